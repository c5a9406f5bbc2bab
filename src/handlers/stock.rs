use super::common::{map_service_error, success_response};
use crate::{errors::ApiError, handlers::AppState};
use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::IntoParams;

// All stock endpoints are read-only: they never mutate the ledger.

#[derive(Debug, Deserialize, IntoParams)]
pub struct ConsultationParams {
    pub salesperson_id: i64,
    pub product_id: Option<i64>,
    pub customer_id: Option<i64>,
    /// Requested quantity used for price resolution
    pub qte: Option<Decimal>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ByLocationParams {
    pub location_code: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TransactionsParams {
    pub salesperson_id: Option<i64>,
    pub product_id: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PriceParams {
    pub item_no: String,
    pub customer_id: Option<i64>,
    pub qte: Decimal,
}

/// Stock consultation for a salesperson: BC snapshot, ledger-derived local
/// stock, and (when a customer and quantity are given) the resolved price
#[utoipa::path(
    get,
    path = "/api/v1/stock/consultation",
    params(ConsultationParams),
    responses((status = 200, description = "Stock consultation rows")),
    tag = "stock"
)]
pub async fn stock_consultation(
    State(state): State<AppState>,
    Query(params): Query<ConsultationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let rows = state
        .services
        .stock_view
        .consultation(
            params.salesperson_id,
            params.product_id,
            params.customer_id,
            params.qte,
        )
        .await
        .map_err(map_service_error)?;

    Ok(success_response(rows))
}

/// ERP inventory snapshot by location (advisory)
#[utoipa::path(
    get,
    path = "/api/v1/stock/by-location",
    params(ByLocationParams),
    responses((status = 200, description = "Snapshot rows by location")),
    tag = "stock"
)]
pub async fn stock_by_location(
    State(state): State<AppState>,
    Query(params): Query<ByLocationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let rows = state
        .services
        .stock_view
        .by_location(params.location_code.as_deref())
        .await
        .map_err(map_service_error)?;

    Ok(success_response(rows))
}

/// Ledger rows, newest first
#[utoipa::path(
    get,
    path = "/api/v1/stock/transactions",
    params(TransactionsParams),
    responses((status = 200, description = "Stock transactions")),
    tag = "stock"
)]
pub async fn stock_transactions(
    State(state): State<AppState>,
    Query(params): Query<TransactionsParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let rows = state
        .services
        .ledger
        .transactions(params.salesperson_id, params.product_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(rows))
}

/// Tiered price resolution for one item
#[utoipa::path(
    get,
    path = "/api/v1/stock/price",
    params(PriceParams),
    responses(
        (status = 200, description = "Resolved price"),
        (status = 404, description = "No applicable price", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn stock_price(
    State(state): State<AppState>,
    Query(params): Query<PriceParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let price = state
        .services
        .stock_view
        .require_price(&params.item_no, params.customer_id, params.qte)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(price))
}

/// Creates the router for stock query endpoints
pub fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/consultation", get(stock_consultation))
        .route("/by-location", get(stock_by_location))
        .route("/transactions", get(stock_transactions))
        .route("/price", get(stock_price))
}
