use super::common::{
    created_response, map_service_error, success_response, validate_input, PaginatedResponse,
    PaginationParams,
};
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::documents::{NewDocumentLine, NewSale},
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateSaleRequest {
    pub reference: Option<String>,
    pub salesperson_id: i64,
    pub customer_id: Option<i64>,
    #[validate(length(min = 1))]
    pub lines: Vec<SaleLineRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct SaleLineRequest {
    pub product_id: i64,
    #[validate(range(min = 1))]
    pub qte: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ListFilter {
    pub status: Option<String>,
}

/// Create a sale
#[utoipa::path(
    post,
    path = "/api/v1/sales",
    request_body = CreateSaleRequest,
    responses(
        (status = 201, description = "Sale created"),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn create_sale(
    State(state): State<AppState>,
    Json(payload): Json<CreateSaleRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let input = NewSale {
        reference: payload.reference,
        salesperson_id: payload.salesperson_id,
        customer_id: payload.customer_id,
        lines: payload
            .lines
            .into_iter()
            .map(|l| NewDocumentLine {
                product_id: l.product_id,
                qte: l.qte,
                unit_price: Some(l.unit_price),
            })
            .collect(),
    };

    let (sale, lines) = state
        .services
        .documents
        .create_sale(input)
        .await
        .map_err(map_service_error)?;

    info!("Sale created: {} ({})", sale.id, sale.reference);

    Ok(created_response(
        serde_json::json!({ "sale": sale, "lines": lines }),
    ))
}

/// Get a sale with its lines
#[utoipa::path(
    get,
    path = "/api/v1/sales/{id}",
    params(("id" = i64, Path, description = "Sale ID")),
    responses(
        (status = 200, description = "Sale fetched"),
        (status = 404, description = "Sale not found", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn get_sale(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (sale, lines) = state
        .services
        .documents
        .get_sale(id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Sale {} not found", id)))?;

    Ok(success_response(
        serde_json::json!({ "sale": sale, "lines": lines }),
    ))
}

/// List sales
#[utoipa::path(
    get,
    path = "/api/v1/sales",
    params(PaginationParams),
    responses((status = 200, description = "Sales listed")),
    tag = "sales"
)]
pub async fn list_sales(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<ListFilter>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (items, total) = state
        .services
        .documents
        .list_sales(filter.status.as_deref(), pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        items,
        pagination.page,
        pagination.per_page,
        total,
    )))
}

/// Validate a sale (cree -> valide), booking one sortie per line
#[utoipa::path(
    post,
    path = "/api/v1/sales/{id}/validate",
    params(("id" = i64, Path, description = "Sale ID")),
    responses(
        (status = 200, description = "Sale validated"),
        (status = 404, description = "Sale not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Invalid state transition", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn validate_sale(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let settlement = state
        .services
        .settlement
        .validate_sale(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "sale": settlement.document,
        "movements": settlement.movements,
        "already_applied": settlement.already_applied,
    })))
}

/// Cancel a sale (cree -> annule)
#[utoipa::path(
    post,
    path = "/api/v1/sales/{id}/cancel",
    params(("id" = i64, Path, description = "Sale ID")),
    responses(
        (status = 200, description = "Sale cancelled"),
        (status = 409, description = "Invalid state transition", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn cancel_sale(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let settlement = state
        .services
        .settlement
        .cancel_sale(id)
        .await
        .map_err(map_service_error)?;

    info!("Sale cancelled: {}", id);

    Ok(success_response(serde_json::json!({
        "sale": settlement.document,
        "already_applied": settlement.already_applied,
    })))
}

/// Creates the router for sale endpoints
pub fn sale_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_sale))
        .route("/", get(list_sales))
        .route("/:id", get(get_sale))
        .route("/:id/validate", post(validate_sale))
        .route("/:id/cancel", post(cancel_sale))
}
