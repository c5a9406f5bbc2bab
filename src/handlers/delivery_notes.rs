use super::common::{
    created_response, map_service_error, success_response, validate_input, PaginatedResponse,
    PaginationParams,
};
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::documents::{NewDeliveryNote, NewDocumentLine},
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
pub struct CreateDeliveryNoteRequest {
    pub reference: Option<String>,
    pub salesperson_id: i64,
    pub customer_id: Option<i64>,
    pub notes: Option<String>,
    #[validate(length(min = 1))]
    pub lines: Vec<DeliveryNoteLineRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct DeliveryNoteLineRequest {
    pub product_id: i64,
    #[validate(range(min = 1))]
    pub qte: i32,
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct ListFilter {
    pub status: Option<String>,
}

/// Create a delivery note
#[utoipa::path(
    post,
    path = "/api/v1/delivery-notes",
    request_body = CreateDeliveryNoteRequest,
    responses(
        (status = 201, description = "Delivery note created"),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "delivery-notes"
)]
pub async fn create_delivery_note(
    State(state): State<AppState>,
    Json(payload): Json<CreateDeliveryNoteRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let input = NewDeliveryNote {
        reference: payload.reference,
        salesperson_id: payload.salesperson_id,
        customer_id: payload.customer_id,
        notes: payload.notes,
        lines: payload
            .lines
            .into_iter()
            .map(|l| NewDocumentLine {
                product_id: l.product_id,
                qte: l.qte,
                unit_price: l.unit_price,
            })
            .collect(),
    };

    let (dn, lines) = state
        .services
        .documents
        .create_delivery_note(input)
        .await
        .map_err(map_service_error)?;

    info!("Delivery note created: {} ({})", dn.id, dn.reference);

    Ok(created_response(
        serde_json::json!({ "delivery_note": dn, "lines": lines }),
    ))
}

/// Get a delivery note with its lines
#[utoipa::path(
    get,
    path = "/api/v1/delivery-notes/{id}",
    params(("id" = i64, Path, description = "Delivery note ID")),
    responses(
        (status = 200, description = "Delivery note fetched"),
        (status = 404, description = "Delivery note not found", body = crate::errors::ErrorResponse)
    ),
    tag = "delivery-notes"
)]
pub async fn get_delivery_note(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (dn, lines) = state
        .services
        .documents
        .get_delivery_note(id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Delivery note {} not found", id)))?;

    Ok(success_response(
        serde_json::json!({ "delivery_note": dn, "lines": lines }),
    ))
}

/// List delivery notes
#[utoipa::path(
    get,
    path = "/api/v1/delivery-notes",
    params(PaginationParams),
    responses((status = 200, description = "Delivery notes listed")),
    tag = "delivery-notes"
)]
pub async fn list_delivery_notes(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<ListFilter>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (items, total) = state
        .services
        .documents
        .list_delivery_notes(filter.status.as_deref(), pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        items,
        pagination.page,
        pagination.per_page,
        total,
    )))
}

/// Validate a delivery note (cree -> valide), booking one sortie per line
#[utoipa::path(
    post,
    path = "/api/v1/delivery-notes/{id}/validate",
    params(("id" = i64, Path, description = "Delivery note ID")),
    responses(
        (status = 200, description = "Delivery note validated"),
        (status = 404, description = "Delivery note not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Invalid state transition", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "delivery-notes"
)]
pub async fn validate_delivery_note(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let settlement = state
        .services
        .settlement
        .validate_delivery_note(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "delivery_note": settlement.document,
        "movements": settlement.movements,
        "already_applied": settlement.already_applied,
    })))
}

/// Cancel a delivery note (cree -> annule)
#[utoipa::path(
    post,
    path = "/api/v1/delivery-notes/{id}/cancel",
    params(("id" = i64, Path, description = "Delivery note ID")),
    responses(
        (status = 200, description = "Delivery note cancelled"),
        (status = 409, description = "Invalid state transition", body = crate::errors::ErrorResponse)
    ),
    tag = "delivery-notes"
)]
pub async fn cancel_delivery_note(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let settlement = state
        .services
        .settlement
        .cancel_delivery_note(id)
        .await
        .map_err(map_service_error)?;

    info!("Delivery note cancelled: {}", id);

    Ok(success_response(serde_json::json!({
        "delivery_note": settlement.document,
        "already_applied": settlement.already_applied,
    })))
}

/// Creates the router for delivery note endpoints
pub fn delivery_note_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_delivery_note))
        .route("/", get(list_delivery_notes))
        .route("/:id", get(get_delivery_note))
        .route("/:id/validate", post(validate_delivery_note))
        .route("/:id/cancel", post(cancel_delivery_note))
}
