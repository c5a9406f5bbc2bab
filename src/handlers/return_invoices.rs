use super::common::{created_response, map_service_error, success_response, validate_input};
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::documents::{NewDocumentLine, NewReturnInvoice},
};
use axum::{
    extract::{Json, Path, State},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateReturnInvoiceRequest {
    pub reference: Option<String>,
    /// Expedited purchase order the goods are returned against
    pub purchase_order_id: i64,
    pub reason: Option<String>,
    #[validate(length(min = 1))]
    pub lines: Vec<ReturnInvoiceLineRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReturnInvoiceLineRequest {
    pub product_id: i64,
    #[validate(range(min = 1))]
    pub qte: i32,
}

/// Create a return invoice against a purchase order
#[utoipa::path(
    post,
    path = "/api/v1/return-invoices",
    request_body = CreateReturnInvoiceRequest,
    responses(
        (status = 201, description = "Return invoice created"),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Purchase order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "return-invoices"
)]
pub async fn create_return_invoice(
    State(state): State<AppState>,
    Json(payload): Json<CreateReturnInvoiceRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let input = NewReturnInvoice {
        reference: payload.reference,
        purchase_order_id: payload.purchase_order_id,
        reason: payload.reason,
        lines: payload
            .lines
            .into_iter()
            .map(|l| NewDocumentLine {
                product_id: l.product_id,
                qte: l.qte,
                unit_price: None,
            })
            .collect(),
    };

    let (ri, lines) = state
        .services
        .documents
        .create_return_invoice(input)
        .await
        .map_err(map_service_error)?;

    info!("Return invoice created: {} ({})", ri.id, ri.reference);

    Ok(created_response(
        serde_json::json!({ "return_invoice": ri, "lines": lines }),
    ))
}

/// Get a return invoice with its lines
#[utoipa::path(
    get,
    path = "/api/v1/return-invoices/{id}",
    params(("id" = i64, Path, description = "Return invoice ID")),
    responses(
        (status = 200, description = "Return invoice fetched"),
        (status = 404, description = "Return invoice not found", body = crate::errors::ErrorResponse)
    ),
    tag = "return-invoices"
)]
pub async fn get_return_invoice(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (ri, lines) = state
        .services
        .documents
        .get_return_invoice(id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Return invoice {} not found", id)))?;

    Ok(success_response(
        serde_json::json!({ "return_invoice": ri, "lines": lines }),
    ))
}

/// Validate a return invoice (cree -> valide), booking offsetting sortie rows
#[utoipa::path(
    post,
    path = "/api/v1/return-invoices/{id}/validate",
    params(("id" = i64, Path, description = "Return invoice ID")),
    responses(
        (status = 200, description = "Return invoice validated"),
        (status = 404, description = "Return invoice not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Invalid state transition", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "return-invoices"
)]
pub async fn validate_return_invoice(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let settlement = state
        .services
        .settlement
        .validate_return_invoice(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "return_invoice": settlement.document,
        "movements": settlement.movements,
        "already_applied": settlement.already_applied,
    })))
}

/// Creates the router for return invoice endpoints
pub fn return_invoice_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_return_invoice))
        .route("/:id", get(get_return_invoice))
        .route("/:id/validate", post(validate_return_invoice))
}
