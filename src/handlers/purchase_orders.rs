use super::common::{
    created_response, map_service_error, success_response, validate_input, PaginatedResponse,
    PaginationParams,
};
use crate::{
    bc::client::{BcPurchaseOrderLineSubmission, BcPurchaseOrderSubmission},
    entities::product,
    errors::ApiError,
    handlers::AppState,
    services::documents::{NewDocumentLine, NewPurchaseOrder},
    services::settlement::ReceivedLine,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

// Request and response DTOs

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreatePurchaseOrderRequest {
    pub reference: Option<String>,
    pub salesperson_id: i64,
    pub depot_location_code: Option<String>,
    pub notes: Option<String>,
    #[validate(length(min = 1))]
    pub lines: Vec<PurchaseOrderLineRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct PurchaseOrderLineRequest {
    pub product_id: i64,
    #[validate(range(min = 1))]
    pub qte: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct MarkExpedieRequest {
    /// Received quantities per line; omit to keep the stored values
    #[serde(default)]
    pub lines: Vec<ReceivedLineRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReceivedLineRequest {
    pub line_id: i64,
    #[validate(range(min = 0))]
    pub qte_recue: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct SendToBcRequest {
    #[validate(length(min = 1))]
    pub vendor_number: String,
}

#[derive(Debug, Deserialize)]
pub struct ListFilter {
    pub status: Option<String>,
}

// Handler functions

/// Create a purchase order
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders",
    request_body = CreatePurchaseOrderRequest,
    responses(
        (status = 201, description = "Purchase order created"),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn create_purchase_order(
    State(state): State<AppState>,
    Json(payload): Json<CreatePurchaseOrderRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let input = NewPurchaseOrder {
        reference: payload.reference,
        salesperson_id: payload.salesperson_id,
        depot_location_code: payload.depot_location_code,
        notes: payload.notes,
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

    let (po, lines) = state
        .services
        .documents
        .create_purchase_order(input)
        .await
        .map_err(map_service_error)?;

    info!("Purchase order created: {} ({})", po.id, po.reference);

    Ok(created_response(
        serde_json::json!({ "purchase_order": po, "lines": lines }),
    ))
}

/// Get a purchase order with its lines
#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders/{id}",
    params(("id" = i64, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order fetched"),
        (status = 404, description = "Purchase order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn get_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (po, lines) = state
        .services
        .documents
        .get_purchase_order(id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Purchase order {} not found", id)))?;

    Ok(success_response(
        serde_json::json!({ "purchase_order": po, "lines": lines }),
    ))
}

/// List purchase orders
#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders",
    params(PaginationParams),
    responses((status = 200, description = "Purchase orders listed")),
    tag = "purchase-orders"
)]
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<ListFilter>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (items, total) = state
        .services
        .documents
        .list_purchase_orders(filter.status.as_deref(), pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        items,
        pagination.page,
        pagination.per_page,
        total,
    )))
}

/// Validate a purchase order (non_valide -> valide)
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/validate",
    params(("id" = i64, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order validated"),
        (status = 404, description = "Purchase order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Invalid state transition", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn validate_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let settlement = state
        .services
        .settlement
        .validate_purchase_order(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "purchase_order": settlement.document,
        "already_applied": settlement.already_applied,
    })))
}

/// Submit a purchase order to BC and record the confirmed document number
/// (valide -> envoye_bc)
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/send-to-bc",
    request_body = SendToBcRequest,
    params(("id" = i64, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order sent to BC"),
        (status = 409, description = "Invalid state transition", body = crate::errors::ErrorResponse),
        (status = 502, description = "BC submission failed", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn send_purchase_order_to_bc(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<SendToBcRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let (po, lines) = state
        .services
        .documents
        .get_purchase_order(id)
        .await
        .map_err(map_service_error)?
        .ok_or_else(|| ApiError::NotFound(format!("Purchase order {} not found", id)))?;

    // Already submitted: return the stored result instead of re-posting
    if let Some(bc_number) = po.bc_number.clone() {
        let settlement = state
            .services
            .settlement
            .record_bc_submission(id, &bc_number, po.bc_status.as_deref())
            .await
            .map_err(map_service_error)?;
        return Ok(success_response(serde_json::json!({
            "purchase_order": settlement.document,
            "already_applied": settlement.already_applied,
        })));
    }

    // Map local product lines to BC item numbers
    let product_ids: Vec<i64> = lines.iter().map(|l| l.product_id).collect();
    let products = product::Entity::find()
        .filter(product::Column::Id.is_in(product_ids))
        .all(&*state.db)
        .await
        .map_err(|e| map_service_error(e.into()))?;

    let mut bc_lines = Vec::with_capacity(lines.len());
    for line in &lines {
        let item_number = products
            .iter()
            .find(|p| p.id == line.product_id)
            .and_then(|p| p.bc_item_no.clone())
            .ok_or_else(|| {
                ApiError::ValidationError(format!(
                    "product {} has no BC item number",
                    line.product_id
                ))
            })?;
        bc_lines.push(BcPurchaseOrderLineSubmission {
            item_number,
            quantity: Decimal::from(line.qte),
        });
    }

    let submission = BcPurchaseOrderSubmission {
        vendor_number: payload.vendor_number,
        external_document_number: po.reference.clone(),
        lines: bc_lines,
    };

    // POST against BC is not retried; a failure surfaces as 502 and the
    // document stays in valide
    let bc_po = state
        .services
        .bc_client
        .submit_purchase_order(&submission)
        .await
        .map_err(map_service_error)?;

    let settlement = state
        .services
        .settlement
        .record_bc_submission(id, &bc_po.number, bc_po.status.as_deref())
        .await
        .map_err(map_service_error)?;

    info!("Purchase order {} sent to BC as {}", id, bc_po.number);

    Ok(success_response(serde_json::json!({
        "purchase_order": settlement.document,
        "already_applied": settlement.already_applied,
    })))
}

/// Mark a purchase order as expedited (envoye_bc -> expedie), booking one
/// entree per line from qte_recue
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/mark-as-expedie",
    request_body = MarkExpedieRequest,
    params(("id" = i64, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order expedited"),
        (status = 404, description = "Purchase order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Invalid state transition", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn mark_as_expedie(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<MarkExpedieRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let received: Vec<ReceivedLine> = payload
        .lines
        .iter()
        .map(|l| ReceivedLine {
            line_id: l.line_id,
            qte_recue: l.qte_recue,
        })
        .collect();

    let settlement = state
        .services
        .settlement
        .mark_purchase_order_expedie(id, &received)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "purchase_order": settlement.document,
        "movements": settlement.movements,
        "already_applied": settlement.already_applied,
    })))
}

/// Cancel a purchase order (legal until expedie)
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/cancel",
    params(("id" = i64, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order cancelled"),
        (status = 409, description = "Invalid state transition", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn cancel_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let settlement = state
        .services
        .settlement
        .cancel_purchase_order(id)
        .await
        .map_err(map_service_error)?;

    info!("Purchase order cancelled: {}", id);

    Ok(success_response(serde_json::json!({
        "purchase_order": settlement.document,
        "already_applied": settlement.already_applied,
    })))
}

/// Creates the router for purchase order endpoints
pub fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_purchase_order))
        .route("/", get(list_purchase_orders))
        .route("/:id", get(get_purchase_order))
        .route("/:id/validate", post(validate_purchase_order))
        .route("/:id/send-to-bc", post(send_purchase_order_to_bc))
        .route("/:id/mark-as-expedie", post(mark_as_expedie))
        .route("/:id/cancel", post(cancel_purchase_order))
}
