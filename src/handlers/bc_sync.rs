use super::common::success_response;
use crate::{
    bc::sync::{CustomerUpsert, ItemPriceUpsert, ItemUpsert, LocationUpsert},
    bc::SyncCancellation,
    errors::ApiError,
    handlers::AppState,
};
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

// Batch-upsert endpoints consumed by the sync job. Each call is
// partial-failure tolerant: one bad record never blocks the rest, and the
// response always carries the applied count plus a structured error list.

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CustomerSyncRequest {
    pub customers: Vec<CustomerUpsert>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ItemSyncRequest {
    pub items: Vec<ItemUpsert>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LocationSyncRequest {
    pub locations: Vec<LocationUpsert>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemPriceSyncRequest {
    pub item_prices: Vec<ItemPriceUpsert>,
}

/// Upsert a batch of customer mirrors
#[utoipa::path(
    post,
    path = "/api/v1/bc-customers/sync",
    request_body = CustomerSyncRequest,
    responses((status = 200, description = "Sync outcome", body = crate::bc::SyncReport)),
    tag = "bc-sync"
)]
pub async fn sync_customers(
    State(state): State<AppState>,
    Json(payload): Json<CustomerSyncRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let report = state
        .services
        .catalog_sync
        .upsert_customers(payload.customers)
        .await;

    info!(
        "Customer sync applied {} records ({} errors)",
        report.count,
        report.errors.len()
    );

    Ok(success_response(report))
}

/// Upsert a batch of item mirrors
#[utoipa::path(
    post,
    path = "/api/v1/bc-items/sync",
    request_body = ItemSyncRequest,
    responses((status = 200, description = "Sync outcome", body = crate::bc::SyncReport)),
    tag = "bc-sync"
)]
pub async fn sync_items(
    State(state): State<AppState>,
    Json(payload): Json<ItemSyncRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let report = state.services.catalog_sync.upsert_items(payload.items).await;

    info!(
        "Item sync applied {} records ({} errors)",
        report.count,
        report.errors.len()
    );

    Ok(success_response(report))
}

/// Upsert a batch of location mirrors
#[utoipa::path(
    post,
    path = "/api/v1/bc-locations/sync",
    request_body = LocationSyncRequest,
    responses((status = 200, description = "Sync outcome", body = crate::bc::SyncReport)),
    tag = "bc-sync"
)]
pub async fn sync_locations(
    State(state): State<AppState>,
    Json(payload): Json<LocationSyncRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let report = state
        .services
        .catalog_sync
        .upsert_locations(payload.locations)
        .await;

    info!(
        "Location sync applied {} records ({} errors)",
        report.count,
        report.errors.len()
    );

    Ok(success_response(report))
}

/// Upsert a batch of item price mirrors
#[utoipa::path(
    post,
    path = "/api/v1/bc-item-prices/sync",
    request_body = ItemPriceSyncRequest,
    responses((status = 200, description = "Sync outcome", body = crate::bc::SyncReport)),
    tag = "bc-sync"
)]
pub async fn sync_item_prices(
    State(state): State<AppState>,
    Json(payload): Json<ItemPriceSyncRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let report = state
        .services
        .catalog_sync
        .upsert_item_prices(payload.item_prices)
        .await;

    info!(
        "Item price sync applied {} records ({} errors)",
        report.count,
        report.errors.len()
    );

    Ok(success_response(report))
}

/// Run a full pull-sync from BC (customers, items, locations, prices)
#[utoipa::path(
    post,
    path = "/api/v1/bc/sync/run",
    responses(
        (status = 200, description = "Per-resource sync reports", body = crate::bc::sync::FullSyncReport),
        (status = 502, description = "BC unreachable", body = crate::errors::ErrorResponse)
    ),
    tag = "bc-sync"
)]
pub async fn run_full_sync(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cancel = SyncCancellation::new();
    let report = state.services.catalog_sync.run_full_sync(&cancel).await;

    Ok(success_response(report))
}

/// Creates the router for BC sync endpoints
pub fn bc_sync_routes() -> Router<AppState> {
    Router::new()
        .route("/bc-customers/sync", post(sync_customers))
        .route("/bc-items/sync", post(sync_items))
        .route("/bc-locations/sync", post(sync_locations))
        .route("/bc-item-prices/sync", post(sync_item_prices))
        .route("/bc/sync/run", post(run_full_sync))
}
