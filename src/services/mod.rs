pub mod documents;
pub mod settlement;
pub mod state_machine;
pub mod stock_ledger;
pub mod stock_view;

use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;

use crate::bc::{BcClient, CatalogSyncService, TokenProvider};
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::EventSender;

use documents::DocumentService;
use settlement::SettlementCoordinator;
use stock_ledger::{NegativeStockPolicy, StockLedger};
use stock_view::StockQueryService;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub documents: Arc<DocumentService>,
    pub settlement: Arc<SettlementCoordinator>,
    pub ledger: Arc<StockLedger>,
    pub stock_view: Arc<StockQueryService>,
    pub catalog_sync: Arc<CatalogSyncService>,
    pub bc_client: Arc<BcClient>,
}

impl AppServices {
    /// Build the service container from configuration.
    pub fn new(
        db_pool: Arc<DatabaseConnection>,
        cfg: &AppConfig,
        event_sender: EventSender,
    ) -> Result<Self, ServiceError> {
        // Token calls carry the same hard timeout as every other BC call
        let token_http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.bc.timeout_secs))
            .build()
            .map_err(|e| {
                ServiceError::InternalError(format!("failed to build HTTP client: {}", e))
            })?;
        let tokens = Arc::new(TokenProvider::new(token_http, &cfg.bc));
        let bc_client = Arc::new(BcClient::new(cfg.bc.clone(), tokens)?);

        let policy = NegativeStockPolicy::from_config(&cfg.negative_stock_policy);
        let ledger = Arc::new(StockLedger::new(db_pool.clone(), policy));
        let settlement = Arc::new(SettlementCoordinator::new(
            db_pool.clone(),
            StockLedger::new(db_pool.clone(), policy),
            Some(event_sender.clone()),
        ));
        let documents = Arc::new(DocumentService::new(db_pool.clone()));
        let stock_view = Arc::new(StockQueryService::new(db_pool.clone()));
        let catalog_sync = Arc::new(CatalogSyncService::new(
            db_pool,
            bc_client.clone(),
            cfg.bc.sync_batch_size,
            cfg.bc.price_fetch_concurrency,
            Duration::from_millis(cfg.bc.price_fetch_pause_ms),
            Some(event_sender),
        ));

        Ok(Self {
            documents,
            settlement,
            ledger,
            stock_view,
            catalog_sync,
            bc_client,
        })
    }
}
