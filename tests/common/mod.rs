use std::sync::Arc;

use axum::{
    body,
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use vansale_api::{
    config::AppConfig,
    db,
    entities::{bc_item, product},
    events::{self, EventSender},
    services::AppServices,
    AppState,
};

/// Helper harness spinning up an application backed by an in-memory SQLite
/// database. One pooled connection keeps the database alive for the whole
/// test.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(db_arc.clone(), &cfg, event_sender.clone())
            .expect("failed to build services");

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", vansale_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Fire one request through the router.
    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(path);
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                body::Body::from(value.to_string())
            }
            None => body::Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("request build"))
            .await
            .expect("request dispatch")
    }

    /// Insert a catalog product directly, returning its id.
    pub async fn seed_product(&self, code: &str, bc_item_no: Option<&str>) -> i64 {
        let now = Utc::now();
        let row = product::ActiveModel {
            code: Set(code.to_string()),
            designation: Set(format!("Product {}", code)),
            unit: Set(Some("PCS".to_string())),
            bc_item_no: Set(bc_item_no.map(str::to_string)),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product");
        row.id
    }

    /// Insert a BC item mirror directly, returning its id.
    pub async fn seed_bc_item(&self, no: &str, inventory: Option<rust_decimal::Decimal>) -> i64 {
        let now = Utc::now();
        let row = bc_item::ActiveModel {
            bc_id: Set(format!("bc-item-{}", no)),
            no: Set(no.to_string()),
            display_name: Set(format!("Item {}", no)),
            item_category_code: Set(None),
            base_unit_of_measure: Set(Some("PCS".to_string())),
            unit_price: Set(None),
            inventory: Set(inventory),
            etag: Set(None),
            last_modified: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed bc item");
        row.id
    }
}

/// Decode a response body as JSON.
pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Assert a status and decode the body in one step.
pub async fn expect_json(response: Response, status: StatusCode) -> Value {
    assert_eq!(response.status(), status, "unexpected response status");
    response_json(response).await
}
