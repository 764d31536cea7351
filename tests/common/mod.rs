use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use batch_inventory_api::{
    config::AppConfig,
    db,
    events::{self, EventSender},
    handlers::AppServices,
    AppState,
};

/// Helper harness for spinning up an application state backed by a throwaway
/// SQLite database file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    db_file: PathBuf,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_file =
            std::env::temp_dir().join(format!("batch_inventory_test_{}.db", Uuid::new_v4()));
        let db_url = format!("sqlite://{}?mode=rwc", db_file.display());

        let mut cfg = AppConfig::new(
            db_url,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");

        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(db_arc.clone(), Arc::new(event_sender.clone()));

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", batch_inventory_api::api_v1_routes())
            .layer(axum::middleware::from_fn(
                batch_inventory_api::middleware_helpers::request_id::request_id_middleware,
            ))
            .with_state(state.clone());

        Self {
            router,
            state,
            db_file,
            _event_task: event_task,
        }
    }

    /// Send a JSON request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Create a batch through the API and return the `data` object from the
    /// response envelope, asserting a 201.
    pub async fn create_batch(&self, batch_code: &str, volume_liters: f64) -> Value {
        self.create_batch_with(json!({
            "batch_code": batch_code,
            "shelf_life_days": 7,
            "volume_liters": volume_liters,
            "fat_percent": 3.5,
        }))
        .await
    }

    /// Create a batch from an arbitrary request body, asserting a 201.
    pub async fn create_batch_with(&self, body: Value) -> Value {
        let response = self
            .request(Method::POST, "/api/v1/batches", Some(body))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let envelope = read_json(response).await;
        envelope["data"].clone()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
        let _ = std::fs::remove_file(&self.db_file);
    }
}

/// Read a response body as JSON.
pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body was not valid json")
}
