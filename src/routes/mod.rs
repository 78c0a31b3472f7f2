use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::{Cache, CatalogStore, HistoryStore};
use crate::middleware::request_id::{make_span, propagate_request_id};

pub mod books;
pub mod recommendations;

/// Shared application state: the two store capabilities, the optional page
/// cache, and the runtime knobs the services need.
pub struct AppState {
    pub catalog: Arc<dyn CatalogStore>,
    pub history: Arc<dyn HistoryStore>,
    pub cache: Option<Cache>,
    pub store_timeout: Duration,
    pub cache_ttl: u64,
}

impl AppState {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        history: Arc<dyn HistoryStore>,
        cache: Option<Cache>,
        store_timeout: Duration,
        cache_ttl: u64,
    ) -> Self {
        Self {
            catalog,
            history,
            cache,
            store_timeout,
            cache_ttl,
        }
    }
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http().make_span_with(make_span))
        .layer(axum::middleware::from_fn(propagate_request_id))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/books", get(books::list))
        .route("/books/:id", get(books::detail))
        .route(
            "/users/:user_id/recommendations",
            get(recommendations::recommend),
        )
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
