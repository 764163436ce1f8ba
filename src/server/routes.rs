//! Router configuration for the dashboard server.

use axum::{routing::get, Router};

use super::handlers;
use super::AppState;

/// Create the router: the dashboard page plus its two JSON endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/brands", get(handlers::api_brands))
        .route("/api/summary", get(handlers::api_summary))
        .with_state(state)
}
