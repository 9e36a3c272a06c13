//! API routes and router configuration.

use super::handlers::{AppState, enr_text, health_check, node_status};
use axum::{Router, routing::get};

/// Create the API router with all routes.
///
/// # Routes
///
/// - `GET /enr` - Both node records as plain text
/// - `GET /health` - Health check endpoint
/// - `GET /status` - Per-engine status
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/enr", get(enr_text))
        .route("/health", get(health_check))
        .route("/status", get(node_status))
        .with_state(state)
}
