//! HTTP request handlers for the node API.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use catdog_bridge::Bridge;
use catdog_discovery::EngineHandle;
use tracing::info;

use super::error::ApiError;
use super::types::{EngineStatus, HealthResponse, StatusResponse};

/// Shared state for HTTP handlers.
///
/// Cloned for each request. The engines are only read from.
#[derive(Clone)]
pub struct AppState {
    pub v50: Arc<dyn EngineHandle>,
    pub v51: Arc<dyn EngineHandle>,
    /// Name of the placement policy in use.
    pub placement: &'static str,
}

impl AppState {
    pub fn from_bridge(bridge: &Bridge) -> Self {
        Self {
            v50: Arc::clone(bridge.v50()),
            v51: Arc::clone(bridge.v51()),
            placement: bridge.coordinator().placement().name(),
        }
    }
}

/// `GET /enr`: both current records as plain text.
pub async fn enr_text(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    info!("Received ENR API request");

    let v50 = state.v50.local_record().to_text()?;
    let v51 = state.v51.local_record().to_text()?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=UTF-8")],
        format!("v5.0: \n{}\n\nv5.1: \n{}", v50, v51),
    ))
}

/// `GET /health`
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// `GET /status`: record and table size of each engine.
pub async fn node_status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    Ok(Json(StatusResponse {
        v50: engine_status(state.v50.as_ref()).await?,
        v51: engine_status(state.v51.as_ref()).await?,
        placement: state.placement.to_string(),
    }))
}

pub async fn engine_status(engine: &dyn EngineHandle) -> Result<EngineStatus, ApiError> {
    let record = engine.local_record();
    Ok(EngineStatus {
        version: engine.version(),
        node_id: record.id().to_string(),
        seq: record.seq(),
        enr: record.to_text()?,
        peer_count: engine.peer_count().await,
    })
}
