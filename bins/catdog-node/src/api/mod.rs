//! HTTP API for reading the node's records.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod types;

pub use error::ApiError;
pub use handlers::{AppState, enr_text, engine_status, health_check, node_status};
pub use routes::create_router;
pub use types::{EngineStatus, HealthResponse, StatusResponse};
