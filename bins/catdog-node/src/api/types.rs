//! API response types.

use catdog_discovery::ProtocolVersion;
use serde::{Deserialize, Serialize};

/// Response for the health check endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    /// Status of the node ("ok" if healthy).
    pub status: String,
}

/// Response for the node status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub v50: EngineStatus,
    pub v51: EngineStatus,
    /// Name of the placement policy for propagated peers.
    pub placement: String,
}

/// State of one discovery engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineStatus {
    pub version: ProtocolVersion,
    /// Node ID, hex encoded.
    pub node_id: String,
    /// Sequence number of the current record.
    pub seq: u64,
    /// Current record in `enr:` text form.
    pub enr: String,
    /// Number of peers in the routing table.
    pub peer_count: usize,
}
