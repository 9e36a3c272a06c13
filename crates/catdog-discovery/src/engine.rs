//! Discovery engine capability interface.
//!
//! The bridge never depends on a concrete engine. It starts engines through
//! [`EngineStarter`], talks to running engines through [`EngineHandle`], and
//! is called back by engines through [`EngineHooks`].

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use catdog_identity::NodeRecord;
use serde::{Deserialize, Serialize};

use crate::{EngineConfig, Result};

/// Discovery wire-protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// The older protocol that participants are migrating away from.
    #[serde(rename = "v5.0")]
    V50,
    /// The newer protocol that participants are migrating to.
    #[serde(rename = "v5.1")]
    V51,
}

impl ProtocolVersion {
    /// Label used in logs and status output, e.g. `v5.0`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::V50 => "v5.0",
            Self::V51 => "v5.1",
        }
    }

    /// The other protocol version.
    pub fn other(&self) -> Self {
        match self {
            Self::V50 => Self::V51,
            Self::V51 => Self::V50,
        }
    }

    /// Magic prefix of every packet sent under this version.
    pub(crate) fn wire_tag(&self) -> &'static [u8] {
        match self {
            Self::V50 => b"catdog/5.0",
            Self::V51 => b"catdog/5.1",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V50 => f.write_str("5.0"),
            Self::V51 => f.write_str("5.1"),
        }
    }
}

/// Callbacks an engine invokes from its background activity.
///
/// Engines may call these from any task, concurrently. Implementations may
/// suspend for a long time, so engines must not call them from their packet
/// loop directly.
#[async_trait]
pub trait EngineHooks: Send + Sync + 'static {
    /// A peer was just added to the table or proved itself alive again.
    async fn on_seen(&self, node: Arc<NodeRecord>, seen_at: SystemTime, liveness: u32);

    /// Check that `node` is alive and fetch its current record sequence.
    async fn revalidate(&self, node: Arc<NodeRecord>) -> Result<u64>;
}

/// A running discovery engine.
#[async_trait]
pub trait EngineHandle: Send + Sync + 'static {
    /// Protocol version this engine speaks.
    fn version(&self) -> ProtocolVersion;

    /// The engine's own current record.
    fn local_record(&self) -> NodeRecord;

    /// Number of live entries in the routing table.
    async fn peer_count(&self) -> usize;

    /// Best-effort insertion of a recently seen peer at default priority.
    ///
    /// Rejections (full bucket, restricted network, own record) are the
    /// engine's concern and are not reported.
    async fn insert_recent_peer(&self, node: Arc<NodeRecord>, seen_at: SystemTime, liveness: u32);

    /// Best-effort insertion with preferential placement.
    ///
    /// Engines without a notion of priority treat this as
    /// [`insert_recent_peer`](EngineHandle::insert_recent_peer).
    async fn insert_preferred_peer(
        &self,
        node: Arc<NodeRecord>,
        seen_at: SystemTime,
        liveness: u32,
    ) {
        self.insert_recent_peer(node, seen_at, liveness).await
    }

    /// Ping `node` and return the record sequence it reports.
    async fn ping_for_sequence(&self, node: &NodeRecord) -> Result<u64>;

    /// Release the engine's resources. Calling this more than once is a no-op.
    async fn close(&self);
}

/// Starts an engine with a configuration.
#[async_trait]
pub trait EngineStarter: Send + 'static {
    /// Protocol version the started engine will speak.
    fn version(&self) -> ProtocolVersion;

    /// Begin listening and return the running engine.
    async fn start(self, config: EngineConfig) -> Result<Arc<dyn EngineHandle>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_label() {
        assert_eq!(ProtocolVersion::V50.to_string(), "5.0");
        assert_eq!(ProtocolVersion::V51.label(), "v5.1");
    }

    #[test]
    fn other_swaps_versions() {
        assert_eq!(ProtocolVersion::V50.other(), ProtocolVersion::V51);
        assert_eq!(ProtocolVersion::V51.other(), ProtocolVersion::V50);
    }

    #[test]
    fn wire_tags_differ() {
        assert_ne!(
            ProtocolVersion::V50.wire_tag(),
            ProtocolVersion::V51.wire_tag()
        );
    }

    #[test]
    fn serde_uses_labels() {
        assert_eq!(
            serde_json::to_string(&ProtocolVersion::V51).unwrap(),
            "\"v5.1\""
        );
    }
}
