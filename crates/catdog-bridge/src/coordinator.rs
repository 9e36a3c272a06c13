//! The bridge coordinator.
//!
//! The coordinator owns the hooks both engines call. It holds no mutable
//! state besides the [`InitGate`] and the two engine handles, which are each
//! attached once before the gate opens.

use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use async_trait::async_trait;
use catdog_discovery::{EngineHandle, EngineHooks, Error as DiscoveryError, ProtocolVersion};
use catdog_identity::NodeRecord;
use tracing::{debug, trace, warn};

use crate::placement::{DefaultPlacement, PlacementPolicy};
use crate::{BridgeError, InitGate, Result};

/// Routes hook calls between a v5.0 and a v5.1 engine.
pub struct Coordinator {
    gate: InitGate,
    v50: OnceLock<Arc<dyn EngineHandle>>,
    v51: OnceLock<Arc<dyn EngineHandle>>,
    placement: Arc<dyn PlacementPolicy>,
}

impl Coordinator {
    /// A coordinator with a pending gate and default placement.
    pub fn new() -> Self {
        Self::with_placement(Arc::new(DefaultPlacement))
    }

    pub fn with_placement(placement: Arc<dyn PlacementPolicy>) -> Self {
        Self::with_gate(InitGate::new(), placement)
    }

    /// A coordinator waiting on an externally owned gate.
    pub fn with_gate(gate: InitGate, placement: Arc<dyn PlacementPolicy>) -> Self {
        Self {
            gate,
            v50: OnceLock::new(),
            v51: OnceLock::new(),
            placement,
        }
    }

    pub fn gate(&self) -> &InitGate {
        &self.gate
    }

    pub fn placement(&self) -> &dyn PlacementPolicy {
        self.placement.as_ref()
    }

    /// Attach the engine for its protocol version.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::AlreadyAttached`] if an engine for the same
    /// version is already attached.
    pub fn attach(&self, engine: Arc<dyn EngineHandle>) -> Result<()> {
        let version = engine.version();
        self.slot(version)
            .set(engine)
            .map_err(|_| BridgeError::AlreadyAttached(version))
    }

    /// The attached engine for `version`, if any.
    pub fn engine(&self, version: ProtocolVersion) -> Option<&Arc<dyn EngineHandle>> {
        self.slot(version).get()
    }

    /// Hooks to install into the `version` engine's configuration.
    pub fn hooks(self: &Arc<Self>, version: ProtocolVersion) -> Arc<dyn EngineHooks> {
        Arc::new(BridgeHooks {
            coordinator: Arc::clone(self),
            version,
        })
    }

    /// The v5.0 engine saw `peer`; copy it into the v5.1 table.
    pub async fn on_seen_v50(&self, peer: Arc<NodeRecord>, seen_at: SystemTime, liveness: u32) {
        self.propagate(ProtocolVersion::V50, peer, seen_at, liveness)
            .await
    }

    /// The v5.1 engine saw `peer`; copy it into the v5.0 table.
    pub async fn on_seen_v51(&self, peer: Arc<NodeRecord>, seen_at: SystemTime, liveness: u32) {
        self.propagate(ProtocolVersion::V51, peer, seen_at, liveness)
            .await
    }

    /// Check that `peer` is alive, preferring v5.1.
    ///
    /// Pings over v5.1 first. If that fails, pings over v5.0 and returns its
    /// outcome unchanged, so a peer unreachable over both protocols fails
    /// exactly as it would without the bridge.
    pub async fn revalidate(&self, peer: &NodeRecord) -> std::result::Result<u64, DiscoveryError> {
        self.gate.await_ready().await;

        match self.engine(ProtocolVersion::V51) {
            Some(v51) => match v51.ping_for_sequence(peer).await {
                Ok(seq) => return Ok(seq),
                Err(e) => debug!(
                    peer = %peer.id().fmt_short(),
                    "v5.1 ping failed, falling back to v5.0: {}", e
                ),
            },
            None => warn!("Revalidating without a v5.1 engine"),
        }

        let v50 = self
            .engine(ProtocolVersion::V50)
            .ok_or(DiscoveryError::EngineUnavailable(ProtocolVersion::V50))?;
        v50.ping_for_sequence(peer).await
    }

    async fn propagate(
        &self,
        from: ProtocolVersion,
        peer: Arc<NodeRecord>,
        seen_at: SystemTime,
        liveness: u32,
    ) {
        self.gate.await_ready().await;

        let to = from.other();
        let Some(engine) = self.engine(to) else {
            warn!(
                peer = %peer.id().fmt_short(),
                "No {} engine to propagate to", to.label()
            );
            return;
        };

        trace!(
            peer = %peer.id().fmt_short(),
            from = from.label(),
            to = to.label(),
            liveness,
            "Propagating peer"
        );
        self.placement
            .place(engine.as_ref(), peer, seen_at, liveness)
            .await;
    }

    fn slot(&self, version: ProtocolVersion) -> &OnceLock<Arc<dyn EngineHandle>> {
        match version {
            ProtocolVersion::V50 => &self.v50,
            ProtocolVersion::V51 => &self.v51,
        }
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// The hooks one engine calls, bound to the coordinator.
pub struct BridgeHooks {
    coordinator: Arc<Coordinator>,
    version: ProtocolVersion,
}

impl BridgeHooks {
    /// Version of the engine these hooks are installed in.
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }
}

#[async_trait]
impl EngineHooks for BridgeHooks {
    async fn on_seen(&self, node: Arc<NodeRecord>, seen_at: SystemTime, liveness: u32) {
        match self.version {
            ProtocolVersion::V50 => self.coordinator.on_seen_v50(node, seen_at, liveness).await,
            ProtocolVersion::V51 => self.coordinator.on_seen_v51(node, seen_at, liveness).await,
        }
    }

    async fn revalidate(&self, node: Arc<NodeRecord>) -> catdog_discovery::Result<u64> {
        self.coordinator.revalidate(&node).await
    }
}
