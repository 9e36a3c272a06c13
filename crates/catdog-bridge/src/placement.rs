//! Where propagated peers land in the receiving engine's table.
//!
//! Discovery tables favour entries near the front of a bucket. Whether a
//! peer learned through the other protocol deserves that position is a
//! policy decision, so it is pluggable.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use catdog_discovery::EngineHandle;
use catdog_identity::NodeRecord;
use serde::{Deserialize, Serialize};

/// Inserts a propagated peer into the receiving engine.
#[async_trait]
pub trait PlacementPolicy: Send + Sync + 'static {
    /// Short name for logs and status output.
    fn name(&self) -> &'static str;

    async fn place(
        &self,
        engine: &dyn EngineHandle,
        peer: Arc<NodeRecord>,
        seen_at: SystemTime,
        liveness: u32,
    );
}

/// Insert at the engine's default position.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPlacement;

#[async_trait]
impl PlacementPolicy for DefaultPlacement {
    fn name(&self) -> &'static str {
        "default"
    }

    async fn place(
        &self,
        engine: &dyn EngineHandle,
        peer: Arc<NodeRecord>,
        seen_at: SystemTime,
        liveness: u32,
    ) {
        engine.insert_recent_peer(peer, seen_at, liveness).await
    }
}

/// Ask the engine for preferential, front-of-bucket placement.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrontOfBucket;

#[async_trait]
impl PlacementPolicy for FrontOfBucket {
    fn name(&self) -> &'static str {
        "front"
    }

    async fn place(
        &self,
        engine: &dyn EngineHandle,
        peer: Arc<NodeRecord>,
        seen_at: SystemTime,
        liveness: u32,
    ) {
        engine.insert_preferred_peer(peer, seen_at, liveness).await
    }
}

/// Configurable choice between the built-in policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    #[default]
    Default,
    Front,
}

impl Placement {
    pub fn policy(self) -> Arc<dyn PlacementPolicy> {
        match self {
            Self::Default => Arc::new(DefaultPlacement),
            Self::Front => Arc::new(FrontOfBucket),
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Front => f.write_str("front"),
        }
    }
}

impl FromStr for Placement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "front" => Ok(Self::Front),
            other => Err(format!(
                "unknown placement '{}' (expected 'default' or 'front')",
                other
            )),
        }
    }
}
