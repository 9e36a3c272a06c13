//! Shared test utilities for catdog-bridge tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use catdog_bridge::{Coordinator, DefaultPlacement};
use catdog_discovery::{EngineConfig, ProtocolVersion};
use catdog_test_utils::{FakeEngine, identity};

/// How long to wait before concluding that a task is blocked.
pub const BLOCKED: Duration = Duration::from_millis(100);

/// A coordinator with both fake engines attached but the gate still pending.
pub struct Harness {
    pub coordinator: Arc<Coordinator>,
    pub v50: Arc<FakeEngine>,
    pub v51: Arc<FakeEngine>,
}

impl Harness {
    pub fn pending() -> Self {
        let coordinator = Arc::new(Coordinator::with_placement(Arc::new(DefaultPlacement)));
        let v50 = FakeEngine::new(ProtocolVersion::V50);
        let v51 = FakeEngine::new(ProtocolVersion::V51);
        coordinator.attach(v50.clone()).unwrap();
        coordinator.attach(v51.clone()).unwrap();
        Self {
            coordinator,
            v50,
            v51,
        }
    }

    pub fn ready() -> Self {
        let harness = Self::pending();
        harness.coordinator.gate().signal_ready();
        harness
    }
}

/// A valid engine configuration under a fresh identity.
pub fn engine_config() -> EngineConfig {
    EngineConfig::builder(identity::random_key())
        .build()
        .expect("valid test config")
}
