//! Shared test utilities for catdog-discovery tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use catdog_discovery::{
    EngineConfig, EngineConfigBuilder, EngineHooks, Error, ProtocolVersion, RESP_TIMEOUT, Result,
    UdpEngine, UdpStarter,
};
use catdog_identity::{LocalNode, NodeId, NodeRecord};
use catdog_test_utils::identity;

/// Response timeout used by test engines.
pub const TEST_TIMEOUT: Duration = Duration::from_millis(250);

/// Builder with test-friendly timeouts.
pub fn test_config(local: &LocalNode) -> EngineConfigBuilder {
    EngineConfig::builder(local.signing_key().clone())
        .resp_timeout(TEST_TIMEOUT)
        .revalidate_interval(Duration::from_secs(3600))
        .refresh_interval(Duration::from_secs(3600))
}

/// Start an engine on loopback with default test settings.
pub async fn start_engine(version: ProtocolVersion) -> Arc<UdpEngine> {
    start_engine_with(version, |b| b).await
}

/// Start an engine on loopback, customising its configuration.
pub async fn start_engine_with(
    version: ProtocolVersion,
    configure: impl FnOnce(EngineConfigBuilder) -> EngineConfigBuilder,
) -> Arc<UdpEngine> {
    let local = identity::random_local_node();
    let config = configure(test_config(&local))
        .build()
        .expect("valid test config");
    UdpStarter::bind(version, "127.0.0.1:0".parse().unwrap(), local)
        .await
        .expect("failed to bind test socket")
        .start_udp(config)
        .expect("failed to start test engine")
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Hooks that record `on_seen` calls and answer `revalidate` from a script.
#[derive(Default)]
pub struct RecordingHooks {
    seen: Mutex<Vec<(NodeId, u32)>>,
    revalidations: Mutex<Vec<NodeId>>,
    revalidate_answer: Mutex<Option<u64>>,
}

impl RecordingHooks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `revalidate` succeed with `seq`; `None` makes it fail.
    pub fn answer_revalidate(&self, seq: Option<u64>) {
        *self.revalidate_answer.lock().unwrap() = seq;
    }

    pub fn seen(&self) -> Vec<(NodeId, u32)> {
        self.seen.lock().unwrap().clone()
    }

    pub fn seen_ids(&self) -> Vec<NodeId> {
        self.seen().into_iter().map(|(id, _)| id).collect()
    }

    pub fn revalidations(&self) -> Vec<NodeId> {
        self.revalidations.lock().unwrap().clone()
    }
}

#[async_trait]
impl EngineHooks for RecordingHooks {
    async fn on_seen(&self, node: Arc<NodeRecord>, _seen_at: SystemTime, liveness: u32) {
        self.seen.lock().unwrap().push((node.id(), liveness));
    }

    async fn revalidate(&self, node: Arc<NodeRecord>) -> Result<u64> {
        self.revalidations.lock().unwrap().push(node.id());
        let answer = *self.revalidate_answer.lock().unwrap();
        answer.ok_or(Error::Timeout(RESP_TIMEOUT))
    }
}

/// Hooks whose `on_seen` never returns, like a bridge that is not ready yet.
#[derive(Default)]
pub struct ParkedHooks {
    entered: AtomicUsize,
}

impl ParkedHooks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of `on_seen` calls currently or previously parked.
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineHooks for ParkedHooks {
    async fn on_seen(&self, _node: Arc<NodeRecord>, _seen_at: SystemTime, _liveness: u32) {
        self.entered.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
    }

    async fn revalidate(&self, _node: Arc<NodeRecord>) -> Result<u64> {
        Err(Error::Timeout(RESP_TIMEOUT))
    }
}
