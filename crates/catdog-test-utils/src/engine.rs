//! In-memory discovery engines for bridge tests.
//!
//! [`FakeEngine`] implements [`EngineHandle`] without any networking. It
//! records every insertion, ping and close so tests can assert exactly how
//! the bridge drove it. Ping outcomes are scripted per peer.
//!
//! [`FakeStarter`] hands a prepared [`FakeEngine`] to the bridge, captures the
//! hooks the bridge installs and can be told to fail.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use catdog_discovery::{
    EngineConfig, EngineHandle, EngineHooks, EngineStarter, Error, ProtocolVersion, RESP_TIMEOUT,
    Result,
};
use catdog_identity::{NodeId, NodeRecord};

use crate::identity::{random_key, record_for_key};

// ============================================================================
// FakeEngine
// ============================================================================

/// One call to an insertion operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertCall {
    pub node: Arc<NodeRecord>,
    pub seen_at: SystemTime,
    pub liveness: u32,
    /// Whether the preferential insertion operation was used.
    pub preferred: bool,
}

/// Scripted engine that records how it is used.
///
/// Pings fail with [`Error::Timeout`] unless answered with
/// [`FakeEngine::answer_pings`], and with [`Error::Closed`] once closed.
pub struct FakeEngine {
    version: ProtocolVersion,
    record: NodeRecord,
    inserts: Mutex<Vec<InsertCall>>,
    pings: Mutex<Vec<NodeId>>,
    ping_results: Mutex<HashMap<NodeId, u64>>,
    ping_delay: Mutex<Duration>,
    reject_inserts: Mutex<bool>,
    closes: AtomicUsize,
    close_log: Option<Arc<Mutex<Vec<ProtocolVersion>>>>,
}

impl FakeEngine {
    /// An engine whose pings all fail until scripted otherwise.
    pub fn new(version: ProtocolVersion) -> Arc<Self> {
        Arc::new(Self::build(version, None))
    }

    /// Like [`FakeEngine::new`], appending its version to `log` when closed.
    pub fn with_close_log(
        version: ProtocolVersion,
        log: Arc<Mutex<Vec<ProtocolVersion>>>,
    ) -> Arc<Self> {
        Arc::new(Self::build(version, Some(log)))
    }

    fn build(version: ProtocolVersion, close_log: Option<Arc<Mutex<Vec<ProtocolVersion>>>>) -> Self {
        Self {
            version,
            record: record_for_key(&random_key(), 1),
            inserts: Mutex::new(Vec::new()),
            pings: Mutex::new(Vec::new()),
            ping_results: Mutex::new(HashMap::new()),
            ping_delay: Mutex::new(Duration::ZERO),
            reject_inserts: Mutex::new(false),
            closes: AtomicUsize::new(0),
            close_log,
        }
    }

    /// Make pings to `id` succeed with `seq`.
    pub fn answer_pings(&self, id: NodeId, seq: u64) {
        self.ping_results.lock().unwrap().insert(id, seq);
    }

    /// Delay every ping by `delay` before answering.
    pub fn set_ping_delay(&self, delay: Duration) {
        *self.ping_delay.lock().unwrap() = delay;
    }

    /// Simulate a full table: insertions are recorded but dropped.
    pub fn reject_inserts(&self, reject: bool) {
        *self.reject_inserts.lock().unwrap() = reject;
    }

    /// All insertion calls so far, in call order.
    pub fn inserts(&self) -> Vec<InsertCall> {
        self.inserts.lock().unwrap().clone()
    }

    /// Ids of all pinged peers so far, in call order.
    pub fn pings(&self) -> Vec<NodeId> {
        self.pings.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn record_insert(&self, node: Arc<NodeRecord>, seen_at: SystemTime, liveness: u32, preferred: bool) {
        self.inserts.lock().unwrap().push(InsertCall {
            node,
            seen_at,
            liveness,
            preferred,
        });
    }
}

#[async_trait]
impl EngineHandle for FakeEngine {
    fn version(&self) -> ProtocolVersion {
        self.version
    }

    fn local_record(&self) -> NodeRecord {
        self.record.clone()
    }

    async fn peer_count(&self) -> usize {
        if *self.reject_inserts.lock().unwrap() {
            return 0;
        }
        let inserts = self.inserts.lock().unwrap();
        let mut ids: Vec<NodeId> = inserts.iter().map(|c| c.node.id()).collect();
        ids.sort();
        ids.dedup();
        ids.len()
    }

    async fn insert_recent_peer(&self, node: Arc<NodeRecord>, seen_at: SystemTime, liveness: u32) {
        self.record_insert(node, seen_at, liveness, false);
    }

    async fn insert_preferred_peer(
        &self,
        node: Arc<NodeRecord>,
        seen_at: SystemTime,
        liveness: u32,
    ) {
        self.record_insert(node, seen_at, liveness, true);
    }

    async fn ping_for_sequence(&self, node: &NodeRecord) -> Result<u64> {
        let id = node.id();
        self.pings.lock().unwrap().push(id);
        if self.close_count() > 0 {
            return Err(Error::Closed);
        }

        let delay = *self.ping_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let answer = self.ping_results.lock().unwrap().get(&id).copied();
        answer.ok_or(Error::Timeout(RESP_TIMEOUT))
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.close_log {
            log.lock().unwrap().push(self.version);
        }
    }
}

// ============================================================================
// FakeStarter
// ============================================================================

type StartCallback = Box<dyn FnOnce(Arc<dyn EngineHooks>) + Send>;

/// Starter that returns a prepared [`FakeEngine`].
pub struct FakeStarter {
    version: ProtocolVersion,
    engine: Option<Arc<FakeEngine>>,
    captured: Arc<Mutex<Option<EngineConfig>>>,
    on_start: Option<StartCallback>,
}

impl FakeStarter {
    /// A starter that succeeds with `engine`.
    pub fn new(engine: Arc<FakeEngine>) -> Self {
        Self {
            version: engine.version,
            engine: Some(engine),
            captured: Arc::new(Mutex::new(None)),
            on_start: None,
        }
    }

    /// A starter that fails as if its port were taken.
    pub fn failing(version: ProtocolVersion) -> Self {
        Self {
            version,
            engine: None,
            captured: Arc::new(Mutex::new(None)),
            on_start: None,
        }
    }

    /// Run `callback` with the installed hooks while starting.
    ///
    /// This is the window in which a real engine could already receive
    /// traffic.
    pub fn on_start(mut self, callback: impl FnOnce(Arc<dyn EngineHooks>) + Send + 'static) -> Self {
        self.on_start = Some(Box::new(callback));
        self
    }

    /// Shared slot holding the configuration the engine was started with.
    pub fn captured_config(&self) -> Arc<Mutex<Option<EngineConfig>>> {
        Arc::clone(&self.captured)
    }
}

#[async_trait]
impl EngineStarter for FakeStarter {
    fn version(&self) -> ProtocolVersion {
        self.version
    }

    async fn start(self, config: EngineConfig) -> Result<Arc<dyn EngineHandle>> {
        let hooks = config.hooks().cloned();
        *self.captured.lock().unwrap() = Some(config);

        if let (Some(callback), Some(hooks)) = (self.on_start, hooks) {
            callback(hooks);
        }

        match self.engine {
            Some(engine) => {
                let engine: Arc<dyn EngineHandle> = engine;
                Ok(engine)
            }
            None => Err(Error::Io(io::Error::new(
                io::ErrorKind::AddrInUse,
                "address already in use",
            ))),
        }
    }
}
