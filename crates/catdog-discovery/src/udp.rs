//! UDP discovery engine.
//!
//! One engine speaks one protocol version on one socket. It answers PING,
//! FINDNODE and record requests, keeps a [`RoutingTable`], periodically
//! re-checks the liveness of its entries and refreshes the table by asking
//! known peers for their neighbours.
//!
//! # Hooks
//!
//! When [`EngineHooks`] are configured, the engine reports every peer that
//! enters its live table or passes a liveness check through `on_seen`, and
//! delegates liveness checks to `revalidate`. Hook calls never run on the
//! packet loop.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock as StdRwLock};
use std::time::SystemTime;

use async_trait::async_trait;
use catdog_identity::{LocalNode, NodeRecord};
use futures::future::join_all;
use tokio::net::UdpSocket;
use tokio::sync::{RwLock, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, trace, warn};

use crate::wire::{MAX_FINDNODE_DISTANCES, MAX_FINDNODE_RESULTS, Message, pack_nodes};
use crate::{
    EngineConfig, EngineHandle, EngineHooks, EngineStarter, Error, InsertOutcome,
    MAX_PACKET_SIZE, ProtocolVersion, Result, RoutingTable, TableEntry,
};

/// Records learned from other peers must not use privileged ports.
const MIN_PEER_PORT: u16 = 1024;

/// Distances queried during a table refresh.
const REFRESH_DISTANCES: [u32; 3] = [256, 255, 254];

/// Peers queried during a table refresh.
const REFRESH_FANOUT: usize = 3;

/// Starts a [`UdpEngine`] on an already bound socket.
pub struct UdpStarter {
    version: ProtocolVersion,
    socket: UdpSocket,
    local: Arc<LocalNode>,
}

impl UdpStarter {
    pub fn new(version: ProtocolVersion, socket: UdpSocket, local: Arc<LocalNode>) -> Self {
        Self {
            version,
            socket,
            local,
        }
    }

    /// Bind a socket on `addr` for a `version` engine.
    pub async fn bind(
        version: ProtocolVersion,
        addr: SocketAddr,
        local: Arc<LocalNode>,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self::new(version, socket, local))
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Start the engine and keep its concrete type.
    pub fn start_udp(self, config: EngineConfig) -> Result<Arc<UdpEngine>> {
        UdpEngine::start(self.version, self.socket, self.local, config)
    }
}

#[async_trait]
impl EngineStarter for UdpStarter {
    fn version(&self) -> ProtocolVersion {
        self.version
    }

    async fn start(self, config: EngineConfig) -> Result<Arc<dyn EngineHandle>> {
        let engine: Arc<dyn EngineHandle> = self.start_udp(config)?;
        Ok(engine)
    }
}

/// A running UDP discovery engine.
pub struct UdpEngine {
    inner: Arc<Inner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

struct Inner {
    version: ProtocolVersion,
    label: String,
    socket: UdpSocket,
    local_addr: SocketAddr,
    local: Arc<LocalNode>,
    config: EngineConfig,
    hooks: StdRwLock<Option<Arc<dyn EngineHooks>>>,
    table: RwLock<RoutingTable>,
    pending: Mutex<HashMap<u64, Pending>>,
    /// In-flight `on_seen` calls, aborted on close.
    seen_tasks: Mutex<JoinSet<()>>,
    closed: AtomicBool,
}

/// An outstanding request awaiting its reply.
struct Pending {
    to: SocketAddr,
    expects: &'static str,
    nodes: Vec<NodeRecord>,
    received: u8,
    tx: oneshot::Sender<Reply>,
}

enum Reply {
    Pong { enr_seq: u64 },
    Nodes(Vec<NodeRecord>),
    Record(NodeRecord),
}

impl Reply {
    fn name(&self) -> &'static str {
        match self {
            Self::Pong { .. } => "PONG",
            Self::Nodes(_) => "NODES",
            Self::Record(_) => "RECORDRESPONSE",
        }
    }
}

impl UdpEngine {
    /// Start an engine on `socket`.
    ///
    /// Must be called from within a Tokio runtime. If the local record has
    /// no endpoint yet, the socket's address is advertised.
    pub fn start(
        version: ProtocolVersion,
        socket: UdpSocket,
        local: Arc<LocalNode>,
        mut config: EngineConfig,
    ) -> Result<Arc<Self>> {
        let local_addr = socket.local_addr()?;
        let hooks = config.take_hooks();

        let current = local.node();
        if current.udp().is_none() {
            local.set_fallback_udp(local_addr.port());
        }
        if current.ip().is_none() && !local_addr.ip().is_unspecified() {
            local.set_fallback_ip(local_addr.ip());
        }

        let label = if config.log_label().is_empty() {
            version.label().to_string()
        } else {
            config.log_label().to_string()
        };

        let inner = Arc::new(Inner {
            version,
            label,
            socket,
            local_addr,
            table: RwLock::new(RoutingTable::new(local.id(), config.bucket_size())),
            hooks: StdRwLock::new(hooks),
            local,
            config,
            pending: Mutex::new(HashMap::new()),
            seen_tasks: Mutex::new(JoinSet::new()),
            closed: AtomicBool::new(false),
        });

        info!(
            engine = %inner.label,
            addr = %local_addr,
            id = %inner.local.id().fmt_short(),
            bootnodes = inner.config.bootnodes().len(),
            "Discovery engine started"
        );

        let tasks = vec![
            tokio::spawn(Inner::read_loop(Arc::clone(&inner))),
            tokio::spawn(Inner::revalidate_loop(Arc::clone(&inner))),
            tokio::spawn(Inner::refresh_loop(Arc::clone(&inner))),
        ];

        Ok(Arc::new(Self {
            inner,
            tasks: Mutex::new(tasks),
        }))
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    pub fn local_node(&self) -> &Arc<LocalNode> {
        &self.inner.local
    }

    /// Snapshot of the live table entries.
    pub async fn table_entries(&self) -> Vec<TableEntry> {
        self.inner.table.read().await.entries()
    }

    /// Ask `node` for the records it holds at the given distances.
    ///
    /// Only records that pass verification are returned.
    pub async fn find_node(&self, node: &NodeRecord, distances: Vec<u32>) -> Result<Vec<NodeRecord>> {
        self.inner.find_node(node, distances).await
    }

    /// Fetch `node`'s current record.
    pub async fn request_record(&self, node: &NodeRecord) -> Result<NodeRecord> {
        self.inner.request_record(node).await
    }

    /// Run one liveness check round immediately.
    pub async fn revalidate_now(&self) {
        self.inner.revalidate_once().await
    }

    /// Run one table refresh immediately.
    pub async fn refresh_now(&self) {
        self.inner.refresh().await
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn abort_tasks(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|p| p.into_inner());
        for task in tasks.drain(..) {
            task.abort();
        }
        self.inner.seen_tasks().abort_all();
    }
}

#[async_trait]
impl EngineHandle for UdpEngine {
    fn version(&self) -> ProtocolVersion {
        self.inner.version
    }

    fn local_record(&self) -> NodeRecord {
        self.inner.local.node()
    }

    async fn peer_count(&self) -> usize {
        self.inner.table.read().await.len()
    }

    async fn insert_recent_peer(&self, node: Arc<NodeRecord>, seen_at: SystemTime, liveness: u32) {
        self.inner.insert_peer(node, seen_at, liveness, false).await;
    }

    async fn insert_preferred_peer(
        &self,
        node: Arc<NodeRecord>,
        seen_at: SystemTime,
        liveness: u32,
    ) {
        self.inner.insert_peer(node, seen_at, liveness, true).await;
    }

    async fn ping_for_sequence(&self, node: &NodeRecord) -> Result<u64> {
        self.inner.ping(node).await
    }

    async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.abort_tasks();
        self.inner.pending().clear();
        // Drop the hooks so the bridge and this engine stop referencing each other.
        *self.inner.hooks.write().unwrap_or_else(|p| p.into_inner()) = None;

        info!(engine = %self.inner.label, "Discovery engine closed");
    }
}

impl Drop for UdpEngine {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

impl Inner {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<u64, Pending>> {
        self.pending.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn seen_tasks(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.seen_tasks.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn hooks(&self) -> Option<Arc<dyn EngineHooks>> {
        self.hooks.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn check_net(&self, addr: SocketAddr) -> Result<()> {
        match self.config.net_restrict() {
            Some(netlist) if !netlist.contains(addr.ip()) => Err(Error::NetRestricted(addr.ip())),
            _ => Ok(()),
        }
    }

    /// Whether `record` may enter the table.
    fn admit(&self, record: &NodeRecord) -> Result<SocketAddr> {
        let addr = record
            .udp_addr()
            .ok_or_else(|| Error::UnknownNode(record.id().fmt_short()))?;
        self.check_net(addr)?;
        self.config.valid_schemes().verify(record)?;
        Ok(addr)
    }

    /// Like [`Inner::admit`], plus checks for records relayed by other peers.
    fn admit_relayed(&self, record: &NodeRecord) -> Result<()> {
        let addr = self.admit(record)?;
        if addr.port() < MIN_PEER_PORT {
            return Err(Error::LowPort(addr.port()));
        }
        Ok(())
    }

    // --- Table maintenance ---

    async fn insert_peer(&self, node: Arc<NodeRecord>, seen_at: SystemTime, liveness: u32, front: bool) {
        if self.is_closed() {
            return;
        }
        if let Err(e) = self.admit(&node) {
            trace!(engine = %self.label, peer = %node.id().fmt_short(), "Ignoring peer: {}", e);
            return;
        }
        self.add_node(node, seen_at, liveness, front).await;
    }

    async fn add_node(
        &self,
        record: Arc<NodeRecord>,
        seen_at: SystemTime,
        liveness: u32,
        front: bool,
    ) -> InsertOutcome {
        let outcome = {
            let mut table = self.table.write().await;
            if front {
                table.insert_front(Arc::clone(&record), seen_at, liveness)
            } else {
                table.insert_recent(Arc::clone(&record), seen_at, liveness)
            }
        };

        if outcome == InsertOutcome::Added {
            debug!(
                engine = %self.label,
                peer = %record.id().fmt_short(),
                seq = record.seq(),
                "Added peer to table"
            );
            self.notify_seen(record, seen_at, liveness);
        }
        outcome
    }

    fn notify_seen(&self, record: Arc<NodeRecord>, seen_at: SystemTime, liveness: u32) {
        if let Some(hooks) = self.hooks() {
            let mut tasks = self.seen_tasks();
            while tasks.try_join_next().is_some() {}
            tasks.spawn(async move {
                hooks.on_seen(record, seen_at, liveness).await;
            });
        }
    }

    /// Check the liveness of the stalest entry of a random bucket.
    async fn revalidate_once(&self) {
        let target = {
            let table = self.table.read().await;
            table.revalidation_target(&mut rand::rng())
        };
        let Some(node) = target else {
            return;
        };
        let id = node.id();

        let result = match self.hooks() {
            Some(hooks) => hooks.revalidate(Arc::clone(&node)).await,
            None => self.ping(&node).await,
        };

        match result {
            Ok(seq) => {
                let now = SystemTime::now();
                let Some(entry) = self.table.write().await.mark_alive(&id, now) else {
                    return;
                };

                let mut record = entry.record;
                if seq > record.seq() {
                    match self.request_record(&record).await {
                        Ok(fresh) => {
                            let fresh = Arc::new(fresh);
                            if self.table.write().await.update_record(Arc::clone(&fresh)) {
                                record = fresh;
                            }
                        }
                        Err(e) => debug!(
                            engine = %self.label,
                            peer = %id.fmt_short(),
                            "Failed to fetch updated record: {}", e
                        ),
                    }
                }

                trace!(
                    engine = %self.label,
                    peer = %id.fmt_short(),
                    liveness = entry.liveness,
                    "Revalidated peer"
                );
                self.notify_seen(record, now, entry.liveness);
            }
            Err(e) => {
                let promoted = self.table.write().await.remove_and_promote(&id);
                debug!(
                    engine = %self.label,
                    peer = %id.fmt_short(),
                    promoted = ?promoted.map(|p| p.record.id().fmt_short()),
                    "Removed dead peer: {}", e
                );
            }
        }
    }

    /// Ask peers close to us for their neighbours.
    async fn refresh(&self) {
        let targets = self
            .table
            .read()
            .await
            .closest(&self.local.id(), REFRESH_FANOUT);

        for target in targets {
            match self.find_node(&target, REFRESH_DISTANCES.to_vec()).await {
                Ok(records) => {
                    for record in records {
                        self.add_node(Arc::new(record), SystemTime::now(), 0, false)
                            .await;
                    }
                }
                Err(e) => trace!(
                    engine = %self.label,
                    peer = %target.id().fmt_short(),
                    "Refresh query failed: {}", e
                ),
            }
        }
    }

    /// Seed the table with the bootnodes and ping them.
    async fn bootstrap(&self) {
        let bootnodes = self.config.bootnodes().to_vec();
        if bootnodes.is_empty() {
            return;
        }

        for bootnode in &bootnodes {
            if let Err(e) = self.admit(bootnode) {
                warn!(engine = %self.label, peer = %bootnode.id().fmt_short(), "Bad bootnode: {}", e);
                continue;
            }
            self.add_node(Arc::new(bootnode.clone()), SystemTime::now(), 0, false)
                .await;
        }

        let results = join_all(bootnodes.iter().map(|b| self.ping(b))).await;
        let mut reachable = 0usize;
        for (bootnode, result) in bootnodes.iter().zip(results) {
            match result {
                Ok(_) => {
                    reachable += 1;
                    let now = SystemTime::now();
                    if let Some(entry) = self.table.write().await.mark_alive(&bootnode.id(), now) {
                        self.notify_seen(entry.record, now, entry.liveness);
                    }
                }
                Err(e) => debug!(
                    engine = %self.label,
                    peer = %bootnode.id().fmt_short(),
                    "Bootnode did not answer: {}", e
                ),
            }
        }

        info!(
            engine = %self.label,
            reachable,
            total = bootnodes.len(),
            "Contacted bootnodes"
        );
    }

    // --- Requests ---

    async fn request(&self, to: SocketAddr, expects: &'static str, message: Message) -> Result<Reply> {
        self.ensure_open()?;
        self.check_net(to)?;

        let req_id = message.req_id();
        let (tx, rx) = oneshot::channel();
        self.pending().insert(
            req_id,
            Pending {
                to,
                expects,
                nodes: Vec::new(),
                received: 0,
                tx,
            },
        );

        if let Err(e) = self.send(to, &message).await {
            self.pending().remove(&req_id);
            return Err(e);
        }

        let timeout = self.config.resp_timeout();
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(Error::Closed),
            Err(_) => {
                // A partial NODES response is still useful.
                match self.pending().remove(&req_id) {
                    Some(pending) if !pending.nodes.is_empty() => Ok(Reply::Nodes(pending.nodes)),
                    _ => Err(Error::Timeout(timeout)),
                }
            }
        }
    }

    async fn ping(&self, node: &NodeRecord) -> Result<u64> {
        let to = node
            .udp_addr()
            .ok_or_else(|| Error::UnknownNode(node.id().fmt_short()))?;
        let message = Message::Ping {
            req_id: rand::random(),
            record: self.local.node(),
        };

        match self.request(to, "PONG", message).await? {
            Reply::Pong { enr_seq } => Ok(enr_seq),
            other => Err(Error::UnexpectedReply {
                expected: "PONG",
                got: other.name(),
            }),
        }
    }

    async fn find_node(&self, node: &NodeRecord, distances: Vec<u32>) -> Result<Vec<NodeRecord>> {
        let to = node
            .udp_addr()
            .ok_or_else(|| Error::UnknownNode(node.id().fmt_short()))?;
        let message = Message::FindNode {
            req_id: rand::random(),
            distances,
        };

        let records = match self.request(to, "NODES", message).await? {
            Reply::Nodes(records) => records,
            other => {
                return Err(Error::UnexpectedReply {
                    expected: "NODES",
                    got: other.name(),
                });
            }
        };

        let local_id = self.local.id();
        Ok(records
            .into_iter()
            .filter(|r| r.id() != local_id)
            .filter(|r| match self.admit_relayed(r) {
                Ok(()) => true,
                Err(e) => {
                    trace!(engine = %self.label, peer = %r.id().fmt_short(), "Dropping relayed record: {}", e);
                    false
                }
            })
            .collect())
    }

    async fn request_record(&self, node: &NodeRecord) -> Result<NodeRecord> {
        let to = node
            .udp_addr()
            .ok_or_else(|| Error::UnknownNode(node.id().fmt_short()))?;
        let message = Message::RecordRequest {
            req_id: rand::random(),
        };

        let record = match self.request(to, "RECORDRESPONSE", message).await? {
            Reply::Record(record) => record,
            other => {
                return Err(Error::UnexpectedReply {
                    expected: "RECORDRESPONSE",
                    got: other.name(),
                });
            }
        };

        if record.id() != node.id() {
            return Err(Error::Decode(format!(
                "record for {} answered by {}",
                node.id().fmt_short(),
                record.id().fmt_short()
            )));
        }
        self.config.valid_schemes().verify(&record)?;
        Ok(record)
    }

    async fn send(&self, to: SocketAddr, message: &Message) -> Result<()> {
        let packet = message.encode(self.version)?;
        self.socket.send_to(&packet, to).await?;
        trace!(engine = %self.label, %to, "Sent {}", message.name());
        Ok(())
    }

    // --- Packet handling ---

    async fn handle_packet(&self, from: SocketAddr, packet: &[u8]) {
        if let Err(e) = self.check_net(from) {
            trace!(engine = %self.label, %from, "Dropping packet: {}", e);
            return;
        }

        let message = match Message::decode(packet, self.version) {
            Ok(message) => message,
            Err(e) => {
                trace!(engine = %self.label, %from, "Failed to decode packet: {}", e);
                return;
            }
        };

        let result = match message {
            Message::Ping { req_id, record } => self.handle_ping(from, req_id, record).await,
            Message::FindNode { req_id, distances } => {
                self.handle_findnode(from, req_id, distances).await
            }
            Message::RecordRequest { req_id } => {
                let reply = Message::RecordResponse {
                    req_id,
                    record: self.local.node(),
                };
                self.send(from, &reply).await
            }
            reply => self.handle_reply(from, reply),
        };

        if let Err(e) = result {
            debug!(engine = %self.label, %from, "Failed to handle packet: {}", e);
        }
    }

    async fn handle_ping(&self, from: SocketAddr, req_id: u64, record: NodeRecord) -> Result<()> {
        let pong = Message::Pong {
            req_id,
            enr_seq: self.local.node().seq(),
            to_ip: from.ip(),
            to_port: from.port(),
        };
        self.send(from, &pong).await?;

        // Learn about the sender.
        if record.id() == self.local.id() {
            return Ok(());
        }
        self.admit(&record)?;
        self.add_node(Arc::new(record), SystemTime::now(), 0, false)
            .await;
        Ok(())
    }

    async fn handle_findnode(&self, from: SocketAddr, req_id: u64, mut distances: Vec<u32>) -> Result<()> {
        distances.truncate(MAX_FINDNODE_DISTANCES);
        distances.sort_unstable();
        distances.dedup();

        let mut records: Vec<NodeRecord> = Vec::new();
        {
            let table = self.table.read().await;
            for distance in distances {
                if records.len() >= MAX_FINDNODE_RESULTS {
                    break;
                }
                if distance == 0 {
                    records.push(self.local.node());
                    continue;
                }
                records.extend(table.at_distance(distance).iter().map(|r| (**r).clone()));
            }
        }
        records.truncate(MAX_FINDNODE_RESULTS);

        let chunks = pack_nodes(req_id, records, self.version);
        let total = u8::try_from(chunks.len()).unwrap_or(u8::MAX);
        for chunk in chunks {
            let reply = Message::Nodes {
                req_id,
                total,
                records: chunk,
            };
            self.send(from, &reply).await?;
        }
        Ok(())
    }

    fn handle_reply(&self, from: SocketAddr, message: Message) -> Result<()> {
        let req_id = message.req_id();
        let got = message.name();

        let mut pending = self.pending();
        let entry = pending.get_mut(&req_id).ok_or(Error::UnsolicitedReply)?;
        if entry.to != from {
            return Err(Error::UnsolicitedReply);
        }
        if entry.expects != got {
            return Err(Error::UnexpectedReply {
                expected: entry.expects,
                got,
            });
        }

        let reply = match message {
            Message::Pong { enr_seq, .. } => Reply::Pong { enr_seq },
            Message::RecordResponse { record, .. } => Reply::Record(record),
            Message::Nodes { total, records, .. } => {
                entry.nodes.extend(records);
                entry.received = entry.received.saturating_add(1);
                if entry.received < total {
                    return Ok(());
                }
                Reply::Nodes(std::mem::take(&mut entry.nodes))
            }
            _ => return Err(Error::UnsolicitedReply),
        };

        if let Some(entry) = pending.remove(&req_id) {
            let _ = entry.tx.send(reply);
        }
        Ok(())
    }

    // --- Background loops ---

    async fn read_loop(inner: Arc<Self>) {
        debug!(engine = %inner.label, "Starting packet loop");

        let mut buf = vec![0u8; MAX_PACKET_SIZE + 1];
        loop {
            match inner.socket.recv_from(&mut buf).await {
                Ok((len, from)) => {
                    if len > MAX_PACKET_SIZE {
                        trace!(engine = %inner.label, %from, "Dropping oversized packet");
                        continue;
                    }
                    inner.handle_packet(from, &buf[..len]).await;
                }
                Err(e) => {
                    if inner.is_closed() {
                        break;
                    }
                    // ICMP errors surface here on some platforms.
                    debug!(engine = %inner.label, "Receive error: {}", e);
                }
            }
        }
    }

    async fn revalidate_loop(inner: Arc<Self>) {
        let interval = inner.config.revalidate_interval();
        debug!(engine = %inner.label, "Starting revalidation loop (interval: {:?})", interval);

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            inner.revalidate_once().await;
        }
    }

    async fn refresh_loop(inner: Arc<Self>) {
        inner.bootstrap().await;

        let interval = inner.config.refresh_interval();
        debug!(engine = %inner.label, "Starting refresh loop (interval: {:?})", interval);

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            inner.refresh().await;
        }
    }
}
