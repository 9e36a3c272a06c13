//! The local node's own, mutable record.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard};

use k256::ecdsa::SigningKey;
use tracing::debug;

use crate::keys::public_key_bytes;
use crate::record::{NodeId, NodeRecord, RecordBuilder};

/// Maintains this node's record under one identity key.
///
/// Every change to the advertised content invalidates the cached record;
/// the next call to [`LocalNode::node`] bumps the sequence number and
/// re-signs.
pub struct LocalNode {
    key: SigningKey,
    id: NodeId,
    state: Mutex<LocalState>,
}

struct LocalState {
    seq: u64,
    static_ip: Option<IpAddr>,
    fallback_ip: Option<IpAddr>,
    fallback_udp: Option<u16>,
    entries: BTreeMap<String, Vec<u8>>,
    current: Option<NodeRecord>,
}

impl LocalNode {
    pub fn new(key: SigningKey) -> Self {
        Self::with_seq(key, 0)
    }

    /// Resume from a previously published sequence number.
    pub fn with_seq(key: SigningKey, seq: u64) -> Self {
        let id = NodeId::from_public_key(&public_key_bytes(&key));
        Self {
            key,
            id,
            state: Mutex::new(LocalState {
                seq,
                static_ip: None,
                fallback_ip: None,
                fallback_udp: None,
                entries: BTreeMap::new(),
                current: None,
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.key
    }

    /// Sequence number of the most recently signed record.
    pub fn seq(&self) -> u64 {
        self.lock().seq
    }

    /// Advertise `ip` regardless of what the socket is bound to.
    pub fn set_static_ip(&self, ip: IpAddr) {
        let mut state = self.lock();
        if state.static_ip != Some(ip) {
            state.static_ip = Some(ip);
            state.current = None;
        }
    }

    /// IP to advertise when no static IP is set.
    pub fn set_fallback_ip(&self, ip: IpAddr) {
        let mut state = self.lock();
        if state.fallback_ip != Some(ip) {
            state.fallback_ip = Some(ip);
            state.current = None;
        }
    }

    /// UDP port to advertise.
    pub fn set_fallback_udp(&self, port: u16) {
        let mut state = self.lock();
        if state.fallback_udp != Some(port) {
            state.fallback_udp = Some(port);
            state.current = None;
        }
    }

    /// Set an extension entry.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        let key = key.into();
        let value = value.into();
        let mut state = self.lock();
        if state.entries.get(&key) != Some(&value) {
            state.entries.insert(key, value);
            state.current = None;
        }
    }

    /// Remove an extension entry.
    pub fn delete(&self, key: &str) {
        let mut state = self.lock();
        if state.entries.remove(key).is_some() {
            state.current = None;
        }
    }

    /// The current signed record.
    pub fn node(&self) -> NodeRecord {
        let mut state = self.lock();
        if let Some(record) = &state.current {
            return record.clone();
        }

        state.seq += 1;
        let record = RecordBuilder::new()
            .seq(state.seq)
            .maybe_ip(state.static_ip.or(state.fallback_ip))
            .maybe_udp(state.fallback_udp)
            .entries(state.entries.clone())
            .sign(&self.key);

        debug!(id = %self.id.fmt_short(), seq = state.seq, "Signed new local record");
        state.current = Some(record.clone());
        record
    }

    fn lock(&self) -> MutexGuard<'_, LocalState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for LocalNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalNode")
            .field("id", &self.id)
            .field("seq", &self.seq())
            .finish()
    }
}
