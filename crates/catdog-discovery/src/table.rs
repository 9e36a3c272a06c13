//! Kademlia-style routing table.
//!
//! Peers are grouped into buckets by logarithmic distance from the local
//! node id. Each bucket holds up to `bucket_size` live entries, most
//! recently proven alive first, plus a short list of replacement candidates
//! that are promoted when a live entry is evicted.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::SystemTime;

use catdog_identity::{NodeId, NodeRecord};
use rand::Rng;

use crate::{MAX_REPLACEMENTS, N_BUCKETS};

/// Distances at or below this all share the first bucket.
const BUCKET_MIN_DISTANCE: u32 = 256 - (N_BUCKETS as u32 - 1);

/// A peer held by the routing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    /// The peer's most recent known record.
    pub record: Arc<NodeRecord>,

    /// When the peer was last observed.
    pub seen_at: SystemTime,

    /// Number of successful liveness checks.
    pub liveness: u32,
}

impl TableEntry {
    fn new(record: Arc<NodeRecord>, seen_at: SystemTime, liveness: u32) -> Self {
        Self {
            record,
            seen_at,
            liveness,
        }
    }

    fn id(&self) -> NodeId {
        self.record.id()
    }

    /// Adopt `record` if it is newer than the one held.
    fn refresh(&mut self, record: Arc<NodeRecord>) -> bool {
        if record.seq() > self.record.seq() {
            self.record = record;
            true
        } else {
            false
        }
    }
}

/// Result of inserting a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The peer became a live entry.
    Added,
    /// The peer was already known; its record or position was updated.
    Updated,
    /// The bucket is full; the peer was kept as a replacement candidate.
    Replacement,
    /// The peer is the local node.
    IsSelf,
}

#[derive(Debug, Default)]
struct Bucket {
    entries: VecDeque<TableEntry>,
    replacements: VecDeque<TableEntry>,
}

impl Bucket {
    fn position(&self, id: &NodeId) -> Option<usize> {
        self.entries.iter().position(|e| &e.id() == id)
    }

    fn replacement_position(&self, id: &NodeId) -> Option<usize> {
        self.replacements.iter().position(|e| &e.id() == id)
    }

    fn push_replacement(&mut self, entry: TableEntry) {
        if let Some(pos) = self.replacement_position(&entry.id()) {
            self.replacements.remove(pos);
        }
        self.replacements.push_front(entry);
        self.replacements.truncate(MAX_REPLACEMENTS);
    }
}

/// Routing table of one discovery engine.
///
/// Not synchronized; engines wrap it in a lock.
#[derive(Debug)]
pub struct RoutingTable {
    self_id: NodeId,
    bucket_size: usize,
    buckets: Vec<Bucket>,
}

impl RoutingTable {
    /// Create an empty table around `self_id`.
    pub fn new(self_id: NodeId, bucket_size: usize) -> Self {
        Self {
            self_id,
            bucket_size,
            buckets: (0..N_BUCKETS).map(|_| Bucket::default()).collect(),
        }
    }

    pub fn self_id(&self) -> NodeId {
        self.self_id
    }

    /// Insert a peer that was recently seen, at the back of its bucket.
    ///
    /// Known peers keep their position and adopt the record if it is newer.
    pub fn insert_recent(
        &mut self,
        record: Arc<NodeRecord>,
        seen_at: SystemTime,
        liveness: u32,
    ) -> InsertOutcome {
        let id = record.id();
        if id == self.self_id {
            return InsertOutcome::IsSelf;
        }

        let bucket_size = self.bucket_size;
        let bucket = self.bucket_mut(&id);

        if let Some(pos) = bucket.position(&id) {
            bucket.entries[pos].refresh(record);
            return InsertOutcome::Updated;
        }

        let entry = TableEntry::new(record, seen_at, liveness);
        if bucket.entries.len() < bucket_size {
            if let Some(pos) = bucket.replacement_position(&id) {
                bucket.replacements.remove(pos);
            }
            bucket.entries.push_back(entry);
            InsertOutcome::Added
        } else {
            bucket.push_replacement(entry);
            InsertOutcome::Replacement
        }
    }

    /// Insert a peer at the front of its bucket.
    ///
    /// If the bucket is full, its least recently seen entry is demoted to
    /// the replacement list.
    pub fn insert_front(
        &mut self,
        record: Arc<NodeRecord>,
        seen_at: SystemTime,
        liveness: u32,
    ) -> InsertOutcome {
        let id = record.id();
        if id == self.self_id {
            return InsertOutcome::IsSelf;
        }

        let bucket_size = self.bucket_size;
        let bucket = self.bucket_mut(&id);

        if let Some(pos) = bucket.position(&id) {
            if let Some(mut entry) = bucket.entries.remove(pos) {
                entry.refresh(record);
                entry.seen_at = seen_at;
                entry.liveness = entry.liveness.max(liveness);
                bucket.entries.push_front(entry);
            }
            return InsertOutcome::Updated;
        }

        if let Some(pos) = bucket.replacement_position(&id) {
            bucket.replacements.remove(pos);
        }
        if bucket.entries.len() >= bucket_size {
            if let Some(demoted) = bucket.entries.pop_back() {
                bucket.push_replacement(demoted);
            }
        }
        bucket
            .entries
            .push_front(TableEntry::new(record, seen_at, liveness));
        InsertOutcome::Added
    }

    /// Look up a live entry.
    pub fn get(&self, id: &NodeId) -> Option<&TableEntry> {
        let bucket = self.bucket(id);
        bucket.position(id).map(|pos| &bucket.entries[pos])
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Record a successful liveness check.
    ///
    /// Bumps the entry's liveness counter and moves it to the front of its
    /// bucket. Returns the updated entry.
    pub fn mark_alive(&mut self, id: &NodeId, seen_at: SystemTime) -> Option<TableEntry> {
        let bucket = self.bucket_mut(id);
        let pos = bucket.position(id)?;
        let mut entry = bucket.entries.remove(pos)?;
        entry.liveness = entry.liveness.saturating_add(1);
        entry.seen_at = seen_at;
        bucket.entries.push_front(entry.clone());
        Some(entry)
    }

    /// Replace a live entry's record if `record` is newer.
    pub fn update_record(&mut self, record: Arc<NodeRecord>) -> bool {
        let id = record.id();
        let bucket = self.bucket_mut(&id);
        match bucket.position(&id) {
            Some(pos) => bucket.entries[pos].refresh(record),
            None => false,
        }
    }

    /// Evict a live entry and promote the freshest replacement, if any.
    ///
    /// Returns the promoted entry.
    pub fn remove_and_promote(&mut self, id: &NodeId) -> Option<TableEntry> {
        let bucket = self.bucket_mut(id);
        let pos = bucket.position(id)?;
        bucket.entries.remove(pos);

        let promoted = bucket.replacements.pop_front()?;
        bucket.entries.push_back(promoted.clone());
        Some(promoted)
    }

    /// Pick the least recently seen entry of a random non-empty bucket.
    pub fn revalidation_target<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Arc<NodeRecord>> {
        let candidates: Vec<&Bucket> = self
            .buckets
            .iter()
            .filter(|b| !b.entries.is_empty())
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let bucket = candidates[rng.random_range(0..candidates.len())];
        bucket.entries.back().map(|e| Arc::clone(&e.record))
    }

    /// Live entries at exactly `distance` from the local node.
    pub fn at_distance(&self, distance: u32) -> Vec<Arc<NodeRecord>> {
        self.bucket_for_distance(distance)
            .entries
            .iter()
            .filter(|e| self.self_id.log_distance(&e.id()) == distance)
            .map(|e| Arc::clone(&e.record))
            .collect()
    }

    /// Up to `count` live entries closest to `target`.
    pub fn closest(&self, target: &NodeId, count: usize) -> Vec<Arc<NodeRecord>> {
        let mut all: Vec<&TableEntry> = self.buckets.iter().flat_map(|b| &b.entries).collect();
        all.sort_by_key(|e| {
            let id = e.id();
            let mut xor = [0u8; 32];
            for (i, byte) in xor.iter_mut().enumerate() {
                *byte = id.as_bytes()[i] ^ target.as_bytes()[i];
            }
            xor
        });
        all.into_iter()
            .take(count)
            .map(|e| Arc::clone(&e.record))
            .collect()
    }

    /// Snapshot of all live entries.
    pub fn entries(&self) -> Vec<TableEntry> {
        self.buckets
            .iter()
            .flat_map(|b| b.entries.iter().cloned())
            .collect()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of replacement candidates across all buckets.
    pub fn replacement_count(&self) -> usize {
        self.buckets.iter().map(|b| b.replacements.len()).sum()
    }

    fn bucket_index(distance: u32) -> usize {
        distance.saturating_sub(BUCKET_MIN_DISTANCE) as usize
    }

    fn bucket_for_distance(&self, distance: u32) -> &Bucket {
        &self.buckets[Self::bucket_index(distance).min(N_BUCKETS - 1)]
    }

    fn bucket(&self, id: &NodeId) -> &Bucket {
        self.bucket_for_distance(self.self_id.log_distance(id))
    }

    fn bucket_mut(&mut self, id: &NodeId) -> &mut Bucket {
        let index = Self::bucket_index(self.self_id.log_distance(id)).min(N_BUCKETS - 1);
        &mut self.buckets[index]
    }
}
