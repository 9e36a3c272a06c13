//! Identity factory utilities for testing.
//!
//! Random factories use `OsRng`. Seeded factories are deterministic, so the
//! same seed always yields the same node id.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use catdog_identity::{LocalNode, NodeRecord, V4Scheme};
use k256::ecdsa::SigningKey;
use rand_core::{OsRng, RngCore};

/// UDP port advertised by factory records.
pub const TEST_UDP_PORT: u16 = 30303;

/// Generate a random secp256k1 key.
pub fn random_key() -> SigningKey {
    SigningKey::random(&mut OsRng)
}

/// Deterministic key derived from `seed`.
pub fn key_from_seed(seed: u64) -> SigningKey {
    let mut bytes = [0u8; 32];
    bytes[0] = 0x42;
    bytes[24..].copy_from_slice(&seed.to_be_bytes());
    SigningKey::from_slice(&bytes).expect("seeded key is a valid scalar")
}

/// Hex encoding of a key, as accepted on the command line.
pub fn key_hex(key: &SigningKey) -> String {
    hex::encode(key.to_bytes())
}

/// A signed record for `key` at sequence `seq`, reachable on loopback.
pub fn record_for_key(key: &SigningKey, seq: u64) -> NodeRecord {
    NodeRecord::builder()
        .seq(seq)
        .ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .udp(TEST_UDP_PORT)
        .sign(key)
}

/// A record for `key` that carries the uncompressed 65-byte public key,
/// correctly signed over that encoding.
pub fn uncompressed_key_record(key: &SigningKey, seq: u64) -> NodeRecord {
    let uncompressed = key.verifying_key().to_encoded_point(false);
    let mut json = serde_json::to_value(record_for_key(key, seq)).expect("record serializes");
    json["public_key"] = hex::encode(uncompressed.as_bytes()).into();

    let unsigned: NodeRecord = serde_json::from_value(json.clone()).expect("record deserializes");
    json["signature"] = hex::encode(V4Scheme::sign(key, &unsigned.signing_message())).into();
    serde_json::from_value(json).expect("record deserializes")
}

/// A deterministic record for `seed` at sequence `seq`.
pub fn record_with_seq(seed: u64, seq: u64) -> NodeRecord {
    record_for_key(&key_from_seed(seed), seq)
}

/// A record under a fresh random identity.
pub fn random_record() -> NodeRecord {
    record_for_key(&random_key(), 1)
}

/// A shared record, as engines and hooks pass them around.
pub fn peer(seed: u64, seq: u64) -> Arc<NodeRecord> {
    Arc::new(record_with_seq(seed, seq))
}

/// A local node under a fresh random identity.
pub fn random_local_node() -> Arc<LocalNode> {
    Arc::new(LocalNode::new(random_key()))
}

/// Random bytes, e.g. for record entries.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}
