//! Property-based tests for catdog-identity.
//!
//! Tests invariants of record signing and the textual record form.

use std::net::{IpAddr, Ipv4Addr};

use catdog_identity::{Error, NodeId, NodeRecord, ValidSchemes};
use k256::ecdsa::SigningKey;
use proptest::prelude::*;
use rand_core::OsRng;

fn random_key() -> SigningKey {
    SigningKey::random(&mut OsRng)
}

// ============================================================================
// Record Property Tests
// ============================================================================

proptest! {
    /// Property: any signed record verifies and survives the text form.
    #[test]
    fn prop_signed_record_verifies(
        seq in 1u64..u64::MAX,
        octets in any::<[u8; 4]>(),
        port in any::<u16>(),
        attnets in proptest::collection::vec(any::<u8>(), 0..16),
    ) {
        let record = NodeRecord::builder()
            .seq(seq)
            .ip(IpAddr::V4(Ipv4Addr::from(octets)))
            .udp(port)
            .entry("attnets", attnets)
            .sign(&random_key());

        prop_assert!(record.verify(&ValidSchemes::default()).is_ok());

        let parsed = NodeRecord::from_text(&record.to_text().unwrap()).unwrap();
        prop_assert!(parsed.verify(&ValidSchemes::default()).is_ok());
        prop_assert_eq!(parsed, record);
    }
}

proptest! {
    /// Property: a signature never carries over to a record signed by another key.
    #[test]
    fn prop_foreign_signature_rejected(port in 1024u16..u16::MAX) {
        let record = NodeRecord::builder().udp(port).sign(&random_key());
        let other = NodeRecord::builder().udp(port).sign(&random_key());

        // Splice the other record's signature onto this record's text.
        let mut json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&record).unwrap()).unwrap();
        json["signature"] = serde_json::Value::String(hex::encode(other.signature()));
        let spliced: NodeRecord = serde_json::from_value(json).unwrap();

        prop_assert!(matches!(
            spliced.verify(&ValidSchemes::default()),
            Err(Error::VerificationFailed)
        ));
    }
}

proptest! {
    /// Property: log distance is symmetric and zero only for equal ids.
    #[test]
    fn prop_log_distance_symmetric(a in any::<[u8; 32]>(), b in any::<[u8; 32]>()) {
        let a = NodeId::from_bytes(a);
        let b = NodeId::from_bytes(b);

        prop_assert_eq!(a.log_distance(&b), b.log_distance(&a));
        prop_assert!(a.log_distance(&b) <= 256);
        prop_assert_eq!(a.log_distance(&b) == 0, a == b);
    }
}
