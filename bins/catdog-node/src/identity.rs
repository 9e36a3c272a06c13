//! Local identities, records and bootnodes of both engines.

use std::sync::Arc;

use catdog_discovery::ProtocolVersion;
use catdog_identity::{LocalNode, NodeRecord, parse_private_key};
use k256::ecdsa::SigningKey;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use crate::NodeConfig;

/// Record entry holding the attestation subnet bitfield.
pub const ATTNETS_ENTRY: &str = "attnets";

/// Record entry holding the eth2 fork data.
pub const ETH2_ENTRY: &str = "eth2";

/// Next fork epoch advertised when no fork is scheduled.
pub const FAR_FUTURE_EPOCH: u64 = u64::MAX;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("need p2p priv key for {}", .0.label())]
    MissingKey(ProtocolVersion),

    #[error("bad p2p priv key for {}: {source}", .version.label())]
    InvalidKey {
        version: ProtocolVersion,
        source: catdog_identity::Error,
    },

    #[error("bootnode ({}) {index} is bad: {source}", .version.label().to_uppercase())]
    BadBootnode {
        version: ProtocolVersion,
        index: usize,
        source: catdog_identity::Error,
    },

    #[error("invalid {entry} entry: {reason}")]
    InvalidEntry { entry: &'static str, reason: String },

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

pub type Result<T> = std::result::Result<T, IdentityError>;

/// Everything one engine needs to know about itself and where to start.
pub struct EngineIdentity {
    pub version: ProtocolVersion,
    pub key: SigningKey,
    pub local: Arc<LocalNode>,
    pub bootnodes: Vec<NodeRecord>,
}

/// The identities of both engines.
pub struct NodeIdentities {
    pub v50: EngineIdentity,
    pub v51: EngineIdentity,
}

impl NodeIdentities {
    /// Build both local records from `config`.
    ///
    /// Bootnodes are checked before keys, so a bad bootnode is reported even
    /// when a key is missing.
    pub fn from_config(config: &NodeConfig) -> Result<Self> {
        let bootnodes_v50 = parse_bootnodes(&config.v50.bootnodes, ProtocolVersion::V50)?;
        let bootnodes_v51 = parse_bootnodes(&config.v51.bootnodes, ProtocolVersion::V51)?;

        let key_v50 = load_key(&config.v50.priv_key, ProtocolVersion::V50)?;
        let key_v51 = load_key(&config.v51.priv_key, ProtocolVersion::V51)?;

        let identities = Self {
            v50: EngineIdentity {
                version: ProtocolVersion::V50,
                local: local_node(config, ProtocolVersion::V50, key_v50.clone())?,
                key: key_v50,
                bootnodes: bootnodes_v50,
            },
            v51: EngineIdentity {
                version: ProtocolVersion::V51,
                local: local_node(config, ProtocolVersion::V51, key_v51.clone())?,
                key: key_v51,
                bootnodes: bootnodes_v51,
            },
        };

        for identity in [&identities.v50, &identities.v51] {
            info!(
                version = identity.version.label(),
                id = %identity.local.id(),
                bootnodes = identity.bootnodes.len(),
                "Local identity loaded"
            );
        }
        Ok(identities)
    }
}

/// Parse the private key of the `version` engine.
pub fn load_key(hex_key: &str, version: ProtocolVersion) -> Result<SigningKey> {
    if hex_key.trim().is_empty() {
        return Err(IdentityError::MissingKey(version));
    }
    parse_private_key(hex_key).map_err(|source| IdentityError::InvalidKey { version, source })
}

/// Parse bootnode records, reporting the index of the first bad entry.
pub fn parse_bootnodes(entries: &[String], version: ProtocolVersion) -> Result<Vec<NodeRecord>> {
    entries
        .iter()
        .enumerate()
        .map(|(index, text)| {
            NodeRecord::from_text(text).map_err(|source| IdentityError::BadBootnode {
                version,
                index,
                source,
            })
        })
        .collect()
}

/// Create the `version` engine's local record.
///
/// Both records share the static IP and the `attnets` and `eth2` entries.
/// Each gets its own UDP port.
pub fn local_node(
    config: &NodeConfig,
    version: ProtocolVersion,
    key: SigningKey,
) -> Result<Arc<LocalNode>> {
    let local = LocalNode::new(key);

    if let Some(ip) = config.enr_ip()? {
        local.set_static_ip(ip);
    }
    let enr_udp = config.protocol(version).enr_udp;
    if enr_udp != 0 {
        local.set_fallback_udp(enr_udp);
    }

    local.set(ATTNETS_ENTRY, decode_entry(ATTNETS_ENTRY, &config.record.attnets)?);
    let eth2 = if config.record.eth2.is_empty() {
        eth2_entry(config.fork_version()?)
    } else {
        decode_entry(ETH2_ENTRY, &config.record.eth2)?
    };
    local.set(ETH2_ENTRY, eth2);

    Ok(Arc::new(local))
}

/// First four bytes of the hash tree root of `(fork_version, genesis_validators_root)`.
pub fn fork_digest(fork_version: [u8; 4], genesis_validators_root: [u8; 32]) -> [u8; 4] {
    let mut padded = [0u8; 32];
    padded[..4].copy_from_slice(&fork_version);

    let root = Sha256::new()
        .chain_update(padded)
        .chain_update(genesis_validators_root)
        .finalize();
    let mut digest = [0u8; 4];
    digest.copy_from_slice(&root[..4]);
    digest
}

/// SSZ-encoded eth2 data for `fork_version` with a zero genesis root and no
/// scheduled fork: digest (4) || next fork version (4) || next fork epoch (8, LE).
pub fn eth2_entry(fork_version: [u8; 4]) -> Vec<u8> {
    let mut entry = Vec::with_capacity(16);
    entry.extend_from_slice(&fork_digest(fork_version, [0u8; 32]));
    entry.extend_from_slice(&fork_version);
    entry.extend_from_slice(&FAR_FUTURE_EPOCH.to_le_bytes());
    entry
}

fn decode_entry(entry: &'static str, value: &str) -> Result<Vec<u8>> {
    hex::decode(value).map_err(|e| IdentityError::InvalidEntry {
        entry,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use catdog_test_utils::identity;

    fn config_with_keys() -> NodeConfig {
        let mut config = NodeConfig::default();
        config.v50.priv_key = identity::key_hex(&identity::key_from_seed(1));
        config.v51.priv_key = identity::key_hex(&identity::key_from_seed(2));
        config
    }

    #[test]
    fn missing_keys_are_reported_per_version() {
        let mut config = config_with_keys();
        config.v50.priv_key.clear();
        let err = NodeIdentities::from_config(&config).err().unwrap();
        assert_eq!(err.to_string(), "need p2p priv key for v5.0");

        let mut config = config_with_keys();
        config.v51.priv_key = "  ".to_string();
        let err = NodeIdentities::from_config(&config).err().unwrap();
        assert_eq!(err.to_string(), "need p2p priv key for v5.1");
    }

    #[test]
    fn malformed_key_is_rejected() {
        let mut config = config_with_keys();
        config.v51.priv_key = "abcd".to_string();
        let err = NodeIdentities::from_config(&config).err().unwrap();
        assert!(matches!(
            err,
            IdentityError::InvalidKey {
                version: ProtocolVersion::V51,
                ..
            }
        ));
    }

    #[test]
    fn bad_bootnode_reports_index() {
        let mut config = config_with_keys();
        config.v51.bootnodes = vec![
            identity::random_record().to_text().unwrap(),
            "enode://nope".to_string(),
        ];
        let err = NodeIdentities::from_config(&config).err().unwrap();
        assert!(err.to_string().starts_with("bootnode (V5.1) 1 is bad"));
    }

    #[test]
    fn bad_bootnode_reported_before_missing_key() {
        let mut config = NodeConfig::default();
        config.v50.bootnodes = vec!["garbage".to_string()];
        let err = NodeIdentities::from_config(&config).err().unwrap();
        assert!(err.to_string().starts_with("bootnode (V5.0) 0 is bad"));
    }

    #[test]
    fn records_carry_shared_entries() {
        let mut config = config_with_keys();
        config.record.enr_ip = "10.1.2.3".to_string();
        config.record.attnets = "ff00000000000000".to_string();
        config.record.eth2 = "0102".to_string();
        config.v50.enr_udp = 9000;
        config.v51.enr_udp = 9001;
        let bootnode = identity::random_record();
        config.v50.bootnodes = vec![bootnode.to_text().unwrap()];

        let ids = NodeIdentities::from_config(&config).unwrap();
        let v50 = ids.v50.local.node();
        let v51 = ids.v51.local.node();

        assert_ne!(v50.id(), v51.id());
        assert_eq!(v50.udp_addr(), Some("10.1.2.3:9000".parse().unwrap()));
        assert_eq!(v51.udp_addr(), Some("10.1.2.3:9001".parse().unwrap()));
        for record in [&v50, &v51] {
            assert_eq!(record.entry(ATTNETS_ENTRY), Some(&[0xff, 0, 0, 0, 0, 0, 0, 0][..]));
            assert_eq!(record.entry(ETH2_ENTRY), Some(&[1, 2][..]));
        }
        assert_eq!(ids.v50.bootnodes, vec![bootnode]);
        assert!(ids.v51.bootnodes.is_empty());
    }

    #[test]
    fn fork_digest_of_genesis_version() {
        // sha256 of 64 zero bytes starts with f5a5fd42.
        assert_eq!(fork_digest([0; 4], [0; 32]), [0xf5, 0xa5, 0xfd, 0x42]);
        assert_ne!(fork_digest([1, 0, 0, 0], [0; 32]), [0xf5, 0xa5, 0xfd, 0x42]);
    }

    #[test]
    fn eth2_entry_layout() {
        let entry = eth2_entry([0x01, 0x00, 0x00, 0x00]);
        assert_eq!(entry.len(), 16);
        assert_eq!(entry[..4], fork_digest([0x01, 0, 0, 0], [0; 32]));
        assert_eq!(entry[4..8], [0x01, 0x00, 0x00, 0x00]);
        assert_eq!(entry[8..], [0xff; 8]);
    }

    #[test]
    fn default_eth2_is_derived_from_fork_version() {
        let ids = NodeIdentities::from_config(&config_with_keys()).unwrap();
        let expected = hex::decode("f5a5fd4200000000ffffffffffffffff").unwrap();
        for local in [&ids.v50.local, &ids.v51.local] {
            assert_eq!(local.node().entry(ETH2_ENTRY), Some(&expected[..]));
            assert!(local.node().entry(ATTNETS_ENTRY).is_some());
        }

        let mut config = config_with_keys();
        config.record.fork_version = "01000000".to_string();
        let ids = NodeIdentities::from_config(&config).unwrap();
        let entry = ids.v50.local.node().entry(ETH2_ENTRY).unwrap().to_vec();
        assert_eq!(entry, eth2_entry([1, 0, 0, 0]));
    }
}
