//! Node identities and signed node records for the CATDOG discovery bridge.
//!
//! Each discovery protocol version runs under its own secp256k1 identity.
//! Peers describe themselves with a [`NodeRecord`]: a signed, versioned
//! record carrying the node's public key, network endpoint and arbitrary
//! extension entries. A node's own record is maintained by [`LocalNode`].

pub mod keys;
pub mod local;
pub mod record;
pub mod scheme;

mod error;

pub use error::Error;
pub use keys::{parse_private_key, public_key_bytes};
pub use local::LocalNode;
pub use record::{ENR_PREFIX, NodeId, NodeRecord, RecordBuilder};
pub use scheme::{IdentityScheme, V4Scheme, ValidSchemes};

/// Result type for identity operations.
pub type Result<T> = std::result::Result<T, Error>;
