//! Identity schemes used to sign and verify node records.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};

use crate::record::NodeRecord;
use crate::{Error, Result};

/// A scheme that can verify record signatures.
pub trait IdentityScheme: Send + Sync + 'static {
    /// Name stored in the record's `scheme` field.
    fn name(&self) -> &'static str;

    /// Verify the record's signature.
    fn verify(&self, record: &NodeRecord) -> Result<()>;
}

/// secp256k1 ECDSA over SHA-256 of the record content.
#[derive(Debug, Clone, Copy, Default)]
pub struct V4Scheme;

impl V4Scheme {
    pub const NAME: &'static str = "v4";

    /// Sign `message`, returning the 64-byte `r || s` signature.
    pub fn sign(key: &SigningKey, message: &[u8]) -> Vec<u8> {
        let signature: Signature = key.sign(message);
        signature.to_bytes().to_vec()
    }
}

impl IdentityScheme for V4Scheme {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn verify(&self, record: &NodeRecord) -> Result<()> {
        let key = VerifyingKey::from_sec1_bytes(record.public_key())
            .map_err(|e| Error::InvalidRecord(format!("bad public key: {}", e)))?;
        let signature =
            Signature::from_slice(record.signature()).map_err(|_| Error::VerificationFailed)?;

        key.verify(&record.signing_message(), &signature)
            .map_err(|_| Error::VerificationFailed)
    }
}

/// The set of identity schemes a node accepts.
///
/// Records signed under any other scheme are rejected.
#[derive(Clone)]
pub struct ValidSchemes {
    schemes: BTreeMap<&'static str, Arc<dyn IdentityScheme>>,
}

impl ValidSchemes {
    /// An empty set that rejects every record.
    pub fn empty() -> Self {
        Self {
            schemes: BTreeMap::new(),
        }
    }

    /// Add a scheme to the set.
    pub fn with(mut self, scheme: impl IdentityScheme) -> Self {
        self.schemes.insert(scheme.name(), Arc::new(scheme));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemes.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.schemes.keys().copied()
    }

    /// Check the record's layout, then verify it with the scheme it names.
    pub fn verify(&self, record: &NodeRecord) -> Result<()> {
        record.check_structure()?;
        let scheme = self
            .schemes
            .get(record.scheme())
            .ok_or_else(|| Error::UnknownScheme(record.scheme().to_string()))?;
        scheme.verify(record)
    }
}

impl Default for ValidSchemes {
    fn default() -> Self {
        Self::empty().with(V4Scheme)
    }
}

impl fmt::Debug for ValidSchemes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.schemes.keys()).finish()
    }
}
