//! secp256k1 key handling.
//!
//! Private keys are supplied as raw hex (32 bytes, optional `0x` prefix),
//! the format accepted by the bootnode's `--priv-v50` / `--priv-v51` flags.

use k256::ecdsa::SigningKey;

use crate::{Error, Result};

/// Length of a compressed SEC1 public key.
pub const PUBLIC_KEY_SIZE: usize = 33;

/// Parses a raw hex-encoded secp256k1 private key.
pub fn parse_private_key(input: &str) -> Result<SigningKey> {
    let trimmed = input.trim();
    let hex_str = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    let bytes = hex::decode(hex_str).map_err(|e| Error::InvalidKey(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(Error::InvalidKey(format!(
            "expected 32 bytes, got {}",
            bytes.len()
        )));
    }

    SigningKey::from_slice(&bytes).map_err(|e| Error::InvalidKey(e.to_string()))
}

/// Returns the compressed SEC1 encoding of the key's public half.
pub fn public_key_bytes(key: &SigningKey) -> [u8; PUBLIC_KEY_SIZE] {
    let point = key.verifying_key().to_encoded_point(true);
    let mut out = [0u8; PUBLIC_KEY_SIZE];
    out.copy_from_slice(point.as_bytes());
    out
}
