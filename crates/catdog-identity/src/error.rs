//! Error types for identity operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("invalid node record: {0}")]
    InvalidRecord(String),

    #[error("unknown identity scheme: {0}")]
    UnknownScheme(String),

    #[error("record signature verification failed")]
    VerificationFailed,

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),
}
