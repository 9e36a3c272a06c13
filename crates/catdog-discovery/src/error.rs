//! Error types for discovery operations.

use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;

use crate::ProtocolVersion;

/// Discovery engine error.
#[derive(Debug, Error)]
pub enum Error {
    // --- Request errors ---
    /// No reply arrived within the response timeout.
    #[error("RPC timeout after {0:?}")]
    Timeout(Duration),

    /// The engine has been closed.
    #[error("socket closed")]
    Closed,

    /// The record does not advertise a UDP endpoint.
    #[error("unknown node: {0} has no UDP endpoint")]
    UnknownNode(String),

    /// A reply arrived that matches no pending request.
    #[error("unsolicited reply")]
    UnsolicitedReply,

    /// The reply did not match the request type.
    #[error("unexpected reply: expected {expected}, got {got}")]
    UnexpectedReply {
        expected: &'static str,
        got: &'static str,
    },

    /// A learned record advertises a privileged port.
    #[error("low port {0}")]
    LowPort(u16),

    /// The address is outside the configured network allow-list.
    #[error("address {0} is not in the allowed networks")]
    NetRestricted(IpAddr),

    // --- Encoding errors ---
    /// The encoded packet exceeds the maximum packet size.
    #[error("packet too large: {0} bytes")]
    PacketTooLarge(usize),

    /// The packet belongs to a different protocol version.
    #[error("packet is not a {0} packet")]
    VersionMismatch(ProtocolVersion),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    // --- Bridge-facing errors ---
    /// No engine is attached for this protocol version.
    #[error("no discv {0} engine available")]
    EngineUnavailable(ProtocolVersion),

    // --- Wrapped errors ---
    #[error("record: {0}")]
    Record(#[from] catdog_identity::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for discovery operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration validation error.
///
/// Returned when [`EngineConfig`](crate::EngineConfig) is built with
/// values the engine cannot run with.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration value is below the minimum.
    #[error("{field} must be at least {minimum}, got {provided}")]
    BelowMinimum {
        field: &'static str,
        minimum: usize,
        provided: usize,
    },

    /// A duration that must be positive is zero.
    #[error("{0} must be non-zero")]
    ZeroDuration(&'static str),

    /// A configuration value is invalid relative to another value.
    #[error("{field} must be greater than {other_field} ({field_value:?} <= {other_value:?})")]
    InvalidRelation {
        field: &'static str,
        field_value: Duration,
        other_field: &'static str,
        other_value: Duration,
    },

    /// A network restriction entry could not be parsed.
    #[error("invalid network restriction: {0}")]
    InvalidNetlist(String),
}
