//! Error types for bridge construction.

use std::fmt;
use std::sync::Arc;

use catdog_discovery::{EngineHandle, ProtocolVersion};
use thiserror::Error;

/// Bridge construction error.
#[derive(Error)]
pub enum BridgeError {
    /// An engine failed to start.
    ///
    /// If the v5.0 engine was already running when the v5.1 engine failed,
    /// it is handed back in `started` so the caller can close it.
    #[error("failed to start discv {version}: {source}")]
    Start {
        version: ProtocolVersion,
        #[source]
        source: catdog_discovery::Error,
        started: Option<Arc<dyn EngineHandle>>,
    },

    /// A starter produced an engine for the wrong protocol version.
    #[error("expected a discv {expected} engine, got discv {actual}")]
    WrongVersion {
        expected: ProtocolVersion,
        actual: ProtocolVersion,
    },

    /// An engine for this version is already attached to the coordinator.
    #[error("a discv {0} engine is already attached")]
    AlreadyAttached(ProtocolVersion),
}

impl BridgeError {
    /// Take the engine that was left running, if any.
    pub fn take_started(&mut self) -> Option<Arc<dyn EngineHandle>> {
        match self {
            Self::Start { started, .. } => started.take(),
            _ => None,
        }
    }
}

impl fmt::Debug for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start {
                version,
                source,
                started,
            } => f
                .debug_struct("Start")
                .field("version", version)
                .field("source", source)
                .field("started", &started.as_ref().map(|e| e.version()))
                .finish(),
            Self::WrongVersion { expected, actual } => f
                .debug_struct("WrongVersion")
                .field("expected", expected)
                .field("actual", actual)
                .finish(),
            Self::AlreadyAttached(version) => {
                f.debug_tuple("AlreadyAttached").field(version).finish()
            }
        }
    }
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
