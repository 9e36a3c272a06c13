//! Discovery engines for the CATDOG bridge.
//!
//! This crate defines the narrow capability interface a discovery engine
//! exposes to the bridge ([`EngineHandle`], [`EngineHooks`],
//! [`EngineStarter`]) and ships a compact UDP engine ([`UdpEngine`]) that
//! speaks one protocol version per instance.

pub mod config;
pub mod engine;
pub mod table;
pub mod udp;

mod error;
mod netlist;
mod wire;

use std::time::Duration;

pub use config::{EngineConfig, EngineConfigBuilder};
pub use engine::{EngineHandle, EngineHooks, EngineStarter, ProtocolVersion};
pub use error::{ConfigError, Error, Result};
pub use netlist::Netlist;
pub use table::{InsertOutcome, RoutingTable, TableEntry};
pub use udp::{UdpEngine, UdpStarter};

/// How long to wait for a reply before a request fails.
pub const RESP_TIMEOUT: Duration = Duration::from_millis(500);

/// Discovery packets are no larger than this; larger datagrams are dropped.
pub const MAX_PACKET_SIZE: usize = 1280;

/// Live entries per routing table bucket.
pub const BUCKET_SIZE: usize = 16;

/// Replacement candidates kept per bucket.
pub const MAX_REPLACEMENTS: usize = 10;

/// Number of routing table buckets.
pub const N_BUCKETS: usize = 17;

/// Default interval between liveness re-checks.
pub const REVALIDATE_INTERVAL: Duration = Duration::from_secs(10);

/// Default interval between table refreshes.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 60);
