//! CATDOG bootnode library.
//!
//! Runs a discovery v5.0 engine and a v5.1 engine bridged by
//! [`catdog_bridge::Bridge`], with an optional HTTP surface for reading the
//! node records.

pub mod api;
pub mod cli;
pub mod config;
pub mod identity;
pub mod service;

pub use config::NodeConfig;
pub use service::NodeService;
