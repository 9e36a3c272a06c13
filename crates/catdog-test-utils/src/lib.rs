//! Shared test utilities for the CATDOG bridge crates.
//!
//! ## Module Organization
//!
//! - [`identity`] - Keys, node records and local nodes
//! - [`engine`] - In-memory discovery engines and starters that record how
//!   they are driven
//!
//! ## Quick Start
//!
//! ```rust
//! use catdog_test_utils::identity;
//!
//! let record = identity::record_with_seq(7, 4);
//! assert_eq!(record.seq(), 4);
//! assert_eq!(identity::record_with_seq(7, 4).id(), record.id());
//! ```

pub mod engine;
pub mod identity;

pub use engine::{FakeEngine, FakeStarter, InsertCall};
