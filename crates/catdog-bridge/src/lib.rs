//! Bridge between discovery v5.0 and v5.1.
//!
//! A network migrating from discovery v5.0 to v5.1 runs both protocols side
//! by side. The [`Bridge`] starts one engine per version and wires them to a
//! [`Coordinator`] that:
//!
//! - holds every bridging effect back until both engines have started
//!   ([`InitGate`]),
//! - copies peers seen by one engine into the other engine's table,
//! - re-checks a peer's liveness over v5.1 first and falls back to v5.0.
//!
//! Engines are reached only through the traits in [`catdog_discovery`].

pub mod bridge;
pub mod coordinator;
pub mod gate;
pub mod placement;

mod error;

pub use bridge::Bridge;
pub use coordinator::{BridgeHooks, Coordinator};
pub use error::{BridgeError, Result};
pub use gate::InitGate;
pub use placement::{DefaultPlacement, FrontOfBucket, Placement, PlacementPolicy};
