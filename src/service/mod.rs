//! StoragePool Service
//!
//! Lifecycle of the StoragePool sub-controllers:
//! - lifecycle: initialization pipeline and reconnection protocol
//! - registry: the assembled controller set
//! - activator: feature-gated start of the decommission controller
//! - keepalive: session liveness probing and reconnection
//! - stats: counters for the background paths

pub mod activator;
pub mod keepalive;
pub mod lifecycle;
pub mod registry;
pub mod stats;
pub mod ticker;

pub use activator::*;
pub use keepalive::*;
pub use lifecycle::*;
pub use registry::*;
pub use stats::*;
pub use ticker::*;
