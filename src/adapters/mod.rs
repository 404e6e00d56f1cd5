//! Adapters
//!
//! Implementations of the domain ports against Kubernetes and the
//! storage-management endpoint's REST API.

pub mod endpoint;
pub mod factory;
pub mod feature_gate;
pub mod kube_crd;
pub mod listener;

pub use endpoint::*;
pub use factory::*;
pub use feature_gate::*;
pub use kube_crd::*;
pub use listener::*;
