//! Adapters between the reconcilers and the outside world
//!
//! Store ports and their kube-rs implementations, event recorders,
//! manifest rendering and the apply cache.

mod events;
mod kube_store;
mod manifests;
mod resource_cache;
mod store;

pub use events::*;
pub use kube_store::*;
pub use manifests::*;
pub use resource_cache::*;
pub use store::*;
