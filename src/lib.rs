//! CRD Lifecycle Operator
//!
//! This operator keeps the hub's CustomResourceDefinitions in shape for a
//! ClusterManager: it prunes retired stored versions once their migrations
//! have finished, applies the CRD manifests, and tears the CRDs down in
//! dependency order when the ClusterManager is deleted.

pub mod adapters;
pub mod config;
pub mod controllers;
pub mod crd;
pub mod error;
pub mod metrics;
pub mod reconcilers;

pub use error::{Error, Result};
