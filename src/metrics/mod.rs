//! Prometheus metrics for the CRD Lifecycle Operator
//!
//! This module exposes metrics for monitoring operator health and performance.

mod prometheus;

pub use prometheus::*;
