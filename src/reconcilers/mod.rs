//! Reconcilers for hub CRDs
//!
//! This module contains the business logic run for a ClusterManager:
//! - Pruning retired stored versions once migrations are done
//! - Applying the hub CRD manifests
//! - Ordered and best-effort CRD teardown

pub mod apply;
pub mod crd;
pub mod stored_version;
pub mod teardown;

use std::time::Duration;

use kube::runtime::controller::Action;

/// Result of one reconcile phase
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileState {
    /// Move on to the next step
    Continue,
    /// Abort this pass; the error and any status change are already recorded
    Stop,
    /// Not a failure; run again no sooner than the delay
    RequeueAfter(Duration),
}

impl ReconcileState {
    /// Controller action for a pass that did not fail
    pub fn into_action(self, resync: Duration) -> Action {
        match self {
            ReconcileState::Continue => Action::requeue(resync),
            ReconcileState::RequeueAfter(delay) => Action::requeue(delay),
            ReconcileState::Stop => Action::await_change(),
        }
    }
}
