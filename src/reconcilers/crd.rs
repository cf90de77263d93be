//! Hub CRD reconciler
//!
//! `reconcile` prunes retired stored versions and then applies the hub CRDs.
//! `clean` removes the hub CRDs when the ClusterManager goes away. Both take
//! the ClusterManager by value and hand it back with any status change.
//!
//! A `RequeueAfter` from `clean` comes with [`Error::StillDeleting`] naming
//! the CRD being waited on. It is a retry request, not a failure.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapters::{
    CrdStore, EventRecorder, HubConfig, ManifestRenderer, MigrationStatusProvider, ResourceCache,
};
use crate::config::CrdReconcileConfig;
use crate::crd::{
    set_related_resource, set_status_condition, ClusterManager, Condition, CONDITION_APPLIED,
};
use crate::error::Error;
use crate::reconcilers::apply::{apply_directly, related_resource};
use crate::reconcilers::stored_version::update_stored_versions;
use crate::reconcilers::teardown::{OrderedCrdRemoval, RemovalProgress, StaticCleanup};
use crate::reconcilers::ReconcileState;

/// Reason set when stored versions cannot be pruned
pub const REASON_STORED_VERSION_UPDATE_FAILED: &str = "CRDStoredVersionUpdateFailed";

/// Reason set when one or more CRDs fail to apply
pub const REASON_APPLY_FAILED: &str = "CRDApplyFailed";

/// ClusterManager handed back with the phase outcome and its error
pub type PhaseResult = (ClusterManager, ReconcileState, Option<Error>);

pub struct CrdReconcile {
    pub store: Arc<dyn CrdStore>,
    pub migrations: Arc<dyn MigrationStatusProvider>,
    pub renderer: Arc<dyn ManifestRenderer>,
    pub recorder: Arc<dyn EventRecorder>,
    pub cache: Option<Arc<ResourceCache>>,
    pub config: Arc<CrdReconcileConfig>,
}

impl CrdReconcile {
    pub async fn reconcile(
        &self,
        ctx: &CancellationToken,
        mut cm: ClusterManager,
        hub: &HubConfig,
    ) -> PhaseResult {
        if let Err(e) = update_stored_versions(
            ctx,
            self.store.as_ref(),
            self.migrations.as_ref(),
            &self.config.removed_stored_versions,
        )
        .await
        {
            warn!(error = %e, "Failed to update CRD stored versions");
            set_status_condition(
                &mut cm.status.get_or_insert_with(Default::default).conditions,
                Condition::new(
                    CONDITION_APPLIED,
                    false,
                    REASON_STORED_VERSION_UPDATE_FAILED,
                    format!("Failed to update crd stored version: {}", e),
                ),
            );
            return (cm, ReconcileState::Stop, Some(e));
        }

        let mut applied = Vec::new();
        let results = apply_directly(
            ctx,
            self.store.as_ref(),
            self.cache.as_deref(),
            |file| self.renderer.render(file, hub),
            |crd| applied.push(related_resource(crd)),
            &self.config.resource_files,
        )
        .await;

        let status = cm.status.get_or_insert_with(Default::default);
        for meta in applied {
            set_related_resource(&mut status.related_resources, meta);
        }

        let failures: Vec<String> = results
            .iter()
            .filter_map(|r| r.failure_message())
            .collect();
        if !failures.is_empty() {
            let err = Error::AggregateApply(failures);
            warn!(error = %err, "Failed to apply CRDs");
            set_status_condition(
                &mut status.conditions,
                Condition::new(
                    CONDITION_APPLIED,
                    false,
                    REASON_APPLY_FAILED,
                    format!("Failed to apply crd: {}", err),
                ),
            );
            return (cm, ReconcileState::Stop, Some(err));
        }

        (cm, ReconcileState::Continue, None)
    }

    pub async fn clean(
        &self,
        ctx: &CancellationToken,
        cm: ClusterManager,
        hub: &HubConfig,
    ) -> PhaseResult {
        if self.config.skip_remove_crds {
            info!("CRD removal is disabled, leaving hub CRDs in place");
            return (cm, ReconcileState::Continue, None);
        }

        let removal = OrderedCrdRemoval {
            store: self.store.as_ref(),
            recorder: self.recorder.as_ref(),
            names: &self.config.crd_names,
            retry_after: self.config.retry_after(),
            confirm_policy: self.config.confirm_failure_policy,
        };
        match removal.run(ctx).await {
            Ok(RemovalProgress::Completed) => {}
            Ok(progress @ RemovalProgress::StillDeleting { retry_after, .. }) => {
                let signal = progress.into_result().err();
                return (cm, ReconcileState::RequeueAfter(retry_after), signal);
            }
            Err(e) => return (cm, ReconcileState::Stop, Some(e)),
        }

        let cleanup = StaticCleanup {
            store: self.store.as_ref(),
            files: &self.config.resource_files,
        };
        match cleanup.run(ctx, |file| self.renderer.render(file, hub)).await {
            Ok(report) => (cm, ReconcileState::Continue, report.last_error),
            Err(e) => (cm, ReconcileState::Stop, Some(e)),
        }
    }
}
