//! ClusterManager controller
//!
//! Watches ClusterManager resources and drives the hub CRD reconciler.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::{
    api::{ListParams, Patch, PatchParams},
    runtime::{
        controller::{Action, Controller},
        finalizer::{finalizer, Error as FinalizerError, Event as FinalizerEvent},
        watcher::Config as WatcherConfig,
    },
    Api, Client, ResourceExt,
};
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::adapters::{HubConfig, KubeEventRecorder};
use crate::controllers::Context;
use crate::crd::{set_status_condition, ClusterManager, Condition, CONDITION_APPLIED};
use crate::error::{Error, Result};
use crate::metrics;
use crate::reconcilers::crd::CrdReconcile;
use crate::reconcilers::ReconcileState;

/// Finalizer name for ClusterManager resources
const FINALIZER_NAME: &str = "operator.hub.io/cluster-manager-cleanup";

/// Periodic resync of an applied ClusterManager
const RESYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Run the ClusterManager controller
pub async fn run(client: Client, context: Arc<Context>) {
    let api: Api<ClusterManager> = Api::all(client.clone());

    // Verify CRD is installed
    if let Err(e) = api.list(&ListParams::default().limit(1)).await {
        error!("ClusterManager CRD not installed: {}", e);
        return;
    }

    info!("Starting ClusterManager controller");

    Controller::new(api, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    info!(name = %obj.name, "Reconciled ClusterManager");
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation error");
                    metrics::RECONCILIATION_ERRORS
                        .with_label_values(&["ClusterManager"])
                        .inc();
                }
            }
        })
        .await;
}

/// Main reconciliation function
#[instrument(skip(ctx), fields(name = %obj.name_any()))]
async fn reconcile(obj: Arc<ClusterManager>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = metrics::RECONCILE_DURATION
        .with_label_values(&["ClusterManager"])
        .start_timer();
    metrics::RECONCILIATIONS
        .with_label_values(&["ClusterManager"])
        .inc();

    let api: Api<ClusterManager> = Api::all(ctx.client.clone());

    finalizer(&api, FINALIZER_NAME, obj, |event| async {
        match event {
            FinalizerEvent::Apply(cm) => apply(cm, ctx.clone()).await,
            FinalizerEvent::Cleanup(cm) => cleanup(cm, ctx.clone()).await,
        }
    })
    .await
    .map_err(|e| Error::Finalizer(Box::new(e)))
}

fn crd_reconcile(ctx: &Context, cm: &ClusterManager) -> CrdReconcile {
    CrdReconcile {
        store: ctx.store.clone(),
        migrations: ctx.migrations.clone(),
        renderer: ctx.renderer.clone(),
        recorder: Arc::new(KubeEventRecorder::for_object(ctx.client.clone(), cm)),
        cache: Some(ctx.cache.clone()),
        config: ctx.crd_config.clone(),
    }
}

/// Apply the hub CRDs and publish the resulting status
async fn apply(obj: Arc<ClusterManager>, ctx: Arc<Context>) -> Result<Action> {
    let hub = HubConfig::from_cluster_manager(&obj);
    let token = ctx.shutdown.child_token();

    let (mut cm, state, err) = crd_reconcile(&ctx, &obj)
        .reconcile(&token, (*obj).clone(), &hub)
        .await;

    if state == ReconcileState::Continue {
        let status = cm.status.get_or_insert_with(Default::default);
        set_status_condition(
            &mut status.conditions,
            Condition::new(
                CONDITION_APPLIED,
                true,
                "ClusterManagerApplied",
                "Hub CRDs are applied",
            ),
        );
        status.observed_generation = cm.metadata.generation;
    }

    if cm.status != obj.status {
        patch_status(&ctx.client, &cm).await?;
    }

    match err {
        Some(e) => Err(e),
        None => Ok(state.into_action(RESYNC_INTERVAL)),
    }
}

/// Tear down the hub CRDs; the finalizer stays until this returns Ok
async fn cleanup(obj: Arc<ClusterManager>, ctx: Arc<Context>) -> Result<Action> {
    info!(name = %obj.name_any(), "Cleaning up ClusterManager");
    metrics::CLEANUPS
        .with_label_values(&["ClusterManager"])
        .inc();

    let hub = HubConfig::from_cluster_manager(&obj);
    let token = ctx.shutdown.child_token();

    let (_, state, err) = crd_reconcile(&ctx, &obj)
        .clean(&token, (*obj).clone(), &hub)
        .await;

    cleanup_outcome(&obj.name_any(), state, err)
}

/// Any error, or a pending requeue, keeps the finalizer in place
fn cleanup_outcome(name: &str, state: ReconcileState, err: Option<Error>) -> Result<Action> {
    match (state, err) {
        (_, Some(e)) => Err(e),
        (ReconcileState::RequeueAfter(retry_after), None) => Err(Error::StillDeleting {
            name: name.to_string(),
            retry_after,
        }),
        _ => Ok(Action::await_change()),
    }
}

async fn patch_status(client: &Client, cm: &ClusterManager) -> Result<()> {
    let api: Api<ClusterManager> = Api::all(client.clone());
    let patch = json!({ "status": cm.status });
    api.patch_status(&cm.name_any(), &PatchParams::default(), &Patch::Merge(patch))
        .await?;
    Ok(())
}

/// Unwrap the reconciler error carried by a finalizer error
fn root_cause(error: &Error) -> &Error {
    match error {
        Error::Finalizer(inner) => match inner.as_ref() {
            FinalizerError::ApplyFailed(e) | FinalizerError::CleanupFailed(e) => e,
            _ => error,
        },
        other => other,
    }
}

/// Requeue delay for a failed reconcile
fn requeue_delay(error: &Error) -> Duration {
    match root_cause(error) {
        Error::StillDeleting { retry_after, .. } => *retry_after,
        Error::Cancelled => Duration::from_secs(5),
        Error::MigrationIncomplete { .. } => Duration::from_secs(60),
        Error::Config(_) | Error::Manifest(_) | Error::Template(_) => Duration::from_secs(300),
        _ => Duration::from_secs(30),
    }
}

/// Error policy for the controller
fn error_policy(obj: Arc<ClusterManager>, error: &Error, _ctx: Arc<Context>) -> Action {
    let name = obj.name_any();
    let requeue_duration = requeue_delay(error);

    match root_cause(error) {
        Error::StillDeleting { name: crd, .. } => {
            info!(name = %name, crd = %crd, "Waiting for CRD deletion");
        }
        _ => {
            warn!(
                name = %name,
                error = %error,
                requeue_after = ?requeue_duration,
                "Reconciliation failed, scheduling retry"
            );
        }
    }
    Action::requeue(requeue_duration)
}
