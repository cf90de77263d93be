//! CRD teardown
//!
//! Two passes with different failure policies:
//!
//! - [`OrderedCrdRemoval`] deletes the named CRDs strictly in order and halts
//!   at the first one the store has not confirmed absent. The names are
//!   ordered dependents before owners, so moving on early could remove an
//!   owner while its dependents and their controllers still exist.
//! - [`StaticCleanup`] deletes every rendered manifest, independent leaves
//!   with no ordering, and keeps going past failures.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::{CrdStore, EventRecorder};
use crate::config::ConfirmFailurePolicy;
use crate::error::{Error, Result};
use crate::metrics;
use crate::reconcilers::apply::decode_crd;

/// Progress of the ordered removal pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemovalProgress {
    /// Every CRD is confirmed absent
    Completed,
    /// `name` is not yet confirmed absent; check again after `retry_after`
    StillDeleting { name: String, retry_after: Duration },
}

impl RemovalProgress {
    /// Convert a pending removal into [`Error::StillDeleting`]
    pub fn into_result(self) -> Result<()> {
        match self {
            RemovalProgress::Completed => Ok(()),
            RemovalProgress::StillDeleting { name, retry_after } => {
                Err(Error::StillDeleting { name, retry_after })
            }
        }
    }
}

/// Strict, ordered removal of named CRDs
pub struct OrderedCrdRemoval<'a> {
    pub store: &'a dyn CrdStore,
    pub recorder: &'a dyn EventRecorder,
    pub names: &'a [String],
    pub retry_after: Duration,
    pub confirm_policy: ConfirmFailurePolicy,
}

impl OrderedCrdRemoval<'_> {
    pub async fn run(&self, ctx: &CancellationToken) -> Result<RemovalProgress> {
        for name in self.names {
            if !self.remove(ctx, name).await? {
                info!(crd = %name, retry_after = ?self.retry_after, "CRD is still deleting");
                metrics::REQUEUES.with_label_values(&["crd-removal"]).inc();
                return Ok(RemovalProgress::StillDeleting {
                    name: name.clone(),
                    retry_after: self.retry_after,
                });
            }
            metrics::CRD_DELETIONS.inc();
            self.recorder
                .emit("CRDDeleted", &format!("crd {} is deleted", name));
        }
        Ok(RemovalProgress::Completed)
    }

    /// Delete `name` and report whether its absence is confirmed
    async fn remove(&self, ctx: &CancellationToken, name: &str) -> Result<bool> {
        match self.store.delete(ctx, name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => debug!(crd = %name, "CRD already absent"),
            Err(e) => return Err(e),
        }

        match self.store.get(ctx, name).await {
            Err(e) if e.is_not_found() => Ok(true),
            Ok(_) => Ok(false),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => match self.confirm_policy {
                ConfirmFailurePolicy::Requeue => {
                    warn!(crd = %name, error = %e, "Failed to confirm CRD deletion");
                    Ok(false)
                }
                ConfirmFailurePolicy::Escalate => Err(e),
            },
        }
    }
}

/// Report of the best-effort cleanup pass
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Files whose object is deleted or already absent
    pub removed: Vec<String>,
    /// Last failure seen, if any
    pub last_error: Option<Error>,
}

/// Best-effort deletion of the objects rendered from each manifest file
pub struct StaticCleanup<'a> {
    pub store: &'a dyn CrdStore,
    pub files: &'a [String],
}

impl StaticCleanup<'_> {
    /// Visit every file; only cancellation ends the pass early
    pub async fn run<L>(&self, ctx: &CancellationToken, mut load: L) -> Result<CleanupReport>
    where
        L: FnMut(&str) -> Result<Vec<u8>>,
    {
        let mut report = CleanupReport::default();

        for file in self.files {
            match self.clean_up(ctx, &mut load, file).await {
                Ok(()) => report.removed.push(file.clone()),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(file = %file, error = %e, "Failed to clean up static object");
                    report.last_error = Some(e);
                }
            }
        }

        Ok(report)
    }

    async fn clean_up<L>(&self, ctx: &CancellationToken, load: &mut L, file: &str) -> Result<()>
    where
        L: FnMut(&str) -> Result<Vec<u8>>,
    {
        let crd = decode_crd(&load(file)?)?;
        let name = crd.metadata.name.unwrap_or_default();
        match self.store.delete(ctx, &name).await {
            Ok(()) => {
                debug!(crd = %name, file = %file, "Deleted static object");
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }
}
