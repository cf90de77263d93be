//! Stored version pruning
//!
//! Drops retired API versions from `status.storedVersions` of hub CRDs, but
//! only once the storage version migration for that CRD has succeeded (or was
//! never needed). Dropping a version whose objects are still stored in it
//! would leave those objects unreadable.

use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::{CrdStore, MigrationStatusProvider};
use crate::crd::MigrationStatus;
use crate::error::{Error, Result};
use crate::metrics;

/// Return `stored` without `removed`, keeping the order of the rest
pub fn retain_stored_versions(stored: &[String], removed: &str) -> Vec<String> {
    stored
        .iter()
        .filter(|v| v.as_str() != removed)
        .cloned()
        .collect()
}

/// Remove the retired stored versions listed in `removed_versions`.
///
/// Aborts on the first CRD whose migration is not finished, and on any
/// status write failure. Read failures of a single CRD are logged and skipped.
pub async fn update_stored_versions(
    ctx: &CancellationToken,
    store: &dyn CrdStore,
    migrations: &dyn MigrationStatusProvider,
    removed_versions: &BTreeMap<String, String>,
) -> Result<()> {
    for (name, version) in removed_versions {
        ensure_migrated(ctx, migrations, name, version).await?;

        let mut crd = match store.get(ctx, name).await {
            Ok(crd) => crd,
            Err(e) if e.is_not_found() => {
                debug!(crd = %name, "CRD is not installed, nothing to prune");
                continue;
            }
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                warn!(crd = %name, error = %e, "Failed to get CRD");
                continue;
            }
        };

        let stored = crd
            .status
            .as_ref()
            .and_then(|s| s.stored_versions.clone())
            .unwrap_or_default();
        let retained = retain_stored_versions(&stored, version);
        if retained == stored {
            continue;
        }

        if let Some(status) = crd.status.as_mut() {
            status.stored_versions = Some(retained);
        }
        let updated = store.update_status(ctx, &crd).await?;

        metrics::STORED_VERSION_UPDATES
            .with_label_values(&[name.as_str()])
            .inc();
        info!(
            crd = %name,
            removed = %version,
            stored_versions = ?updated.status.as_ref().and_then(|s| s.stored_versions.as_ref()),
            "Updated CRD status storedVersions"
        );
    }

    Ok(())
}

async fn ensure_migrated(
    ctx: &CancellationToken,
    migrations: &dyn MigrationStatusProvider,
    name: &str,
    version: &str,
) -> Result<()> {
    let incomplete = |reason: String| Error::MigrationIncomplete {
        name: name.to_string(),
        version: version.to_string(),
        reason,
    };

    match migrations.status(ctx, name).await {
        Ok(MigrationStatus::Succeeded | MigrationStatus::NotFound) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(Error::Cancelled) => Err(Error::Cancelled),
        Ok(status) => Err(incomplete(format!("storage version migration is {}", status))),
        Err(e) => Err(incomplete(format!("storage version migration unknown: {}", e))),
    }
}
