//! CRD apply
//!
//! Creates or updates each rendered CRD manifest, collecting a result per
//! file instead of stopping at the first failure.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::{CrdStore, ResourceCache};
use crate::crd::RelatedResourceMeta;
use crate::error::{Error, Result};
use crate::metrics;

const CRD_KIND: &str = "CustomResourceDefinition";

/// Outcome of applying one manifest file
#[derive(Debug)]
pub struct AppliedResourceResult {
    /// Manifest file the object was rendered from
    pub file: String,
    /// Kind of the rendered object, `Unknown` if it could not be decoded
    pub kind: String,
    /// Object as stored after the apply
    pub result: Option<CustomResourceDefinition>,
    /// Whether the apply wrote to the store
    pub changed: bool,
    pub error: Option<Error>,
}

impl AppliedResourceResult {
    /// `"<file>" (<kind>): <error>` for failed applies
    pub fn failure_message(&self) -> Option<String> {
        self.error
            .as_ref()
            .map(|e| format!("{:?} ({}): {}", self.file, self.kind, e))
    }
}

/// Decode a rendered manifest into a CRD
pub fn decode_crd(bytes: &[u8]) -> Result<CustomResourceDefinition> {
    let crd: CustomResourceDefinition = serde_yaml::from_slice(bytes)?;
    if crd.metadata.name.as_deref().unwrap_or_default().is_empty() {
        return Err(Error::manifest("CustomResourceDefinition has no metadata.name"));
    }
    Ok(crd)
}

/// Reference recorded on the ClusterManager for an applied CRD
pub fn related_resource(crd: &CustomResourceDefinition) -> RelatedResourceMeta {
    RelatedResourceMeta {
        group: "apiextensions.k8s.io".to_string(),
        version: "v1".to_string(),
        resource: "customresourcedefinitions".to_string(),
        namespace: String::new(),
        name: crd.metadata.name.clone().unwrap_or_default(),
    }
}

/// Apply every file in order.
///
/// `load` renders a file; `on_applied` receives each successfully stored CRD.
pub async fn apply_directly<L, S>(
    ctx: &CancellationToken,
    store: &dyn CrdStore,
    cache: Option<&ResourceCache>,
    mut load: L,
    mut on_applied: S,
    files: &[String],
) -> Vec<AppliedResourceResult>
where
    L: FnMut(&str) -> Result<Vec<u8>>,
    S: FnMut(&CustomResourceDefinition),
{
    let mut results = Vec::with_capacity(files.len());

    for file in files {
        let mut result = AppliedResourceResult {
            file: file.clone(),
            kind: "Unknown".to_string(),
            result: None,
            changed: false,
            error: None,
        };

        let required = match load(file).and_then(|bytes| decode_crd(&bytes)) {
            Ok(crd) => crd,
            Err(e) => {
                warn!(file = %file, error = %e, "Failed to load manifest");
                result.error = Some(e);
                results.push(result);
                continue;
            }
        };
        result.kind = CRD_KIND.to_string();

        match apply_crd(ctx, store, cache, &required).await {
            Ok((actual, changed)) => {
                on_applied(&actual);
                metrics::CRD_APPLIES
                    .with_label_values(&[if changed { "changed" } else { "unchanged" }])
                    .inc();
                result.changed = changed;
                result.result = Some(actual);
            }
            Err(e) => {
                metrics::CRD_APPLIES.with_label_values(&["failed"]).inc();
                result.error = Some(e);
            }
        }
        results.push(result);
    }

    results
}

/// Create the CRD if absent, otherwise bring it to the required state.
///
/// Returns the stored object and whether the store was written.
pub async fn apply_crd(
    ctx: &CancellationToken,
    store: &dyn CrdStore,
    cache: Option<&ResourceCache>,
    required: &CustomResourceDefinition,
) -> Result<(CustomResourceDefinition, bool)> {
    let name = required
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| Error::manifest("CustomResourceDefinition has no metadata.name"))?;

    let existing = match store.get(ctx, name).await {
        Ok(existing) => existing,
        Err(e) if e.is_not_found() => {
            let mut to_create = required.clone();
            to_create.status = None;
            let created = store.create(ctx, &to_create).await?;
            info!(crd = %name, "Created CRD");
            if let Some(cache) = cache {
                cache.update_cached_resource_metadata(required, &created);
            }
            return Ok((created, true));
        }
        Err(e) => return Err(e),
    };

    if cache.is_some_and(|c| c.safe_to_skip_apply(required, &existing)) {
        debug!(crd = %name, "CRD unchanged since last apply, skipping");
        return Ok((existing, false));
    }

    let mut merged = existing.clone();
    let metadata_changed = merge_metadata(&mut merged.metadata, &required.metadata);
    let spec_changed = merged.spec != required.spec;

    if !metadata_changed && !spec_changed {
        if let Some(cache) = cache {
            cache.update_cached_resource_metadata(required, &existing);
        }
        return Ok((existing, false));
    }

    merged.spec = required.spec.clone();
    let updated = store.update(ctx, &merged).await?;
    info!(crd = %name, spec_changed, metadata_changed, "Updated CRD");
    if let Some(cache) = cache {
        cache.update_cached_resource_metadata(required, &updated);
    }
    Ok((updated, true))
}

/// Copy required labels and annotations onto `existing`, reporting whether any changed
fn merge_metadata(existing: &mut ObjectMeta, required: &ObjectMeta) -> bool {
    let mut changed = false;
    for (target, source) in [
        (&mut existing.labels, &required.labels),
        (&mut existing.annotations, &required.annotations),
    ] {
        let Some(source) = source else { continue };
        let target = target.get_or_insert_with(Default::default);
        for (k, v) in source {
            if target.get(k) != Some(v) {
                target.insert(k.clone(), v.clone());
                changed = true;
            }
        }
    }
    changed
}
