//! Apply cache
//!
//! Remembers, per CRD name, a hash of the last applied manifest and the
//! resourceVersion the server returned for it. When both still match, the
//! update can be skipped. Entries are last-write-wins per key.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use dashmap::DashMap;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;

#[derive(Clone, Debug, PartialEq, Eq)]
struct CacheEntry {
    required_hash: u64,
    resource_version: String,
}

#[derive(Debug, Default)]
pub struct ResourceCache {
    entries: DashMap<String, CacheEntry>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `existing` is exactly what a previous apply of `required` left behind
    pub fn safe_to_skip_apply(
        &self,
        required: &CustomResourceDefinition,
        existing: &CustomResourceDefinition,
    ) -> bool {
        let (Some(name), Some(rv)) = (
            required.metadata.name.as_deref(),
            existing.metadata.resource_version.as_deref(),
        ) else {
            return false;
        };
        let Some(hash) = content_hash(required) else {
            return false;
        };

        self.entries
            .get(name)
            .map(|entry| entry.required_hash == hash && entry.resource_version == rv)
            .unwrap_or(false)
    }

    /// Record a successful apply
    pub fn update_cached_resource_metadata(
        &self,
        required: &CustomResourceDefinition,
        actual: &CustomResourceDefinition,
    ) {
        let (Some(name), Some(rv), Some(hash)) = (
            required.metadata.name.clone(),
            actual.metadata.resource_version.clone(),
            content_hash(required),
        ) else {
            return;
        };
        self.entries.insert(
            name,
            CacheEntry {
                required_hash: hash,
                resource_version: rv,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn content_hash(crd: &CustomResourceDefinition) -> Option<u64> {
    let bytes = serde_json::to_vec(crd).ok()?;
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    Some(hasher.finish())
}
