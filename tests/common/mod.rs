//! In-memory fakes for the reconciler ports
//!
//! `FakeCrdStore` models an eventually consistent API server: a deleted CRD
//! can stay readable for a configurable number of reads.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceDefinition, CustomResourceDefinitionStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tokio_util::sync::CancellationToken;

use crd_lifecycle_operator::adapters::{
    CrdStore, EventRecorder, HubConfig, ManifestRenderer, MigrationStatusProvider,
};
use crd_lifecycle_operator::crd::{ClusterManager, ClusterManagerSpec, MigrationStatus};
use crd_lifecycle_operator::{Error, Result};

// ============================================================================
// CRD store
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Get,
    Create,
    Update,
    UpdateStatus,
    Delete,
}

#[derive(Default)]
struct StoreState {
    objects: BTreeMap<String, CustomResourceDefinition>,
    /// Reads left before a deleted object disappears
    terminating: HashMap<String, usize>,
    linger: HashMap<String, usize>,
    failures: HashMap<(Op, String), String>,
    calls: Vec<(Op, String)>,
    next_rv: u64,
}

impl StoreState {
    fn bump(&mut self, crd: &mut CustomResourceDefinition) {
        self.next_rv += 1;
        crd.metadata.resource_version = Some(self.next_rv.to_string());
    }

    fn enter(&mut self, ctx: &CancellationToken, op: Op, name: &str) -> Result<()> {
        self.calls.push((op, name.to_string()));
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match self.failures.get(&(op, name.to_string())) {
            Some(msg) => Err(Error::store(msg.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct FakeCrdStore {
    state: Mutex<StoreState>,
}

impl FakeCrdStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(crds: impl IntoIterator<Item = CustomResourceDefinition>) -> Self {
        let store = Self::new();
        for crd in crds {
            store.insert(crd);
        }
        store
    }

    pub fn insert(&self, mut crd: CustomResourceDefinition) {
        let mut state = self.state.lock().unwrap();
        state.bump(&mut crd);
        let name = crd.metadata.name.clone().unwrap();
        state.objects.insert(name, crd);
    }

    /// Keep `name` readable for `reads` gets after it is deleted
    pub fn linger_on_delete(&self, name: &str, reads: usize) {
        self.state
            .lock()
            .unwrap()
            .linger
            .insert(name.to_string(), reads);
    }

    pub fn fail(&self, op: Op, name: &str, msg: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert((op, name.to_string()), msg.to_string());
    }

    pub fn heal(&self, op: Op, name: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .remove(&(op, name.to_string()));
    }

    pub fn object(&self, name: &str) -> Option<CustomResourceDefinition> {
        self.state.lock().unwrap().objects.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.object(name).is_some()
    }

    pub fn stored_versions(&self, name: &str) -> Vec<String> {
        self.object(name)
            .and_then(|crd| crd.status)
            .and_then(|s| s.stored_versions)
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<(Op, String)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_of(&self, op: Op) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(o, _)| *o == op)
            .map(|(_, name)| name)
            .collect()
    }

    /// Number of create, update and status calls
    pub fn writes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|(op, _)| matches!(op, Op::Create | Op::Update | Op::UpdateStatus))
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

#[async_trait]
impl CrdStore for FakeCrdStore {
    async fn get(&self, ctx: &CancellationToken, name: &str) -> Result<CustomResourceDefinition> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.enter(ctx, Op::Get, name)?;

        if let Some(remaining) = state.terminating.get_mut(name) {
            if *remaining == 0 {
                state.terminating.remove(name);
                state.objects.remove(name);
                return Err(Error::NotFound(name.to_string()));
            }
            *remaining -= 1;
        }
        state
            .objects
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    async fn create(
        &self,
        ctx: &CancellationToken,
        crd: &CustomResourceDefinition,
    ) -> Result<CustomResourceDefinition> {
        let name = crd.metadata.name.clone().unwrap_or_default();
        let mut state = self.state.lock().unwrap();
        state.enter(ctx, Op::Create, &name)?;
        if state.objects.contains_key(&name) {
            return Err(Error::store(format!("{} already exists", name)));
        }
        let mut created = crd.clone();
        state.bump(&mut created);
        state.objects.insert(name, created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        ctx: &CancellationToken,
        crd: &CustomResourceDefinition,
    ) -> Result<CustomResourceDefinition> {
        let name = crd.metadata.name.clone().unwrap_or_default();
        let mut state = self.state.lock().unwrap();
        state.enter(ctx, Op::Update, &name)?;
        let status = match state.objects.get(&name) {
            Some(existing) => existing.status.clone(),
            None => return Err(Error::NotFound(name)),
        };
        let mut updated = crd.clone();
        updated.status = status;
        state.bump(&mut updated);
        state.objects.insert(name, updated.clone());
        Ok(updated)
    }

    async fn update_status(
        &self,
        ctx: &CancellationToken,
        crd: &CustomResourceDefinition,
    ) -> Result<CustomResourceDefinition> {
        let name = crd.metadata.name.clone().unwrap_or_default();
        let mut state = self.state.lock().unwrap();
        state.enter(ctx, Op::UpdateStatus, &name)?;
        let mut updated = match state.objects.get(&name) {
            Some(existing) => existing.clone(),
            None => return Err(Error::NotFound(name)),
        };
        updated.status = crd.status.clone();
        state.bump(&mut updated);
        state.objects.insert(name, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, ctx: &CancellationToken, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.enter(ctx, Op::Delete, name)?;
        if !state.objects.contains_key(name) {
            return Err(Error::NotFound(name.to_string()));
        }
        if state.terminating.contains_key(name) {
            return Ok(());
        }
        match state.linger.get(name).copied() {
            Some(reads) => {
                state.terminating.insert(name.to_string(), reads);
            }
            None => {
                state.objects.remove(name);
            }
        }
        Ok(())
    }
}

// ============================================================================
// Migrations, events, manifests
// ============================================================================

#[derive(Default)]
pub struct FakeMigrations {
    statuses: HashMap<String, std::result::Result<MigrationStatus, String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeMigrations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, status: MigrationStatus) -> Self {
        self.statuses.insert(name.to_string(), Ok(status));
        self
    }

    pub fn with_error(mut self, name: &str, msg: &str) -> Self {
        self.statuses.insert(name.to_string(), Err(msg.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MigrationStatusProvider for FakeMigrations {
    async fn status(&self, ctx: &CancellationToken, crd_name: &str) -> Result<MigrationStatus> {
        self.calls.lock().unwrap().push(crd_name.to_string());
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match self.statuses.get(crd_name) {
            Some(Ok(status)) => Ok(*status),
            Some(Err(msg)) => Err(Error::store(msg.clone())),
            None => Err(Error::NotFound(crd_name.to_string())),
        }
    }
}

#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<(String, String)>>,
}

impl RecordingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, String)> {
        self.events.lock().unwrap().clone()
    }
}

impl EventRecorder for RecordingEvents {
    fn emit(&self, reason: &str, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push((reason.to_string(), message.to_string()));
    }
}

/// Serves manifests from memory
#[derive(Default)]
pub struct FakeRenderer {
    manifests: HashMap<String, std::result::Result<String, String>>,
    renders: Mutex<Vec<String>>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, file: &str, manifest: String) -> Self {
        self.manifests.insert(file.to_string(), Ok(manifest));
        self
    }

    pub fn with_error(mut self, file: &str, msg: &str) -> Self {
        self.manifests.insert(file.to_string(), Err(msg.to_string()));
        self
    }

    pub fn renders(&self) -> Vec<String> {
        self.renders.lock().unwrap().clone()
    }

    pub fn load(&self, file: &str) -> Result<Vec<u8>> {
        self.render(file, &HubConfig::default())
    }
}

impl ManifestRenderer for FakeRenderer {
    fn render(&self, file: &str, _config: &HubConfig) -> Result<Vec<u8>> {
        self.renders.lock().unwrap().push(file.to_string());
        match self.manifests.get(file) {
            Some(Ok(manifest)) => Ok(manifest.clone().into_bytes()),
            Some(Err(msg)) => Err(Error::manifest(msg.clone())),
            None => Err(Error::manifest(format!("template {} not found", file))),
        }
    }
}

// ============================================================================
// Builders
// ============================================================================

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// CRD as stored on the server, with `status.storedVersions`
pub fn crd(name: &str, stored_versions: &[&str]) -> CustomResourceDefinition {
    let (plural, group) = name.split_once('.').unwrap_or((name, "example.io"));
    let mut crd = CustomResourceDefinition {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        status: Some(CustomResourceDefinitionStatus {
            stored_versions: Some(strings(stored_versions)),
            ..Default::default()
        }),
        ..Default::default()
    };
    crd.spec.group = group.to_string();
    crd.spec.names.plural = plural.to_string();
    crd.spec.names.kind = plural.to_string();
    crd.spec.scope = "Namespaced".to_string();
    crd
}

/// Rendered CRD manifest for `name` (`<plural>.<group>`)
pub fn crd_manifest(name: &str, version: &str) -> String {
    let (plural, group) = name.split_once('.').unwrap_or((name, "example.io"));
    format!(
        r#"apiVersion: apiextensions.k8s.io/v1
kind: CustomResourceDefinition
metadata:
  name: {name}
  labels:
    app.kubernetes.io/managed-by: crd-lifecycle-operator
spec:
  group: {group}
  names:
    kind: {plural}
    plural: {plural}
  scope: Namespaced
  versions:
    - name: {version}
      served: true
      storage: true
"#
    )
}

pub fn cluster_manager(name: &str) -> ClusterManager {
    ClusterManager::new(
        name,
        ClusterManagerSpec {
            registration_image_pull_spec: "quay.io/hub/registration:latest".to_string(),
            work_image_pull_spec: "quay.io/hub/work:latest".to_string(),
            placement_image_pull_spec: "quay.io/hub/placement:latest".to_string(),
        },
    )
}
