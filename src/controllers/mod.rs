//! Kubernetes controllers for the CRD Lifecycle Operator
//!
//! This module contains the controller that watches ClusterManager
//! resources and triggers reconciliation of the hub CRDs.

mod cluster_manager_controller;

pub use cluster_manager_controller::run as run_cluster_manager_controller;

use std::sync::Arc;

use kube::Client;
use tokio_util::sync::CancellationToken;

use crate::adapters::{
    CrdStore, KubeCrdStore, KubeMigrationStatus, ManifestRenderer, MigrationStatusProvider,
    ResourceCache, TemplateRenderer,
};
use crate::config::{CrdReconcileConfig, OperatorConfig};

/// Shared context for all controllers
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    pub store: Arc<dyn CrdStore>,
    pub migrations: Arc<dyn MigrationStatusProvider>,
    pub renderer: Arc<dyn ManifestRenderer>,
    /// Apply cache shared by every reconcile
    pub cache: Arc<ResourceCache>,
    pub crd_config: Arc<CrdReconcileConfig>,
    /// Cancelled on shutdown; each reconcile runs on a child token
    pub shutdown: CancellationToken,
}

impl Context {
    /// Create a new context
    pub fn new(client: Client, config: &OperatorConfig, shutdown: CancellationToken) -> Self {
        Self {
            store: Arc::new(KubeCrdStore::new(client.clone())),
            migrations: Arc::new(KubeMigrationStatus::new(client.clone())),
            renderer: Arc::new(TemplateRenderer::new(&config.manifests_dir)),
            cache: Arc::new(ResourceCache::new()),
            crd_config: Arc::new(config.crd.clone()),
            shutdown,
            client,
        }
    }
}
