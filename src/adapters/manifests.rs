//! Manifest rendering
//!
//! CRD manifests are minijinja templates rendered against a [`HubConfig`]
//! built from the ClusterManager being reconciled.

use std::path::Path;

use kube::ResourceExt;
use minijinja::{path_loader, Environment, UndefinedBehavior};
use serde::Serialize;

use crate::crd::ClusterManager;
use crate::error::Result;

/// Values available to the manifest templates
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct HubConfig {
    pub cluster_manager_name: String,
    pub cluster_manager_namespace: String,
    pub registration_image: String,
    pub work_image: String,
    pub placement_image: String,
}

impl HubConfig {
    /// Template values for a ClusterManager
    pub fn from_cluster_manager(cm: &ClusterManager) -> Self {
        let name = cm.name_any();
        Self {
            cluster_manager_namespace: format!("open-cluster-management-{}", name),
            cluster_manager_name: name,
            registration_image: cm.spec.registration_image_pull_spec.clone(),
            work_image: cm.spec.work_image_pull_spec.clone(),
            placement_image: cm.spec.placement_image_pull_spec.clone(),
        }
    }
}

/// Produces the manifest bytes for a resource file
pub trait ManifestRenderer: Send + Sync {
    fn render(&self, file: &str, config: &HubConfig) -> Result<Vec<u8>>;
}

/// Renders templates from a directory on disk
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl TemplateRenderer {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        env.set_loader(path_loader(dir));
        Self { env }
    }
}

impl ManifestRenderer for TemplateRenderer {
    fn render(&self, file: &str, config: &HubConfig) -> Result<Vec<u8>> {
        let template = self.env.get_template(file)?;
        Ok(template.render(config)?.into_bytes())
    }
}
