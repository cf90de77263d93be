//! Custom Resource Definitions used by the CRD Lifecycle Operator

mod cluster_manager;
mod storage_version_migration;

pub use cluster_manager::*;
pub use storage_version_migration::*;

use kube::CustomResourceExt;

use crate::error::Result;

/// Generate the CRD YAML manifests owned by this operator
pub fn generate_crds() -> Result<Vec<String>> {
    Ok(vec![serde_yaml::to_string(&ClusterManager::crd())?])
}
