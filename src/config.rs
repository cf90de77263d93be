//! Operator configuration
//!
//! Static inputs of the CRD reconciler. Loaded once from the YAML file named
//! by `CRD_OPERATOR_CONFIG`, falling back to the built-in hub defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "CRD_OPERATOR_CONFIG";

/// What to do when the post-delete read fails with something other than not-found
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmFailurePolicy {
    /// Treat the CRD as still deleting and requeue
    #[default]
    Requeue,
    /// Surface the store error and stop
    Escalate,
}

/// Configuration of the CRD reconcile phases
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CrdReconcileConfig {
    /// Leave CRDs in place when the ClusterManager is deleted
    pub skip_remove_crds: bool,

    /// Delay before re-checking a CRD that is still deleting
    pub retry_after_secs: u64,

    /// CRDs removed first on teardown, dependents before owners
    pub crd_names: Vec<String>,

    /// CRD manifest templates applied to the hub
    pub resource_files: Vec<String>,

    /// Stored versions to drop, by CRD name
    pub removed_stored_versions: BTreeMap<String, String>,

    pub confirm_failure_policy: ConfirmFailurePolicy,
}

impl CrdReconcileConfig {
    pub fn retry_after(&self) -> Duration {
        Duration::from_secs(self.retry_after_secs)
    }

    /// Reject configurations the reconciler cannot act on
    pub fn validate(&self) -> Result<()> {
        if self.retry_after_secs == 0 {
            return Err(Error::config("retryAfterSecs must be greater than zero"));
        }
        if let Some(name) = self.crd_names.iter().find(|n| n.is_empty()) {
            return Err(Error::config(format!("invalid crd name {:?}", name)));
        }
        if self.resource_files.iter().any(|f| f.is_empty()) {
            return Err(Error::config("resource file entries must not be empty"));
        }
        for (name, version) in &self.removed_stored_versions {
            if name.is_empty() || version.is_empty() {
                return Err(Error::config(format!(
                    "removed stored version entry {:?}: {:?} is incomplete",
                    name, version
                )));
            }
        }
        Ok(())
    }
}

impl Default for CrdReconcileConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| -> Vec<String> { items.iter().map(|s| s.to_string()).collect() };
        Self {
            skip_remove_crds: false,
            retry_after_secs: 3,
            crd_names: strings(&[
                "managedclusteraddons.addon.open-cluster-management.io",
                "manifestworks.work.open-cluster-management.io",
                "managedclusters.cluster.open-cluster-management.io",
            ]),
            resource_files: strings(&[
                "hub/0000_00_addon.open-cluster-management.io_clustermanagementaddons.crd.yaml",
                "hub/0000_00_clusters.open-cluster-management.io_managedclusters.crd.yaml",
                "hub/0000_00_clusters.open-cluster-management.io_managedclustersets.crd.yaml",
                "hub/0000_00_work.open-cluster-management.io_manifestworks.crd.yaml",
                "hub/0000_01_addon.open-cluster-management.io_managedclusteraddons.crd.yaml",
                "hub/0000_01_clusters.open-cluster-management.io_managedclustersetbindings.crd.yaml",
                "hub/0000_02_clusters.open-cluster-management.io_placements.crd.yaml",
                "hub/0000_02_addon.open-cluster-management.io_addondeploymentconfigs.crd.yaml",
                "hub/0000_03_clusters.open-cluster-management.io_placementdecisions.crd.yaml",
                "hub/0000_05_clusters.open-cluster-management.io_addonplacementscores.crd.yaml",
            ]),
            removed_stored_versions: [
                ("placements.cluster.open-cluster-management.io", "v1alpha1"),
                ("placementdecisions.cluster.open-cluster-management.io", "v1alpha1"),
                ("managedclustersets.cluster.open-cluster-management.io", "v1alpha1"),
                ("managedclustersetbindings.cluster.open-cluster-management.io", "v1alpha1"),
            ]
            .into_iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect(),
            confirm_failure_policy: ConfirmFailurePolicy::Requeue,
        }
    }
}

/// Top-level operator configuration
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct OperatorConfig {
    /// Port of the metrics and health server
    pub metrics_port: u16,

    /// Directory holding the CRD manifest templates
    pub manifests_dir: PathBuf,

    pub crd: CrdReconcileConfig,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            metrics_port: 8080,
            manifests_dir: PathBuf::from("manifests"),
            crd: CrdReconcileConfig::default(),
        }
    }
}

impl OperatorConfig {
    /// Parse a YAML document
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: OperatorConfig = serde_yaml::from_str(raw)?;
        config.crd.validate()?;
        Ok(config)
    }

    /// Read configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    /// Load from `CRD_OPERATOR_CONFIG` or use the defaults
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => {
                let path = PathBuf::from(path);
                info!(path = %path.display(), "Loading operator configuration");
                Self::from_file(&path)
            }
            None => {
                info!("No {} set, using default configuration", CONFIG_ENV);
                Ok(Self::default())
            }
        }
    }
}
