//! StorageVersionMigration resource
//!
//! Owned by the storage version migrator; the operator only reads it to
//! decide whether an old stored version may be dropped from a CRD.

use std::fmt;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// StorageVersionMigration specification
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "migration.k8s.io",
    version = "v1alpha1",
    kind = "StorageVersionMigration",
    plural = "storageversionmigrations",
    singular = "storageversionmigration",
    status = "StorageVersionMigrationStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct StorageVersionMigrationSpec {
    /// Resource being migrated
    pub resource: GroupVersionResource,

    /// Continue token of the migrator's list call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continue_token: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupVersionResource {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub resource: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageVersionMigrationStatus {
    #[serde(default)]
    pub conditions: Vec<MigrationCondition>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MigrationCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Migration state as seen by the stored version pruner
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MigrationStatus {
    Succeeded,
    Failed,
    Pending,
    NotFound,
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MigrationStatus::Succeeded => "Succeeded",
            MigrationStatus::Failed => "Failed",
            MigrationStatus::Pending => "Pending",
            MigrationStatus::NotFound => "NotFound",
        };
        f.write_str(s)
    }
}

impl StorageVersionMigration {
    /// Derive the migration state from the status conditions
    pub fn migration_status(&self) -> MigrationStatus {
        let conditions = self
            .status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default();
        let is_true = |type_: &str| {
            conditions
                .iter()
                .any(|c| c.type_ == type_ && c.status == "True")
        };

        if is_true("Succeeded") {
            MigrationStatus::Succeeded
        } else if is_true("Failed") {
            MigrationStatus::Failed
        } else {
            MigrationStatus::Pending
        }
    }
}
