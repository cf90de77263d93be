//! ClusterManager Custom Resource Definition

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type reporting whether the hub resources are applied
pub const CONDITION_APPLIED: &str = "Applied";

/// ClusterManager resource specification
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "operator.hub.io",
    version = "v1",
    kind = "ClusterManager",
    plural = "clustermanagers",
    singular = "clustermanager",
    shortname = "clm",
    status = "ClusterManagerStatus",
    printcolumn = r#"{"name": "Applied", "type": "string", "jsonPath": ".status.conditions[?(@.type==\"Applied\")].status"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterManagerSpec {
    /// Registration controller image
    #[serde(default = "default_registration_image")]
    pub registration_image_pull_spec: String,

    /// Work controller image
    #[serde(default = "default_work_image")]
    pub work_image_pull_spec: String,

    /// Placement controller image
    #[serde(default = "default_placement_image")]
    pub placement_image_pull_spec: String,
}

fn default_registration_image() -> String {
    "quay.io/open-cluster-management/registration".to_string()
}

fn default_work_image() -> String {
    "quay.io/open-cluster-management/work".to_string()
}

fn default_placement_image() -> String {
    "quay.io/open-cluster-management/placement".to_string()
}

/// ClusterManager status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterManagerStatus {
    /// Observed generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Status conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Resources deployed on behalf of this ClusterManager
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_resources: Vec<RelatedResourceMeta>,
}

/// Status condition
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type
    #[serde(rename = "type")]
    pub type_: String,

    /// Status (True, False, Unknown)
    pub status: String,

    /// Last transition time
    pub last_transition_time: DateTime<Utc>,

    /// Reason for the condition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Condition {
    /// Build a condition stamped with the current time
    pub fn new(
        type_: impl Into<String>,
        status: bool,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status: if status { "True" } else { "False" }.to_string(),
            last_transition_time: Utc::now(),
            reason: Some(reason.into()),
            message: Some(message.into()),
        }
    }
}

/// Reference to an object deployed by the operator
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelatedResourceMeta {
    pub group: String,
    pub version: String,
    pub resource: String,
    #[serde(default)]
    pub namespace: String,
    pub name: String,
}

/// Insert or update a condition by type.
///
/// `last_transition_time` moves only when the status value flips.
pub fn set_status_condition(conditions: &mut Vec<Condition>, new: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == new.type_) {
        Some(existing) => {
            if existing.status != new.status {
                existing.status = new.status;
                existing.last_transition_time = new.last_transition_time;
            }
            existing.reason = new.reason;
            existing.message = new.message;
        }
        None => conditions.push(new),
    }
}

/// Record a related resource once
pub fn set_related_resource(resources: &mut Vec<RelatedResourceMeta>, meta: RelatedResourceMeta) {
    if !resources.contains(&meta) {
        resources.push(meta);
    }
}
