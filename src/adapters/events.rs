//! Event recorders

use chrono::Utc;
use k8s_openapi::api::core::v1::{Event, EventSource, ObjectReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::{api::PostParams, Api, Client, Resource, ResourceExt};
use tracing::{info, warn};

use crate::adapters::EventRecorder;

/// Reporting component name
pub const COMPONENT: &str = "crd-lifecycle-operator";

/// Namespace holding events for cluster-scoped objects
const EVENT_NAMESPACE: &str = "default";

/// Publishes core/v1 Events against one involved object
#[derive(Clone)]
pub struct KubeEventRecorder {
    api: Api<Event>,
    reference: ObjectReference,
}

impl KubeEventRecorder {
    /// Recorder whose events refer to `obj`
    pub fn for_object<K>(client: Client, obj: &K) -> Self
    where
        K: Resource<DynamicType = ()>,
    {
        let namespace = obj
            .namespace()
            .unwrap_or_else(|| EVENT_NAMESPACE.to_string());
        Self {
            api: Api::namespaced(client, &namespace),
            reference: obj.object_ref(&()),
        }
    }

    fn build(&self, reason: &str, message: &str) -> Event {
        let now = Time(Utc::now());
        let object_name = self.reference.name.clone().unwrap_or_default();
        Event {
            metadata: ObjectMeta {
                generate_name: Some(format!("{}.", object_name)),
                ..Default::default()
            },
            involved_object: self.reference.clone(),
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
            type_: Some("Normal".to_string()),
            source: Some(EventSource {
                component: Some(COMPONENT.to_string()),
                host: None,
            }),
            reporting_component: Some(COMPONENT.to_string()),
            first_timestamp: Some(now.clone()),
            last_timestamp: Some(now),
            count: Some(1),
            ..Default::default()
        }
    }
}

impl EventRecorder for KubeEventRecorder {
    fn emit(&self, reason: &str, message: &str) {
        let event = self.build(reason, message);
        let api = self.api.clone();
        tokio::spawn(async move {
            if let Err(e) = api.create(&PostParams::default(), &event).await {
                warn!(error = %e, reason = ?event.reason, "Failed to publish event");
            }
        });
    }
}

/// Writes events to the log only
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEventRecorder;

impl EventRecorder for TracingEventRecorder {
    fn emit(&self, reason: &str, message: &str) {
        info!(reason = %reason, "{}", message);
    }
}
