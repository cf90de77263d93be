//! Ports consumed by the reconcilers
//!
//! Every async call takes the reconcile's cancellation token. Implementations
//! must return [`Error::NotFound`](crate::Error::NotFound) for absent objects
//! and [`Error::Cancelled`](crate::Error::Cancelled) once the token fires.

use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use tokio_util::sync::CancellationToken;

use crate::crd::MigrationStatus;
use crate::error::Result;

/// CustomResourceDefinition access on the hub API server
#[async_trait]
pub trait CrdStore: Send + Sync {
    async fn get(&self, ctx: &CancellationToken, name: &str) -> Result<CustomResourceDefinition>;

    async fn create(
        &self,
        ctx: &CancellationToken,
        crd: &CustomResourceDefinition,
    ) -> Result<CustomResourceDefinition>;

    async fn update(
        &self,
        ctx: &CancellationToken,
        crd: &CustomResourceDefinition,
    ) -> Result<CustomResourceDefinition>;

    /// Replace the status sub-resource
    async fn update_status(
        &self,
        ctx: &CancellationToken,
        crd: &CustomResourceDefinition,
    ) -> Result<CustomResourceDefinition>;

    async fn delete(&self, ctx: &CancellationToken, name: &str) -> Result<()>;
}

/// Read access to storage version migrations
#[async_trait]
pub trait MigrationStatusProvider: Send + Sync {
    /// Migration state of the CRD with the given name
    async fn status(&self, ctx: &CancellationToken, crd_name: &str) -> Result<MigrationStatus>;
}

/// Fire-and-forget event sink
pub trait EventRecorder: Send + Sync {
    fn emit(&self, reason: &str, message: &str);
}
