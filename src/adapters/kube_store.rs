//! kube-rs backed implementations of the store ports

use std::future::Future;

use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{
    api::{DeleteParams, PostParams},
    Api, Client,
};
use tokio_util::sync::CancellationToken;

use crate::adapters::{CrdStore, MigrationStatusProvider};
use crate::crd::{MigrationStatus, StorageVersionMigration};
use crate::error::{Error, Result};

/// Run a kube call, aborting as soon as the token is cancelled
pub async fn cancellable<T, F>(ctx: &CancellationToken, name: &str, call: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, kube::Error>>,
{
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(Error::Cancelled),
        res = call => res.map_err(|e| Error::from_kube(name, e)),
    }
}

fn crd_name(crd: &CustomResourceDefinition) -> Result<&str> {
    crd.metadata
        .name
        .as_deref()
        .ok_or_else(|| Error::manifest("CustomResourceDefinition has no metadata.name"))
}

/// CRD store talking to the API server
#[derive(Clone)]
pub struct KubeCrdStore {
    api: Api<CustomResourceDefinition>,
}

impl KubeCrdStore {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl CrdStore for KubeCrdStore {
    async fn get(&self, ctx: &CancellationToken, name: &str) -> Result<CustomResourceDefinition> {
        cancellable(ctx, name, self.api.get(name)).await
    }

    async fn create(
        &self,
        ctx: &CancellationToken,
        crd: &CustomResourceDefinition,
    ) -> Result<CustomResourceDefinition> {
        let name = crd_name(crd)?;
        cancellable(ctx, name, self.api.create(&PostParams::default(), crd)).await
    }

    async fn update(
        &self,
        ctx: &CancellationToken,
        crd: &CustomResourceDefinition,
    ) -> Result<CustomResourceDefinition> {
        let name = crd_name(crd)?;
        cancellable(ctx, name, self.api.replace(name, &PostParams::default(), crd)).await
    }

    async fn update_status(
        &self,
        ctx: &CancellationToken,
        crd: &CustomResourceDefinition,
    ) -> Result<CustomResourceDefinition> {
        let name = crd_name(crd)?;
        let body = serde_json::to_vec(crd)?;
        cancellable(
            ctx,
            name,
            self.api.replace_status(name, &PostParams::default(), body),
        )
        .await
    }

    async fn delete(&self, ctx: &CancellationToken, name: &str) -> Result<()> {
        cancellable(ctx, name, self.api.delete(name, &DeleteParams::default()))
            .await
            .map(|_| ())
    }
}

/// Migration status read from StorageVersionMigration objects
#[derive(Clone)]
pub struct KubeMigrationStatus {
    api: Api<StorageVersionMigration>,
}

impl KubeMigrationStatus {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl MigrationStatusProvider for KubeMigrationStatus {
    async fn status(&self, ctx: &CancellationToken, crd_name: &str) -> Result<MigrationStatus> {
        match cancellable(ctx, crd_name, self.api.get(crd_name)).await {
            Ok(svm) => Ok(svm.migration_status()),
            Err(e) if e.is_not_found() => Ok(MigrationStatus::NotFound),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancelled_token_wins_over_pending_call() {
        let ctx = CancellationToken::new();
        ctx.cancel();

        let result: Result<()> =
            cancellable(&ctx, "x", std::future::pending::<std::result::Result<(), kube::Error>>())
                .await;

        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_completed_call_passes_through() {
        let ctx = CancellationToken::new();
        let result = cancellable(&ctx, "x", async { Ok::<_, kube::Error>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
