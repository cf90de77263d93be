//! CRD Lifecycle Operator
//!
//! Main entry point for the operator. Loads configuration, sets up the
//! Kubernetes client and runs the ClusterManager controller.

use std::sync::Arc;

use kube::Client;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crd_lifecycle_operator::{
    config::OperatorConfig,
    controllers::{self, Context},
    metrics,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting CRD Lifecycle Operator");

    let config = OperatorConfig::load()?;
    info!(
        manifests_dir = %config.manifests_dir.display(),
        resource_files = config.crd.resource_files.len(),
        skip_remove_crds = config.crd.skip_remove_crds,
        "Loaded configuration"
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    let shutdown = CancellationToken::new();
    let context = Arc::new(Context::new(client.clone(), &config, shutdown.clone()));

    let metrics_handle = tokio::spawn(metrics::serve(config.metrics_port));
    info!("Metrics server starting on port {}", config.metrics_port);

    let controller = controllers::run_cluster_manager_controller(client, context);

    tokio::select! {
        _ = controller => {
            error!("ClusterManager controller exited unexpectedly");
        }
        _ = metrics_handle => {
            error!("Metrics server exited unexpectedly");
        }
        res = shutdown_signal() => {
            res?;
            info!("Received shutdown signal, stopping operator");
        }
    }

    shutdown.cancel();
    info!("CRD Lifecycle Operator stopped");
    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kube=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            res = signal::ctrl_c() => {
                res?;
                info!("Received CTRL+C signal");
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM signal");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received CTRL+C signal");
    }

    Ok(())
}
