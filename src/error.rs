//! Error types for the CRD Lifecycle Operator

use std::time::Duration;

use thiserror::Error;

/// Result type alias using the operator's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Operator error types
#[derive(Error, Debug)]
pub enum Error {
    /// Object is absent from the store
    #[error("{0} not found")]
    NotFound(String),

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Store failure that is not a not-found
    #[error("Store error: {0}")]
    Store(String),

    /// Storage version migration has not completed successfully
    #[error("failed to update stored version {version} of {name}: {reason}")]
    MigrationIncomplete {
        name: String,
        version: String,
        reason: String,
    },

    /// One or more CRDs failed to apply
    #[error("{}", format_aggregate(.0))]
    AggregateApply(Vec<String>),

    /// CRD deletion is requested but not yet observed
    #[error("crd {name} is still deleting")]
    StillDeleting { name: String, retry_after: Duration },

    /// The reconcile context was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// Rendered manifest is not usable
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Template rendering error
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML decoding error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Finalizer error
    #[error("Finalizer error: {0}")]
    Finalizer(#[source] Box<kube::runtime::finalizer::Error<Error>>),
}

fn format_aggregate(errs: &[String]) -> String {
    match errs {
        [single] => single.clone(),
        _ => format!("[{}]", errs.join(", ")),
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a manifest error
    pub fn manifest(msg: impl Into<String>) -> Self {
        Error::Manifest(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Error::Store(msg.into())
    }

    /// Whether the store reported the object as absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Whether the reconcile context was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Map a kube error for the named object, tagging 404s as [`Error::NotFound`]
    pub fn from_kube(name: &str, err: kube::Error) -> Self {
        match err {
            kube::Error::Api(api_err) if api_err.code == 404 => Error::NotFound(name.to_string()),
            other => Error::Kube(other),
        }
    }
}
