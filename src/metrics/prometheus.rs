//! Prometheus metrics definitions and HTTP server

use std::net::SocketAddr;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec, Encoder,
    HistogramVec, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info};

lazy_static::lazy_static! {
    /// Total number of reconciliations
    pub static ref RECONCILIATIONS: CounterVec = register_counter_vec!(
        "crd_lifecycle_operator_reconciliations_total",
        "Total number of reconciliations",
        &["kind"]
    ).unwrap();

    /// Total number of reconciliation errors
    pub static ref RECONCILIATION_ERRORS: CounterVec = register_counter_vec!(
        "crd_lifecycle_operator_reconciliation_errors_total",
        "Total number of reconciliation errors",
        &["kind"]
    ).unwrap();

    /// Reconciliation duration histogram
    pub static ref RECONCILE_DURATION: HistogramVec = register_histogram_vec!(
        "crd_lifecycle_operator_reconcile_duration_seconds",
        "Duration of reconciliations in seconds",
        &["kind"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    /// CRD applies by outcome (changed, unchanged, failed)
    pub static ref CRD_APPLIES: CounterVec = register_counter_vec!(
        "crd_lifecycle_operator_crd_applies_total",
        "Total number of CRD applies by outcome",
        &["outcome"]
    ).unwrap();

    /// CRDs confirmed deleted by the ordered removal pass
    pub static ref CRD_DELETIONS: Counter = register_counter!(
        "crd_lifecycle_operator_crd_deletions_total",
        "Total number of CRDs confirmed deleted"
    ).unwrap();

    /// Stored version rewrites per CRD
    pub static ref STORED_VERSION_UPDATES: CounterVec = register_counter_vec!(
        "crd_lifecycle_operator_stored_version_updates_total",
        "Total number of CRD storedVersions updates",
        &["crd"]
    ).unwrap();

    /// Requeues requested by a phase
    pub static ref REQUEUES: CounterVec = register_counter_vec!(
        "crd_lifecycle_operator_requeues_total",
        "Total number of requeues requested by reconcile phases",
        &["phase"]
    ).unwrap();

    /// Total number of cleanup operations
    pub static ref CLEANUPS: CounterVec = register_counter_vec!(
        "crd_lifecycle_operator_cleanups_total",
        "Total number of cleanup operations",
        &["kind"]
    ).unwrap();

    /// Operator health (1 = healthy, 0 = unhealthy)
    pub static ref OPERATOR_HEALTH: prometheus::Gauge = prometheus::register_gauge!(
        "crd_lifecycle_operator_health",
        "Operator health status (1 = healthy, 0 = unhealthy)"
    ).unwrap();
}

/// Start the metrics and health HTTP server
pub async fn serve(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    OPERATOR_HEALTH.set(1.0);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(handle_request))
                .await
            {
                error!("Error serving connection: {}", e);
            }
        });
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let response = match req.uri().path() {
        "/metrics" => metrics_response(),
        "/healthz" | "/readyz" if OPERATOR_HEALTH.get() >= 1.0 => {
            respond(StatusCode::OK, None, Bytes::from_static(b"ok"))
        }
        "/healthz" | "/readyz" => respond(
            StatusCode::SERVICE_UNAVAILABLE,
            None,
            Bytes::from_static(b"unhealthy"),
        ),
        _ => respond(StatusCode::NOT_FOUND, None, Bytes::from_static(b"Not Found")),
    };

    Ok(response)
}

fn metrics_response() -> Response<Full<Bytes>> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    match encoder.encode(&prometheus::gather(), &mut buffer) {
        Ok(()) => respond(
            StatusCode::OK,
            Some(encoder.format_type()),
            Bytes::from(buffer),
        ),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                None,
                Bytes::from_static(b"Failed to encode metrics"),
            )
        }
    }
}

fn respond(status: StatusCode, content_type: Option<&str>, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    if let Some(value) = content_type.and_then(|v| HeaderValue::from_str(v).ok()) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}
