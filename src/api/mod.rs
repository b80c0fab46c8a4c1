//! HTTP surface of the probe.
//!
//! - `GET /probe?module=<name>&cache=<duration>`: run (or replay) a module
//! - `GET /metrics`: the probe's own telemetry
//! - `GET /healthz`, `GET /readyz`: liveness

use crate::core::{ProbeError, Result};
use crate::metrics::{render, CONTENT_TYPE};
use crate::probe::{ProbeRequest, Prober};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::SecondsFormat;
use serde::Deserialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Header telling whether the body came from the cache.
pub const HEADER_CACHED: &str = "x-metrics-cached";
/// Header carrying the expiry of a freshly cached result.
pub const HEADER_CACHED_UNTIL: &str = "x-metrics-cached-until";

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    prober: Arc<Prober>,
}

/// Query parameters of `/probe`.
#[derive(Debug, Default, Deserialize)]
pub struct ProbeParams {
    /// Module to run
    pub module: Option<String>,
    /// Cache lifetime, e.g. `5m`
    pub cache: Option<String>,
}

/// Build the router.
pub fn router(prober: Arc<Prober>) -> Router {
    let state = ApiState { prober };

    Router::new()
        .route("/probe", get(probe_handler))
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(health_handler))
        .route("/readyz", get(health_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn start_server<F>(addr: SocketAddr, prober: Arc<Prober>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        ProbeError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to bind to {}: {}", addr, e),
        ))
    })?;
    tracing::info!("Starting probe server on http://{}", addr);

    axum::serve(listener, router(prober))
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// GET /probe - run the queries of one module
async fn probe_handler(
    State(state): State<ApiState>,
    Query(params): Query<ProbeParams>,
) -> Response {
    let started = Instant::now();

    let parsed = ProbeRequest::from_params(params.module.as_deref(), params.cache.as_deref());
    let request = match parsed {
        Ok(request) => request,
        Err(e) => {
            tracing::error!(
                module = ?params.module,
                error = %e,
                category = e.category(),
                "invalid probe request"
            );
            return error_response(&e);
        },
    };

    let outcome = match state.prober.probe(&request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(
                module = %request.module,
                error = %e,
                category = e.category(),
                "probe failed"
            );
            return error_response(&e);
        },
    };

    tracing::debug!(module = %request.module, "building prometheus metrics");
    let body = match render(&outcome.metrics) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(module = %request.module, error = %e, "unable to render metrics");
            return error_response(&e);
        },
    };

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));
    headers.insert(
        HeaderName::from_static(HEADER_CACHED),
        HeaderValue::from_static(if outcome.cached { "true" } else { "false" }),
    );
    if let Some(until) = outcome.cached_until {
        let until = until.to_rfc3339_opts(SecondsFormat::Secs, true);
        if let Ok(value) = HeaderValue::from_str(&until) {
            headers.insert(HeaderName::from_static(HEADER_CACHED_UNTIL), value);
        }
    }

    tracing::debug!(
        module = %request.module,
        duration = ?started.elapsed(),
        cached = outcome.cached,
        "finished request"
    );
    (StatusCode::OK, headers, body).into_response()
}

/// GET /metrics - probe self-telemetry
async fn metrics_handler(State(state): State<ApiState>) -> Response {
    match state.prober.metrics().render() {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET /healthz, /readyz
async fn health_handler() -> &'static str {
    "Ok"
}

fn error_response(err: &ProbeError) -> Response {
    (err.status_code(), err.to_string()).into_response()
}
