//! HTTP control surface
//!
//! - `POST /status/{value}` switches collection off for `false`/`0`, on otherwise
//! - `GET /status/{value}` returns a static acknowledgement
//! - `/healthz`, `/readyz` and `/metrics` for probes and scraping
//!
//! The status routes always answer 200 with a JSON-labelled text body.

use crate::health::{ComponentStatus, HealthRegistry};
use crate::observability::{SnapshotMetrics, StructuredLogger};
use crate::toggle::AvailabilityToggle;
use anyhow::Context;
use axum::{
    extract::{MatchedPath, Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tracing::{error, info};

/// Content type sent with status responses
pub const STATUS_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

pub const TURN_OFF_BODY: &str = "post turn off";
pub const TURN_ON_BODY: &str = "post turn run";
pub const STATUS_INDEX_BODY: &str = "post the app status";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub toggle: AvailabilityToggle,
    pub health_registry: HealthRegistry,
    pub metrics: SnapshotMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        toggle: AvailabilityToggle,
        health_registry: HealthRegistry,
        metrics: SnapshotMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            toggle,
            health_registry,
            metrics,
            logger,
        }
    }
}

fn status_response(body: &str) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, STATUS_CONTENT_TYPE)],
        format!("{}\n", body),
    )
        .into_response()
}

/// Switch collection on or off
async fn set_status(State(state): State<Arc<AppState>>, Path(value): Path<String>) -> Response {
    let active = AvailabilityToggle::parse_status(&value);
    state.toggle.set_active(active);
    state.metrics.set_collection_active(active);
    state.logger.log_toggle(active, &value);

    status_response(if active { TURN_ON_BODY } else { TURN_OFF_BODY })
}

async fn status_index(Path(_value): Path<String>) -> Response {
    status_response(STATUS_INDEX_BODY)
}

/// Returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

/// Log method, route and latency of every status request
async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_default();
    let start = Instant::now();

    let response = next.run(request).await;

    info!(
        method = %method,
        uri = %uri,
        route = %route,
        status = response.status().as_u16(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "Handled status request"
    );
    response
}

/// Create the control router
pub fn create_router(state: Arc<AppState>) -> Router {
    let status_routes = Router::new()
        .route("/status/:value", get(status_index).post(set_status))
        .route_layer(middleware::from_fn(log_request));

    Router::new()
        .merge(status_routes)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Bind the control listener ahead of `serve`
pub async fn bind(addr: SocketAddr) -> anyhow::Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind control API on {}", addr))
}

/// Serve the control router on `listener` until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %listener.local_addr()?, "Starting control API server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
