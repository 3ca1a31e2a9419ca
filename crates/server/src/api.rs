//! HTTP API for the dashboard, health checks and Prometheus metrics
//!
//! Every route serves derived data from the pollers or forwards a
//! command to the topology control plane. Forwarding failures come
//! back as typed JSON outcomes, never as an unhandled propagation.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use multisocks_telemetry::{
    counters::{group_by_service, ServiceGroup},
    health::{run_diagnostics, DiagnosticCheck, HealthThresholds},
    topology::{rebuild_all_circuits, TopologySource},
    CommandOutcome, HealthLevel, HealthStatus, Poller, Snapshot, SystemSummary,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Live 2-second identity: counters plus topology.
    pub live: Poller,
    /// Slow counter-only identity for the counters view.
    pub counters: Poller,
    pub topology: Arc<dyn TopologySource>,
    pub thresholds: HealthThresholds,
}

impl AppState {
    pub fn new(
        live: Poller,
        counters: Poller,
        topology: Arc<dyn TopologySource>,
        thresholds: HealthThresholds,
    ) -> Self {
        Self {
            live,
            counters,
            topology,
            thresholds,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotResponse {
    #[serde(flatten)]
    snapshot: Snapshot,
    age_seconds: i64,
}

#[derive(Serialize)]
struct ApiError {
    error: String,
}

fn no_snapshot() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ApiError {
            error: "no snapshot available yet".to_string(),
        }),
    )
        .into_response()
}

/// Latest live snapshot with its age; 503 until the first cycle
/// completes.
async fn dashboard_data(State(state): State<Arc<AppState>>) -> Response {
    match state.live.latest() {
        Some((snapshot, age)) => Json(SnapshotResponse {
            snapshot: (*snapshot).clone(),
            age_seconds: age.num_seconds(),
        })
        .into_response(),
        None => no_snapshot(),
    }
}

/// Force one collection cycle now. Coalesces with an in-flight
/// cycle; the returned snapshot is the one that cycle produced.
async fn refresh(State(state): State<Arc<AppState>>) -> Response {
    match state.live.refresh().await {
        Ok(snapshot) => Json(SnapshotResponse {
            snapshot: (*snapshot).clone(),
            age_seconds: 0,
        })
        .into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(ApiError {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn history(State(state): State<Arc<AppState>>) -> Response {
    Json(state.live.history().await).into_response()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CountersResponse {
    services: Vec<ServiceGroup>,
    summary: SystemSummary,
    last_updated: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    counter_error: Option<String>,
}

/// Counter-only view: rows grouped by service, from the slow
/// polling identity.
async fn counters(State(state): State<Arc<AppState>>) -> Response {
    match state.counters.latest() {
        Some((snapshot, _)) => Json(CountersResponse {
            services: group_by_service(&snapshot.data.counter_rows),
            summary: snapshot.data.summary.clone(),
            last_updated: snapshot.data.last_updated,
            counter_error: snapshot.counter_error.clone(),
        })
        .into_response(),
        None => no_snapshot(),
    }
}

#[derive(Serialize)]
struct HealthzResponse {
    status: HealthStatus,
    diagnostics: Vec<DiagnosticCheck>,
}

/// Health check - 200 while the system is at least degraded, 503
/// when critical or when no snapshot exists yet.
async fn healthz(State(state): State<Arc<AppState>>) -> Response {
    let Some((snapshot, _)) = state.live.latest() else {
        return no_snapshot();
    };

    let status_code = match snapshot.health.overall.status {
        HealthLevel::Healthy => StatusCode::OK,
        HealthLevel::Warning => StatusCode::OK, // Still operational
        HealthLevel::Critical => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        status_code,
        Json(HealthzResponse {
            status: snapshot.health.overall.clone(),
            diagnostics: run_diagnostics(&snapshot.data.summary, &state.thresholds),
        }),
    )
        .into_response()
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder.encode(&metric_families, &mut buffer).unwrap();

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

fn forward_outcome(
    result: Result<CommandOutcome, multisocks_telemetry::TelemetryError>,
) -> Response {
    match result {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(CommandOutcome {
                success: false,
                message: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn rebuild_host_circuits(
    State(state): State<Arc<AppState>>,
    Path(host_id): Path<String>,
) -> Response {
    forward_outcome(state.topology.rebuild_circuits(&host_id).await)
}

async fn new_identity(
    State(state): State<Arc<AppState>>,
    Path(host_id): Path<String>,
) -> Response {
    forward_outcome(state.topology.new_identity(&host_id).await)
}

#[derive(Deserialize)]
struct CloseParams {
    host_id: String,
}

async fn close_circuit(
    State(state): State<Arc<AppState>>,
    Path(circuit_id): Path<String>,
    Query(params): Query<CloseParams>,
) -> Response {
    forward_outcome(
        state
            .topology
            .close_circuit(&params.host_id, &circuit_id)
            .await,
    )
}

async fn rebuild_all(State(state): State<Arc<AppState>>) -> Response {
    match rebuild_all_circuits(Arc::clone(&state.topology)).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(ApiError {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/dashboard-data", get(dashboard_data))
        .route("/refresh", post(refresh))
        .route("/history", get(history))
        .route("/counters", get(counters))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/tor-hosts/:host_id/rebuild-circuits", post(rebuild_host_circuits))
        .route("/tor-hosts/:host_id/new-identity", post(new_identity))
        .route("/circuits/:circuit_id/close", post(close_circuit))
        .route("/circuits/rebuild-all", post(rebuild_all))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
