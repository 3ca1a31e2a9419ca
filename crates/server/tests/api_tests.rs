//! Integration tests for the server API endpoints
//!
//! Wires the library's pollers to mock sources and drives the
//! routes through `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use multisocks_telemetry::{
    counters::CounterSource,
    error::Result as TelemetryResult,
    health::{run_diagnostics, HealthThresholds},
    topology::TopologySource,
    Circuit, CommandOutcome, DashboardCollector, HealthLevel, Poller, PollerConfig,
    TelemetryError, TorHost,
};
use serde::Serialize;
use tower::ServiceExt;

const COUNTER_TEXT: &str = "\
# pxname,svname,status,stot,bin,bout,ttime\n\
socks,FRONTEND,OPEN,10,100,200,0\n\
socks,tor-01,UP,10,100,200,40\n\
socks,BACKEND,UP,10,100,200,40\n";

struct MockCounters;

#[async_trait]
impl CounterSource for MockCounters {
    async fn fetch_raw(&self) -> TelemetryResult<String> {
        Ok(COUNTER_TEXT.to_string())
    }
}

struct MockTopology {
    circuits_fail: bool,
}

#[async_trait]
impl TopologySource for MockTopology {
    async fn list_hosts(&self) -> TelemetryResult<Vec<TorHost>> {
        Ok(vec![TorHost {
            id: "abc".to_string(),
            ip_address: "10.0.0.2".to_string(),
            external_ip: None,
            hostname: "tor-01".to_string(),
            image: "multisocks-private-tor".to_string(),
            state: "running".to_string(),
        }])
    }

    async fn host_circuits(&self, host_id: &str) -> TelemetryResult<Vec<Circuit>> {
        if self.circuits_fail {
            return Err(TelemetryError::fetch(host_id, "control port unreachable"));
        }
        Ok(vec![
            Circuit {
                circuit_id: "1".to_string(),
                purpose: "GENERAL".to_string(),
                path: Vec::new(),
            },
            Circuit {
                circuit_id: "2".to_string(),
                purpose: "GENERAL".to_string(),
                path: Vec::new(),
            },
        ])
    }

    async fn rebuild_circuits(&self, _: &str) -> TelemetryResult<CommandOutcome> {
        Ok(CommandOutcome {
            success: true,
            message: "rebuilt".to_string(),
        })
    }

    async fn close_circuit(&self, _: &str, _: &str) -> TelemetryResult<CommandOutcome> {
        Ok(CommandOutcome {
            success: true,
            message: "closed".to_string(),
        })
    }

    async fn new_identity(&self, _: &str) -> TelemetryResult<CommandOutcome> {
        Ok(CommandOutcome {
            success: true,
            message: "new identity".to_string(),
        })
    }
}

#[derive(Clone)]
struct AppState {
    live: Poller,
    thresholds: HealthThresholds,
}

#[derive(Serialize)]
struct ApiError {
    error: String,
}

async fn dashboard_data(State(state): State<Arc<AppState>>) -> Response {
    match state.live.latest() {
        Some((snapshot, _)) => Json((*snapshot).clone()).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError {
                error: "no snapshot available yet".to_string(),
            }),
        )
            .into_response(),
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> Response {
    let Some((snapshot, _)) = state.live.latest() else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    let status_code = match snapshot.health.overall.status {
        HealthLevel::Healthy | HealthLevel::Warning => StatusCode::OK,
        HealthLevel::Critical => StatusCode::SERVICE_UNAVAILABLE,
    };
    let diagnostics = run_diagnostics(&snapshot.data.summary, &state.thresholds);

    (
        status_code,
        Json(serde_json::json!({
            "status": snapshot.health.overall,
            "diagnostics": diagnostics,
        })),
    )
        .into_response()
}

fn create_test_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/dashboard-data", get(dashboard_data))
        .route("/healthz", get(healthz))
        .with_state(state)
}

fn setup_test_app(circuits_fail: bool) -> (Router, Poller) {
    let collector = Arc::new(DashboardCollector::new(
        Arc::new(MockCounters),
        Arc::new(MockTopology { circuits_fail }),
        Duration::from_secs(5),
    ));
    let live = Poller::new(collector, PollerConfig::default());
    let state = Arc::new(AppState {
        live: live.clone(),
        thresholds: HealthThresholds::default(),
    });
    (create_test_router(state), live)
}

#[tokio::test]
async fn test_dashboard_data_503_before_first_cycle() {
    let (app, _live) = setup_test_app(false);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/dashboard-data")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_dashboard_data_serves_snapshot_after_refresh() {
    let (app, live) = setup_test_app(false);
    live.refresh().await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/dashboard-data")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let data: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(data["torHosts"].as_array().unwrap().len(), 1);
    assert_eq!(data["summary"]["totalSessions"], 10);
    assert_eq!(data["summary"]["activeCircuits"], 2);
    assert_eq!(data["health"]["overall"]["status"], "healthy");
    assert_eq!(data["health"]["overall"]["message"], "1/1 hosts, 2 circuits");
}

#[tokio::test]
async fn test_healthz_ok_when_fleet_healthy() {
    let (app, live) = setup_test_app(false);
    live.refresh().await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(health["status"]["status"], "healthy");
    assert_eq!(health["diagnostics"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_healthz_503_when_all_hosts_offline() {
    let (app, live) = setup_test_app(true);
    live.refresh().await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(health["status"]["status"], "critical");
    assert_eq!(health["status"]["message"], "All hosts offline");
}
