//! multisocks server - telemetry aggregation daemon
//!
//! Polls the load-balancer counter endpoint and the topology
//! control plane, derives the system summary and health, and serves
//! the resulting snapshots over HTTP for the dashboard.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use multisocks_telemetry::{
    counters::{CounterSource, HttpCounterSource},
    health::HealthThresholds,
    topology::{HttpTopologySource, TopologySource},
    DashboardCollector, Poller, PollerConfig,
};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting multisocks-server");

    let config = config::ServerConfig::load()?;
    info!(
        counter_url = %config.counter_url,
        topology_url = %config.topology_url,
        "Server configured"
    );

    let fetch_timeout = Duration::from_secs(config.fetch_timeout_secs);

    let counter_source: Arc<dyn CounterSource> = Arc::new(
        HttpCounterSource::new(&config.counter_url, fetch_timeout)
            .context("Failed to build counter source")?,
    );
    let topology: Arc<dyn TopologySource> = Arc::new(
        HttpTopologySource::new(&config.topology_url, fetch_timeout)
            .context("Failed to build topology source")?,
    );

    // Two independent polling identities: the live dashboard view
    // and the slower counter-only view.
    let live = Poller::new(
        Arc::new(DashboardCollector::new(
            Arc::clone(&counter_source),
            Arc::clone(&topology),
            fetch_timeout,
        )),
        PollerConfig {
            interval: Duration::from_secs(config.live_interval_secs),
            history_capacity: config.history_capacity,
        },
    );
    let counters = Poller::new(
        Arc::new(DashboardCollector::counters_only(counter_source)),
        PollerConfig {
            interval: Duration::from_secs(config.counter_interval_secs),
            history_capacity: config.history_capacity,
        },
    );

    let (shutdown_tx, _) = broadcast::channel(1);

    let live_loop = live.clone();
    let live_shutdown = shutdown_tx.subscribe();
    tokio::spawn(async move { live_loop.run(live_shutdown).await });

    let counters_loop = counters.clone();
    let counters_shutdown = shutdown_tx.subscribe();
    tokio::spawn(async move { counters_loop.run(counters_shutdown).await });

    let state = Arc::new(api::AppState::new(
        live,
        counters,
        topology,
        HealthThresholds::default(),
    ));
    let _api_handle = tokio::spawn(api::serve(config.api_port, state));

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    let _ = shutdown_tx.send(());

    Ok(())
}
