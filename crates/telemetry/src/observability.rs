//! Observability infrastructure for the telemetry engine
//!
//! Prometheus metrics for cycle latency, cycle outcomes, source
//! failures and fleet size. Exposition lives in the server binary.

use prometheus::{register_histogram, register_int_gauge, Histogram, IntGauge};
use std::sync::OnceLock;

/// Default histogram buckets for cycle latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<TelemetryMetricsInner> = OnceLock::new();

struct TelemetryMetricsInner {
    cycle_latency_seconds: Histogram,
    cycles_total: IntGauge,
    cycle_errors_total: IntGauge,
    host_fetch_errors_total: IntGauge,
    counter_source_errors_total: IntGauge,
    hosts_monitored: IntGauge,
}

impl TelemetryMetricsInner {
    fn new() -> Self {
        Self {
            cycle_latency_seconds: register_histogram!(
                "multisocks_cycle_latency_seconds",
                "Time spent running one full collection cycle",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_latency_seconds"),

            cycles_total: register_int_gauge!(
                "multisocks_cycles_total",
                "Total number of completed collection cycles"
            )
            .expect("Failed to register cycles_total"),

            cycle_errors_total: register_int_gauge!(
                "multisocks_cycle_errors_total",
                "Total number of collection cycles that failed outright"
            )
            .expect("Failed to register cycle_errors_total"),

            host_fetch_errors_total: register_int_gauge!(
                "multisocks_host_fetch_errors_total",
                "Total number of per-host circuit fetch failures"
            )
            .expect("Failed to register host_fetch_errors_total"),

            counter_source_errors_total: register_int_gauge!(
                "multisocks_counter_source_errors_total",
                "Total number of counter source fetch/parse failures"
            )
            .expect("Failed to register counter_source_errors_total"),

            hosts_monitored: register_int_gauge!(
                "multisocks_hosts_monitored",
                "Number of hosts covered by the latest snapshot"
            )
            .expect("Failed to register hosts_monitored"),
        }
    }
}

/// Lightweight handle to the global metrics instance. Multiple
/// clones share the same underlying metrics.
#[derive(Clone)]
pub struct TelemetryMetrics {
    _private: (),
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(TelemetryMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &'static TelemetryMetricsInner {
        GLOBAL_METRICS.get_or_init(TelemetryMetricsInner::new)
    }

    pub fn observe_cycle_latency(&self, seconds: f64) {
        self.inner().cycle_latency_seconds.observe(seconds);
    }

    pub fn record_cycle(&self) {
        self.inner().cycles_total.inc();
    }

    pub fn record_cycle_error(&self) {
        self.inner().cycle_errors_total.inc();
    }

    pub fn record_host_fetch_error(&self) {
        self.inner().host_fetch_errors_total.inc();
    }

    pub fn record_counter_source_error(&self) {
        self.inner().counter_source_errors_total.inc();
    }

    pub fn set_hosts_monitored(&self, count: i64) {
        self.inner().hosts_monitored.set(count);
    }
}
