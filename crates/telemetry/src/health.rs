//! Health classification
//!
//! Stateless, pure classification from the current cycle's summary
//! and host records. No transition history: every cycle is judged
//! from scratch.

use serde::{Deserialize, Serialize};

use crate::models::{HealthLevel, HealthStatus, SystemSummary, TorHostRecord};

/// Thresholds for the quantitative checks.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthThresholds {
    /// Average latency above this (milliseconds) trips the latency
    /// diagnostic to warning.
    pub latency_warning_ms: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            latency_warning_ms: 5000.0,
        }
    }
}

/// Classify the whole system. Rules are evaluated in order and the
/// first match wins:
///
/// 1. no healthy hosts -> critical
/// 2. fewer than half the hosts healthy -> warning
/// 3. no active circuits -> warning
/// 4. otherwise healthy
pub fn classify_system(summary: &SystemSummary, hosts: &[TorHostRecord]) -> HealthStatus {
    let healthy_hosts = hosts.iter().filter(|h| h.is_healthy()).count();
    let total_hosts = hosts.len();

    if healthy_hosts == 0 {
        return HealthStatus::critical("All hosts offline");
    }
    // healthy < total/2, kept in integer arithmetic
    if healthy_hosts * 2 < total_hosts {
        return HealthStatus::warning(format!("{healthy_hosts}/{total_hosts} hosts healthy"));
    }
    if summary.active_circuits == 0 {
        return HealthStatus::warning("No active circuits");
    }
    HealthStatus::healthy(format!(
        "{healthy_hosts}/{total_hosts} hosts, {} circuits",
        summary.active_circuits
    ))
}

/// Classify one host record.
pub fn classify_host(record: &TorHostRecord) -> HealthStatus {
    if let Some(error) = &record.error {
        return HealthStatus::critical(error.clone());
    }
    if record.circuits.is_empty() {
        return HealthStatus::warning("no circuits");
    }
    HealthStatus::healthy(format!("{} circuits", record.circuits.len()))
}

/// One named diagnostic check over the summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticCheck {
    pub name: String,
    pub status: HealthLevel,
    pub message: String,
}

/// Quantitative diagnostics for the diagnostics view: backend
/// health, circuit availability, and the latency threshold.
pub fn run_diagnostics(
    summary: &SystemSummary,
    thresholds: &HealthThresholds,
) -> Vec<DiagnosticCheck> {
    vec![
        DiagnosticCheck {
            name: "backends".to_string(),
            status: if summary.healthy_backends > 0 {
                HealthLevel::Healthy
            } else {
                HealthLevel::Warning
            },
            message: format!(
                "{}/{} backends healthy",
                summary.healthy_backends, summary.total_backends
            ),
        },
        DiagnosticCheck {
            name: "circuits".to_string(),
            status: if summary.active_circuits > 0 {
                HealthLevel::Healthy
            } else {
                HealthLevel::Warning
            },
            message: format!(
                "{}/{} circuits active",
                summary.active_circuits, summary.total_circuits
            ),
        },
        DiagnosticCheck {
            name: "latency".to_string(),
            status: if summary.average_latency < thresholds.latency_warning_ms {
                HealthLevel::Healthy
            } else {
                HealthLevel::Warning
            },
            message: format!("average latency: {:.0} ms", summary.average_latency),
        },
    ]
}
