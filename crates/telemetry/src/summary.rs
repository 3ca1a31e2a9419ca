//! System summary aggregation
//!
//! A pure reduction over one cycle's counter rows and host records.
//! Identical inputs always yield identical output, so the result is
//! safe to cache and to replay into the rolling trend history.

use crate::models::{CounterRow, SystemSummary, TorHostRecord};

/// Reduce the current cycle's inputs into one [`SystemSummary`].
///
/// Session and byte totals come from the per-service `BACKEND`
/// aggregate rows only; latency and backend health come from the
/// member rows. Circuit counts come from the host records.
pub fn summarize(rows: &[CounterRow], hosts: &[TorHostRecord]) -> SystemSummary {
    let total_circuits = hosts.iter().map(|h| h.circuits.len() as u64).sum();
    let active_circuits = hosts
        .iter()
        .flat_map(|h| h.circuits.iter())
        .filter(|c| !c.is_closed())
        .count() as u64;

    let mut total_sessions = 0u64;
    let mut total_bytes_in = 0u64;
    let mut total_bytes_out = 0u64;
    for row in rows.iter().filter(|r| r.is_backend()) {
        total_sessions += row.stot;
        total_bytes_in += row.bin;
        total_bytes_out += row.bout;
    }

    let mut latency_sum = 0.0f64;
    let mut up_members = 0u64;
    let mut total_backends = 0u64;
    for row in rows.iter().filter(|r| r.is_member()) {
        total_backends += 1;
        if row.is_up() {
            up_members += 1;
            latency_sum += row.ttime as f64;
        }
    }
    let average_latency = if up_members == 0 {
        0.0
    } else {
        latency_sum / up_members as f64
    };

    let total_errors = rows.iter().map(CounterRow::error_total).sum();

    SystemSummary {
        total_circuits,
        active_circuits,
        total_sessions,
        total_bytes_in,
        total_bytes_out,
        total_errors,
        average_latency,
        healthy_backends: up_members,
        total_backends,
    }
}
