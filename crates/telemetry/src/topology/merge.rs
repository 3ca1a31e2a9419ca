//! Merging host identity with fetched circuit topology
//!
//! Each host's circuit fetch resolves independently; one host's
//! failure never blocks the others. The fan-out settles every fetch
//! (success or failure) before returning and has no overall failure
//! mode of its own.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::TelemetryError;
use crate::models::{Circuit, TorHost, TorHostRecord};
use crate::observability::TelemetryMetrics;
use crate::topology::TopologySource;

/// Combine one host identity with the outcome of its circuit fetch.
///
/// A failed fetch yields an empty circuit list with the failure
/// captured in `error`; the two are never populated together.
pub fn merge_host(
    host: TorHost,
    fetched: Result<Vec<Circuit>, TelemetryError>,
) -> TorHostRecord {
    match fetched {
        Ok(circuits) => TorHostRecord {
            host,
            circuits,
            error: None,
        },
        Err(e) => TorHostRecord {
            host,
            circuits: Vec::new(),
            error: Some(e.to_string()),
        },
    }
}

/// Fetch every host's circuits concurrently and settle them all.
///
/// Produces exactly one record per input host, in input order. Each
/// fetch carries its own timeout; a timeout is captured like any
/// other fetch failure.
pub async fn collect_host_records(
    source: Arc<dyn TopologySource>,
    hosts: Vec<TorHost>,
    fetch_timeout: Duration,
) -> Vec<TorHostRecord> {
    let metrics = TelemetryMetrics::new();
    let mut pending = Vec::with_capacity(hosts.len());

    for host in hosts {
        let source = Arc::clone(&source);
        let host_id = host.id.clone();
        let handle = tokio::spawn(async move {
            match tokio::time::timeout(fetch_timeout, source.host_circuits(&host_id)).await {
                Ok(result) => result,
                Err(_) => Err(TelemetryError::fetch(
                    &host_id,
                    format!("circuit fetch timed out after {:?}", fetch_timeout),
                )),
            }
        });
        pending.push((host, handle));
    }

    let mut records = Vec::with_capacity(pending.len());
    for (host, handle) in pending {
        let fetched = match handle.await {
            Ok(result) => result,
            // A panicked fetch task is a bug; capture it on the
            // record like a failure so the cycle still settles.
            Err(e) => Err(TelemetryError::Invariant(format!(
                "circuit fetch task for {} panicked: {e}",
                host.id
            ))),
        };

        if let Err(e) = &fetched {
            metrics.record_host_fetch_error();
            debug!(host = %host.hostname, error = %e, "circuit fetch failed");
        }

        records.push(merge_host(host, fetched));
    }

    records
}
