//! Fleet-wide command fan-out
//!
//! Mirrors the per-host isolation of the circuit fetch path: every
//! host gets its command, per-host failures are captured in that
//! host's result.

use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::models::{CommandOutcome, FleetCommandOutcome, HostCommandResult};
use crate::topology::TopologySource;

/// Rebuild circuits on every host in the fleet.
///
/// Fails only when the host list itself cannot be fetched; a
/// rebuild failure on one host becomes an unsuccessful entry in that
/// host's result.
pub async fn rebuild_all_circuits(
    source: Arc<dyn TopologySource>,
) -> Result<FleetCommandOutcome> {
    let hosts = source.list_hosts().await?;
    info!(hosts = hosts.len(), "rebuilding circuits across fleet");

    let mut pending = Vec::with_capacity(hosts.len());
    for host in hosts {
        let source = Arc::clone(&source);
        let host_id = host.id.clone();
        let handle = tokio::spawn(async move { source.rebuild_circuits(&host_id).await });
        pending.push((host, handle));
    }

    let mut results = Vec::with_capacity(pending.len());
    for (host, handle) in pending {
        let result = match handle.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => CommandOutcome {
                success: false,
                message: e.to_string(),
            },
            Err(e) => CommandOutcome {
                success: false,
                message: format!("rebuild task panicked: {e}"),
            },
        };
        results.push(HostCommandResult {
            host_id: host.id,
            hostname: host.hostname,
            result,
        });
    }

    let success = results.iter().all(|r| r.result.success);
    Ok(FleetCommandOutcome { success, results })
}
