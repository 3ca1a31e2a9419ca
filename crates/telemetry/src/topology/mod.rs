//! Topology-side input: host identities, per-host circuit fetches,
//! the merge that isolates per-host failures, and forwarded
//! control-plane commands.

mod client;
mod control;
mod merge;

pub use client::{HttpTopologySource, TopologySource};
pub use control::rebuild_all_circuits;
pub use merge::{collect_host_records, merge_host};
