//! Telemetry aggregation engine for the multisocks proxy fleet
//!
//! This crate provides the core functionality for:
//! - Parsing the load balancer's delimited counter table
//! - Grouping counter rows by logical service
//! - Merging host identity with per-host circuit topology
//! - Reducing both sources into one system summary
//! - Classifying qualitative health from quantitative thresholds
//! - Scheduling collection cycles and publishing snapshots
//!
//! Rendering, notification and theming are external consumers of
//! the snapshot this crate produces.

pub mod counters;
pub mod error;
pub mod health;
pub mod history;
pub mod models;
pub mod observability;
pub mod poller;
pub mod summary;
pub mod topology;

pub use error::TelemetryError;
pub use models::*;
pub use observability::TelemetryMetrics;
pub use poller::{
    CycleResult, DashboardCollector, HostHealth, Poller, PollerConfig, Snapshot,
    SnapshotCollector, SystemHealth,
};
