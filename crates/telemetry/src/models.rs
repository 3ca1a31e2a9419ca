//! Core data models for the telemetry engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Distinguished entity name for a service's frontend aggregate row.
pub const FRONTEND: &str = "FRONTEND";
/// Distinguished entity name for a service's backend aggregate row.
pub const BACKEND: &str = "BACKEND";
/// Status value reported by the load balancer for a live entity.
pub const STATUS_UP: &str = "UP";
/// Circuit purpose marking a torn-down circuit.
pub const PURPOSE_CLOSED: &str = "CLOSED";

/// One load-balancer entity sample from the counter table.
///
/// Numeric counters default to 0 when the source omits the field or
/// reports a non-numeric value. Rows are created fresh on every poll
/// cycle and never mutated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CounterRow {
    /// Logical service this row belongs to (`pxname`); never empty.
    #[serde(rename = "serviceName")]
    pub service_name: String,
    /// Entity within the service (`svname`); `FRONTEND`/`BACKEND`
    /// mark aggregate rows, anything else is a member instance.
    #[serde(rename = "entityName")]
    pub entity_name: String,
    pub status: String,
    pub scur: u64,
    pub smax: u64,
    pub stot: u64,
    pub bin: u64,
    pub bout: u64,
    pub ereq: u64,
    pub econ: u64,
    pub eresp: u64,
    pub wretr: u64,
    pub wredis: u64,
    pub weight: u64,
    pub act: u64,
    pub bck: u64,
    pub chkfail: u64,
    pub chkdown: u64,
    pub downtime: u64,
    pub rate: u64,
    pub rate_max: u64,
    pub hrsp_2xx: u64,
    pub hrsp_3xx: u64,
    pub hrsp_4xx: u64,
    pub hrsp_5xx: u64,
    pub cli_abrt: u64,
    pub srv_abrt: u64,
    /// Seconds since the last session; -1 when no session was seen.
    pub lastsess: i64,
    pub qtime: u64,
    pub ctime: u64,
    pub rtime: u64,
    pub ttime: u64,
    pub check_status: String,
    pub check_code: u64,
    pub check_duration: u64,
    pub last_chk: String,
    pub qtime_max: u64,
    pub ctime_max: u64,
    pub rtime_max: u64,
    pub ttime_max: u64,
}

impl CounterRow {
    pub fn is_frontend(&self) -> bool {
        self.entity_name == FRONTEND
    }

    pub fn is_backend(&self) -> bool {
        self.entity_name == BACKEND
    }

    /// A concrete backend instance rather than an aggregate row.
    pub fn is_member(&self) -> bool {
        !self.is_frontend() && !self.is_backend()
    }

    pub fn is_up(&self) -> bool {
        self.status == STATUS_UP
    }

    /// Request, connection and response errors plus retry and
    /// redispatch warnings for this entity.
    pub fn error_total(&self) -> u64 {
        self.ereq + self.econ + self.eresp + self.wretr + self.wredis
    }
}

/// Geographic lookup result for a circuit hop.
///
/// `country == "unknown"` is a sentinel for a failed lookup, not an
/// error condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub country: String,
    pub city: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl GeoLocation {
    pub fn unknown() -> Self {
        Self {
            country: "unknown".to_string(),
            city: "unknown".to_string(),
            latitude: None,
            longitude: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.country == "unknown"
    }
}

impl Default for GeoLocation {
    fn default() -> Self {
        Self::unknown()
    }
}

/// One hop in a circuit path. The fingerprint uniquely identifies
/// the node within its path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitPathNode {
    pub fingerprint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    pub address: String,
    #[serde(default)]
    pub location: GeoLocation,
}

/// A logical multi-hop path through routing nodes, unique per host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    pub circuit_id: String,
    /// `BUILDING`, `CLOSED`, or any established purpose.
    pub purpose: String,
    /// Ordered hops; empty while the circuit is still building.
    #[serde(default)]
    pub path: Vec<CircuitPathNode>,
}

impl Circuit {
    pub fn is_closed(&self) -> bool {
        self.purpose == PURPOSE_CLOSED
    }

    /// Active means not closed and with at least one hop built.
    pub fn is_active(&self) -> bool {
        !self.is_closed() && !self.path.is_empty()
    }
}

/// Identity of one anonymity-routing host as reported by the
/// topology source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorHost {
    pub id: String,
    pub ip_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ip: Option<String>,
    pub hostname: String,
    pub image: String,
    pub state: String,
}

/// One host enriched with its circuit topology for a single cycle.
///
/// `error` and a populated circuit list are mutually exclusive: a
/// host whose circuit fetch failed always reports zero circuits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorHostRecord {
    #[serde(flatten)]
    pub host: TorHost,
    #[serde(default)]
    pub circuits: Vec<Circuit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TorHostRecord {
    /// A host counts as healthy when its circuit fetch succeeded and
    /// it carries at least one circuit.
    pub fn is_healthy(&self) -> bool {
        self.error.is_none() && !self.circuits.is_empty()
    }

    pub fn active_circuits(&self) -> usize {
        self.circuits.iter().filter(|c| !c.is_closed()).count()
    }
}

/// Point-in-time reduction over the current cycle's counter rows and
/// host records. Every field is a pure function of those inputs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSummary {
    pub total_circuits: u64,
    pub active_circuits: u64,
    pub total_sessions: u64,
    pub total_bytes_in: u64,
    pub total_bytes_out: u64,
    pub total_errors: u64,
    /// Mean total time in milliseconds over UP member rows; 0 when
    /// no member row is UP.
    pub average_latency: f64,
    pub healthy_backends: u64,
    pub total_backends: u64,
}

/// Qualitative health category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Healthy,
    Warning,
    Critical,
}

/// Classified health with a human-readable message. Recomputed every
/// cycle, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: HealthLevel,
    pub message: String,
}

impl HealthStatus {
    pub fn healthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthLevel::Healthy,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            status: HealthLevel::Warning,
            message: message.into(),
        }
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self {
            status: HealthLevel::Critical,
            message: message.into(),
        }
    }
}

/// The shape handed to the presentation layer on every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub tor_hosts: Vec<TorHostRecord>,
    pub counter_rows: Vec<CounterRow>,
    pub summary: SystemSummary,
    pub last_updated: DateTime<Utc>,
}

/// Result of one control-plane command forwarded to the topology
/// control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
}

/// Per-host entry in a fleet-wide command result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostCommandResult {
    pub host_id: String,
    pub hostname: String,
    pub result: CommandOutcome,
}

/// Aggregate outcome of a command fanned out across all hosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetCommandOutcome {
    pub success: bool,
    pub results: Vec<HostCommandResult>,
}
