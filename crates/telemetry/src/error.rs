//! Error types for the telemetry engine
//!
//! Failures are scoped: a `Fetch` error belongs to one source (one
//! host's circuit fetch, or the counter endpoint) and never turns
//! into a system-wide failure on its own. `Parse` covers a malformed
//! counter table, fatal only to that cycle's counter data.

use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The counter table header is missing or malformed.
    #[error("counter table parse error: {0}")]
    Parse(String),

    /// Network failure, timeout, or non-success status from a source.
    #[error("fetch from {endpoint} failed: {reason}")]
    Fetch { endpoint: String, reason: String },

    /// A broken internal invariant. Indicates a bug in the engine,
    /// not an operational condition.
    #[error("aggregation invariant violated: {0}")]
    Invariant(String),
}

impl TelemetryError {
    pub fn fetch(endpoint: impl Into<String>, reason: impl Display) -> Self {
        Self::Fetch {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
