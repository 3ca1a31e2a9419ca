//! Bounded rolling history for trend display
//!
//! Keeps the last N cycle summaries in memory. This is the only
//! state carried across cycles; nothing is persisted.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::SystemSummary;

/// Number of trend points kept by default.
pub const DEFAULT_HISTORY_CAPACITY: usize = 60;

/// One cycle's summary reduced to the fields the trend charts need.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub sessions: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub active_circuits: u64,
    pub average_latency: f64,
}

/// Rolling window of trend points, oldest first.
#[derive(Debug, Clone)]
pub struct History {
    capacity: usize,
    points: VecDeque<TrendPoint>,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            points: VecDeque::new(),
        }
    }

    /// Record one cycle's summary, evicting the oldest point when
    /// the window is full.
    pub fn record(&mut self, at: DateTime<Utc>, summary: &SystemSummary) {
        self.points.push_back(TrendPoint {
            timestamp: at,
            sessions: summary.total_sessions,
            bytes_in: summary.total_bytes_in,
            bytes_out: summary.total_bytes_out,
            active_circuits: summary.active_circuits,
            average_latency: summary.average_latency,
        });
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn to_vec(&self) -> Vec<TrendPoint> {
        self.points.iter().cloned().collect()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
