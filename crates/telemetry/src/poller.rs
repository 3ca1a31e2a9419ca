//! Polling scheduler
//!
//! Drives periodic re-collection and owns the latest snapshot. One
//! cycle fetches both sources, settles every per-host merge, then
//! reduces and classifies. At most one cycle is ever in flight:
//! timer ticks and forced refreshes that arrive while a cycle is
//! collecting coalesce onto it and observe its result.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::{interval, Instant};
use tracing::{debug, info, warn};

use crate::counters::{parse_counter_table, CounterSource};
use crate::error::TelemetryError;
use crate::health::{classify_host, classify_system};
use crate::history::{History, TrendPoint, DEFAULT_HISTORY_CAPACITY};
use crate::models::{DashboardData, HealthStatus};
use crate::observability::TelemetryMetrics;
use crate::summary::summarize;
use crate::topology::{collect_host_records, TopologySource};

/// Health derived for one cycle: the system-level status plus one
/// entry per host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealth {
    pub overall: HealthStatus,
    pub hosts: Vec<HostHealth>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostHealth {
    pub host_id: String,
    pub hostname: String,
    pub health: HealthStatus,
}

/// One fully-settled, internally consistent collection result.
///
/// Replaced wholesale on every successful cycle; consumers only ever
/// hold immutable `Arc` views.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(flatten)]
    pub data: DashboardData,
    pub health: SystemHealth,
    /// Present when the counter source failed this cycle; the
    /// counter-derived summary fields are then zeroed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_error: Option<String>,
    pub collected_at: DateTime<Utc>,
}

/// Produces one snapshot per collection cycle.
#[async_trait]
pub trait SnapshotCollector: Send + Sync {
    async fn collect(&self) -> Result<Snapshot, TelemetryError>;
}

/// Collector composing the full pipeline: counter text and per-host
/// topology in, snapshot out.
///
/// Without a topology source it becomes the counter-only identity:
/// zero hosts, counter-derived summary fields only.
pub struct DashboardCollector {
    counters: Arc<dyn CounterSource>,
    topology: Option<Arc<dyn TopologySource>>,
    host_fetch_timeout: Duration,
}

impl DashboardCollector {
    pub fn new(
        counters: Arc<dyn CounterSource>,
        topology: Arc<dyn TopologySource>,
        host_fetch_timeout: Duration,
    ) -> Self {
        Self {
            counters,
            topology: Some(topology),
            host_fetch_timeout,
        }
    }

    pub fn counters_only(counters: Arc<dyn CounterSource>) -> Self {
        Self {
            counters,
            topology: None,
            host_fetch_timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait]
impl SnapshotCollector for DashboardCollector {
    async fn collect(&self) -> Result<Snapshot, TelemetryError> {
        // A hosts-list failure fails the whole cycle; there is no
        // meaningful partial snapshot without host identities.
        let tor_hosts = match &self.topology {
            Some(topology) => {
                let hosts = topology.list_hosts().await?;
                collect_host_records(Arc::clone(topology), hosts, self.host_fetch_timeout).await
            }
            None => Vec::new(),
        };

        // Counter failures degrade: empty rows, error reported
        // alongside the snapshot rather than thrown.
        let fetched = match self.counters.fetch_raw().await {
            Ok(text) => parse_counter_table(&text),
            Err(e) => Err(e),
        };
        let (counter_rows, counter_error) = match fetched {
            Ok(rows) => (rows, None),
            Err(e) => {
                TelemetryMetrics::new().record_counter_source_error();
                warn!(error = %e, "counter source failed, degrading counter data");
                (Vec::new(), Some(e.to_string()))
            }
        };

        let summary = summarize(&counter_rows, &tor_hosts);
        let health = SystemHealth {
            overall: classify_system(&summary, &tor_hosts),
            hosts: tor_hosts
                .iter()
                .map(|record| HostHealth {
                    host_id: record.host.id.clone(),
                    hostname: record.host.hostname.clone(),
                    health: classify_host(record),
                })
                .collect(),
        };

        let now = Utc::now();
        Ok(Snapshot {
            data: DashboardData {
                tor_hosts,
                counter_rows,
                summary,
                last_updated: now,
            },
            health,
            counter_error,
            collected_at: now,
        })
    }
}

/// Configuration for one polling identity.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Cadence of timer-driven cycles (default: 2 seconds for the
    /// live view; the counter-only identity typically runs at 30).
    pub interval: Duration,
    /// Rolling trend window size.
    pub history_capacity: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// Result observed by every caller coalesced onto one cycle.
pub type CycleResult = Result<Arc<Snapshot>, Arc<TelemetryError>>;

struct PollerInner {
    collector: Arc<dyn SnapshotCollector>,
    config: PollerConfig,
    metrics: TelemetryMetrics,
    /// Latest successful snapshot; replaced atomically, never
    /// mutated in place.
    latest_tx: watch::Sender<Option<Arc<Snapshot>>>,
    history: Mutex<History>,
    /// Publisher of the in-flight cycle's result, if one is running.
    inflight: Mutex<Option<broadcast::Sender<CycleResult>>>,
}

/// Scheduler for one polling identity.
///
/// Cheap to clone; clones share the snapshot, history and in-flight
/// state.
#[derive(Clone)]
pub struct Poller {
    inner: Arc<PollerInner>,
}

impl Poller {
    pub fn new(collector: Arc<dyn SnapshotCollector>, config: PollerConfig) -> Self {
        let (latest_tx, _) = watch::channel(None);
        let history = Mutex::new(History::new(config.history_capacity));
        Self {
            inner: Arc::new(PollerInner {
                collector,
                config,
                metrics: TelemetryMetrics::new(),
                latest_tx,
                history,
                inflight: Mutex::new(None),
            }),
        }
    }

    /// Last successfully computed snapshot and its age. Non-blocking;
    /// `None` until the first cycle succeeds.
    pub fn latest(&self) -> Option<(Arc<Snapshot>, chrono::Duration)> {
        let snapshot = self.inner.latest_tx.borrow().clone()?;
        let age = Utc::now() - snapshot.collected_at;
        Some((snapshot, age))
    }

    /// Push interface: resolves whenever a new snapshot is published.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.inner.latest_tx.subscribe()
    }

    pub async fn history(&self) -> Vec<TrendPoint> {
        self.inner.history.lock().await.to_vec()
    }

    /// Force one collection cycle and wait for its result.
    ///
    /// If a cycle is already collecting, no second one starts: the
    /// call coalesces onto the in-flight cycle and returns its
    /// result. A failed cycle leaves the previous snapshot in place.
    pub async fn refresh(&self) -> CycleResult {
        let mut waiter = self.join_or_start_cycle().await;

        match waiter.recv().await {
            Ok(result) => result,
            Err(_) => Err(Arc::new(TelemetryError::Invariant(
                "in-flight cycle ended without publishing a result".to_string(),
            ))),
        }
    }

    /// Subscribe to the in-flight cycle if one exists, otherwise
    /// start one. The cycle runs detached so a caller that goes away
    /// mid-refresh cannot strand later waiters.
    async fn join_or_start_cycle(&self) -> broadcast::Receiver<CycleResult> {
        let mut inflight = self.inner.inflight.lock().await;
        if let Some(tx) = inflight.as_ref() {
            return tx.subscribe();
        }

        let (tx, rx) = broadcast::channel(1);
        *inflight = Some(tx.clone());
        drop(inflight);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let result = PollerInner::run_cycle(&inner).await;
            // Clear before publishing: a caller arriving after the
            // send must start a fresh cycle, not subscribe to a
            // finished one.
            *inner.inflight.lock().await = None;
            let _ = tx.send(result);
        });
        rx
    }

    /// Timer-driven polling loop. Runs until the shutdown channel
    /// fires; each tick coalesces with any forced refresh.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.inner.config.interval.as_secs(),
            "starting polling loop"
        );

        let mut ticker = interval(self.inner.config.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = self.refresh().await;
                }
                _ = shutdown.recv() => {
                    info!("stopping polling loop");
                    break;
                }
            }
        }
    }
}

impl PollerInner {
    async fn run_cycle(inner: &Arc<PollerInner>) -> CycleResult {
        let started = Instant::now();

        match inner.collector.collect().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                let elapsed = started.elapsed();

                inner
                    .history
                    .lock()
                    .await
                    .record(snapshot.collected_at, &snapshot.data.summary);

                inner.metrics.record_cycle();
                inner.metrics.observe_cycle_latency(elapsed.as_secs_f64());
                inner
                    .metrics
                    .set_hosts_monitored(snapshot.data.tor_hosts.len() as i64);

                debug!(
                    hosts = snapshot.data.tor_hosts.len(),
                    rows = snapshot.data.counter_rows.len(),
                    elapsed_ms = elapsed.as_millis(),
                    "collection cycle complete"
                );

                inner.latest_tx.send_replace(Some(Arc::clone(&snapshot)));
                Ok(snapshot)
            }
            Err(e) => {
                inner.metrics.record_cycle_error();
                warn!(error = %e, "collection cycle failed, keeping previous snapshot");
                Err(Arc::new(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Circuit, CommandOutcome, SystemSummary, TorHost};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockCollector {
        collect_count: AtomicUsize,
        delay: Duration,
        fail_from_call: usize,
    }

    impl MockCollector {
        fn new(delay: Duration) -> Self {
            Self {
                collect_count: AtomicUsize::new(0),
                delay,
                fail_from_call: usize::MAX,
            }
        }

        fn failing_after(successes: usize) -> Self {
            Self {
                collect_count: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail_from_call: successes,
            }
        }

        fn calls(&self) -> usize {
            self.collect_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SnapshotCollector for MockCollector {
        async fn collect(&self) -> Result<Snapshot, TelemetryError> {
            let call = self.collect_count.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;

            if call >= self.fail_from_call {
                return Err(TelemetryError::fetch("mock", "source down"));
            }

            let now = Utc::now();
            Ok(Snapshot {
                data: DashboardData {
                    tor_hosts: Vec::new(),
                    counter_rows: Vec::new(),
                    summary: SystemSummary {
                        total_sessions: call as u64,
                        ..Default::default()
                    },
                    last_updated: now,
                },
                health: SystemHealth {
                    overall: HealthStatus::critical("All hosts offline"),
                    hosts: Vec::new(),
                },
                counter_error: None,
                collected_at: now,
            })
        }
    }

    #[tokio::test]
    async fn test_latest_is_none_before_first_cycle() {
        let collector = Arc::new(MockCollector::new(Duration::ZERO));
        let poller = Poller::new(collector, PollerConfig::default());
        assert!(poller.latest().is_none());
    }

    #[tokio::test]
    async fn test_refresh_publishes_snapshot() {
        let collector = Arc::new(MockCollector::new(Duration::ZERO));
        let poller = Poller::new(collector, PollerConfig::default());

        let snapshot = poller.refresh().await.unwrap();
        let (latest, age) = poller.latest().unwrap();

        assert!(Arc::ptr_eq(&snapshot, &latest));
        assert!(age.num_seconds() >= 0);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_coalesce_onto_one_cycle() {
        let collector = Arc::new(MockCollector::new(Duration::from_millis(50)));
        let poller = Poller::new(collector.clone(), PollerConfig::default());

        let (first, second) = tokio::join!(poller.refresh(), poller.refresh());
        let first = first.unwrap();
        let second = second.unwrap();

        assert_eq!(collector.calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_sequential_refreshes_run_separate_cycles() {
        let collector = Arc::new(MockCollector::new(Duration::ZERO));
        let poller = Poller::new(collector.clone(), PollerConfig::default());

        poller.refresh().await.unwrap();
        poller.refresh().await.unwrap();

        assert_eq!(collector.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_cycle_keeps_previous_snapshot() {
        let collector = Arc::new(MockCollector::failing_after(1));
        let poller = Poller::new(collector, PollerConfig::default());

        let good = poller.refresh().await.unwrap();
        let err = poller.refresh().await.unwrap_err();

        assert!(err.is_fetch());
        let (latest, _) = poller.latest().unwrap();
        assert!(Arc::ptr_eq(&good, &latest));
    }

    #[tokio::test]
    async fn test_history_records_successful_cycles() {
        let collector = Arc::new(MockCollector::new(Duration::ZERO));
        let poller = Poller::new(collector, PollerConfig::default());

        poller.refresh().await.unwrap();
        poller.refresh().await.unwrap();

        let history = poller.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].sessions, 0);
        assert_eq!(history[1].sessions, 1);
    }

    #[tokio::test]
    async fn test_subscriber_sees_new_snapshot() {
        let collector = Arc::new(MockCollector::new(Duration::ZERO));
        let poller = Poller::new(collector, PollerConfig::default());
        let mut rx = poller.subscribe();

        poller.refresh().await.unwrap();

        rx.changed().await.unwrap();
        assert!(rx.borrow().is_some());
    }

    // -- DashboardCollector --

    struct StaticCounters {
        text: Result<String, ()>,
    }

    #[async_trait]
    impl crate::counters::CounterSource for StaticCounters {
        async fn fetch_raw(&self) -> crate::error::Result<String> {
            self.text
                .clone()
                .map_err(|_| TelemetryError::fetch("counters", "connection refused"))
        }
    }

    struct StaticTopology {
        hosts_fail: bool,
    }

    #[async_trait]
    impl crate::topology::TopologySource for StaticTopology {
        async fn list_hosts(&self) -> crate::error::Result<Vec<TorHost>> {
            if self.hosts_fail {
                return Err(TelemetryError::fetch("tor-hosts", "timed out"));
            }
            Ok(vec![TorHost {
                id: "abc".to_string(),
                ip_address: "10.0.0.2".to_string(),
                external_ip: None,
                hostname: "tor-01".to_string(),
                image: "multisocks-private-tor".to_string(),
                state: "running".to_string(),
            }])
        }

        async fn host_circuits(&self, _: &str) -> crate::error::Result<Vec<Circuit>> {
            Ok(vec![Circuit {
                circuit_id: "1".to_string(),
                purpose: "GENERAL".to_string(),
                path: Vec::new(),
            }])
        }

        async fn rebuild_circuits(&self, _: &str) -> crate::error::Result<CommandOutcome> {
            unimplemented!()
        }

        async fn close_circuit(&self, _: &str, _: &str) -> crate::error::Result<CommandOutcome> {
            unimplemented!()
        }

        async fn new_identity(&self, _: &str) -> crate::error::Result<CommandOutcome> {
            unimplemented!()
        }
    }

    const COUNTER_TEXT: &str = "\
# pxname,svname,status,stot,bin,bout,ttime\n\
socks,tor-01,UP,10,100,200,50\n\
socks,BACKEND,UP,10,100,200,50\n";

    #[tokio::test]
    async fn test_dashboard_collector_full_cycle() {
        let collector = DashboardCollector::new(
            Arc::new(StaticCounters {
                text: Ok(COUNTER_TEXT.to_string()),
            }),
            Arc::new(StaticTopology { hosts_fail: false }),
            Duration::from_secs(5),
        );

        let snapshot = collector.collect().await.unwrap();

        assert!(snapshot.counter_error.is_none());
        assert_eq!(snapshot.data.tor_hosts.len(), 1);
        assert_eq!(snapshot.data.counter_rows.len(), 2);
        assert_eq!(snapshot.data.summary.total_sessions, 10);
        assert_eq!(snapshot.data.summary.total_circuits, 1);
        assert_eq!(snapshot.health.hosts.len(), 1);
    }

    #[tokio::test]
    async fn test_counter_failure_degrades_instead_of_failing() {
        let collector = DashboardCollector::new(
            Arc::new(StaticCounters { text: Err(()) }),
            Arc::new(StaticTopology { hosts_fail: false }),
            Duration::from_secs(5),
        );

        let snapshot = collector.collect().await.unwrap();

        assert!(snapshot.counter_error.is_some());
        assert!(snapshot.data.counter_rows.is_empty());
        assert_eq!(snapshot.data.summary.total_sessions, 0);
        // Topology side is unaffected by the counter failure.
        assert_eq!(snapshot.data.summary.total_circuits, 1);
    }

    #[tokio::test]
    async fn test_hosts_list_failure_fails_the_cycle() {
        let collector = DashboardCollector::new(
            Arc::new(StaticCounters {
                text: Ok(COUNTER_TEXT.to_string()),
            }),
            Arc::new(StaticTopology { hosts_fail: true }),
            Duration::from_secs(5),
        );

        let err = collector.collect().await.unwrap_err();
        assert!(err.is_fetch());
    }

    #[tokio::test]
    async fn test_counters_only_identity_has_no_hosts() {
        let collector = DashboardCollector::counters_only(Arc::new(StaticCounters {
            text: Ok(COUNTER_TEXT.to_string()),
        }));

        let snapshot = collector.collect().await.unwrap();

        assert!(snapshot.data.tor_hosts.is_empty());
        assert_eq!(snapshot.data.summary.total_sessions, 10);
        assert_eq!(snapshot.data.summary.total_circuits, 0);
    }
}
