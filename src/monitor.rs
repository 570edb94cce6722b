//! The monitor: poll, detect, publish.
//!
//! One [`Monitor`] owns the collector, the change detector and the hub. Ticks
//! are single-flight: a tick that starts while another is still running is
//! skipped, so snapshots reach the detector and the hub in poll order.
//!
//! A store call that outlives the poll timeout is not thrown away: its
//! answer goes through the detector as soon as it lands, and no newer poll
//! starts before that.

use crate::collector::{LateFetch, PollOutcome, StoreCollector};
use crate::detector::{Change, ChangeDetector};
use crate::error::StoreError;
use crate::hub::{BroadcastHub, Subscription};
use crate::record::Snapshot;
use crate::store::Store;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Default time between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Content changed; the snapshot went to this many subscribers
    Published(usize),
    Unchanged,
    /// Another tick or store call was still running
    Skipped,
    /// The store failed or timed out; nothing was published
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStats {
    pub ticks: u64,
    pub publishes: u64,
    pub unchanged: u64,
    pub skipped: u64,
    pub failures: u64,
    pub subscribers: usize,
    pub deliveries: u64,
}

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    publishes: AtomicU64,
    unchanged: AtomicU64,
    skipped: AtomicU64,
    failures: AtomicU64,
}

pub struct Monitor {
    collector: StoreCollector,
    detector: Arc<Mutex<ChangeDetector>>,
    hub: BroadcastHub,
    poll_interval: Duration,
    counters: Arc<Counters>,
}

impl Monitor {
    pub fn new(store: Arc<dyn Store>, poll_interval: Duration, poll_timeout: Duration) -> Self {
        Self {
            collector: StoreCollector::new(store, poll_timeout),
            detector: Arc::new(Mutex::new(ChangeDetector::new())),
            hub: BroadcastHub::new(),
            poll_interval,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    pub fn collector(&self) -> &StoreCollector {
        &self.collector
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Run one poll cycle. Never fails: store errors are logged and the
    /// previous snapshot stays current.
    pub async fn tick(&self) -> TickOutcome {
        self.counters.ticks.fetch_add(1, Ordering::Relaxed);

        let Ok(mut detector) = self.detector.try_lock() else {
            debug!("Previous tick still running, skipping");
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            return TickOutcome::Skipped;
        };

        let snapshot = match self.collector.poll_once().await {
            Ok(PollOutcome::Fetched(snapshot)) => snapshot,
            Ok(PollOutcome::Skipped) => {
                self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                return TickOutcome::Skipped;
            }
            Err(e) => {
                warn!(store = %self.collector.store().describe(), "⚠️ Store poll failed: {}", e);
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                if matches!(e, StoreError::Timeout(_)) {
                    if let Some(late) = self.collector.take_late() {
                        self.deliver_late(late);
                    }
                }
                return TickOutcome::Failed;
            }
        };

        apply_and_publish(&mut detector, &self.hub, &self.counters, snapshot)
    }

    // Feed a timed-out store call's answer through the detector once it lands.
    fn deliver_late(&self, late: LateFetch) {
        let detector = Arc::clone(&self.detector);
        let hub = self.hub.clone();
        let counters = Arc::clone(&self.counters);

        tokio::spawn(async move {
            // The permit keeps new polls skipped until this answer is handled.
            let (snapshot, _permit) = match late.finish().await {
                Ok(finished) => finished,
                Err(e) => {
                    warn!("⚠️ Late store answer failed: {}", e);
                    return;
                }
            };
            debug!("Store answered after its timeout");
            let mut detector = detector.lock().await;
            apply_and_publish(&mut detector, &hub, &counters, snapshot);
        });
    }

    /// Register a subscriber. If nothing has been published yet, a poll runs
    /// first so the new subscriber starts from real data.
    pub async fn subscribe(&self) -> Subscription {
        if self.hub.current().is_none() {
            self.tick().await;
        }
        self.hub.subscribe()
    }

    /// Poll every interval until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(interval = ?self.poll_interval, store = %self.collector.store().describe(), "🚀 Monitor polling started");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("🛑 Monitor polling stopped");
                    break;
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            ticks: self.counters.ticks.load(Ordering::Relaxed),
            publishes: self.counters.publishes.load(Ordering::Relaxed),
            unchanged: self.counters.unchanged.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            subscribers: self.hub.subscriber_count(),
            deliveries: self.hub.delivery_count(),
        }
    }
}

fn apply_and_publish(detector: &mut ChangeDetector, hub: &BroadcastHub, counters: &Counters, snapshot: Snapshot) -> TickOutcome {
    match detector.apply(snapshot) {
        Change::Unchanged => {
            debug!("No change in AGV data");
            counters.unchanged.fetch_add(1, Ordering::Relaxed);
            TickOutcome::Unchanged
        }
        Change::Changed(snapshot) => {
            let rows = snapshot.len();
            let delivered = hub.publish(snapshot);
            info!(rows, subscribers = delivered, "📡 AGV data changed, broadcasting");
            counters.publishes.fetch_add(1, Ordering::Relaxed);
            TickOutcome::Published(delivered)
        }
    }
}
