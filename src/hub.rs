//! Broadcast hub: the subscriber set and the current snapshot.
//!
//! All subscribers read from one bounded broadcast ring. A publish replaces
//! the current snapshot and pushes it onto the ring under the same lock a
//! subscribe takes, so a new subscriber sees each snapshot exactly once:
//! either as its initial one or from the ring. Publish order is delivery
//! order for every subscriber.
//!
//! A subscriber that falls more than [`SUBSCRIBER_QUEUE_DEPTH`] snapshots
//! behind skips the oldest ones and resumes with the newest retained. Every
//! snapshot is complete, so a skipped one is simply superseded.

use crate::record::Snapshot;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, info};

pub type SubscriberId = u64;

/// Snapshots retained for subscribers that have not read them yet.
pub const SUBSCRIBER_QUEUE_DEPTH: usize = 16;

#[derive(Debug, Default)]
struct Shared {
    subscribers: HashMap<SubscriberId, Arc<AtomicBool>>,
    current: Option<Arc<Snapshot>>,
}

#[derive(Debug)]
struct HubInner {
    shared: Mutex<Shared>,
    tx: broadcast::Sender<Arc<Snapshot>>,
    next_id: AtomicU64,
    deliveries: AtomicU64,
}

impl HubInner {
    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: SubscriberId) -> bool {
        let Some(active) = self.shared().subscribers.remove(&id) else {
            return false;
        };
        active.store(false, Ordering::Release);
        info!(subscriber = id, "Subscriber removed");
        true
    }
}

#[derive(Debug, Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(SUBSCRIBER_QUEUE_DEPTH);
        Self {
            inner: Arc::new(HubInner {
                shared: Mutex::new(Shared::default()),
                tx,
                next_id: AtomicU64::new(0),
                deliveries: AtomicU64::new(0),
            }),
        }
    }

    /// Register a subscriber. Its first delivery is the current snapshot, if
    /// there is one.
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let active = Arc::new(AtomicBool::new(true));

        let mut shared = self.inner.shared();
        let rx = self.inner.tx.subscribe();
        let pending = shared.current.clone();
        if pending.is_some() {
            self.inner.deliveries.fetch_add(1, Ordering::Relaxed);
        }
        shared.subscribers.insert(id, Arc::clone(&active));
        let count = shared.subscribers.len();
        drop(shared);

        info!(subscriber = id, subscribers = count, "Subscriber added");
        Subscription {
            id,
            pending,
            rx,
            active,
            missed: 0,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a subscriber. Removing an unknown id is a no-op returning false.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.remove(id)
    }

    /// Make `snapshot` current and deliver it once to every registered
    /// subscriber. Returns the number of subscribers it was delivered to.
    pub fn publish(&self, snapshot: Arc<Snapshot>) -> usize {
        let mut shared = self.inner.shared();
        shared.current = Some(Arc::clone(&snapshot));
        let delivered = shared.subscribers.len();
        // Only fails when no receiver exists, and then there is nobody to miss it.
        let _ = self.inner.tx.send(snapshot);
        drop(shared);

        self.inner.deliveries.fetch_add(delivered as u64, Ordering::Relaxed);
        delivered
    }

    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.inner.shared().current.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.shared().subscribers.len()
    }

    /// Total deliveries made since the hub was created.
    pub fn delivery_count(&self) -> u64 {
        self.inner.deliveries.load(Ordering::Relaxed)
    }
}

/// One connected viewer. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    pending: Option<Arc<Snapshot>>,
    rx: broadcast::Receiver<Arc<Snapshot>>,
    active: Arc<AtomicBool>,
    missed: u64,
    hub: Weak<HubInner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next delivered snapshot; `None` once unsubscribed or the hub is gone.
    pub async fn recv(&mut self) -> Option<Arc<Snapshot>> {
        loop {
            if !self.active.load(Ordering::Acquire) {
                return None;
            }
            if let Some(snapshot) = self.pending.take() {
                return Some(snapshot);
            }
            match self.rx.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(RecvError::Lagged(skipped)) => self.skip(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-delivered snapshot, if any.
    pub fn try_recv(&mut self) -> Option<Arc<Snapshot>> {
        loop {
            if !self.active.load(Ordering::Acquire) {
                return None;
            }
            if let Some(snapshot) = self.pending.take() {
                return Some(snapshot);
            }
            match self.rx.try_recv() {
                Ok(snapshot) => return Some(snapshot),
                Err(TryRecvError::Lagged(skipped)) => self.skip(skipped),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Snapshots superseded before this subscriber read them.
    pub fn missed(&self) -> u64 {
        self.missed
    }

    fn skip(&mut self, skipped: u64) {
        self.missed += skipped;
        debug!(subscriber = self.id, skipped, "Subscriber fell behind, skipping to newer snapshots");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.id);
        }
    }
}
