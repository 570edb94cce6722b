//! Store collector: single-flight, time-bounded polls.

use crate::error::StoreError;
use crate::record::Snapshot;
use crate::store::Store;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Default bound on one store call.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(2000);

#[derive(Debug)]
pub enum PollOutcome {
    Fetched(Snapshot),
    /// A previous poll is still outstanding; nothing was queried.
    Skipped,
}

/// Marks a store call as outstanding. Further polls are skipped until the
/// permit is dropped.
#[derive(Debug)]
pub struct PollPermit(Arc<AtomicBool>);

impl PollPermit {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for PollPermit {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

type FetchTask = JoinHandle<(Result<Snapshot, StoreError>, PollPermit)>;

/// A store call that outlived the poll timeout and is still running.
#[derive(Debug)]
pub struct LateFetch {
    task: FetchTask,
}

impl LateFetch {
    /// Wait for the call to finish.
    ///
    /// On success the permit comes back with the snapshot; hold it until the
    /// snapshot has been handled so no newer poll can overtake it.
    pub async fn finish(self) -> Result<(Snapshot, PollPermit), StoreError> {
        match self.task.await {
            Ok((result, permit)) => result.map(|snapshot| (snapshot, permit)),
            Err(join_error) => Err(StoreError::Unavailable(format!("store task failed: {}", join_error))),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

pub struct StoreCollector {
    store: Arc<dyn Store>,
    timeout: Duration,
    in_flight: Arc<AtomicBool>,
    late: Mutex<Option<LateFetch>>,
}

impl StoreCollector {
    pub fn new(store: Arc<dyn Store>, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            in_flight: Arc::new(AtomicBool::new(false)),
            late: Mutex::new(None),
        }
    }

    /// Fetch a full snapshot.
    ///
    /// The store call runs on a blocking thread. If it outlives the timeout the
    /// caller gets [`StoreError::Timeout`] and the call stays in flight until it
    /// finishes, so later polls are skipped rather than stacked up. Its answer
    /// is kept: claim it with [`StoreCollector::take_late`], or the first poll
    /// after it finishes returns it.
    pub async fn poll_once(&self) -> Result<PollOutcome, StoreError> {
        if let Some(late) = self.take_finished_late() {
            debug!("Using the answer of a store call that outlived its timeout");
            return late.finish().await.map(|(snapshot, _permit)| PollOutcome::Fetched(snapshot));
        }

        let Some(permit) = PollPermit::acquire(&self.in_flight) else {
            debug!("Store poll still outstanding, skipping");
            return Ok(PollOutcome::Skipped);
        };

        let store = Arc::clone(&self.store);
        let mut task: FetchTask = tokio::task::spawn_blocking(move || (store.fetch_all(), permit));

        let waited = tokio::time::timeout(self.timeout, &mut task).await;
        match waited {
            Ok(Ok((result, _permit))) => result.map(PollOutcome::Fetched),
            Ok(Err(join_error)) => Err(StoreError::Unavailable(format!("store task failed: {}", join_error))),
            Err(_) => {
                *self.late() = Some(LateFetch { task });
                Err(StoreError::Timeout(self.timeout))
            }
        }
    }

    /// Claim the store call left running by the last timed-out poll.
    pub fn take_late(&self) -> Option<LateFetch> {
        self.late().take()
    }

    fn take_finished_late(&self) -> Option<LateFetch> {
        let mut late = self.late();
        if late.as_ref().map_or(false, LateFetch::is_finished) {
            late.take()
        } else {
            None
        }
    }

    fn late(&self) -> MutexGuard<'_, Option<LateFetch>> {
        self.late.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_polling(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}
