//! Keyed work queue: at most one unit in flight per key.
//!
//! Each key with pending work owns a *lane*: an unbounded FIFO drained by
//! one task. Lanes of different keys run concurrently, bounded by a shared
//! semaphore. A lane removes itself from the map once empty; the emptiness
//! check and the removal happen under the same lock `submit` holds while
//! enqueueing, so no job can slip into a lane that is going away.
//!
//! The caller waits on a oneshot with a deadline. Timing out only abandons
//! the wait; the unit still runs to completion in its lane.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio_util::task::TaskTracker;
use vidgit_core::error::CoreError;
use vidgit_core::types::DbId;

/// Default number of lanes allowed to run a unit at the same time.
const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Default time a caller waits for its unit.
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

type Job = BoxFuture<'static, ()>;

// ---------------------------------------------------------------------------
// Config / errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub max_concurrency: usize,
    pub wait_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The caller stopped waiting. The unit is still queued or running.
    #[error("Timed out after {0:?} waiting for queued work")]
    Timeout(Duration),

    /// The unit panicked before producing a result.
    #[error("Worker lost before completing the unit")]
    WorkerLost,

    /// The queue is shutting down and accepts no new work.
    #[error("Queue is closed")]
    Closed,
}

impl From<QueueError> for CoreError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Timeout(_) => CoreError::Timeout(err.to_string()),
            QueueError::WorkerLost => CoreError::Internal(err.to_string()),
            QueueError::Closed => CoreError::Transport(err.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Lanes {
    senders: HashMap<DbId, mpsc::UnboundedSender<Job>>,
    closed: bool,
}

fn lock(lanes: &Mutex<Lanes>) -> MutexGuard<'_, Lanes> {
    lanes.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ChangeQueue {
    lanes: Arc<Mutex<Lanes>>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    wait_timeout: Duration,
}

impl ChangeQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            lanes: Arc::new(Mutex::new(Lanes::default())),
            permits: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            tracker: TaskTracker::new(),
            wait_timeout: config.wait_timeout,
        }
    }

    /// Run `work` in `key`'s lane and wait for its output.
    pub async fn submit<T, F>(&self, key: DbId, work: F) -> Result<T, QueueError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            match AssertUnwindSafe(work).catch_unwind().await {
                Ok(output) => {
                    // The waiter may have timed out; the result is dropped then.
                    let _ = tx.send(output);
                }
                Err(_) => {
                    tracing::error!(key, "Queued unit panicked");
                }
            }
        });

        self.enqueue(key, job)?;

        match tokio::time::timeout(self.wait_timeout, rx).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(_)) => Err(QueueError::WorkerLost),
            Err(_) => {
                tracing::warn!(
                    key,
                    timeout_ms = self.wait_timeout.as_millis() as u64,
                    "Caller stopped waiting for queued unit"
                );
                Err(QueueError::Timeout(self.wait_timeout))
            }
        }
    }

    fn enqueue(&self, key: DbId, job: Job) -> Result<(), QueueError> {
        let mut lanes = lock(&self.lanes);
        if lanes.closed {
            return Err(QueueError::Closed);
        }

        let job = match lanes.senders.get(&key) {
            Some(sender) => match sender.send(job) {
                Ok(()) => return Ok(()),
                // The lane task is gone; start a fresh one below.
                Err(mpsc::error::SendError(job)) => job,
            },
            None => job,
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        // The receiver is alive, so this cannot fail.
        let _ = sender.send(job);
        lanes.senders.insert(key, sender);
        self.tracker.spawn(run_lane(
            key,
            receiver,
            Arc::clone(&self.lanes),
            Arc::clone(&self.permits),
        ));
        tracing::debug!(key, "Lane opened");
        Ok(())
    }

    /// Number of keys that currently own a lane.
    pub fn active_lanes(&self) -> usize {
        lock(&self.lanes).senders.len()
    }

    /// Reject new work and wait for every lane to drain.
    pub async fn shutdown(&self) {
        lock(&self.lanes).closed = true;
        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!("Change queue drained");
    }
}

impl Default for ChangeQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

/// Drain one lane, then deregister it once it is empty.
async fn run_lane(
    key: DbId,
    mut receiver: mpsc::UnboundedReceiver<Job>,
    lanes: Arc<Mutex<Lanes>>,
    permits: Arc<Semaphore>,
) {
    loop {
        while let Ok(job) = receiver.try_recv() {
            let Ok(_permit) = permits.acquire().await else {
                return;
            };
            job.await;
        }

        let mut guard = lock(&lanes);
        if receiver.is_empty() {
            guard.senders.remove(&key);
            tracing::debug!(key, "Lane closed");
            return;
        }
    }
}
