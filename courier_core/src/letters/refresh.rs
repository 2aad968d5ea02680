//! Fire-and-forget refresh of every tracked letter.
//!
//! `refresh_all` snapshots the tracking numbers, schedules one task per letter on a bounded
//! pool, and returns without waiting. Task failures are logged and counted, never reported
//! to the caller, and never affect sibling tasks.

use crate::letters::models::TrackingNumber;
use crate::letters::tracker::LetterTracker;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

/// Returned to the caller as soon as a batch has been scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshAck {
    pub batch_id: Uuid,
    pub scheduled: usize,
}

/// Cumulative task counters since the refresher was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshStats {
    pub scheduled: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Tasks cancelled by shutdown before they started.
    pub skipped: u64,
}

#[derive(Default)]
struct Counters {
    scheduled: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> RefreshStats {
        RefreshStats {
            scheduled: self.scheduled.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

pub struct BulkRefresher {
    tracker: Arc<LetterTracker>,
    permits: Arc<Semaphore>,
    tasks: TaskTracker,
    cancel: CancellationToken,
    counters: Arc<Counters>,
    /// Serializes the close/wait/reopen cycles of `drain` and `shutdown`.
    waiting: Mutex<()>,
}

impl BulkRefresher {
    #[tracing::instrument(level = "debug", skip(tracker))]
    pub fn new(tracker: Arc<LetterTracker>, max_concurrency: usize) -> Result<Self> {
        if max_concurrency == 0 {
            return Err(Error::InvalidInput("max_concurrency must be > 0".to_string()));
        }
        Ok(Self {
            tracker,
            permits: Arc::new(Semaphore::new(max_concurrency)),
            tasks: TaskTracker::new(),
            cancel: CancellationToken::new(),
            counters: Arc::new(Counters::default()),
            waiting: Mutex::new(()),
        })
    }

    /// Schedule a refresh of every letter registered right now.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn refresh_all(&self) -> Result<RefreshAck> {
        if self.cancel.is_cancelled() {
            return Err(Error::ShuttingDown);
        }

        let tracking_numbers = self.tracker.tracking_numbers().await?;
        let batch_id = Uuid::new_v4();
        let scheduled = tracking_numbers.len();
        tracing::info!(%batch_id, scheduled, "bulk letter refresh started");

        for tracking_number in tracking_numbers {
            self.spawn_one(batch_id, tracking_number);
        }

        Ok(RefreshAck {
            batch_id,
            scheduled,
        })
    }

    fn spawn_one(&self, batch_id: Uuid, tracking_number: TrackingNumber) {
        let tracker = self.tracker.clone();
        let permits = self.permits.clone();
        let cancel = self.cancel.clone();
        let counters = self.counters.clone();
        counters.scheduled.fetch_add(1, Ordering::Relaxed);

        self.tasks.spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = permits.acquire_owned() => permit.ok(),
            };
            let Some(_permit) = permit else {
                counters.skipped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(%batch_id, tracking_number = %tracking_number, "refresh skipped");
                return;
            };

            // Run in its own task so a panic is contained and counted as a failure.
            let job = {
                let tracking_number = tracking_number.clone();
                tokio::spawn(async move { tracker.refresh_one(&tracking_number).await })
            };
            match job.await {
                Ok(Ok(reconciled)) => {
                    counters.succeeded.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        %batch_id,
                        tracking_number = %tracking_number,
                        status = %reconciled.observation.status,
                        "letter refreshed"
                    );
                }
                Ok(Err(e)) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        %batch_id,
                        tracking_number = %tracking_number,
                        error = %e,
                        "letter refresh failed"
                    );
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        %batch_id,
                        tracking_number = %tracking_number,
                        error = %e,
                        "letter refresh task panicked"
                    );
                }
            }
        });
    }

    pub fn stats(&self) -> RefreshStats {
        self.counters.snapshot()
    }

    /// Number of scheduled tasks that have not finished yet.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait until every task scheduled so far has finished.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn drain(&self) {
        let _waiting = self.waiting.lock().await;
        self.tasks.close();
        self.tasks.wait().await;
        // Once shutdown has started the tracker stays closed.
        if !self.cancel.is_cancelled() {
            self.tasks.reopen();
        }
    }

    /// Stop accepting batches, skip tasks that have not started, and wait for in-flight ones.
    ///
    /// Returns `false` if in-flight tasks were still running when `timeout` elapsed.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.cancel.cancel();
        let wait = async {
            let _waiting = self.waiting.lock().await;
            self.tasks.close();
            self.tasks.wait().await;
        };
        let drained = tokio::time::timeout(timeout, wait).await.is_ok();
        let stats = self.stats();
        if drained {
            tracing::info!(?stats, "bulk refresher drained");
        } else {
            tracing::warn!(?stats, pending = self.pending(), "bulk refresher drain timed out");
        }
        drained
    }
}
