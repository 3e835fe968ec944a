// SPDX-FileCopyrightText: 2026 Moana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Debounced background extraction.
//!
//! Each submission replaces the user's pending snapshot and pushes the
//! deadline back to `now + delay`, capped at `max_batch_wait` after the
//! first submission of the batch. When the deadline passes, one extraction
//! per kind runs on the latest snapshot. Runs for the same user never
//! overlap; different users proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use metrics::counter;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::extractor::MemoryExtractor;
use crate::types::{ConversationSnapshot, MemoryKind};

/// What happened to a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Started a new batch for the user.
    Scheduled,
    /// Replaced the snapshot of a batch already waiting.
    Coalesced,
}

struct PendingJob {
    snapshot: ConversationSnapshot,
    first_submitted: Instant,
    deadline: Instant,
}

struct Inner {
    extractor: Arc<MemoryExtractor>,
    kinds: Vec<MemoryKind>,
    max_batch_wait: Duration,
    pending: Mutex<HashMap<String, PendingJob>>,
    user_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    tracker: TaskTracker,
    flush: CancellationToken,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Debounces extraction requests per user.
///
/// Cloning is cheap; clones share the same queue.
#[derive(Clone)]
pub struct ExtractionScheduler {
    inner: Arc<Inner>,
}

impl ExtractionScheduler {
    pub fn new(extractor: Arc<MemoryExtractor>, kinds: Vec<MemoryKind>, max_batch_wait: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                extractor,
                kinds,
                max_batch_wait,
                pending: Mutex::new(HashMap::new()),
                user_locks: Mutex::new(HashMap::new()),
                tracker: TaskTracker::new(),
                flush: CancellationToken::new(),
            }),
        }
    }

    /// Queues extraction of `snapshot` after `delay`.
    ///
    /// Returns immediately. Must be called from within a Tokio runtime.
    pub fn submit(&self, snapshot: ConversationSnapshot, delay: Duration) -> SubmitOutcome {
        let now = Instant::now();
        let user_id = snapshot.user_id.clone();
        counter!("moana_memory_submissions_total").increment(1);
        let mut pending = lock(&self.inner.pending);

        if let Some(job) = pending.get_mut(&user_id) {
            let cap = job.first_submitted + self.inner.max_batch_wait;
            job.snapshot = snapshot;
            job.deadline = (now + delay).min(cap);
            counter!("moana_memory_submissions_coalesced_total").increment(1);
            debug!(user_id = %user_id, "extraction coalesced into pending batch");
            return SubmitOutcome::Coalesced;
        }

        pending.insert(
            user_id.clone(),
            PendingJob {
                snapshot,
                first_submitted: now,
                deadline: now + delay.min(self.inner.max_batch_wait),
            },
        );
        drop(pending);

        let inner = Arc::clone(&self.inner);
        self.inner.tracker.spawn(async move {
            inner.run_when_due(user_id).await;
        });
        SubmitOutcome::Scheduled
    }

    /// Number of users with a batch still waiting for its deadline.
    pub fn pending(&self) -> usize {
        lock(&self.inner.pending).len()
    }

    /// Number of users whose extraction is running or queued behind a running one.
    pub fn active_users(&self) -> usize {
        lock(&self.inner.user_locks).len()
    }

    /// Fires every waiting batch now and waits for all runs to finish.
    pub async fn shutdown(&self) {
        info!(pending = self.pending(), "flushing extraction queue");
        self.inner.flush.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
    }
}

impl Inner {
    async fn run_when_due(self: Arc<Self>, user_id: String) {
        let job = loop {
            let deadline = match lock(&self.pending).get(&user_id) {
                Some(job) => job.deadline,
                None => return,
            };

            tokio::select! {
                _ = sleep_until(deadline) => {}
                _ = self.flush.cancelled() => {}
            }

            let mut pending = lock(&self.pending);
            let due = pending
                .get(&user_id)
                .is_some_and(|job| job.deadline <= Instant::now() || self.flush.is_cancelled());
            if due {
                match pending.remove(&user_id) {
                    Some(job) => break job,
                    None => return,
                }
            }
        };

        self.run_batch(job.snapshot).await;
    }

    fn user_lock(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(lock(&self.user_locks).entry(user_id.to_string()).or_default())
    }

    /// Drops the user's lock entry once no other run holds a handle to it.
    fn release_user_lock(&self, user_id: &str, user_lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = lock(&self.user_locks);
        drop(user_lock);
        let idle = locks
            .get(user_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1);
        if idle {
            locks.remove(user_id);
        }
    }

    async fn run_batch(self: Arc<Self>, snapshot: ConversationSnapshot) {
        let user_lock = self.user_lock(&snapshot.user_id);
        let guard = user_lock.lock().await;
        let snapshot = Arc::new(snapshot);

        let handles: Vec<_> = self
            .kinds
            .iter()
            .map(|&kind| {
                let extractor = Arc::clone(&self.extractor);
                let snapshot = Arc::clone(&snapshot);
                let handle = self
                    .tracker
                    .spawn(async move { extractor.extract(kind, &snapshot).await });
                (kind, handle)
            })
            .collect();

        for (kind, handle) in handles {
            match handle.await {
                Ok(Ok(report)) => debug!(
                    user_id = %snapshot.user_id,
                    kind = %kind,
                    created = report.created,
                    updated = report.updated,
                    unchanged = report.unchanged,
                    rejected = report.rejected,
                    "extraction finished"
                ),
                Ok(Err(e)) => {
                    counter!("moana_memory_extraction_failures_total", "kind" => kind.as_str())
                        .increment(1);
                    if e.is_memory_error() {
                        warn!(user_id = %snapshot.user_id, kind = %kind, error = %e, "extraction failed");
                    } else {
                        error!(user_id = %snapshot.user_id, kind = %kind, error = %e, "extraction failed unexpectedly");
                    }
                }
                Err(e) => {
                    counter!("moana_memory_extraction_failures_total", "kind" => kind.as_str())
                        .increment(1);
                    warn!(user_id = %snapshot.user_id, kind = %kind, error = %e, "extraction task aborted");
                }
            }
        }

        drop(guard);
        self.release_user_lock(&snapshot.user_id, user_lock);
    }
}
