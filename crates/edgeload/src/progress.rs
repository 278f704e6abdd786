//! Pipeline counters and periodic progress reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

/// Shared counters updated by every pipeline stage.
#[derive(Debug)]
pub struct Progress {
    started: Instant,
    map_entries: AtomicU64,
    reduce_keys: AtomicU64,
    reduce_edges: AtomicU64,
    queued_jobs: AtomicU64,
    batches_written: AtomicU64,
    pending_writes: AtomicU64,
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress {
    /// Create zeroed counters; elapsed time counts from now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            map_entries: AtomicU64::new(0),
            reduce_keys: AtomicU64::new(0),
            reduce_edges: AtomicU64::new(0),
            queued_jobs: AtomicU64::new(0),
            batches_written: AtomicU64::new(0),
            pending_writes: AtomicU64::new(0),
        }
    }

    /// Count decoded map entries.
    pub fn add_map_entries(&self, n: u64) {
        self.map_entries.fetch_add(n, Ordering::Relaxed);
    }

    /// Count reduced posting lists and the entries folded into them.
    pub fn add_reduced(&self, keys: u64, edges: u64) {
        self.reduce_keys.fetch_add(keys, Ordering::Relaxed);
        self.reduce_edges.fetch_add(edges, Ordering::Relaxed);
    }

    /// Count a batch handed to the reducers.
    pub fn job_queued(&self) {
        self.queued_jobs.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark a batch write as issued.
    pub fn write_started(&self) {
        self.pending_writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark a batch write as acknowledged.
    pub fn write_finished(&self) {
        self.pending_writes.fetch_sub(1, Ordering::Relaxed);
        self.batches_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        let elapsed = self.started.elapsed().as_secs_f64();
        let reduce_edges = self.reduce_edges.load(Ordering::Relaxed);
        ProgressSnapshot {
            elapsed_secs: elapsed,
            map_entries: self.map_entries.load(Ordering::Relaxed),
            reduce_keys: self.reduce_keys.load(Ordering::Relaxed),
            reduce_edges,
            queued_jobs: self.queued_jobs.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            pending_writes: self.pending_writes.load(Ordering::Relaxed),
            edges_per_sec: if elapsed > 0.0 { reduce_edges as f64 / elapsed } else { 0.0 },
        }
    }
}

/// Point-in-time copy of [`Progress`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    /// Seconds since the counters were created.
    pub elapsed_secs: f64,
    /// Entries decoded from shard files.
    pub map_entries: u64,
    /// Posting lists produced.
    pub reduce_keys: u64,
    /// Entries folded into posting lists.
    pub reduce_edges: u64,
    /// Batches handed to the reducers.
    pub queued_jobs: u64,
    /// Batch writes acknowledged by the store.
    pub batches_written: u64,
    /// Batch writes outstanding at the store.
    pub pending_writes: u64,
    /// Reduce throughput.
    pub edges_per_sec: f64,
}

/// Background task logging a [`ProgressSnapshot`] at a fixed interval.
#[derive(Debug)]
pub struct ProgressReporter {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    /// Start reporting on the current runtime. Returns `None` for a zero
    /// interval.
    #[must_use]
    pub fn spawn(progress: Arc<Progress>, interval: Duration) -> Option<Self> {
        if interval.is_zero() {
            return None;
        }
        let (stop, mut stopped) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let s = progress.snapshot();
                        info!(
                            elapsed_secs = s.elapsed_secs as u64,
                            map_entries = s.map_entries,
                            reduce_keys = s.reduce_keys,
                            reduce_edges = s.reduce_edges,
                            queued_jobs = s.queued_jobs,
                            pending_writes = s.pending_writes,
                            edges_per_sec = s.edges_per_sec as u64,
                            "progress"
                        );
                    }
                    _ = &mut stopped => break,
                }
            }
        });
        Some(Self { stop, handle })
    }

    /// Stop reporting and wait for the task to exit.
    pub async fn stop(self) {
        let _ = self.stop.send(());
        let _ = self.handle.await;
    }
}
