//! Loader configuration.

use std::time::Duration;

use crate::error::{LoadError, Result};

/// Configuration for a bulk load.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use edgeload::LoaderConfig;
///
/// let config = LoaderConfig::new()
///     .batch_size(50_000)
///     .reduce_workers(4)
///     .max_pending_writes(16)
///     .progress_interval(Duration::ZERO);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Minimum number of entries per reduce batch. A batch only closes
    /// where the key changes, so it may run over.
    /// Default: 100,000.
    pub batch_size: usize,

    /// Number of concurrent reduce workers.
    /// Default: available parallelism.
    pub reduce_workers: usize,

    /// Maximum number of batch writes outstanding at the store.
    /// Default: 8.
    pub max_pending_writes: usize,

    /// Capacity of each decoder-to-merge channel, in entries.
    /// Default: 1,000.
    pub shard_channel_capacity: usize,

    /// Capacity of the merge-to-reducers channel, in batches.
    /// Default: 2.
    pub batch_channel_capacity: usize,

    /// Read buffer size per shard file.
    /// Default: 16 KiB.
    pub read_buffer_size: usize,

    /// Maximum idle entries kept by the entry pool.
    pub entry_pool_capacity: usize,

    /// Maximum idle write requests kept by the request pool.
    pub request_pool_capacity: usize,

    /// Maximum idle value buffers kept by the buffer pool.
    pub buffer_pool_capacity: usize,

    /// Interval between progress log lines. Zero disables reporting.
    /// Default: 5 seconds.
    pub progress_interval: Duration,

    /// Number of puts per target transaction in the staged path.
    /// Default: 10,000.
    pub staged_commit_every: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism().map_or(4, usize::from);
        Self {
            batch_size: 100_000,
            reduce_workers: workers,
            max_pending_writes: 8,
            shard_channel_capacity: 1_000,
            batch_channel_capacity: 2,
            read_buffer_size: 16 * 1024,
            entry_pool_capacity: 400_000,
            request_pool_capacity: 100_000,
            buffer_pool_capacity: 100_000,
            progress_interval: Duration::from_secs(5),
            staged_commit_every: 10_000,
        }
    }
}

impl LoaderConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target batch size.
    #[must_use]
    pub const fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the number of reduce workers.
    #[must_use]
    pub const fn reduce_workers(mut self, workers: usize) -> Self {
        self.reduce_workers = workers;
        self
    }

    /// Set the cap on outstanding batch writes.
    #[must_use]
    pub const fn max_pending_writes(mut self, pending: usize) -> Self {
        self.max_pending_writes = pending;
        self
    }

    /// Set the per-shard channel capacity.
    #[must_use]
    pub const fn shard_channel_capacity(mut self, capacity: usize) -> Self {
        self.shard_channel_capacity = capacity;
        self
    }

    /// Set the batch channel capacity.
    #[must_use]
    pub const fn batch_channel_capacity(mut self, capacity: usize) -> Self {
        self.batch_channel_capacity = capacity;
        self
    }

    /// Set the shard read buffer size.
    #[must_use]
    pub const fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the idle capacity of all three pools.
    #[must_use]
    pub const fn pool_capacity(mut self, entries: usize, requests: usize, buffers: usize) -> Self {
        self.entry_pool_capacity = entries;
        self.request_pool_capacity = requests;
        self.buffer_pool_capacity = buffers;
        self
    }

    /// Set the progress reporting interval.
    #[must_use]
    pub const fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Set the number of puts per staged target transaction.
    #[must_use]
    pub const fn staged_commit_every(mut self, puts: usize) -> Self {
        self.staged_commit_every = puts;
        self
    }

    /// Check that every size is usable.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let nonzero = [
            ("batch_size", self.batch_size),
            ("reduce_workers", self.reduce_workers),
            ("max_pending_writes", self.max_pending_writes),
            ("shard_channel_capacity", self.shard_channel_capacity),
            ("batch_channel_capacity", self.batch_channel_capacity),
            ("read_buffer_size", self.read_buffer_size),
            ("staged_commit_every", self.staged_commit_every),
        ];
        for (name, value) in nonzero {
            if value == 0 {
                return Err(LoadError::Config(format!("{name} must be greater than zero")));
            }
        }
        // The drain at the end acquires every write slot at once.
        if u32::try_from(self.max_pending_writes).is_err() {
            return Err(LoadError::Config("max_pending_writes does not fit in u32".to_owned()));
        }
        Ok(())
    }
}
