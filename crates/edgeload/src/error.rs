//! Error types for the bulk loader.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use edgeload_core::CoreError;
use edgeload_storage::StorageError;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error};

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoadError>;

/// Errors that abort a load.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Encoding, decoding or key layout failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The store reported a failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// An I/O error outside shard reading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A shard file could not be read.
    #[error("shard {}: {source}", path.display())]
    ShardIo {
        /// The shard file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A shard record could not be decoded.
    #[error("shard {}: record {record}: {source}", path.display())]
    ShardRecord {
        /// The shard file.
        path: PathBuf,
        /// Zero-based index of the bad record.
        record: u64,
        /// The underlying error.
        #[source]
        source: CoreError,
    },

    /// The schema could not be loaded.
    #[error("schema error: {0}")]
    Schema(String),

    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A pipeline task panicked or was cancelled.
    #[error("task failed: {0}")]
    Task(String),

    /// A pipeline channel closed early because another stage stopped.
    #[error("{0} channel closed")]
    ChannelClosed(&'static str),

    /// A stage stopped because an earlier error was recorded.
    #[error("aborted after an earlier failure")]
    Aborted,
}

impl LoadError {
    /// Returns true for errors that only occur as a consequence of another
    /// stage failing first.
    #[must_use]
    pub const fn is_secondary(&self) -> bool {
        matches!(self, Self::ChannelClosed(_) | Self::Aborted)
    }
}

/// Holds the first fatal error of a pipeline run.
///
/// Stages poll [`is_set`](Self::is_set) to stop early. A secondary error
/// (see [`LoadError::is_secondary`]) recorded first is replaced by the next
/// root-cause error, so the error reported is the one that started the
/// shutdown.
#[derive(Debug, Default)]
pub struct FatalSlot {
    failed: AtomicBool,
    first: Mutex<Option<LoadError>>,
}

impl FatalSlot {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `err`.
    pub fn set(&self, err: LoadError) {
        let mut first = self.first.lock();
        let replace = match first.as_ref() {
            None => true,
            Some(existing) => existing.is_secondary() && !err.is_secondary(),
        };
        if replace {
            error!(error = %err, "fatal error, aborting load");
            *first = Some(err);
        } else {
            debug!(error = %err, "suppressed error after fatal failure");
        }
        self.failed.store(true, Ordering::Release);
    }

    /// Returns true once any error has been recorded.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Return [`LoadError::Aborted`] if an error has been recorded.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Aborted`] once the slot is set.
    pub fn check(&self) -> Result<()> {
        if self.is_set() {
            Err(LoadError::Aborted)
        } else {
            Ok(())
        }
    }

    /// Take the recorded error.
    pub fn take(&self) -> Option<LoadError> {
        self.first.lock().take()
    }
}
