//! Storage error types.

use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database could not be opened.
    #[error("failed to open database: {0}")]
    Open(String),

    /// A transaction error occurred.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend reported an internal error.
    #[error("internal storage error: {0}")]
    Internal(String),

    /// A write was attempted on a read-only transaction.
    #[error("transaction is read-only")]
    ReadOnly,

    /// A stored value did not have the expected layout.
    #[error("corrupt stored value: {0}")]
    Corrupt(String),

    /// The operation is not supported.
    #[error("operation not supported: {0}")]
    Unsupported(String),

    /// Some entries of a batch write failed; the batch was not committed.
    #[error("{failed} of {total} entries failed in batch write")]
    EntryFailed {
        /// Number of entries that reported an error.
        failed: usize,
        /// Number of entries in the batch.
        total: usize,
    },
}

impl StorageError {
    /// Wrap a backend error as [`StorageError::Internal`].
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }

    /// Wrap a backend error as [`StorageError::Transaction`].
    pub fn transaction(err: impl std::fmt::Display) -> Self {
        Self::Transaction(err.to_string())
    }
}
