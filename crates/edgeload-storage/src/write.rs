//! Asynchronous multi-key writes with completion callbacks.
//!
//! # Architecture
//!
//! ```text
//! caller                         AsyncWriter                    engine
//!   │ write_batch_async(reqs, cb)    │                             │
//!   ├───────────────────────────────▶│ spawn_blocking              │
//!   │ (returns immediately)          ├────────────────────────────▶│ one write tx,
//!   │                                │                             │ put per request
//!   │                                │◀────────────────────────────┤ commit
//!   │◀─────── cb(WriteCompletion) ───┤                             │
//! ```
//!
//! The callback receives the requests back, so the caller can recycle their
//! buffers only once the store has acknowledged the write. Per-entry
//! failures are recorded on the request and the batch is not committed.

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::engine::{StorageEngine, StorageError, Transaction};

/// One key to write as part of a batch.
#[derive(Debug, Default)]
pub struct WriteRequest {
    /// Target key.
    pub key: Vec<u8>,
    /// Encoded value.
    pub value: Vec<u8>,
    /// Metadata tag stored alongside the value.
    pub meta: u8,
    /// Set by the writer if this entry failed.
    pub error: Option<StorageError>,
}

impl WriteRequest {
    /// Create a request.
    #[must_use]
    pub fn new(key: Vec<u8>, meta: u8, value: Vec<u8>) -> Self {
        Self { key, value, meta, error: None }
    }

    /// Clear the request for reuse, keeping the key allocation.
    ///
    /// The value buffer is left in place; callers that pool value buffers
    /// take it out first.
    pub fn reset(&mut self) {
        self.key.clear();
        self.value.clear();
        self.meta = 0;
        self.error = None;
    }
}

/// Outcome of a batch write, handed to the completion callback.
#[derive(Debug)]
pub struct WriteCompletion {
    /// The requests of the batch, returned to the caller.
    pub requests: Vec<WriteRequest>,
    /// Whole-batch result.
    pub result: Result<(), StorageError>,
}

/// Completion callback of [`BatchWrite::write_batch_async`].
pub type WriteCallback = Box<dyn FnOnce(WriteCompletion) + Send + 'static>;

/// A store that accepts batched writes with asynchronous completion.
pub trait BatchWrite: Send + Sync + 'static {
    /// Start writing `requests` and return immediately.
    ///
    /// `callback` is invoked exactly once, after the batch has been
    /// persisted or has failed.
    fn write_batch_async(&self, requests: Vec<WriteRequest>, callback: WriteCallback);
}

/// [`BatchWrite`] over a [`StorageEngine`], applying each batch in one write
/// transaction on tokio's blocking pool.
pub struct AsyncWriter<E> {
    engine: Arc<E>,
    table: String,
    runtime: Handle,
}

impl<E> fmt::Debug for AsyncWriter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncWriter").field("table", &self.table).finish_non_exhaustive()
    }
}

impl<E: StorageEngine + 'static> AsyncWriter<E> {
    /// Create a writer on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unsupported`] when called outside a runtime.
    pub fn new(engine: Arc<E>, table: impl Into<String>) -> Result<Self, StorageError> {
        let runtime = Handle::try_current()
            .map_err(|e| StorageError::Unsupported(format!("async writer needs a runtime: {e}")))?;
        Ok(Self::with_handle(engine, table, runtime))
    }

    /// Create a writer that spawns onto `runtime`.
    pub fn with_handle(engine: Arc<E>, table: impl Into<String>, runtime: Handle) -> Self {
        Self { engine, table: table.into(), runtime }
    }

    /// The underlying engine.
    #[must_use]
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// The logical table written to.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }
}

fn apply_batch<E: StorageEngine>(
    engine: &E,
    table: &str,
    requests: &mut [WriteRequest],
) -> Result<(), StorageError> {
    let mut tx = engine.begin_write()?;
    let mut failed = 0;
    for req in requests.iter_mut() {
        if let Err(e) = tx.put(table, &req.key, req.meta, &req.value) {
            req.error = Some(e);
            failed += 1;
        }
    }
    if failed > 0 {
        tx.rollback()?;
        return Err(StorageError::EntryFailed { failed, total: requests.len() });
    }
    tx.commit()
}

impl<E: StorageEngine + 'static> BatchWrite for AsyncWriter<E> {
    fn write_batch_async(&self, requests: Vec<WriteRequest>, callback: WriteCallback) {
        let engine = Arc::clone(&self.engine);
        let table = self.table.clone();
        let blocking = self.runtime.spawn_blocking(move || {
            let mut requests = requests;
            let result = apply_batch(engine.as_ref(), &table, &mut requests);
            (requests, result)
        });
        self.runtime.spawn(async move {
            let (requests, result) = match blocking.await {
                Ok(done) => done,
                Err(e) => {
                    (Vec::new(), Err(StorageError::Internal(format!("write task failed: {e}"))))
                }
            };
            match &result {
                Ok(()) => debug!(keys = requests.len(), "batch write committed"),
                Err(e) => warn!(keys = requests.len(), error = %e, "batch write failed"),
            }
            callback(WriteCompletion { requests, result });
        });
    }
}
