//! Core storage engine traits.
//!
//! - [`StorageEngine`] - The main entry point for storage operations
//! - [`Transaction`] - Tagged key-value reads and writes
//! - [`Cursor`] - Ordered forward iteration

use std::sync::Arc;

use super::StorageError;

/// A stored value: a one-byte metadata tag and the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredValue {
    /// Caller-defined tag.
    pub meta: u8,
    /// Payload bytes.
    pub value: Vec<u8>,
}

/// An item yielded by a cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvItem {
    /// Logical key, without any backend prefix.
    pub key: Vec<u8>,
    /// Caller-defined tag.
    pub meta: u8,
    /// Payload bytes.
    pub value: Vec<u8>,
}

/// A storage engine that provides transactional key-value operations.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait StorageEngine: Send + Sync {
    /// The transaction type for this engine.
    type Transaction<'a>: Transaction
    where
        Self: 'a;

    /// Begin a read-only transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transaction`] if the transaction cannot be started.
    fn begin_read(&self) -> Result<Self::Transaction<'_>, StorageError>;

    /// Begin a read-write transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transaction`] if the transaction cannot be started.
    fn begin_write(&self) -> Result<Self::Transaction<'_>, StorageError>;

}

/// A transaction over logical tables of tagged values.
///
/// Write transactions must be explicitly committed; dropping without
/// committing rolls back.
pub trait Transaction {
    /// The cursor type for iteration.
    type Cursor<'a>: Cursor
    where
        Self: 'a;

    /// Get a value by key from a table.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the stored value is corrupt.
    fn get(&self, table: &str, key: &[u8]) -> Result<Option<StoredValue>, StorageError>;

    /// Put a tagged value into a table, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails or if this is a read-only transaction.
    fn put(&mut self, table: &str, key: &[u8], meta: u8, value: &[u8])
        -> Result<(), StorageError>;

    /// Create a cursor over a table. The cursor is unpositioned until
    /// [`Cursor::seek`] or [`Cursor::seek_first`] is called.
    ///
    /// # Errors
    ///
    /// Returns an error if the cursor cannot be created.
    fn cursor(&self, table: &str) -> Result<Self::Cursor<'_>, StorageError>;

    /// Commit the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transaction`] if the commit fails.
    fn commit(self) -> Result<(), StorageError>;

    /// Rollback the transaction, discarding all changes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Transaction`] if the rollback fails.
    fn rollback(self) -> Result<(), StorageError>;

    /// Check if this is a read-only transaction.
    fn is_read_only(&self) -> bool;
}

/// A forward cursor over a table in ascending key order.
///
/// ```ignore
/// let mut cursor = tx.cursor("staged")?;
/// cursor.seek_first()?;
/// while cursor.valid() {
///     let item = cursor.current().expect("valid cursor");
///     // ...
///     cursor.next()?;
/// }
/// ```
pub trait Cursor {
    /// Position at the first key greater than or equal to `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    fn seek(&mut self, key: &[u8]) -> Result<(), StorageError>;

    /// Position at the first key of the table.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    fn seek_first(&mut self) -> Result<(), StorageError>;

    /// Returns true while the cursor is positioned on an item.
    fn valid(&self) -> bool;

    /// The item under the cursor, if positioned.
    fn current(&self) -> Option<&KvItem>;

    /// Advance to the next item. Past the last item the cursor becomes
    /// invalid.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    fn next(&mut self) -> Result<(), StorageError>;
}

/// Implement `StorageEngine` for `Arc<E>` to allow shared ownership of engines.
impl<E: StorageEngine> StorageEngine for Arc<E> {
    type Transaction<'a>
        = E::Transaction<'a>
    where
        Self: 'a;

    fn begin_read(&self) -> Result<Self::Transaction<'_>, StorageError> {
        (**self).begin_read()
    }

    fn begin_write(&self) -> Result<Self::Transaction<'_>, StorageError> {
        (**self).begin_write()
    }
}
