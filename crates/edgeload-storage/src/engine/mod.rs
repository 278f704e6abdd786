//! Storage engine traits and abstractions.
//!
//! - [`StorageEngine`] - Main entry point for creating transactions
//! - [`Transaction`] - Tagged get/put and commit
//! - [`Cursor`] - Ordered iteration over stored items
//!
//! All operations return [`StorageResult<T>`].

mod error;
mod traits;

pub use error::{StorageError, StorageResult};
pub use traits::{Cursor, KvItem, StorageEngine, StoredValue, Transaction};
