//! `edgeload` Storage
//!
//! This crate provides the ordered key-value abstraction the bulk loader
//! writes posting lists into, a redb backend, and the asynchronous batch
//! write path.
//!
//! # Overview
//!
//! Every stored value carries a one-byte metadata tag next to its payload.
//! The loader uses it to mark posting lists as UID-only or full, and count
//! index entries as present or empty.
//!
//! # Core Traits
//!
//! - [`StorageEngine`] - Creates transactions
//! - [`Transaction`] - Tagged get/put, commit and rollback
//! - [`Cursor`] - Forward iteration in key order
//! - [`BatchWrite`] - Multi-key writes with a completion callback
//!
//! # Example
//!
//! ```ignore
//! use edgeload_storage::backends::RedbEngine;
//! use edgeload_storage::{Cursor, StorageEngine, Transaction};
//!
//! let engine = RedbEngine::in_memory()?;
//!
//! let mut tx = engine.begin_write()?;
//! tx.put("postings", b"k1", 1, b"packed")?;
//! tx.commit()?;
//!
//! let tx = engine.begin_read()?;
//! let mut cursor = tx.cursor("postings")?;
//! cursor.seek_first()?;
//! while let Some(item) = cursor.current() {
//!     println!("{:?} meta={}", item.key, item.meta);
//!     cursor.next()?;
//! }
//! ```
//!
//! # Modules
//!
//! - [`engine`] - Storage engine traits and errors
//! - [`backends`] - Concrete storage backends
//! - [`write`] - Asynchronous batch writes

#![deny(clippy::unwrap_used)]

pub mod backends;
pub mod engine;
pub mod write;

pub use engine::{
    Cursor, KvItem, StorageEngine, StorageError, StorageResult, StoredValue, Transaction,
};
pub use write::{AsyncWriter, BatchWrite, WriteCallback, WriteCompletion, WriteRequest};
