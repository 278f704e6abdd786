//! `edgeload`
//!
//! Bulk construction of posting lists for a graph key-value store from the
//! sorted shard files of a map phase.
//!
//! # Architecture
//!
//! ```text
//! shard 0 ─▶ decoder ─┐
//! shard 1 ─▶ decoder ─┼─▶ k-way merge ─▶ batcher ─▶ batch channel ─▶ reduce workers
//! shard N ─▶ decoder ─┘   (one named thread)                        │ encode, gate
//!                                                                   ▼
//!                                                        BatchWrite (async, K in flight)
//! ```
//!
//! Each decoder also runs on its own named thread, outside the runtime's
//! blocking pool.
//!
//! Decoded entries, write requests and value buffers come from shared
//! [`Pools`](pool::Pools) and go back only from the write completion
//! callback.
//!
//! A second path, [`StagedBuilder`](staged::StagedBuilder), ingests
//! individual postings into a scratch store ordered by key and UID, then
//! assembles posting lists and gap-filled count indices in one pass.
//!
//! # Failure Policy
//!
//! Every error is fatal. The first one is recorded in a
//! [`FatalSlot`](error::FatalSlot), every stage stops, and the top-level
//! call returns it. Nothing is retried.
//!
//! # Modules
//!
//! - [`config`] - Loader configuration
//! - [`error`] - Error types and the fatal slot
//! - [`shard`] - Shard file reader and writer
//! - [`merge`] - K-way merge of sorted entry streams
//! - [`batch`] - Key-aligned batching
//! - [`reduce`] - Posting-list assembly and bounded async writes
//! - [`loader`] - Pipeline orchestration
//! - [`staged`] - Staged construction with count indices
//! - [`count`] - Count index accumulation
//! - [`schema`] - Attribute metadata
//! - [`pool`] - Object pools
//! - [`progress`] - Counters and periodic reporting

#![deny(clippy::unwrap_used)]

pub mod batch;
pub mod config;
pub mod count;
pub mod error;
pub mod loader;
pub mod merge;
pub mod pool;
pub mod progress;
pub mod reduce;
pub mod schema;
pub mod shard;
pub mod staged;

pub use config::LoaderConfig;
pub use error::{FatalSlot, LoadError, Result};
pub use loader::{BulkLoader, ReduceSummary};
pub use progress::{Progress, ProgressSnapshot};
pub use schema::{AttributeSchema, Schema, SchemaLookup};
pub use staged::{StagedBuilder, StagedSummary, TargetWriter};
