//! Redb storage backend.
//!
//! Logical tables share one physical redb table; keys are prefixed with the
//! table name and values with their metadata tag (see [`tables`]).

mod engine;
pub mod tables;
mod transaction;

pub use engine::{RedbConfig, RedbEngine};
pub use transaction::{RedbCursor, RedbTransaction};
