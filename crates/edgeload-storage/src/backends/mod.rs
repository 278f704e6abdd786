//! Storage backend implementations.
//!
//! # Available Backends
//!
//! - [`redb`] - Pure-Rust embedded database with ACID transactions

pub mod redb;

pub use self::redb::{tables, RedbConfig, RedbCursor, RedbEngine, RedbTransaction};
