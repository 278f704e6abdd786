//! Core data types for posting-list construction.
//!
//! This module defines the identifiers, map-phase records and postings that
//! flow through the bulk loader.

mod entry;
mod posting;
mod uid;

pub use entry::MapEntry;
pub use posting::{Posting, PostingKind, PostingList, PostingListValue, ValueType};
pub use uid::Uid;
