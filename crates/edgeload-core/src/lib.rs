//! `edgeload` Core
//!
//! This crate provides the data model and binary formats shared by the
//! posting-list bulk construction pipeline.
//!
//! # Overview
//!
//! - **Identifiers**: [`Uid`] for referencing graph entities
//! - **Map output**: [`MapEntry`], one edge or value observation keyed by its
//!   posting-list key
//! - **Postings**: [`Posting`], [`PostingKind`] and [`ValueType`] for
//!   structured values, [`PostingList`] for the full encoded form
//! - **Encoding**: varints, block delta bit-packing of UID sequences, key
//!   layout and the [`PostingListBuilder`](encoding::PostingListBuilder) that
//!   chooses between the UID-only and full encodings
//!
//! # Example
//!
//! ```
//! use edgeload_core::encoding::{decode_posting_list, PostingListBuilder, META_FULL};
//! use edgeload_core::{Posting, PostingListValue, Uid, ValueType};
//!
//! let mut builder = PostingListBuilder::new();
//! builder.add_uid(Uid::new(1));
//! builder.add_posting(Posting::value(Uid::new(2), ValueType::String, b"x".to_vec()));
//!
//! let encoded = builder.finish(Vec::with_capacity).unwrap();
//! assert_eq!(encoded.meta, META_FULL);
//!
//! match decode_posting_list(encoded.meta, &encoded.value).unwrap() {
//!     PostingListValue::Full { postings, uids } => {
//!         assert_eq!(uids, vec![Uid::new(1), Uid::new(2)]);
//!         assert_eq!(postings.len(), 1);
//!     }
//!     PostingListValue::UidOnly(_) => unreachable!(),
//! }
//! ```
//!
//! # Modules
//!
//! - [`types`] - Core data types
//! - [`encoding`] - Binary codecs, UID packing and key layout
//! - [`error`] - Error types ([`CoreError`])

#![deny(clippy::unwrap_used)]

pub mod encoding;
pub mod error;
pub mod types;

pub use error::CoreError;
pub use types::{MapEntry, Posting, PostingKind, PostingList, PostingListValue, Uid, ValueType};
