//! Binary formats for the bulk loader.
//!
//! # Encoding Traits
//!
//! - [`Encoder`] - Serialize types to bytes, with an exact length hint so
//!   callers can size pooled buffers up front
//! - [`Decoder`] - Deserialize types from bytes
//!
//! # Formats
//!
//! - [`varint`] - LEB128 unsigned varints, used for frame headers and lengths
//! - [`uidpack`] - Block delta bit-packing of ascending UID sequences
//! - [`Posting`](crate::types::Posting), [`MapEntry`](crate::types::MapEntry)
//!   and [`PostingList`](crate::types::PostingList) codecs
//!
//! # Key Encoding
//!
//! The [`keys`] module lays out posting-list keys so that all keys of one
//! attribute are contiguous and UIDs sort numerically.
//!
//! # Building Posting Lists
//!
//! [`PostingListBuilder`] collects the entries of one key and chooses
//! between the UID-only and full encodings.

mod builder;
pub mod keys;
mod posting;
mod traits;
pub mod uidpack;
pub mod varint;


pub use builder::{decode_posting_list, EncodedPostingList, PostingListBuilder};
pub use traits::{Decoder, Encoder};

/// Metadata tag of a full posting list value.
pub const META_FULL: u8 = 0x00;

/// Metadata tag of a UID-only posting list value.
pub const META_UID_ONLY: u8 = 0x01;
