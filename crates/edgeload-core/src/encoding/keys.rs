//! Key encoding for ordered storage.
//!
//! Every posting-list key starts with its attribute so that all keys of one
//! attribute are contiguous in the store:
//!
//! ```text
//! [attr_len: u16 BE][attr bytes][kind: u8][suffix]
//! ```
//!
//! - `0x00` - Data keys: suffix is the entity UID (u64 BE)
//! - `0x02` - Index keys: suffix is the term length (u32 BE) then the term
//! - `0x04` - Reverse keys: suffix is the target UID (u64 BE)
//! - `0x08` - Count keys: suffix is the count (u32 BE)
//! - `0x09` - Reverse count keys: suffix is the count (u32 BE)
//!
//! All numeric suffixes are big-endian so byte order equals numeric order.
//! No posting-list key is a proper prefix of another; the staged layout
//! below depends on it.
//!
//! # Staged Keys
//!
//! The staged builder stores one row per posting under
//! `[posting-list key][uid: u64 BE]`, so that a scan yields the postings of
//! each list in ascending UID order. [`split_staged_key`] recovers both
//! halves.

use crate::types::Uid;
use crate::CoreError;

/// Kind byte of data keys.
pub const KIND_DATA: u8 = 0x00;
/// Kind byte of index keys.
pub const KIND_INDEX: u8 = 0x02;
/// Kind byte of reverse keys.
pub const KIND_REVERSE: u8 = 0x04;
/// Kind byte of forward count keys.
pub const KIND_COUNT: u8 = 0x08;
/// Kind byte of reverse count keys.
pub const KIND_COUNT_REVERSE: u8 = 0x09;

/// Length of the UID suffix of a staged key.
pub const UID_SUFFIX_LEN: usize = 8;

/// The kind of a posting-list key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// Outgoing edges and values of an entity.
    Data,
    /// Entities holding an index term.
    Index,
    /// Incoming edges of an entity.
    Reverse,
    /// Entities with a given number of values.
    Count {
        /// True for counts over reverse edges.
        reverse: bool,
    },
}

impl KeyKind {
    /// The kind byte used in the key layout.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Data => KIND_DATA,
            Self::Index => KIND_INDEX,
            Self::Reverse => KIND_REVERSE,
            Self::Count { reverse: false } => KIND_COUNT,
            Self::Count { reverse: true } => KIND_COUNT_REVERSE,
        }
    }
}

fn prefix(attr: &str, kind: KeyKind, suffix_len: usize) -> Result<Vec<u8>, CoreError> {
    let attr_len = u16::try_from(attr.len()).map_err(|_| {
        CoreError::InvalidKey(format!("attribute name of {} bytes is too long", attr.len()))
    })?;
    let mut key = Vec::with_capacity(2 + attr.len() + 1 + suffix_len);
    key.extend_from_slice(&attr_len.to_be_bytes());
    key.extend_from_slice(attr.as_bytes());
    key.push(kind.as_u8());
    Ok(key)
}

/// Encode a data key for `uid`'s values of `attr`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidKey`] if `attr` is longer than `u16::MAX` bytes.
pub fn data_key(attr: &str, uid: Uid) -> Result<Vec<u8>, CoreError> {
    let mut key = prefix(attr, KeyKind::Data, 8)?;
    key.extend_from_slice(&uid.to_be_bytes());
    Ok(key)
}

/// Encode an index key for `term` of `attr`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidKey`] if `attr` is longer than `u16::MAX` bytes
/// or `term` longer than `u32::MAX` bytes.
pub fn index_key(attr: &str, term: &[u8]) -> Result<Vec<u8>, CoreError> {
    let term_len = u32::try_from(term.len()).map_err(|_| {
        CoreError::InvalidKey(format!("index term of {} bytes is too long", term.len()))
    })?;
    let mut key = prefix(attr, KeyKind::Index, 4 + term.len())?;
    key.extend_from_slice(&term_len.to_be_bytes());
    key.extend_from_slice(term);
    Ok(key)
}

/// Encode a reverse key for edges of `attr` pointing at `uid`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidKey`] if `attr` is longer than `u16::MAX` bytes.
pub fn reverse_key(attr: &str, uid: Uid) -> Result<Vec<u8>, CoreError> {
    let mut key = prefix(attr, KeyKind::Reverse, 8)?;
    key.extend_from_slice(&uid.to_be_bytes());
    Ok(key)
}

/// Encode a count index key.
///
/// # Errors
///
/// Returns [`CoreError::InvalidKey`] if `attr` is longer than `u16::MAX` bytes.
pub fn count_key(attr: &str, count: u32, reverse: bool) -> Result<Vec<u8>, CoreError> {
    let mut key = prefix(attr, KeyKind::Count { reverse }, 4)?;
    key.extend_from_slice(&count.to_be_bytes());
    Ok(key)
}

/// Decomposed view of a posting-list key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    /// Attribute name.
    pub attr: String,
    /// Key kind.
    pub kind: KeyKind,
    /// Entity of a data or reverse key.
    pub uid: Option<Uid>,
    /// Term of an index key.
    pub term: Option<Vec<u8>>,
    /// Count of a count key.
    pub count: Option<u32>,
}

impl ParsedKey {
    /// Parse an encoded posting-list key.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidKey`] if the key is truncated, has an
    /// unknown kind byte or a suffix of the wrong size.
    pub fn parse(key: &[u8]) -> Result<Self, CoreError> {
        let invalid =
            |why: &str| CoreError::InvalidKey(format!("{why} (key of {} bytes)", key.len()));

        let len_bytes: [u8; 2] = key
            .get(..2)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| invalid("missing attribute length"))?;
        let attr_len = usize::from(u16::from_be_bytes(len_bytes));
        let attr = key.get(2..2 + attr_len).ok_or_else(|| invalid("truncated attribute"))?;
        let attr = std::str::from_utf8(attr)
            .map_err(|_| invalid("attribute is not UTF-8"))?
            .to_owned();
        let kind_byte = *key.get(2 + attr_len).ok_or_else(|| invalid("missing kind byte"))?;
        let suffix = &key[2 + attr_len + 1..];

        let uid_suffix = || -> Result<Uid, CoreError> {
            let bytes: [u8; 8] =
                suffix.try_into().map_err(|_| invalid("uid suffix is not 8 bytes"))?;
            Ok(Uid::from_be_bytes(bytes))
        };
        let count_suffix = || -> Result<u32, CoreError> {
            let bytes: [u8; 4] =
                suffix.try_into().map_err(|_| invalid("count suffix is not 4 bytes"))?;
            Ok(u32::from_be_bytes(bytes))
        };

        let mut parsed = Self { attr, kind: KeyKind::Data, uid: None, term: None, count: None };
        match kind_byte {
            KIND_DATA => parsed.uid = Some(uid_suffix()?),
            KIND_INDEX => {
                parsed.kind = KeyKind::Index;
                let (len, term) = suffix
                    .split_first_chunk::<4>()
                    .ok_or_else(|| invalid("missing term length"))?;
                if usize::try_from(u32::from_be_bytes(*len)).ok() != Some(term.len()) {
                    return Err(invalid("term length does not match"));
                }
                parsed.term = Some(term.to_vec());
            }
            KIND_REVERSE => {
                parsed.kind = KeyKind::Reverse;
                parsed.uid = Some(uid_suffix()?);
            }
            KIND_COUNT | KIND_COUNT_REVERSE => {
                parsed.kind = KeyKind::Count { reverse: kind_byte == KIND_COUNT_REVERSE };
                parsed.count = Some(count_suffix()?);
            }
            other => return Err(invalid(&format!("unknown kind byte {other:#04x}"))),
        }
        Ok(parsed)
    }

    /// Returns true for data keys.
    #[must_use]
    pub const fn is_data(&self) -> bool {
        matches!(self.kind, KeyKind::Data)
    }

    /// Returns true for reverse keys.
    #[must_use]
    pub const fn is_reverse(&self) -> bool {
        matches!(self.kind, KeyKind::Reverse)
    }

    /// Returns true for index keys.
    #[must_use]
    pub const fn is_index(&self) -> bool {
        matches!(self.kind, KeyKind::Index)
    }

    /// Returns true for count keys of either direction.
    #[must_use]
    pub const fn is_count(&self) -> bool {
        matches!(self.kind, KeyKind::Count { .. })
    }
}

/// Append the staged key for `uid` under `pl_key` to `buf`.
pub fn staged_key_into(pl_key: &[u8], uid: Uid, buf: &mut Vec<u8>) {
    buf.reserve(pl_key.len() + UID_SUFFIX_LEN);
    buf.extend_from_slice(pl_key);
    buf.extend_from_slice(&uid.to_be_bytes());
}

/// Split a staged key into its posting-list key and UID.
///
/// # Errors
///
/// Returns [`CoreError::Invariant`] if the key is not longer than the UID
/// suffix.
pub fn split_staged_key(key: &[u8]) -> Result<(&[u8], Uid), CoreError> {
    if key.len() <= UID_SUFFIX_LEN {
        return Err(CoreError::invariant(format!("unexpected staged key size {}", key.len())));
    }
    let (pl_key, suffix) = key.split_at(key.len() - UID_SUFFIX_LEN);
    let mut bytes = [0u8; UID_SUFFIX_LEN];
    bytes.copy_from_slice(suffix);
    Ok((pl_key, Uid::from_be_bytes(bytes)))
}
