//! Postings and posting lists.

use serde::{Deserialize, Serialize};

use super::Uid;
use crate::error::CoreError;

/// Distinguishes bare references from value-carrying postings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PostingKind {
    /// A reference to another entity. Carries no payload.
    Ref = 0,
    /// A scalar value.
    Value = 1,
    /// A scalar value tagged with a language.
    ValueLang = 2,
}

impl PostingKind {
    /// The on-wire tag for this kind.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for PostingKind {
    type Error = CoreError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(Self::Ref),
            1 => Ok(Self::Value),
            2 => Ok(Self::ValueLang),
            other => Err(CoreError::UnknownPostingKind(other)),
        }
    }
}

/// Type of a posting's value payload.
///
/// The payload bytes are opaque to the loader; the type is carried so that
/// readers can interpret them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ValueType {
    /// Untyped payload.
    #[default]
    Default = 0,
    /// Raw bytes.
    Binary = 1,
    /// 64-bit signed integer, little-endian.
    Int = 2,
    /// 64-bit float, little-endian.
    Float = 3,
    /// Boolean, one byte.
    Bool = 4,
    /// Timestamp.
    DateTime = 5,
    /// Geometry.
    Geo = 6,
    /// UTF-8 string.
    String = 9,
}

impl ValueType {
    /// The on-wire tag for this type.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ValueType {
    type Error = CoreError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(Self::Default),
            1 => Ok(Self::Binary),
            2 => Ok(Self::Int),
            3 => Ok(Self::Float),
            4 => Ok(Self::Bool),
            5 => Ok(Self::DateTime),
            6 => Ok(Self::Geo),
            9 => Ok(Self::String),
            other => Err(CoreError::UnknownValueType(other)),
        }
    }
}

/// A single element of a posting list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// Target entity, or the value's hash-derived identifier for values.
    pub uid: Uid,
    /// Reference, value or language-tagged value.
    pub kind: PostingKind,
    /// Type of `value`. Ignored for references.
    pub value_type: ValueType,
    /// Value payload. Empty for references.
    pub value: Vec<u8>,
    /// Language tag. Present exactly when `kind` is [`PostingKind::ValueLang`].
    pub lang: Option<String>,
}

impl Posting {
    /// A bare reference to `uid`.
    #[must_use]
    pub const fn reference(uid: Uid) -> Self {
        Self {
            uid,
            kind: PostingKind::Ref,
            value_type: ValueType::Default,
            value: Vec::new(),
            lang: None,
        }
    }

    /// A scalar value.
    #[must_use]
    pub const fn value(uid: Uid, value_type: ValueType, value: Vec<u8>) -> Self {
        Self { uid, kind: PostingKind::Value, value_type, value, lang: None }
    }

    /// A language-tagged scalar value.
    #[must_use]
    pub fn value_with_lang(
        uid: Uid,
        value_type: ValueType,
        value: Vec<u8>,
        lang: impl Into<String>,
    ) -> Self {
        Self { uid, kind: PostingKind::ValueLang, value_type, value, lang: Some(lang.into()) }
    }

    /// Returns true if this posting carries a value and must be kept in the
    /// full encoding of its list.
    #[must_use]
    pub const fn is_value_bearing(&self) -> bool {
        !matches!(self.kind, PostingKind::Ref)
    }

    /// Check that the fields agree with the kind.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Invariant`] if a reference carries a payload or
    /// the language tag does not match the kind.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self.kind {
            PostingKind::Ref if !self.value.is_empty() => Err(CoreError::invariant(format!(
                "reference posting {} carries a {}-byte payload",
                self.uid,
                self.value.len()
            ))),
            PostingKind::Ref | PostingKind::Value if self.lang.is_some() => {
                Err(CoreError::invariant(format!(
                    "posting {} has a language tag but kind {:?}",
                    self.uid, self.kind
                )))
            }
            PostingKind::ValueLang if self.lang.is_none() => Err(CoreError::invariant(format!(
                "language posting {} has no language tag",
                self.uid
            ))),
            _ => Ok(()),
        }
    }
}

/// The full encoding of a posting list.
///
/// `postings` holds only value-bearing postings ordered by UID; `uids` is
/// the packed sequence of every UID in the list, values and references
/// alike.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingList {
    /// Value-bearing postings, ascending by UID.
    pub postings: Vec<Posting>,
    /// Block delta bit-packed UIDs (see [`crate::encoding::uidpack`]).
    pub uids: Vec<u8>,
}

/// A decoded posting-list value, as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostingListValue {
    /// Every entry was a bare reference.
    UidOnly(Vec<Uid>),
    /// At least one entry carried a value.
    Full {
        /// Value-bearing postings, ascending by UID.
        postings: Vec<Posting>,
        /// All UIDs of the list.
        uids: Vec<Uid>,
    },
}

impl PostingListValue {
    /// All UIDs of the list regardless of encoding.
    #[must_use]
    pub fn uids(&self) -> &[Uid] {
        match self {
            Self::UidOnly(uids) | Self::Full { uids, .. } => uids,
        }
    }

    /// Value-bearing postings; empty for UID-only lists.
    #[must_use]
    pub fn postings(&self) -> &[Posting] {
        match self {
            Self::UidOnly(_) => &[],
            Self::Full { postings, .. } => postings,
        }
    }
}
