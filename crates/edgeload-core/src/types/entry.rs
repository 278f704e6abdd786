//! Map-phase output records.

use super::{Posting, Uid};

/// One edge or value observation produced by the map phase.
///
/// `key` identifies the posting list the entry belongs to. A bare reference
/// carries only `uid`; anything else carries a `posting`, whose UID takes
/// precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapEntry {
    /// Encoded posting-list key.
    pub key: Vec<u8>,
    /// Target of a bare reference.
    pub uid: Uid,
    /// Structured posting, if any.
    pub posting: Option<Posting>,
}

impl MapEntry {
    /// A bare reference entry.
    #[must_use]
    pub fn reference(key: impl Into<Vec<u8>>, uid: Uid) -> Self {
        Self { key: key.into(), uid, posting: None }
    }

    /// An entry carrying a structured posting.
    #[must_use]
    pub fn with_posting(key: impl Into<Vec<u8>>, posting: Posting) -> Self {
        Self { key: key.into(), uid: posting.uid, posting: Some(posting) }
    }

    /// The UID this entry contributes to its posting list.
    #[must_use]
    pub fn target_uid(&self) -> Uid {
        self.posting.as_ref().map_or(self.uid, |p| p.uid)
    }

    /// Returns true if the entry carries a value-bearing posting.
    #[must_use]
    pub fn is_value_bearing(&self) -> bool {
        self.posting.as_ref().is_some_and(Posting::is_value_bearing)
    }

    /// Clear the entry for reuse, keeping the key allocation.
    pub fn reset(&mut self) {
        self.key.clear();
        self.uid = Uid::default();
        self.posting = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueType;

    #[test]
    fn target_uid_prefers_posting() {
        let bare = MapEntry::reference(b"k".to_vec(), Uid::new(4));
        assert_eq!(bare.target_uid(), Uid::new(4));
        assert!(!bare.is_value_bearing());

        let mut valued = MapEntry::with_posting(
            b"k".to_vec(),
            Posting::value(Uid::new(9), ValueType::String, b"x".to_vec()),
        );
        valued.uid = Uid::new(1);
        assert_eq!(valued.target_uid(), Uid::new(9));
        assert!(valued.is_value_bearing());
    }

    #[test]
    fn reference_posting_is_not_value_bearing() {
        let entry = MapEntry::with_posting(b"k".to_vec(), Posting::reference(Uid::new(2)));
        assert!(!entry.is_value_bearing());
    }

    #[test]
    fn reset_keeps_capacity() {
        let mut entry = MapEntry::reference(vec![0u8; 64], Uid::new(1));
        let cap = entry.key.capacity();
        entry.reset();
        assert!(entry.key.is_empty());
        assert_eq!(entry.key.capacity(), cap);
        assert_eq!(entry, MapEntry { key: Vec::new(), ..MapEntry::default() });
    }
}
