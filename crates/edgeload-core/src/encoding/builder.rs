//! Assembly of one posting list from its entries.

use super::traits::{Decoder, Encoder};
use super::{uidpack, META_FULL, META_UID_ONLY};
use crate::types::{MapEntry, Posting, PostingList, PostingListValue, Uid};
use crate::CoreError;

/// An encoded posting list ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPostingList {
    /// [`META_FULL`] or [`META_UID_ONLY`].
    pub meta: u8,
    /// The encoded value.
    pub value: Vec<u8>,
    /// Number of distinct UIDs in the list.
    pub uid_count: usize,
}

/// Collects the UIDs and value-bearing postings of one key and encodes them.
///
/// The builder is reusable: [`finish`](Self::finish) leaves it empty with
/// its UID allocation intact.
#[derive(Debug, Default)]
pub struct PostingListBuilder {
    uids: Vec<u64>,
    postings: Vec<Posting>,
}

impl PostingListBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bare reference.
    pub fn add_uid(&mut self, uid: Uid) {
        self.uids.push(uid.as_u64());
    }

    /// Add a posting. References contribute only their UID.
    pub fn add_posting(&mut self, posting: Posting) {
        self.uids.push(posting.uid.as_u64());
        if posting.is_value_bearing() {
            self.postings.push(posting);
        }
    }

    /// Add a map entry, taking its posting.
    pub fn add_entry(&mut self, entry: &mut MapEntry) {
        match entry.posting.take() {
            Some(posting) => self.add_posting(posting),
            None => self.add_uid(entry.uid),
        }
    }

    /// Returns true if nothing has been added since the last finish.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.uids.is_empty()
    }

    /// Number of UIDs added so far, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.uids.len()
    }

    /// Encode the collected list and reset the builder.
    ///
    /// `acquire` is called once with the exact encoded length and returns
    /// the buffer to encode into; it is cleared before use, so a recycled
    /// buffer with enough capacity avoids an allocation.
    ///
    /// UIDs are sorted and de-duplicated and postings are ordered by UID, so
    /// the result does not depend on the order entries were added in.
    ///
    /// # Errors
    ///
    /// Returns an error if a posting fails validation.
    pub fn finish<F>(&mut self, acquire: F) -> Result<EncodedPostingList, CoreError>
    where
        F: FnOnce(usize) -> Vec<u8>,
    {
        self.uids.sort_unstable();
        self.uids.dedup();
        let uid_count = self.uids.len();

        let result = if self.postings.is_empty() {
            let mut value = acquire(uidpack::packed_len(&self.uids));
            value.clear();
            uidpack::pack(&self.uids, &mut value);
            self.uids.clear();
            EncodedPostingList { meta: META_UID_ONLY, value, uid_count }
        } else {
            let mut postings = std::mem::take(&mut self.postings);
            postings.sort_by_key(|p| p.uid);
            let mut uids = Vec::with_capacity(uidpack::packed_len(&self.uids));
            uidpack::pack(&self.uids, &mut uids);
            let list = PostingList { postings, uids };

            let mut value = acquire(list.encoded_len());
            value.clear();
            let encoded = list.encode_to(&mut value);
            self.uids.clear();
            encoded?;
            EncodedPostingList { meta: META_FULL, value, uid_count }
        };
        Ok(result)
    }
}

/// Decode a stored posting-list value given its metadata tag.
///
/// # Errors
///
/// Returns an error on an unknown tag or malformed value.
pub fn decode_posting_list(meta: u8, value: &[u8]) -> Result<PostingListValue, CoreError> {
    match meta {
        META_UID_ONLY => Ok(PostingListValue::UidOnly(uidpack::unpack(value)?)),
        META_FULL => {
            let list = PostingList::decode(value)?;
            let uids = uidpack::unpack(&list.uids)?;
            Ok(PostingListValue::Full { postings: list.postings, uids })
        }
        other => Err(CoreError::Encoding(format!("unknown posting list tag {other:#04x}"))),
    }
}
