//! Count index accumulation.
//!
//! While posting lists of one attribute are assembled, the UID of every data
//! or reverse list is recorded under the number of UIDs the list holds. When
//! the attribute is complete, one count list is written for every count from
//! zero to the largest seen, so counts with no UIDs still get an empty entry.

use std::collections::BTreeMap;

use edgeload_core::encoding::keys::count_key;
use edgeload_core::encoding::uidpack::pack;
use edgeload_core::encoding::{META_FULL, META_UID_ONLY};
use edgeload_core::CoreError;
use edgeload_storage::KvItem;
use tracing::debug;

use crate::error::Result;

/// Destination for assembled keys.
pub trait IndexSink {
    /// Write one value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be stored.
    fn put(&mut self, key: &[u8], meta: u8, value: &[u8]) -> Result<()>;
}

impl IndexSink for Vec<KvItem> {
    fn put(&mut self, key: &[u8], meta: u8, value: &[u8]) -> Result<()> {
        self.push(KvItem { key: key.to_vec(), meta, value: value.to_vec() });
        Ok(())
    }
}

/// UIDs grouped by posting-list size, per direction.
#[derive(Debug, Default)]
pub struct CountIndex {
    forward: BTreeMap<u32, Vec<u64>>,
    reverse: BTreeMap<u32, Vec<u64>>,
}

impl CountIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the list for `uid` holds `count` UIDs.
    ///
    /// # Errors
    ///
    /// Returns an invariant error if `count` does not fit in a count key.
    pub fn record(&mut self, count: usize, uid: u64, reverse: bool) -> Result<()> {
        let count = u32::try_from(count)
            .map_err(|_| CoreError::invariant(format!("posting list of {count} uids")))?;
        let map = if reverse { &mut self.reverse } else { &mut self.forward };
        map.entry(count).or_default().push(uid);
        Ok(())
    }

    /// Returns true if nothing has been recorded since the last flush.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.reverse.is_empty()
    }

    /// Write the count lists for `attr` to `sink` and clear the index.
    ///
    /// Returns the number of keys written.
    ///
    /// # Errors
    ///
    /// Returns the first key-encoding or sink error.
    pub fn flush(&mut self, attr: &str, sink: &mut dyn IndexSink) -> Result<usize> {
        let mut written = 0;
        for (reverse, map) in [(false, &mut self.forward), (true, &mut self.reverse)] {
            written += write_dense(attr, reverse, map, sink)?;
            map.clear();
        }
        Ok(written)
    }
}

fn write_dense(
    attr: &str,
    reverse: bool,
    map: &mut BTreeMap<u32, Vec<u64>>,
    sink: &mut dyn IndexSink,
) -> Result<usize> {
    let Some(&max) = map.keys().next_back() else {
        return Ok(0);
    };
    let mut value = Vec::new();
    for count in 0..=max {
        let key = count_key(attr, count, reverse)?;
        match map.get_mut(&count) {
            Some(uids) => {
                uids.sort_unstable();
                uids.dedup();
                value.clear();
                pack(uids, &mut value);
                sink.put(&key, META_UID_ONLY, &value)?;
            }
            None => sink.put(&key, META_FULL, &[])?,
        }
    }
    debug!(attr, reverse, max_count = max, keys = u64::from(max) + 1, "wrote count index");
    Ok(max as usize + 1)
}
