//! K-way merge of sorted entry streams.
//!
//! A manual binary min-heap over the current head of each source, ordered
//! by a key comparator and then by source index. Ties between equal keys
//! therefore resolve deterministically: the lower source index comes first.

use std::cmp::Ordering;

use edgeload_core::MapEntry;
use tokio::sync::mpsc;

/// A key comparator usable as a plain function pointer.
pub type KeyCmp = fn(&[u8], &[u8]) -> Ordering;

/// Byte-lexicographic key order.
#[inline]
#[must_use]
pub fn bytewise(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

struct HeapEntry {
    entry: MapEntry,
    source: usize,
}

/// Merges N sorted [`MapEntry`] sources into one sorted sequence.
pub struct KWayMerge<S, F>
where
    S: Iterator<Item = MapEntry>,
    F: Fn(&[u8], &[u8]) -> Ordering,
{
    heap: Vec<HeapEntry>,
    sources: Vec<S>,
    cmp: F,
}

/// Merge `sources` in byte-lexicographic key order.
pub fn merge_by_key<S>(sources: Vec<S>) -> KWayMerge<S, KeyCmp>
where
    S: Iterator<Item = MapEntry>,
{
    KWayMerge::new(sources, bytewise as KeyCmp)
}

impl<S, F> KWayMerge<S, F>
where
    S: Iterator<Item = MapEntry>,
    F: Fn(&[u8], &[u8]) -> Ordering,
{
    /// Create a merge, pulling the first entry of every source.
    pub fn new(mut sources: Vec<S>, cmp: F) -> Self {
        let mut heap = Vec::with_capacity(sources.len());
        for (source, s) in sources.iter_mut().enumerate() {
            if let Some(entry) = s.next() {
                heap.push(HeapEntry { entry, source });
            }
        }

        let mut me = Self { heap, sources, cmp };
        if me.heap.len() > 1 {
            let last_internal = (me.heap.len() / 2).saturating_sub(1);
            for i in (0..=last_internal).rev() {
                me.sift_down(i);
            }
        }
        me
    }

    #[inline]
    fn less(&self, i: usize, j: usize) -> bool {
        let (a, b) = (&self.heap[i], &self.heap[j]);
        match (self.cmp)(&a.entry.key, &b.entry.key) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => a.source < b.source,
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let smallest = if right < len && self.less(right, left) { right } else { left };
            if !self.less(smallest, pos) {
                break;
            }
            self.heap.swap(pos, smallest);
            pos = smallest;
        }
    }
}

impl<S, F> Iterator for KWayMerge<S, F>
where
    S: Iterator<Item = MapEntry>,
    F: Fn(&[u8], &[u8]) -> Ordering,
{
    type Item = MapEntry;

    fn next(&mut self) -> Option<MapEntry> {
        if self.heap.is_empty() {
            return None;
        }
        let source = self.heap[0].source;
        let emitted = match self.sources[source].next() {
            // Replace the root in place and restore the heap.
            Some(next) => std::mem::replace(&mut self.heap[0].entry, next),
            None => {
                let last = self.heap.len() - 1;
                self.heap.swap(0, last);
                let popped = self.heap.pop()?;
                popped.entry
            }
        };
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        Some(emitted)
    }
}

/// Adapts a channel receiver into a blocking entry iterator.
///
/// Must be driven from a blocking thread.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<MapEntry>,
}

impl ChannelSource {
    /// Wrap a receiver.
    #[must_use]
    pub const fn new(rx: mpsc::Receiver<MapEntry>) -> Self {
        Self { rx }
    }
}

impl Iterator for ChannelSource {
    type Item = MapEntry;

    fn next(&mut self) -> Option<MapEntry> {
        self.rx.blocking_recv()
    }
}

#[cfg(test)]
mod tests {
    use edgeload_core::Uid;
    use proptest::prelude::*;

    use super::*;

    fn source(keys: &[&str], tag: u64) -> std::vec::IntoIter<MapEntry> {
        keys.iter()
            .map(|k| MapEntry::reference(k.as_bytes().to_vec(), Uid::new(tag)))
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn merges_three_shards() {
        let merged: Vec<MapEntry> = merge_by_key(vec![
            source(&["a", "c", "e"], 0),
            source(&["b", "c", "f"], 1),
            source(&["c", "d"], 2),
        ])
        .collect();

        let keys: Vec<&[u8]> = merged.iter().map(|e| e.key.as_slice()).collect();
        assert_eq!(keys, vec![&b"a"[..], b"b", b"c", b"c", b"c", b"d", b"e", b"f"]);

        // Equal keys come out in source order.
        let c_sources: Vec<u64> =
            merged.iter().filter(|e| e.key == b"c").map(|e| e.uid.as_u64()).collect();
        assert_eq!(c_sources, vec![0, 1, 2]);
    }

    #[test]
    fn empty_sources() {
        let merged: Vec<MapEntry> =
            merge_by_key(vec![source(&[], 0), source(&["x"], 1), source(&[], 2)]).collect();
        assert_eq!(merged.len(), 1);
        assert_eq!(merge_by_key(Vec::<std::vec::IntoIter<MapEntry>>::new()).count(), 0);
    }

    #[test]
    fn custom_comparator() {
        let reverse = |a: &[u8], b: &[u8]| b.cmp(a);
        let merged: Vec<u8> =
            KWayMerge::new(vec![source(&["c", "a"], 0), source(&["b"], 1)], reverse)
                .map(|e| e.key[0])
                .collect();
        assert_eq!(merged, b"cba".to_vec());
    }

    #[test]
    fn channel_source_ends_when_sender_drops() {
        let (tx, rx) = mpsc::channel(4);
        std::thread::spawn(move || {
            for i in 0..3u64 {
                tx.blocking_send(MapEntry::reference(vec![i as u8], Uid::new(i))).expect("send");
            }
        });
        assert_eq!(ChannelSource::new(rx).count(), 3);
    }

    proptest! {
        /// Output is sorted and is exactly the multiset union of the inputs.
        #[test]
        fn merge_is_sorted_union(
            shards in prop::collection::vec(
                prop::collection::vec(prop::collection::vec(0u8..4, 0..3), 0..20),
                0..6,
            )
        ) {
            let sources: Vec<_> = shards
                .iter()
                .enumerate()
                .map(|(i, keys)| {
                    let mut keys = keys.clone();
                    keys.sort();
                    keys.into_iter()
                        .map(|k| MapEntry::reference(k, Uid::new(i as u64)))
                        .collect::<Vec<_>>()
                        .into_iter()
                })
                .collect();

            let merged: Vec<MapEntry> = merge_by_key(sources).collect();
            prop_assert!(merged.windows(2).all(|w| w[0].key <= w[1].key));

            let mut expected: Vec<(Vec<u8>, u64)> = shards
                .iter()
                .enumerate()
                .flat_map(|(i, keys)| keys.iter().map(move |k| (k.clone(), i as u64)))
                .collect();
            expected.sort();
            let mut got: Vec<(Vec<u8>, u64)> =
                merged.into_iter().map(|e| (e.key, e.uid.as_u64())).collect();
            got.sort();
            prop_assert_eq!(got, expected);
        }
    }
}
