//! Key-aligned batching of the merged stream.

use std::iter::Peekable;

use edgeload_core::MapEntry;

/// Splits a key-sorted stream into batches of at least `target` entries.
///
/// A batch closes only where the key changes, so every key's entries land
/// in exactly one batch. A key with more than `target` entries makes its
/// batch run over. The final batch may be short.
pub struct Batcher<I: Iterator<Item = MapEntry>> {
    inner: Peekable<I>,
    target: usize,
}

impl<I: Iterator<Item = MapEntry>> Batcher<I> {
    /// Create a batcher with the given target size.
    pub fn new(inner: I, target: usize) -> Self {
        Self { inner: inner.peekable(), target }
    }
}

impl<I: Iterator<Item = MapEntry>> Iterator for Batcher<I> {
    type Item = Vec<MapEntry>;

    fn next(&mut self) -> Option<Vec<MapEntry>> {
        let mut batch: Vec<MapEntry> = Vec::with_capacity(self.target.min(1 << 16));
        while let Some(next) = self.inner.peek() {
            if batch.len() >= self.target && batch.last().is_some_and(|last| last.key != next.key)
            {
                break;
            }
            match self.inner.next() {
                Some(entry) => batch.push(entry),
                None => break,
            }
        }
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}
