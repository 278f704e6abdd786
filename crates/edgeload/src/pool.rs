//! Free-list object pools.
//!
//! Pooled objects are handed out by value. Ownership travels with the
//! object through the write path and comes back via [`Pool::put`] only from
//! a write completion callback, so an object can never be reused while a
//! write still references it.

use std::sync::atomic::{AtomicU64, Ordering};

use edgeload_core::MapEntry;
use edgeload_storage::WriteRequest;
use parking_lot::Mutex;

use crate::config::LoaderConfig;

/// Types that can be cleared for reuse.
pub trait Recycle: Default {
    /// Clear contents, keeping allocations.
    fn recycle(&mut self);
}

impl Recycle for MapEntry {
    fn recycle(&mut self) {
        self.reset();
    }
}

impl Recycle for WriteRequest {
    fn recycle(&mut self) {
        self.reset();
    }
}

impl Recycle for Vec<u8> {
    fn recycle(&mut self) {
        self.clear();
    }
}

/// Allocation counters of a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Objects created because the free list was empty.
    pub created: u64,
    /// Objects handed out from the free list.
    pub reused: u64,
}

/// A concurrent free list with a cap on idle objects.
#[derive(Debug)]
pub struct Pool<T> {
    free: Mutex<Vec<T>>,
    max_idle: usize,
    created: AtomicU64,
    reused: AtomicU64,
}

impl<T: Recycle> Pool<T> {
    /// Create a pool that keeps at most `max_idle` returned objects.
    #[must_use]
    pub fn new(max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_idle,
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
        }
    }

    /// Take an object, creating one if none is idle.
    pub fn get(&self) -> T {
        if let Some(item) = self.free.lock().pop() {
            self.reused.fetch_add(1, Ordering::Relaxed);
            return item;
        }
        self.created.fetch_add(1, Ordering::Relaxed);
        T::default()
    }

    /// Return an object. It is dropped if the pool is full.
    pub fn put(&self, mut item: T) {
        item.recycle();
        let mut free = self.free.lock();
        if free.len() < self.max_idle {
            free.push(item);
        }
    }

    /// Return many objects under one lock acquisition.
    pub fn put_all(&self, items: impl IntoIterator<Item = T>) {
        let mut free = self.free.lock();
        for mut item in items {
            if free.len() >= self.max_idle {
                break;
            }
            item.recycle();
            free.push(item);
        }
    }

    /// Number of idle objects.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    /// Allocation counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
        }
    }
}

/// The three pools shared by decoders and reducers.
#[derive(Debug)]
pub struct Pools {
    /// Decoded map entries.
    pub entries: Pool<MapEntry>,
    /// Write requests.
    pub requests: Pool<WriteRequest>,
    /// Encoded value buffers.
    pub buffers: Pool<Vec<u8>>,
}

impl Pools {
    /// Create pools sized by `config`.
    #[must_use]
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            entries: Pool::new(config.entry_pool_capacity),
            requests: Pool::new(config.request_pool_capacity),
            buffers: Pool::new(config.buffer_pool_capacity),
        }
    }

    /// A value buffer with capacity for `len` bytes.
    ///
    /// A pooled buffer that is too small is discarded and a fresh one
    /// allocated.
    pub fn value_buffer(&self, len: usize) -> Vec<u8> {
        let buf = self.buffers.get();
        if buf.capacity() >= len {
            buf
        } else {
            Vec::with_capacity(len)
        }
    }

    /// Return a write request and its value buffer to their pools.
    pub fn release_request(&self, mut request: WriteRequest) {
        let value = std::mem::take(&mut request.value);
        if value.capacity() > 0 {
            self.buffers.put(value);
        }
        self.requests.put(request);
    }
}

#[cfg(test)]
mod tests {
    use edgeload_core::Uid;

    use super::*;

    #[test]
    fn reuse_after_put() {
        let pool: Pool<MapEntry> = Pool::new(4);
        let mut entry = pool.get();
        entry.key.extend_from_slice(b"some key");
        entry.uid = Uid::new(3);
        pool.put(entry);
        assert_eq!(pool.idle(), 1);

        let again = pool.get();
        assert!(again.key.is_empty());
        assert!(again.key.capacity() >= 8);
        assert_eq!(again.uid, Uid::default());
        assert_eq!(pool.stats(), PoolStats { created: 1, reused: 1 });
    }

    #[test]
    fn idle_cap() {
        let pool: Pool<Vec<u8>> = Pool::new(2);
        pool.put_all((0..5).map(|_| Vec::with_capacity(8)));
        assert_eq!(pool.idle(), 2);
        pool.put(Vec::new());
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn undersized_buffer_is_replaced() {
        let pools = Pools::new(&LoaderConfig::default());
        pools.buffers.put(Vec::with_capacity(4));
        let buf = pools.value_buffer(64);
        assert!(buf.capacity() >= 64);
        assert_eq!(pools.buffers.idle(), 0);

        pools.buffers.put(Vec::with_capacity(128));
        let buf = pools.value_buffer(64);
        assert!(buf.capacity() >= 128);
    }

    #[test]
    fn release_request_splits_buffer() {
        let pools = Pools::new(&LoaderConfig::default());
        let request = WriteRequest::new(b"k".to_vec(), 1, vec![0; 16]);
        pools.release_request(request);
        assert_eq!(pools.buffers.idle(), 1);
        assert_eq!(pools.requests.idle(), 1);
        assert!(pools.requests.get().value.is_empty());
    }
}
