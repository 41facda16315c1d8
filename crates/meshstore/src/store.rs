//! Thread-safe, size-bounded store of byte views

use parking_lot::Mutex;
use tracing::trace;

use crate::byteview::ByteView;
use crate::lru::LruCache;

/// Fixed per-entry bookkeeping cost added to `key.len() + value.len()`
pub const ENTRY_OVERHEAD: usize = 32;

/// Estimated memory cost of one store entry
pub fn entry_size(key: &str, value: &ByteView) -> usize {
    key.len() + value.len() + ENTRY_OVERHEAD
}

/// Size-bounded key → [`ByteView`] store with LRU eviction.
///
/// One mutex guards the recency list and the byte counter, so `get` and
/// `add` are atomic with respect to each other. The list is only allocated
/// by the first `add`.
pub struct BoundedStore {
    max_bytes: usize,
    lru: Mutex<Option<LruCache<String, ByteView>>>,
}

impl BoundedStore {
    /// Create an empty store holding at most `max_bytes` (0 = unbounded)
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            lru: Mutex::new(None),
        }
    }

    /// Look up `key`, marking it most-recently-used on a hit
    pub fn get(&self, key: &str) -> Option<ByteView> {
        let mut lru = self.lru.lock();
        lru.as_mut()?.get(key).cloned()
    }

    /// Insert or replace `key`, evicting least-recently-used entries until
    /// the store fits again.
    ///
    /// Returns the number of entries evicted.
    pub fn add(&self, key: &str, value: ByteView) -> usize {
        let size = entry_size(key, &value);
        let mut guard = self.lru.lock();
        let lru = guard.get_or_insert_with(|| LruCache::new(self.max_bytes));

        let evicted = lru.put(key.to_owned(), value, size);
        for (old_key, old_value) in &evicted {
            trace!(
                key = %old_key,
                bytes = entry_size(old_key, old_value),
                "evicted store entry"
            );
        }
        evicted.len()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.lru.lock().as_ref().map_or(0, LruCache::len)
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current estimated size of all entries in bytes
    pub fn used_bytes(&self) -> usize {
        self.lru.lock().as_ref().map_or(0, LruCache::weight)
    }

    /// Configured byte bound (0 = unbounded)
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

impl std::fmt::Debug for BoundedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedStore")
            .field("max_bytes", &self.max_bytes)
            .field("used_bytes", &self.used_bytes())
            .field("len", &self.len())
            .finish()
    }
}
