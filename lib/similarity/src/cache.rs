//! Bounded LRU cache of pairwise distances

use ahash::RandomState;
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Everything a cached distance depends on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    first: String,
    second: String,
    method: String,
    revision: u64,
    normalize: bool,
    clusters: Option<usize>,
}

impl PairKey {
    /// Symmetric metrics share one entry for `(a, b)` and `(b, a)`
    pub fn new(
        a: &str,
        b: &str,
        method: &str,
        revision: u64,
        normalize: bool,
        clusters: Option<usize>,
        symmetric: bool,
    ) -> Self {
        let (first, second) = if symmetric && b < a { (b, a) } else { (a, b) };
        Self {
            first: first.to_string(),
            second: second.to_string(),
            method: method.to_string(),
            revision,
            normalize,
            clusters,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
    pub capacity: usize,
}

struct Inner {
    // `None` when the capacity is 0
    entries: Option<LruCache<PairKey, f64, RandomState>>,
    hits: u64,
    misses: u64,
}

pub struct PairCache {
    inner: Mutex<Inner>,
}

impl PairCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: NonZeroUsize::new(capacity).map(|cap| LruCache::with_hasher(cap, RandomState::new())),
                hits: 0,
                misses: 0,
            }),
        }
    }

    pub fn get(&self, key: &PairKey) -> Option<f64> {
        let mut inner = self.inner.lock();
        let found = inner.entries.as_mut().and_then(|entries| entries.get(key).copied());
        if found.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        found
    }

    pub fn put(&self, key: PairKey, value: f64) {
        if let Some(entries) = self.inner.lock().entries.as_mut() {
            entries.put(key, value);
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner
            .lock()
            .entries
            .as_ref()
            .map_or(0, |entries| entries.cap().get())
    }

    /// Change the capacity, evicting least recently used entries if it shrinks
    pub fn resize(&self, capacity: usize) {
        let mut inner = self.inner.lock();
        let current = inner.entries.as_ref().map_or(0, |entries| entries.cap().get());
        if current == capacity {
            return;
        }
        if let Some(cap) = NonZeroUsize::new(capacity) {
            if let Some(entries) = inner.entries.as_mut() {
                entries.resize(cap);
            } else {
                inner.entries = Some(LruCache::with_hasher(cap, RandomState::new()));
            }
        } else {
            inner.entries = None;
        }
        tracing::debug!("Resized distance cache from {} to {} entries", current, capacity);
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        if let Some(entries) = inner.entries.as_mut() {
            entries.clear();
        }
        inner.hits = 0;
        inner.misses = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            len: inner.entries.as_ref().map_or(0, |entries| entries.len()),
            capacity: inner.entries.as_ref().map_or(0, |entries| entries.cap().get()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(a: &str, b: &str) -> PairKey {
        PairKey::new(a, b, "hamming", 1, true, None, true)
    }

    #[test]
    fn test_symmetric_keys_collapse() {
        assert_eq!(key("p", "b"), key("b", "p"));
        let ordered = |a, b| PairKey::new(a, b, "custom", 7, true, None, false);
        assert_ne!(ordered("p", "b"), ordered("b", "p"));
    }

    #[test]
    fn test_lru_eviction_and_stats() {
        let cache = PairCache::new(2);
        cache.put(key("p", "b"), 0.1);
        cache.put(key("t", "d"), 0.2);
        assert_eq!(cache.get(&key("b", "p")), Some(0.1));
        cache.put(key("k", "g"), 0.3);
        // (t, d) was least recently used
        assert_eq!(cache.get(&key("t", "d")), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.len, 2);
        assert_eq!(stats.capacity, 2);
    }

    #[test]
    fn test_zero_capacity_disables() {
        let cache = PairCache::new(0);
        cache.put(key("p", "b"), 0.1);
        assert_eq!(cache.get(&key("p", "b")), None);
        assert_eq!(cache.capacity(), 0);

        cache.resize(4);
        cache.put(key("p", "b"), 0.1);
        assert_eq!(cache.get(&key("p", "b")), Some(0.1));

        cache.resize(1);
        assert_eq!(cache.stats().len, 1);
        cache.resize(0);
        assert_eq!(cache.stats().len, 0);
    }
}
