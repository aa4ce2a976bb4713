//! The in-memory LRU tier.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

struct MemoryInner {
    entries: LruCache<String, Vec<u8>>,
    hits: u64,
    misses: u64,
}

/// Thread-safe LRU of raw blobs. Lock scope is a single map operation,
/// so readers of one key never wait long on writers of another.
pub struct MemoryTier {
    inner: Mutex<MemoryInner>,
}

impl MemoryTier {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity clamped above zero");
        Self {
            inner: Mutex::new(MemoryInner {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut inner = self.lock();
        match inner.entries.get(key).cloned() {
            Some(blob) => {
                inner.hits += 1;
                Some(blob)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    pub fn put(&self, key: String, blob: Vec<u8>) {
        self.lock().entries.put(key, blob);
    }

    pub fn delete(&self, key: &str) {
        self.lock().entries.pop(key);
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.hits = 0;
        inner.misses = 0;
    }

    /// `(entries, hits, misses)` snapshot.
    pub fn counters(&self) -> (usize, u64, u64) {
        let inner = self.lock();
        (inner.entries.len(), inner.hits, inner.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lru_evicts_oldest_accessed() {
        let tier = MemoryTier::new(2);
        tier.put("a".into(), vec![1]);
        tier.put("b".into(), vec![2]);
        tier.get("a");
        tier.put("c".into(), vec![3]);

        assert!(tier.get("a").is_some());
        assert!(tier.get("b").is_none());
        assert!(tier.get("c").is_some());
    }

    #[test]
    fn counters_track_hits_and_misses() {
        let tier = MemoryTier::new(4);
        tier.put("a".into(), vec![1]);
        tier.get("a");
        tier.get("nope");
        let (entries, hits, misses) = tier.counters();
        assert_eq!(entries, 1);
        assert_eq!(hits, 1);
        assert_eq!(misses, 1);
    }
}
