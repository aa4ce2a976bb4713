//! Two-tier embedding cache.
//!
//! A lookup consults the in-memory LRU first; on miss it consults the
//! persistent single-file store, and a persistent hit promotes the stored
//! bytes into memory *verbatim*: values are content-addressed, so the
//! two tiers can never disagree about a key.
//!
//! Values are opaque byte blobs at this layer. Embedding vectors go
//! through the length-prefixed f32 codec ([`encode_vector`] /
//! [`decode_vector`]); the warm-path result cache stores serialized
//! JSON under the same key space. Keys follow `task|sha1(input)|dim`.
//!
//! Persistence failures are recovered locally: they log at `warn`, bump
//! an error counter, and the memory tier carries on. Corrupt entries are
//! deleted on read. Nothing in this crate surfaces an error to a query.

mod codec;
mod error;
mod memory;
mod store;

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

pub use codec::{VECTOR_MAGIC, decode_vector, encode_vector};
pub use error::CacheError;
pub use memory::MemoryTier;
pub use store::{SqliteStore, StoreStats};

/// Default capacity of the memory tier, in entries.
pub const DEFAULT_MEMORY_CAPACITY: usize = 1024;
/// Default byte budget of the persistent tier.
pub const DEFAULT_DISK_BUDGET_BYTES: u64 = 100 * 1024 * 1024;
/// File name of the persistent store inside the cache directory.
pub const EMBEDDINGS_DB: &str = "embeddings.db";

/// Build a cache key from its three components: task label, raw input
/// (hashed), and vector dimension.
pub fn cache_key(task: &str, input: &str, dim: usize) -> String {
    format!("{task}|{}|{dim}", canonical::sha1_hex(input))
}

/// Combined statistics over both tiers.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub disk_entries: u64,
    pub disk_bytes: u64,
    pub disk_hits: u64,
    pub io_errors: u64,
}

/// The two-tier cache. Safe for concurrent use; `get` on one key never
/// waits on a `put` for another beyond the brief tier-level locks.
pub struct EmbeddingCache {
    memory: MemoryTier,
    store: Option<SqliteStore>,
    io_errors: AtomicU64,
}

impl EmbeddingCache {
    /// Open the cache rooted at `dir`, creating `embeddings.db` inside
    /// it. A store that cannot be opened degrades to memory-only rather
    /// than failing the caller.
    pub fn open(dir: &Path, memory_capacity: usize, disk_budget_bytes: u64) -> Self {
        let store = match SqliteStore::open(&dir.join(EMBEDDINGS_DB), disk_budget_bytes) {
            Ok(store) => Some(store),
            Err(err) => {
                warn!(%err, dir = %dir.display(), "persistent cache unavailable, running memory-only");
                None
            }
        };
        Self {
            memory: MemoryTier::new(memory_capacity),
            store,
            io_errors: AtomicU64::new(0),
        }
    }

    /// Memory-only cache, used by tests and ephemeral sessions.
    pub fn in_memory(memory_capacity: usize) -> Self {
        Self {
            memory: MemoryTier::new(memory_capacity),
            store: None,
            io_errors: AtomicU64::new(0),
        }
    }

    fn record_io_error(&self, err: &CacheError, op: &str) {
        self.io_errors.fetch_add(1, Ordering::Relaxed);
        warn!(%err, op, "persistent cache error, treating as miss");
    }

    /// Fetch raw bytes, memory first. A persistent hit promotes the
    /// stored bytes into memory unchanged.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        if let Some(blob) = self.memory.get(key) {
            return Some(blob);
        }
        let store = self.store.as_ref()?;
        match store.get(key) {
            Ok(Some(blob)) => {
                self.memory.put(key.to_string(), blob.clone());
                Some(blob)
            }
            Ok(None) => None,
            Err(err) => {
                self.record_io_error(&err, "get");
                None
            }
        }
    }

    /// Batched fetch: one pass over memory, one batched read for the
    /// remainder. Equivalent to pointwise `get`.
    pub fn get_batch(&self, keys: &[String]) -> HashMap<String, Vec<u8>> {
        let mut results = HashMap::with_capacity(keys.len());
        let mut remaining: Vec<&str> = Vec::new();
        for key in keys {
            match self.memory.get(key) {
                Some(blob) => {
                    results.insert(key.clone(), blob);
                }
                None => remaining.push(key.as_str()),
            }
        }
        if remaining.is_empty() {
            return results;
        }
        if let Some(store) = self.store.as_ref() {
            match store.get_batch(&remaining) {
                Ok(hits) => {
                    for (key, blob) in hits {
                        self.memory.put(key.clone(), blob.clone());
                        results.insert(key, blob);
                    }
                }
                Err(err) => self.record_io_error(&err, "get_batch"),
            }
        }
        results
    }

    /// Store bytes in both tiers. Last write wins; content-derived keys
    /// make concurrent writers byte-identical anyway.
    pub fn put(&self, key: &str, blob: Vec<u8>, metadata: Option<&str>) {
        self.memory.put(key.to_string(), blob.clone());
        if let Some(store) = self.store.as_ref() {
            if let Err(err) = store.put(key, &blob, metadata) {
                self.record_io_error(&err, "put");
            }
        }
    }

    /// Store many entries; the persistent writes share one transaction.
    pub fn put_batch(&self, items: Vec<(String, Vec<u8>)>) {
        if items.is_empty() {
            return;
        }
        for (key, blob) in &items {
            self.memory.put(key.clone(), blob.clone());
        }
        if let Some(store) = self.store.as_ref() {
            if let Err(err) = store.put_batch(&items) {
                self.record_io_error(&err, "put_batch");
            }
        }
    }

    /// Fetch and decode an embedding vector. Corrupt blobs are deleted
    /// from both tiers and reported as a miss.
    pub fn get_vec(&self, key: &str) -> Option<Vec<f32>> {
        let blob = self.get(key)?;
        match decode_vector(&blob) {
            Ok(vec) => Some(vec),
            Err(err) => {
                warn!(%err, key, "corrupt cache entry, deleting");
                self.delete(key);
                None
            }
        }
    }

    /// Encode and store an embedding vector.
    pub fn put_vec(&self, key: &str, vector: &[f32]) {
        match encode_vector(vector) {
            Ok(blob) => self.put(key, blob, None),
            Err(err) => warn!(%err, key, "vector not cacheable"),
        }
    }

    /// Batched vector fetch; corrupt entries are dropped as in
    /// [`get_vec`](Self::get_vec).
    pub fn get_vec_batch(&self, keys: &[String]) -> HashMap<String, Vec<f32>> {
        let blobs = self.get_batch(keys);
        let mut out = HashMap::with_capacity(blobs.len());
        for (key, blob) in blobs {
            match decode_vector(&blob) {
                Ok(vec) => {
                    out.insert(key, vec);
                }
                Err(err) => {
                    warn!(%err, key, "corrupt cache entry, deleting");
                    self.delete(&key);
                }
            }
        }
        out
    }

    /// Encode and store many vectors in one persistent transaction.
    pub fn put_vec_batch(&self, items: &[(String, Vec<f32>)]) {
        let mut encoded = Vec::with_capacity(items.len());
        for (key, vector) in items {
            match encode_vector(vector) {
                Ok(blob) => encoded.push((key.clone(), blob)),
                Err(err) => warn!(%err, key, "vector not cacheable"),
            }
        }
        self.put_batch(encoded);
    }

    pub fn delete(&self, key: &str) {
        self.memory.delete(key);
        if let Some(store) = self.store.as_ref() {
            if let Err(err) = store.delete(key) {
                self.record_io_error(&err, "delete");
            }
        }
    }

    /// Total persistent payload bytes; zero when memory-only.
    pub fn size_bytes(&self) -> u64 {
        self.store
            .as_ref()
            .and_then(|s| s.stats().ok())
            .map(|s| s.total_bytes)
            .unwrap_or(0)
    }

    pub fn stats(&self) -> CacheStats {
        let (memory_entries, memory_hits, memory_misses) = self.memory.counters();
        let disk = self
            .store
            .as_ref()
            .and_then(|s| s.stats().ok())
            .unwrap_or_default();
        CacheStats {
            memory_entries,
            memory_hits,
            memory_misses,
            disk_entries: disk.entries,
            disk_bytes: disk.total_bytes,
            disk_hits: disk.total_hits,
            io_errors: self.io_errors.load(Ordering::Relaxed),
        }
    }

    /// Drop every entry in both tiers.
    pub fn clear(&self) {
        self.memory.clear();
        if let Some(store) = self.store.as_ref() {
            if let Err(err) = store.clear() {
                self.record_io_error(&err, "clear");
            }
        }
    }

    /// Explicit close. Dropping works too; this exists so lifecycle is
    /// visible at call sites.
    pub fn close(self) {}
}
