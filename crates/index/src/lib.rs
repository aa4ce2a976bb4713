//! Per-frame vector index.
//!
//! A [`FrameIndex`] stores aligned `(embedding, descriptor)` rows plus a
//! map from element hash to row id. Rows are only ever appended: a
//! descriptor that disappears from the page stays addressable (warm-path
//! results may still reference it) and the memory is reclaimed when the
//! session closes.
//!
//! Upserts are deltas. Incoming descriptors are partitioned by element
//! hash into *unchanged* (already indexed) and *new*; only the new ones
//! touch the embedder, and the two-tier cache is consulted first so a
//! hash seen in any previous session costs no model call either.
//!
//! Search is exact cosine over all rows: flat inner product over
//! L2-normalized vectors. At this scale (at most a few thousand rows per
//! frame) brute force beats any index structure, and the [`VectorStore`]
//! trait leaves room to swap one in later.

mod cosine;
mod store;

use std::sync::RwLock;

use cache::{EmbeddingCache, cache_key};
use canonical::{CanonicalMode, element_hash, embedding_text};
use descriptor::ElementDescriptor;
use embedding::{EmbedError, Embedder};
use thiserror::Error;
use tracing::debug;

pub use cosine::cosine_truncated;
pub use store::{FlatStore, VectorStore};

/// Errors from index maintenance.
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    #[error("embedding failed during upsert: {0}")]
    Embed(#[from] EmbedError),
}

/// What one delta upsert did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertReport {
    /// Rows appended by this call.
    pub added: usize,
    /// Incoming descriptors whose hash was already indexed.
    pub unchanged: usize,
    /// New descriptors that required a model call.
    pub embedded: usize,
    /// New descriptors served from the embedding cache.
    pub cache_hits: usize,
}

/// One search result row.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub row_id: usize,
    pub score: f32,
    pub element_hash: String,
    pub descriptor: ElementDescriptor,
}

/// The per-frame index. Shared reads, exclusive writes.
pub struct FrameIndex {
    store: RwLock<Box<dyn VectorStore>>,
}

impl Default for FrameIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameIndex {
    pub fn new() -> Self {
        Self::with_store(Box::new(FlatStore::new()))
    }

    /// Build over a custom store implementation.
    pub fn with_store(store: Box<dyn VectorStore>) -> Self {
        Self {
            store: RwLock::new(store),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Box<dyn VectorStore>> {
        self.store.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Box<dyn VectorStore>> {
        self.store.write().unwrap_or_else(|p| p.into_inner())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, element_hash: &str) -> bool {
        self.read().row_of(element_hash).is_some()
    }

    /// Delta upsert: embed and append only descriptors whose element hash
    /// is not yet indexed. Row ids of existing entries never move.
    pub fn upsert(
        &self,
        elements: &[ElementDescriptor],
        mode: CanonicalMode,
        embedder: &dyn Embedder,
        embed_cache: Option<&EmbeddingCache>,
    ) -> Result<UpsertReport, IndexError> {
        let mut report = UpsertReport::default();

        // Partition under a read lock; hashing is pure CPU.
        let mut fresh: Vec<(String, String, &ElementDescriptor)> = Vec::new();
        {
            let store = self.read();
            let mut seen_this_call: hashbrown::HashSet<String> = hashbrown::HashSet::new();
            for el in elements {
                let hash = element_hash(el, mode);
                if store.row_of(&hash).is_some() || !seen_this_call.insert(hash.clone()) {
                    report.unchanged += 1;
                    continue;
                }
                let text = embedding_text(el, mode);
                fresh.push((hash, text, el));
            }
        }

        if fresh.is_empty() {
            return Ok(report);
        }

        // Cache pass: anything embedded in a previous session comes back
        // without touching the model.
        let dim = embedder.dim();
        let keys: Vec<String> = fresh
            .iter()
            .map(|(_, text, _)| cache_key("element", text, dim))
            .collect();
        let mut cached = embed_cache
            .map(|c| c.get_vec_batch(&keys))
            .unwrap_or_default();

        let mut to_embed: Vec<usize> = Vec::new();
        let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(fresh.len());
        for (i, key) in keys.iter().enumerate() {
            match cached.remove(key) {
                Some(vec) => {
                    report.cache_hits += 1;
                    vectors.push(Some(vec));
                }
                None => {
                    to_embed.push(i);
                    vectors.push(None);
                }
            }
        }

        if !to_embed.is_empty() {
            let texts: Vec<String> = to_embed.iter().map(|&i| fresh[i].1.clone()).collect();
            let embedded = embedder.embed_batch(&texts)?;
            report.embedded = embedded.len();

            if let Some(cache) = embed_cache {
                let entries: Vec<(String, Vec<f32>)> = to_embed
                    .iter()
                    .zip(embedded.iter())
                    .map(|(&i, vec)| (keys[i].clone(), vec.clone()))
                    .collect();
                cache.put_vec_batch(&entries);
            }

            for (&i, vec) in to_embed.iter().zip(embedded) {
                vectors[i] = Some(vec);
            }
        }

        // Append in incoming order under the write lock.
        let mut store = self.write();
        for ((hash, _, el), vector) in fresh.into_iter().zip(vectors) {
            // Another thread may have raced us between the locks.
            if store.row_of(&hash).is_some() {
                report.unchanged += 1;
                continue;
            }
            let vector = vector.unwrap_or_else(|| vec![0.0; dim]);
            store.append(hash, vector, el.clone());
            report.added += 1;
        }

        debug!(
            added = report.added,
            unchanged = report.unchanged,
            embedded = report.embedded,
            cache_hits = report.cache_hits,
            "frame index upsert"
        );
        Ok(report)
    }

    /// Exact cosine search over all rows, descending by score, row id as
    /// the tie-break.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        if k == 0 || query.is_empty() {
            return Vec::new();
        }
        let store = self.read();
        let mut hits: Vec<(usize, f32)> = store.search(query, k);
        hits.sort_unstable_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        hits.truncate(k);
        hits.into_iter()
            .filter_map(|(row_id, score)| {
                let descriptor = store.descriptor(row_id)?;
                let element_hash = store.hash_of(row_id)?;
                Some(SearchHit {
                    row_id,
                    score,
                    element_hash,
                    descriptor,
                })
            })
            .collect()
    }

    /// The stored embedding for a row, for dedup checks downstream.
    pub fn vector(&self, row_id: usize) -> Option<Vec<f32>> {
        self.read().vector(row_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedding::HashEmbedder;

    fn el(id: i64, tag: &str, text: &str) -> ElementDescriptor {
        ElementDescriptor::new(id, "main", tag, format!("//{tag}[{id}]"))
            .unwrap()
            .with_text(text)
    }

    fn embedder() -> HashEmbedder {
        HashEmbedder::for_elements()
    }

    #[test]
    fn upsert_partitions_new_and_unchanged() {
        let index = FrameIndex::new();
        let e = embedder();
        let batch = vec![el(1, "button", "Login"), el(2, "a", "Help")];

        let first = index
            .upsert(&batch, CanonicalMode::Both, &e, None)
            .unwrap();
        assert_eq!(first.added, 2);
        assert_eq!(first.embedded, 2);

        let mut grown = batch.clone();
        grown.push(el(3, "input", "Email"));
        let second = index
            .upsert(&grown, CanonicalMode::Both, &e, None)
            .unwrap();
        assert_eq!(second.added, 1);
        assert_eq!(second.unchanged, 2);
        assert_eq!(second.embedded, 1);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn duplicate_descriptors_dedupe_to_one_row() {
        let index = FrameIndex::new();
        let batch = vec![el(1, "li", "Apple"), el(2, "li", "Apple")];
        let report = index
            .upsert(&batch, CanonicalMode::Both, &embedder(), None)
            .unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(report.unchanged, 1);
    }

    #[test]
    fn cached_hashes_skip_the_model() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(tmp.path(), 64, 1 << 20);
        let e = embedder();
        let batch = vec![el(1, "button", "Checkout")];

        let index_a = FrameIndex::new();
        let first = index_a
            .upsert(&batch, CanonicalMode::Both, &e, Some(&cache))
            .unwrap();
        assert_eq!(first.embedded, 1);
        assert_eq!(first.cache_hits, 0);

        // A different index (fresh session) over the same cache: the
        // single element must come from cache, with zero model calls.
        let index_b = FrameIndex::new();
        let second = index_b
            .upsert(&batch, CanonicalMode::Both, &e, Some(&cache))
            .unwrap();
        assert_eq!(second.embedded, 0);
        assert_eq!(second.cache_hits, 1);
        assert_eq!(second.added, 1);
    }

    #[test]
    fn search_orders_by_similarity() {
        let index = FrameIndex::new();
        let e = embedder();
        index
            .upsert(
                &[
                    el(1, "button", "Login now"),
                    el(2, "a", "Privacy policy"),
                    el(3, "button", "Login"),
                ],
                CanonicalMode::Both,
                &e,
                None,
            )
            .unwrap();

        let q = HashEmbedder::for_elements().embed("login").unwrap();
        let hits = index.search(&q, 3);
        assert_eq!(hits.len(), 3);
        assert!(hits[0].score >= hits[1].score);
        assert!(hits[0].descriptor.text.to_lowercase().contains("login"));
    }

    #[test]
    fn row_ids_are_stable_across_upserts() {
        let index = FrameIndex::new();
        let e = embedder();
        index
            .upsert(&[el(1, "button", "One")], CanonicalMode::Both, &e, None)
            .unwrap();
        let q = e.embed("one").unwrap();
        let before = index.search(&q, 1)[0].row_id;

        index
            .upsert(
                &[el(1, "button", "One"), el(2, "button", "Two")],
                CanonicalMode::Both,
                &e,
                None,
            )
            .unwrap();
        let after = index
            .search(&q, 2)
            .into_iter()
            .find(|h| h.descriptor.text == "One")
            .unwrap()
            .row_id;
        assert_eq!(before, after);
    }

    #[test]
    fn zero_k_short_circuits() {
        let index = FrameIndex::new();
        assert!(index.search(&[1.0, 0.0], 0).is_empty());
    }
}
