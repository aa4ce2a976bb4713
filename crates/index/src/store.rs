//! Storage behind the frame index.
//!
//! The trait exists so the flat store can later be swapped for an ANN
//! structure without touching session or pipeline code. Implementations
//! must preserve append order: row ids are handed out sequentially and
//! never reused.

use descriptor::ElementDescriptor;
use hashbrown::HashMap;

use crate::cosine::cosine_truncated;

/// Aligned row storage plus the element-hash lookup.
pub trait VectorStore: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row id for an element hash, if indexed.
    fn row_of(&self, element_hash: &str) -> Option<usize>;

    /// Element hash of a row.
    fn hash_of(&self, row_id: usize) -> Option<String>;

    /// Append a row, returning its id. Callers guarantee the hash is not
    /// yet present.
    fn append(
        &mut self,
        element_hash: String,
        vector: Vec<f32>,
        descriptor: ElementDescriptor,
    ) -> usize;

    /// Unordered `(row_id, score)` candidates; the caller sorts and
    /// truncates. `k` is a hint for implementations that can prune.
    fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)>;

    fn descriptor(&self, row_id: usize) -> Option<ElementDescriptor>;

    fn vector(&self, row_id: usize) -> Option<Vec<f32>>;
}

struct Row {
    element_hash: String,
    vector: Vec<f32>,
    descriptor: ElementDescriptor,
}

/// The default store: plain aligned vectors, exhaustive cosine scan.
#[derive(Default)]
pub struct FlatStore {
    rows: Vec<Row>,
    by_hash: HashMap<String, usize>,
}

impl FlatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorStore for FlatStore {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn row_of(&self, element_hash: &str) -> Option<usize> {
        self.by_hash.get(element_hash).copied()
    }

    fn hash_of(&self, row_id: usize) -> Option<String> {
        self.rows.get(row_id).map(|r| r.element_hash.clone())
    }

    fn append(
        &mut self,
        element_hash: String,
        vector: Vec<f32>,
        descriptor: ElementDescriptor,
    ) -> usize {
        let row_id = self.rows.len();
        self.by_hash.insert(element_hash.clone(), row_id);
        self.rows.push(Row {
            element_hash,
            vector,
            descriptor,
        });
        debug_assert_eq!(self.rows.len(), self.by_hash.len());
        row_id
    }

    fn search(&self, query: &[f32], _k: usize) -> Vec<(usize, f32)> {
        self.rows
            .iter()
            .enumerate()
            .map(|(row_id, row)| (row_id, cosine_truncated(query, &row.vector)))
            .collect()
    }

    fn descriptor(&self, row_id: usize) -> Option<ElementDescriptor> {
        self.rows.get(row_id).map(|r| r.descriptor.clone())
    }

    fn vector(&self, row_id: usize) -> Option<Vec<f32>> {
        self.rows.get(row_id).map(|r| r.vector.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(id: i64) -> ElementDescriptor {
        ElementDescriptor::new(id, "main", "div", format!("//div[{id}]")).unwrap()
    }

    #[test]
    fn append_assigns_sequential_row_ids() {
        let mut store = FlatStore::new();
        assert_eq!(store.append("h1".into(), vec![1.0], el(1)), 0);
        assert_eq!(store.append("h2".into(), vec![0.5], el(2)), 1);
        assert_eq!(store.row_of("h2"), Some(1));
        assert_eq!(store.hash_of(0).as_deref(), Some("h1"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn map_and_rows_stay_aligned() {
        let mut store = FlatStore::new();
        for i in 0..10i64 {
            store.append(format!("h{i}"), vec![i as f32], el(i));
        }
        for i in 0..10 {
            let row = store.row_of(&format!("h{i}")).unwrap();
            assert_eq!(store.vector(row).unwrap(), vec![i as f32]);
        }
    }
}
