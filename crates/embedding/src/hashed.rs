//! Deterministic hash embedder.
//!
//! Generates sinusoid values derived from a 64-bit hash of the input, so
//! two processes (or two runs years apart) produce bit-identical vectors
//! for the same text. Quality is obviously nothing like a real model, but
//! token-overlap structure survives well enough for tests and for cold
//! environments without artifacts.

use fxhash::hash64;

use crate::error::EmbedError;
use crate::normalize::l2_normalize_in_place;
use crate::{ELEMENT_DIM, Embedder, QUERY_DIM};

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
    name: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            name: format!("hash-{dim}"),
        }
    }

    /// Query-side default dimensionality.
    pub fn for_queries() -> Self {
        Self::new(QUERY_DIM)
    }

    /// Element-side default dimensionality.
    pub fn for_elements() -> Self {
        Self::new(ELEMENT_DIM)
    }
}

impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dim]);
        }
        let mut v = vec![0.0f32; self.dim];
        // Mix a per-token hash so related texts land near each other: the
        // vector is the sum of token sinusoids plus a whole-text sinusoid.
        let whole = hash64(text.as_bytes());
        for (idx, value) in v.iter_mut().enumerate() {
            *value = ((whole >> (idx % 32)) as f32 * 0.0001).sin();
        }
        for token in text.split_whitespace() {
            let h = hash64(token.to_lowercase().as_bytes());
            for (idx, value) in v.iter_mut().enumerate() {
                *value += ((h >> (idx % 32)) as f32 * 0.0001).sin();
            }
        }
        l2_normalize_in_place(&mut v);
        Ok(v)
    }
}
