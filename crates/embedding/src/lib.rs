//! Embedding adapter for the hybrid element retriever.
//!
//! Turns query text and canonical element projections into dense L2-
//! normalized vectors. Two implementations sit behind the [`Embedder`]
//! trait:
//!
//! - **ONNX mode**: local inference via `onnxruntime` + `tokenizers`.
//!   Needs model artifacts on disk.
//! - **Hash mode**: deterministic sinusoid vectors seeded by a 64-bit
//!   hash of the input. No artifacts, no I/O, fully reproducible.
//!
//! The nice part is the fallback behavior: when model files are missing
//! the [`EmbedderStack`] degrades to hash mode with a warning instead of
//! failing the query, so tests and cold environments keep working. Query
//! and element embedders may have different dimensions; cosine across
//! them truncates to the common prefix downstream.
//!
//! ## Threading notes
//!
//! Tokenizers and ONNX sessions are cached per-thread. The first call on
//! any thread pays the load cost; after that it's cheap. The embedder
//! structs themselves hold only paths and are freely shareable.

mod assets;
mod error;
mod hashed;
mod normalize;
mod onnx;
mod stack;

pub use assets::{ModelAssets, models_root, resolve_assets};
pub use error::EmbedError;
pub use hashed::HashEmbedder;
pub use normalize::l2_normalize_in_place;
pub use onnx::OnnxEmbedder;
pub use stack::EmbedderStack;

/// Default dimension of query-side vectors (MiniLM/E5 family).
pub const QUERY_DIM: usize = 384;
/// Default dimension of element-side vectors (MarkupLM family).
pub const ELEMENT_DIM: usize = 768;

/// An opaque text-to-vector capability. All returned vectors are L2
/// normalized; empty input yields a zero vector without touching any
/// model.
pub trait Embedder: Send + Sync {
    /// Human-readable label surfaced in logs and result metadata.
    fn name(&self) -> &str;

    /// Output dimensionality.
    fn dim(&self) -> usize;

    /// Embed one input.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Embed a batch. The adapter decides internal batch sizing; the
    /// default just loops.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}
