//! Hybrid element retriever.
//!
//! `her` resolves natural-language instructions ("click the Apple
//! filter", "type user@example.com into the email field") into concrete
//! element locators on a live web page, and optionally executes the
//! resulting action. Given a page snapshot (a flattened set of visible
//! DOM elements enriched with accessibility attributes) and a free-form
//! query, it returns the single best-matching element, a confidence
//! score, and a short ordered list of fallback locators.
//!
//! The crate re-exports the workspace layers so applications can drive
//! everything through a single dependency:
//!
//! - [`descriptor`](::descriptor): the element/snapshot data model and
//!   the collaborator traits ([`SnapshotProvider`], [`Executor`]).
//! - [`canonical`](::canonical): deterministic projections and SHA-1
//!   fingerprints.
//! - [`embedding`](::embedding): ONNX inference with a deterministic
//!   hash fallback.
//! - [`cache`](::cache): the two-tier embedding cache.
//! - [`index`](::index): per-frame vector indexes with delta upsert.
//! - [`ranker`](::ranker): the fusion scorer.
//! - [`session`](::session): per-session index state and SPA tracking.
//! - [`promotion`](::promotion): learned locator promotions.
//!
//! ## Quick start
//!
//! ```
//! use her::{PipelineOptions, QueryOptions, Retriever};
//! use her::{ElementDescriptor, PageSnapshot};
//!
//! let retriever = Retriever::ephemeral(PipelineOptions::default());
//!
//! let elements = vec![
//!     ElementDescriptor::new(1, "main", "button", "//button[1]")
//!         .unwrap()
//!         .with_text("Login"),
//!     ElementDescriptor::new(2, "main", "a", "//a[1]")
//!         .unwrap()
//!         .with_text("Forgot password?"),
//! ];
//! let snapshot = PageSnapshot::single_frame("https://example.com/", elements);
//!
//! let resolution = retriever
//!     .query_snapshot("click login", &snapshot, None, QueryOptions::default())
//!     .unwrap();
//! assert!(resolution.ok);
//! assert_eq!(resolution.element.unwrap().text, "Login");
//! ```
//!
//! ## Sessions and warmth
//!
//! Queries run inside a session. Re-indexing is incremental: only
//! elements whose content hash is new reach the embedder, and repeat
//! queries against an unchanged DOM come back from the warm-path cache
//! without touching a model at all. The embedding and promotion caches
//! persist across processes under the directory named by
//! `HER_CACHE_DIR`.
//!
//! ## Failure behavior
//!
//! Recoverable trouble (missing model artifacts, a corrupt cache file)
//! degrades locally with a `tracing` warning. What callers see is the
//! [`RetrieverError`] taxonomy, and every variant carries a stable
//! single-line [`explanation`](RetrieverError::explanation) naming the
//! failing stage.

pub mod config;
mod error;
pub mod heal;
mod intent;
mod pipeline;
mod result;

pub use config::{PipelineOptions, QueryOptions, cache_dir};
pub use error::RetrieverError;
pub use intent::parse_intent;
pub use pipeline::{Reranker, Retriever};
pub use result::{Resolution, ResolutionMetadata, round_confidence};

// The workspace surface, re-exported for single-dependency consumers.
pub use cache::{CacheStats, EmbeddingCache, cache_key};
pub use canonical::{
    CanonicalMode, HASH_VERSION, canonical, dom_hash, element_hash, frame_hash, page_signature,
};
pub use descriptor::{
    ActionKind, ActionOutcome, BBox, Deadline, ElementDescriptor, Executor, FrameSnapshot, Intent,
    Locator, PageSnapshot, SnapshotProvider, Strategy, merge_dom_ax,
};
pub use embedding::{EmbedError, Embedder, EmbedderStack, HashEmbedder, OnnxEmbedder, models_root};
pub use index::{FrameIndex, SearchHit, UpsertReport};
pub use promotion::{PromotionKey, PromotionRecord, PromotionStore, label_key};
pub use ranker::{RankCandidate, RankOptions, RankedCandidate, rank};
pub use session::{IndexDiff, IndexOutcome, SessionManager, SessionView, TokenPreindex};

/// Crate version, surfaced by the CLI's `version` subcommand.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
