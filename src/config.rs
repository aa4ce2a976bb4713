//! Pipeline options and environment configuration.
//!
//! [`PipelineOptions`] is a closed set: the pipeline recognizes exactly
//! these knobs and nothing else. Dynamic option bags were one of the
//! original sins this rewrite retires: every option here is named,
//! typed, defaulted, and serializable.

use std::path::PathBuf;

use canonical::CanonicalMode;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The enumerated pipeline options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Internal batch size for element embedding.
    pub embedding_batch_size: usize,
    /// Hard cap on elements embedded per query; `None` means unbounded.
    pub max_elements_to_embed: Option<usize>,
    /// Consult the page cache by DOM hash before treating a session as
    /// cold.
    pub enable_cold_start_detection: bool,
    /// Serve repeat `(target, dom_hash)` queries from the result cache.
    pub warm_query_cache: bool,
    /// Index snapshots automatically on query; off means the session
    /// only indexes when it has nothing yet.
    pub auto_index: bool,
    /// Re-index when the DOM hash changes; off freezes the first index.
    pub reindex_on_change: bool,
    /// Which descriptor sides feed the canonical form.
    pub canonical_mode: CanonicalMode,
    /// Hand ranked candidates to the hierarchy collaborator when one is
    /// installed.
    pub use_hierarchy: bool,
    /// Two-stage re-ranking through the same collaborator seam.
    pub use_two_stage: bool,
    /// Promotion short-circuit thresholds.
    pub min_promotion_score: f64,
    pub min_promotion_confidence: f64,
    /// Descriptor count beyond which the text fast path may bypass
    /// embedding.
    pub large_dom_threshold: usize,
    /// Near-duplicate cosine threshold for ranked candidates.
    pub dedup_cosine: f32,
    /// Permit the deterministic hash embedder when model artifacts are
    /// missing. Defaults on in debug builds only; release deployments
    /// opt in explicitly.
    pub allow_hash_fallback: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            embedding_batch_size: 32,
            max_elements_to_embed: None,
            enable_cold_start_detection: true,
            warm_query_cache: true,
            auto_index: true,
            reindex_on_change: true,
            canonical_mode: CanonicalMode::Both,
            use_hierarchy: false,
            use_two_stage: false,
            min_promotion_score: 0.5,
            min_promotion_confidence: 0.7,
            large_dom_threshold: 2000,
            dedup_cosine: 0.995,
            allow_hash_fallback: cfg!(debug_assertions),
        }
    }
}

impl PipelineOptions {
    /// Apply the recognized `HER_*` environment variables on top of the
    /// defaults. Unknown values log and keep the default.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(mode) = std::env::var("HER_CANONICAL_MODE") {
            match mode.parse::<CanonicalMode>() {
                Ok(parsed) => options.canonical_mode = parsed,
                Err(err) => warn!(%err, "ignoring HER_CANONICAL_MODE"),
            }
        }
        if let Some(flag) = env_flag("HER_USE_HIERARCHY") {
            options.use_hierarchy = flag;
        }
        if let Some(flag) = env_flag("HER_USE_TWO_STAGE") {
            options.use_two_stage = flag;
        }
        options
    }

    pub fn with_canonical_mode(mut self, mode: CanonicalMode) -> Self {
        self.canonical_mode = mode;
        self
    }

    pub fn with_large_dom_threshold(mut self, threshold: usize) -> Self {
        self.large_dom_threshold = threshold;
        self
    }

    pub fn with_hash_fallback(mut self, allow: bool) -> Self {
        self.allow_hash_fallback = allow;
        self
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!(name, value, "unrecognized boolean flag");
            None
        }
    }
}

/// Per-call knobs, distinct from the process-wide pipeline options.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    /// Candidates to rank and return fallbacks from.
    pub top_k: usize,
    /// Surface [`Ambiguous`](crate::RetrieverError::Ambiguous) instead
    /// of tie-breaking silently when runners-up sit within epsilon of
    /// the top score.
    pub require_unique: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            require_unique: false,
        }
    }
}

/// Where persistent state lives. `HER_CACHE_DIR` overrides the default
/// of `~/.her/cache`, then the working directory.
pub fn cache_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("HER_CACHE_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    if let Some(home) = dirs_home() {
        return home.join(".her").join("cache");
    }
    PathBuf::from(".her-cache")
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_the_documented_values() {
        let options = PipelineOptions::default();
        assert_eq!(options.embedding_batch_size, 32);
        assert_eq!(options.large_dom_threshold, 2000);
        assert_eq!(options.dedup_cosine, 0.995);
        assert_eq!(options.min_promotion_score, 0.5);
        assert_eq!(options.min_promotion_confidence, 0.7);
        assert!(options.warm_query_cache);
        assert!(!options.use_hierarchy);
    }

    #[test]
    fn options_round_trip_as_json() {
        let options = PipelineOptions::default().with_large_dom_threshold(500);
        let json = serde_json::to_string(&options).unwrap();
        let back: PipelineOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);
    }
}
