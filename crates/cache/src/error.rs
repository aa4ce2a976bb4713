use thiserror::Error;

/// Errors internal to the cache tiers. Callers of [`EmbeddingCache`]
/// never see these; the wrapper logs and degrades. The strict `Result`
/// surface exists so the store itself stays testable.
///
/// [`EmbeddingCache`]: crate::EmbeddingCache
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("store error: {0}")]
    Store(String),

    #[error("codec error: {0}")]
    Codec(String),
}

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        CacheError::Store(e.to_string())
    }
}
