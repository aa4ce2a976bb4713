use thiserror::Error;

/// Errors from the embedding adapter.
#[derive(Debug, Clone, Error)]
pub enum EmbedError {
    /// Tokenization or model execution failed.
    #[error("inference failure: {0}")]
    Inference(String),

    /// Model/tokenizer artifacts could not be found and the hash
    /// fallback was not permitted.
    #[error("model artifacts missing under {root}: {detail}")]
    MissingAssets { root: String, detail: String },

    /// The adapter was constructed with an unusable configuration.
    #[error("invalid embedder config: {0}")]
    InvalidConfig(String),
}
