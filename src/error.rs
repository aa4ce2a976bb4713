//! The error taxonomy surfaced to callers.
//!
//! Recoverable conditions (a missing model, a broken cache file) never
//! appear here: they degrade locally with a log line and a metric. What
//! does appear is exactly what a caller can act on: bad input, a blown
//! deadline, nothing found, genuine ambiguity, a rejected candidate, or
//! an executor that failed after every retry.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RetrieverError {
    /// Empty query, malformed URL, unsupported scheme.
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// An external call exceeded its deadline.
    #[error("deadline exceeded during {stage}")]
    Timeout { stage: &'static str },

    /// The snapshot provider could not capture the page.
    #[error("snapshot capture failed: {0}")]
    SnapshotFailed(String),

    /// No candidate cleared the minimum threshold. Distinct from a
    /// low-confidence result, which is still returned.
    #[error("no matching element: {0}")]
    NotFound(String),

    /// Several candidates within epsilon of the top score and no
    /// tie-break resolved them; only surfaced under `require_unique`.
    #[error("ambiguous match: {candidates} candidates within {epsilon} of the top score")]
    Ambiguous { candidates: usize, epsilon: f32 },

    /// Live-page verification rejected the chosen candidate.
    #[error("candidate rejected: {0}")]
    Rejected(String),

    /// The executor failed and self-heal exhausted its retries.
    #[error("executor failed after {attempts} attempts: {explanation}")]
    ExecutorFailed { attempts: u32, explanation: String },

    #[error(transparent)]
    Session(#[from] session::SessionError),

    #[error(transparent)]
    Embed(#[from] embedding::EmbedError),

    #[error(transparent)]
    Promotion(#[from] promotion::PromotionError),
}

impl RetrieverError {
    /// The pipeline stage a failure names in user-visible explanations.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InputInvalid(_) => "parse",
            Self::Timeout { stage } => stage,
            Self::SnapshotFailed(_) => "snapshot",
            Self::NotFound(_) | Self::Ambiguous { .. } => "rank",
            Self::Rejected(_) => "verify",
            Self::ExecutorFailed { .. } => "execute",
            Self::Session(_) => "index",
            Self::Embed(_) => "embed",
            Self::Promotion(_) => "promotion",
        }
    }

    /// Stable single-line reason code, `stage: detail`.
    pub fn explanation(&self) -> String {
        format!("{}: {self}", self.stage())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explanations_name_the_stage() {
        let err = RetrieverError::NotFound("no candidates above threshold".into());
        assert!(err.explanation().starts_with("rank: "));

        let err = RetrieverError::Timeout { stage: "snapshot" };
        assert!(err.explanation().starts_with("snapshot: "));
    }
}
