//! Model artifact resolution.
//!
//! Artifacts live under a models root, one subdirectory per embedder role
//! (`query/`, `element/`), each holding `model.onnx` and
//! `tokenizer.json`. The root comes from `HER_MODELS_DIR`, then the
//! user's home, then the working directory.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::EmbedError;

/// Resolved on-disk artifact pair for one embedder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAssets {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
}

/// The models root directory: `HER_MODELS_DIR`, else `~/.her/models`,
/// else `./models`.
pub fn models_root() -> PathBuf {
    if let Ok(dir) = std::env::var("HER_MODELS_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".her").join("models");
    }
    PathBuf::from("./models")
}

/// Locate the artifact pair for a role under the given root.
///
/// # Errors
///
/// [`EmbedError::MissingAssets`] when either file is absent; callers
/// decide whether that downgrades to the hash fallback or fails.
pub fn resolve_assets(root: &Path, role: &str) -> Result<ModelAssets, EmbedError> {
    let dir = root.join(role);
    let model_path = dir.join("model.onnx");
    let tokenizer_path = dir.join("tokenizer.json");

    let missing = [&model_path, &tokenizer_path]
        .iter()
        .filter(|p| !p.exists())
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>();

    if !missing.is_empty() {
        return Err(EmbedError::MissingAssets {
            root: root.display().to_string(),
            detail: missing.join(", "),
        });
    }

    debug!(role, model = %model_path.display(), "resolved embedder assets");
    Ok(ModelAssets {
        model_path,
        tokenizer_path,
    })
}
