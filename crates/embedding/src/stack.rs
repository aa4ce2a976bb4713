//! The query/element embedder pair with fallback resolution.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::assets::resolve_assets;
use crate::error::EmbedError;
use crate::hashed::HashEmbedder;
use crate::onnx::OnnxEmbedder;
use crate::{ELEMENT_DIM, Embedder, QUERY_DIM};

/// The two embedders the pipeline needs, resolved together. Query and
/// element models may differ in dimension; downstream cosine truncates
/// to the common prefix.
#[derive(Clone)]
pub struct EmbedderStack {
    query: Arc<dyn Embedder>,
    element: Arc<dyn Embedder>,
    fallback_engaged: bool,
}

impl EmbedderStack {
    /// Resolve ONNX artifacts under `models_root`, degrading to the hash
    /// embedder per missing role when `allow_hash_fallback` is set.
    ///
    /// # Errors
    ///
    /// [`EmbedError::MissingAssets`] when artifacts are missing and the
    /// fallback is not permitted.
    pub fn resolve(models_root: &Path, allow_hash_fallback: bool) -> Result<Self, EmbedError> {
        Self::resolve_with_batch(models_root, allow_hash_fallback, 32)
    }

    /// [`resolve`](Self::resolve) with an explicit internal batch size
    /// for the ONNX embedders.
    pub fn resolve_with_batch(
        models_root: &Path,
        allow_hash_fallback: bool,
        batch_size: usize,
    ) -> Result<Self, EmbedError> {
        let mut fallback_engaged = false;

        let query: Arc<dyn Embedder> = match resolve_assets(models_root, "query") {
            Ok(assets) => {
                info!(model = %assets.model_path.display(), "query embedder: ONNX");
                Arc::new(
                    OnnxEmbedder::new(assets, "query-onnx", QUERY_DIM).with_batch_size(batch_size),
                )
            }
            Err(err) if allow_hash_fallback => {
                warn!(%err, "query embedder unavailable, falling back to deterministic hash");
                fallback_engaged = true;
                Arc::new(HashEmbedder::for_queries())
            }
            Err(err) => return Err(err),
        };

        let element: Arc<dyn Embedder> = match resolve_assets(models_root, "element") {
            Ok(assets) => {
                info!(model = %assets.model_path.display(), "element embedder: ONNX");
                Arc::new(
                    OnnxEmbedder::new(assets, "element-onnx", ELEMENT_DIM)
                        .with_batch_size(batch_size),
                )
            }
            Err(err) if allow_hash_fallback => {
                warn!(%err, "element embedder unavailable, falling back to deterministic hash");
                fallback_engaged = true;
                Arc::new(HashEmbedder::for_elements())
            }
            Err(err) => return Err(err),
        };

        Ok(Self {
            query,
            element,
            fallback_engaged,
        })
    }

    /// Both sides deterministic. The reproducible configuration tests and
    /// cold environments run on.
    pub fn deterministic() -> Self {
        Self {
            query: Arc::new(HashEmbedder::for_queries()),
            element: Arc::new(HashEmbedder::for_elements()),
            fallback_engaged: false,
        }
    }

    pub fn query(&self) -> &dyn Embedder {
        self.query.as_ref()
    }

    pub fn element(&self) -> &dyn Embedder {
        self.element.as_ref()
    }

    /// Whether any role fell back to the hash embedder during resolution.
    pub fn fallback_engaged(&self) -> bool {
        self.fallback_engaged
    }
}
