//! Local ONNX inference embedder.
//!
//! Sessions and tokenizers are expensive to build, so they are cached
//! per-thread keyed by artifact paths; the [`OnnxEmbedder`] itself holds
//! only configuration and is freely shareable across threads.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use once_cell::sync::OnceCell;
use onnxruntime::environment::Environment;
use onnxruntime::ndarray::{Array, Array2};
use onnxruntime::session::Session;
use tokenizers::Tokenizer;

use crate::assets::ModelAssets;
use crate::error::EmbedError;
use crate::normalize::l2_normalize_in_place;
use crate::Embedder;

static ORT_ENV: OnceCell<Environment> = OnceCell::new();

thread_local! {
    static MODEL_CACHE: RefCell<HashMap<ModelCacheKey, Rc<CachedModel>>> =
        RefCell::new(HashMap::new());
}

#[derive(Hash, PartialEq, Eq, Clone)]
struct ModelCacheKey {
    model_path: PathBuf,
    tokenizer_path: PathBuf,
}

struct CachedModel {
    tokenizer: Tokenizer,
    session: RefCell<Session<'static>>,
}

impl CachedModel {
    fn load(assets: &ModelAssets) -> Result<Self, EmbedError> {
        let tokenizer = Tokenizer::from_file(&assets.tokenizer_path)
            .map_err(|e| EmbedError::Inference(e.to_string()))?;

        let env = ort_environment()?;
        let session = env
            .new_session_builder()
            .map_err(|e| EmbedError::Inference(e.to_string()))?
            .with_model_from_file(assets.model_path.clone())
            .map_err(|e| EmbedError::Inference(e.to_string()))?;

        Ok(Self {
            tokenizer,
            session: RefCell::new(session),
        })
    }
}

fn ort_environment() -> Result<&'static Environment, EmbedError> {
    ORT_ENV.get_or_try_init(|| {
        Environment::builder()
            .with_name("her-embedding")
            .build()
            .map_err(|e| EmbedError::Inference(e.to_string()))
    })
}

fn get_or_load_model(assets: &ModelAssets) -> Result<Rc<CachedModel>, EmbedError> {
    let key = ModelCacheKey {
        model_path: assets.model_path.clone(),
        tokenizer_path: assets.tokenizer_path.clone(),
    };

    MODEL_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if let Some(handle) = cache.get(&key) {
            return Ok(handle.clone());
        }
        let handle = Rc::new(CachedModel::load(assets)?);
        cache.insert(key, handle.clone());
        Ok(handle)
    })
}

/// Embedder backed by a local ONNX model.
#[derive(Debug, Clone)]
pub struct OnnxEmbedder {
    assets: ModelAssets,
    name: String,
    dim: usize,
    max_sequence_length: usize,
    batch_size: usize,
}

impl OnnxEmbedder {
    /// Build an embedder over resolved assets. `dim` is the model's
    /// hidden size; output rows longer than it are mean-pooled down.
    pub fn new(assets: ModelAssets, name: impl Into<String>, dim: usize) -> Self {
        Self {
            assets,
            name: name.into(),
            dim,
            max_sequence_length: 512,
            batch_size: 32,
        }
    }

    pub fn with_max_sequence_length(mut self, len: usize) -> Self {
        self.max_sequence_length = len.max(1);
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    fn run_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let handle = get_or_load_model(&self.assets)?;
        let (encoded, max_len) =
            encode_documents(&handle.tokenizer, texts, self.max_sequence_length)?;
        let (input_ids, attn_mask) = build_padded_arrays(encoded, max_len)?;
        let rows = execute_session(&handle.session, input_ids, attn_mask)?;
        rows.into_iter().map(|row| self.pool_row(row)).collect()
    }

    /// Reduce one flat output row to `dim` values. Models that emit
    /// `[seq, hidden]` flattened get mean-pooled over the sequence axis;
    /// already-pooled outputs pass through.
    fn pool_row(&self, row: Vec<f32>) -> Result<Vec<f32>, EmbedError> {
        let mut v = if row.len() <= self.dim || !row.len().is_multiple_of(self.dim) {
            let mut v = row;
            v.truncate(self.dim);
            v.resize(self.dim, 0.0);
            v
        } else {
            let steps = row.len() / self.dim;
            let mut pooled = vec![0.0f32; self.dim];
            for step in 0..steps {
                let base = step * self.dim;
                for (i, slot) in pooled.iter_mut().enumerate() {
                    *slot += row[base + i];
                }
            }
            let inv = 1.0 / steps as f32;
            for slot in &mut pooled {
                *slot *= inv;
            }
            pooled
        };
        l2_normalize_in_place(&mut v);
        Ok(v)
    }
}

impl Embedder for OnnxEmbedder {
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
        let mut rows = self.run_batch(&[text])?;
        rows.pop()
            .ok_or_else(|| EmbedError::Inference("model returned no outputs".into()))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut out = Vec::with_capacity(texts.len());
        // Empty inputs short-circuit to zero vectors and are stitched back
        // into position afterwards.
        let mut live: Vec<(usize, &str)> = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            out.push(vec![0.0; self.dim]);
            if !text.trim().is_empty() {
                live.push((i, text.as_str()));
            }
        }
        for chunk in live.chunks(self.batch_size) {
            let batch: Vec<&str> = chunk.iter().map(|(_, t)| *t).collect();
            let rows = self.run_batch(&batch)?;
            for ((slot, _), row) in chunk.iter().zip(rows) {
                out[*slot] = row;
            }
        }
        Ok(out)
    }
}

struct EncodedDoc {
    ids: Vec<i64>,
    mask: Vec<i64>,
}

fn encode_documents(
    tokenizer: &Tokenizer,
    texts: &[&str],
    max_sequence_length: usize,
) -> Result<(Vec<EncodedDoc>, usize), EmbedError> {
    let mut encoded = Vec::with_capacity(texts.len());
    let mut max_len = 0usize;

    for text in texts {
        let encoding = tokenizer
            .encode(*text, true)
            .map_err(|e| EmbedError::Inference(e.to_string()))?;
        let ids: Vec<i64> = encoding.get_ids().iter().map(|&x| x as i64).collect();
        let mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&x| x as i64)
            .collect();
        max_len = max_len.max(ids.len());
        encoded.push(EncodedDoc { ids, mask });
    }

    max_len = max_len.min(max_sequence_length);
    for doc in &mut encoded {
        if doc.ids.len() > max_sequence_length {
            doc.ids.truncate(max_sequence_length);
            doc.mask.truncate(max_sequence_length);
        }
    }

    Ok((encoded, max_len))
}

fn build_padded_arrays(
    encoded: Vec<EncodedDoc>,
    max_len: usize,
) -> Result<(Array2<i64>, Array2<i64>), EmbedError> {
    let seq_len = max_len.max(1);
    let batch = encoded.len();
    let mut id_storage = Vec::with_capacity(batch * seq_len);
    let mut mask_storage = Vec::with_capacity(batch * seq_len);

    for EncodedDoc { ids, mask } in encoded {
        if ids.len() != mask.len() {
            return Err(EmbedError::Inference(
                "tokenizer produced mismatched id/mask lengths".into(),
            ));
        }
        let pad = seq_len.saturating_sub(ids.len());
        id_storage.extend(ids);
        mask_storage.extend(mask);
        if pad > 0 {
            id_storage.extend(std::iter::repeat_n(0, pad));
            mask_storage.extend(std::iter::repeat_n(0, pad));
        }
    }

    let input_ids = Array::from_shape_vec((batch, seq_len), id_storage)
        .map_err(|e| EmbedError::Inference(e.to_string()))?;
    let attn_mask = Array::from_shape_vec((batch, seq_len), mask_storage)
        .map_err(|e| EmbedError::Inference(e.to_string()))?;
    Ok((input_ids, attn_mask))
}

fn execute_session(
    session: &RefCell<Session<'static>>,
    input_ids: Array2<i64>,
    attn_mask: Array2<i64>,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    let (batch, seq_len) = input_ids.dim();
    let mut guard = session.borrow_mut();
    let session_ref = &mut *guard;
    let mut runtime_inputs = Vec::with_capacity(session_ref.inputs.len());
    let mut input_ids_tensor = Some(input_ids);
    let mut attn_mask_tensor = Some(attn_mask);

    for input in &session_ref.inputs {
        match input.name.as_str() {
            "input_ids" => {
                let tensor = input_ids_tensor.take().ok_or_else(|| {
                    EmbedError::InvalidConfig("model requested `input_ids` multiple times".into())
                })?;
                runtime_inputs.push(tensor.into_dyn());
            }
            "attention_mask" => {
                let tensor = attn_mask_tensor.take().ok_or_else(|| {
                    EmbedError::InvalidConfig(
                        "model requested `attention_mask` multiple times".into(),
                    )
                })?;
                runtime_inputs.push(tensor.into_dyn());
            }
            "token_type_ids" => {
                let tensor = Array::from_elem((batch, seq_len), 0_i64);
                runtime_inputs.push(tensor.into_dyn());
            }
            other => {
                return Err(EmbedError::Inference(format!(
                    "unsupported model input '{other}'"
                )));
            }
        }
    }

    if runtime_inputs.is_empty() {
        return Err(EmbedError::Inference(
            "model did not declare any inputs".into(),
        ));
    }

    let outputs = session_ref
        .run::<i64, f32, _>(runtime_inputs)
        .map_err(|e| EmbedError::Inference(e.to_string()))?;
    let output_tensor = outputs
        .into_iter()
        .next()
        .ok_or_else(|| EmbedError::Inference("model returned no outputs".into()))?;

    let flat: Vec<f32> = output_tensor.iter().copied().collect();
    if batch == 0 {
        return Ok(Vec::new());
    }
    if flat.is_empty() {
        return Ok(vec![Vec::new(); batch]);
    }
    if !flat.len().is_multiple_of(batch) {
        return Err(EmbedError::Inference(format!(
            "model output shape {}/{} is not divisible",
            flat.len(),
            batch
        )));
    }

    let chunk = flat.len() / batch;
    let mut vectors = Vec::with_capacity(batch);
    for slice in flat.chunks(chunk) {
        vectors.push(slice.to_vec());
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder(dim: usize) -> OnnxEmbedder {
        OnnxEmbedder::new(
            ModelAssets {
                model_path: "/nonexistent/model.onnx".into(),
                tokenizer_path: "/nonexistent/tokenizer.json".into(),
            },
            "test",
            dim,
        )
    }

    #[test]
    fn pool_row_mean_pools_sequence_outputs() {
        let e = embedder(2);
        // Two sequence steps of hidden size 2: [1,3] and [3,5] → mean [2,4].
        let pooled = e.pool_row(vec![1.0, 3.0, 3.0, 5.0]).unwrap();
        // Normalized afterwards, so compare directions.
        let expected_ratio = 2.0 / 4.0;
        assert!((pooled[0] / pooled[1] - expected_ratio).abs() < 1e-6);
    }

    #[test]
    fn pool_row_pads_short_outputs() {
        let e = embedder(4);
        let pooled = e.pool_row(vec![1.0, 1.0]).unwrap();
        assert_eq!(pooled.len(), 4);
        assert_eq!(pooled[2], 0.0);
    }

    #[test]
    fn empty_text_skips_the_model_entirely() {
        // The assets point nowhere; an empty input must still succeed.
        let v = embedder(8).embed("   ").unwrap();
        assert_eq!(v, vec![0.0; 8]);
    }
}
