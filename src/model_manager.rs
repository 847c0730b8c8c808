use std::path::{Path, PathBuf};

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use serde::Deserialize;
use tokenizers::{
    PaddingParams,
    PaddingStrategy,
    Tokenizer,
    TruncationParams,
};

use crate::error::{Error, Result};

/// Discriminator persisted in the index metadata for this backend.
pub const SENTENCE_BACKEND: &str = "sentence-transformers";
pub const DEFAULT_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const MODEL_ENV_VAR: &str = "ARXIV_BRAIN_MODEL";

const MODEL_ORG: &str = "sentence-transformers";
/// Token limit when the model ships no `sentence_bert_config.json`.
const DEFAULT_MAX_SEQUENCE_TOKENS: usize = 512;
const SENTENCE_CONFIG_FILE: &str = "sentence_bert_config.json";
const ENCODE_BATCH_SIZE: usize = 32;

/// Select the best available compute device.
///
/// Uses CUDA when compiled with the `cuda` feature, Metal when compiled with
/// the `metal` feature, and falls back to CPU otherwise.
fn default_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            return device;
        }
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            return device;
        }
    }

    Device::Cpu
}

/// Normalize a model identifier.
///
/// Local directories are kept as-is. Bare names such as `all-MiniLM-L6-v2`
/// are resolved under the `sentence-transformers` organisation.
///
/// # Examples
///
/// ```
/// use arxiv_brain::model_manager::resolve_model_id;
///
/// assert_eq!(
///     resolve_model_id("all-MiniLM-L6-v2"),
///     "sentence-transformers/all-MiniLM-L6-v2"
/// );
/// assert_eq!(resolve_model_id("BAAI/bge-small-en-v1.5"), "BAAI/bge-small-en-v1.5");
/// ```
pub fn resolve_model_id(model_id: &str) -> String {
    if model_id.contains('/') || Path::new(model_id).is_dir() {
        model_id.to_string()
    } else {
        format!("{MODEL_ORG}/{model_id}")
    }
}

/// Model id from `ARXIV_BRAIN_MODEL`, falling back to `configured`.
pub fn model_id_from_env(configured: &str) -> String {
    std::env::var(MODEL_ENV_VAR)
        .ok()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| configured.to_string())
}

#[derive(Debug, Deserialize)]
struct ModelDims {
    hidden_size: usize,
}

#[derive(Debug, Deserialize)]
struct SentenceConfig {
    max_seq_length: Option<usize>,
}

struct ModelFiles {
    config: PathBuf,
    tokenizer: PathBuf,
    weights: PathBuf,
    sentence_config: Option<PathBuf>,
}

/// Truncation length from `sentence_bert_config.json`, if present and valid.
fn max_sequence_tokens(sentence_config: Option<&Path>) -> usize {
    sentence_config
        .and_then(|path| std::fs::read_to_string(path).ok())
        .and_then(|json| serde_json::from_str::<SentenceConfig>(&json).ok())
        .and_then(|config| config.max_seq_length)
        .filter(|&limit| limit > 0)
        .unwrap_or(DEFAULT_MAX_SEQUENCE_TOKENS)
}

fn locate_files(model_id: &str) -> Result<ModelFiles> {
    let local = Path::new(model_id);
    if local.is_dir() {
        return Ok(ModelFiles {
            config: local.join("config.json"),
            tokenizer: local.join("tokenizer.json"),
            weights: local.join("model.safetensors"),
            sentence_config: Some(local.join(SENTENCE_CONFIG_FILE))
                .filter(|path| path.is_file()),
        });
    }

    let hub_err = |e: hf_hub::api::sync::ApiError| Error::Embedding(e.to_string());
    let api = hf_hub::api::sync::Api::new().map_err(hub_err)?;
    let repo = api.model(model_id.to_string());
    Ok(ModelFiles {
        config: repo.get("config.json").map_err(hub_err)?,
        tokenizer: repo.get("tokenizer.json").map_err(hub_err)?,
        weights: repo.get("model.safetensors").map_err(hub_err)?,
        sentence_config: repo.get(SENTENCE_CONFIG_FILE).ok(),
    })
}

/// Pretrained sentence-embedding backend: a BERT encoder with mean pooling
/// and L2-normalized output.
pub struct SentenceEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    model_id: String,
    dim: usize,
}

impl std::fmt::Debug for SentenceEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentenceEmbedder")
            .field("model_id", &self.model_id)
            .field("dim", &self.dim)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl SentenceEmbedder {
    /// Load a model from a local directory or the Hugging Face hub cache,
    /// downloading it if needed.
    ///
    /// Every failure is reported as [`Error::BackendUnavailable`].
    pub fn load(model_id: &str) -> Result<Self> {
        let model_id = resolve_model_id(model_id);
        tracing::debug!(model = %model_id, "loading embedding model");

        Self::load_inner(&model_id).map_err(|e| Error::BackendUnavailable {
            model: model_id.clone(),
            reason: e.to_string(),
        })
    }

    fn load_inner(model_id: &str) -> Result<Self> {
        let files = locate_files(model_id)?;

        let config_json = std::fs::read_to_string(&files.config)?;
        let dims: ModelDims = serde_json::from_str(&config_json)?;
        let config: Config = serde_json::from_str(&config_json)?;

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| Error::Embedding(format!("tokenizer: {e}")))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_sequence_tokens(files.sentence_config.as_deref()),
                ..Default::default()
            }))
            .map_err(|e| Error::Embedding(format!("tokenizer: {e}")))?;

        let device = default_device();
        // SAFETY: the weights file is memory-mapped read-only and is not
        // modified while the model is alive.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights], DTYPE, &device)?
        };
        let model = BertModel::load(vb, &config)?;

        Ok(Self {
            model,
            tokenizer,
            device,
            model_id: model_id.to_string(),
            dim: dims.hidden_size,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Encode texts into unit-length sentence embeddings.
    pub fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(ENCODE_BATCH_SIZE) {
            vectors.extend(self.encode_batch(batch)?);
        }
        Ok(vectors)
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| Error::Embedding(format!("tokenization failed: {e}")))?;

        let mut ids = Vec::with_capacity(encodings.len());
        let mut masks = Vec::with_capacity(encodings.len());
        for encoding in &encodings {
            ids.push(Tensor::new(encoding.get_ids(), &self.device)?);
            masks.push(Tensor::new(encoding.get_attention_mask(), &self.device)?);
        }

        let input_ids = Tensor::stack(&ids, 0)?;
        let attention_mask = Tensor::stack(&masks, 0)?;
        let token_type_ids = input_ids.zeros_like()?;

        // [batch, tokens, hidden]
        let hidden = self.model.forward(
            &input_ids,
            &token_type_ids,
            Some(&attention_mask),
        )?;

        let mask = attention_mask.to_dtype(DTYPE)?.unsqueeze(2)?;
        let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?.maximum(1e-9)?;
        let pooled = summed.broadcast_div(&counts)?;

        let norms = pooled.sqr()?.sum_keepdim(1)?.sqrt()?.maximum(1e-12)?;
        let normalized = pooled.broadcast_div(&norms)?;

        Ok(normalized.to_vec2::<f32>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_model_names_get_org_prefix() {
        assert_eq!(resolve_model_id("all-MiniLM-L6-v2"), DEFAULT_MODEL_ID);
        assert_eq!(resolve_model_id(DEFAULT_MODEL_ID), DEFAULT_MODEL_ID);
    }

    #[test]
    fn local_directory_id_is_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let id = tmp.path().to_string_lossy().to_string();
        assert_eq!(resolve_model_id(&id), id);
    }

    #[test]
    fn loading_incomplete_local_model_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let id = tmp.path().to_string_lossy().to_string();

        match SentenceEmbedder::load(&id) {
            Err(Error::BackendUnavailable { model, .. }) => assert_eq!(model, id),
            other => panic!("expected BackendUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn loading_bad_config_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("config.json"), "not json").unwrap();
        let id = tmp.path().to_string_lossy().to_string();

        assert!(matches!(
            SentenceEmbedder::load(&id),
            Err(Error::BackendUnavailable { .. })
        ));
    }

    #[test]
    fn sequence_limit_comes_from_sentence_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(SENTENCE_CONFIG_FILE);
        std::fs::write(&path, r#"{"max_seq_length": 256, "do_lower_case": false}"#).unwrap();
        assert_eq!(max_sequence_tokens(Some(&path)), 256);

        std::fs::write(&path, r#"{"do_lower_case": false}"#).unwrap();
        assert_eq!(max_sequence_tokens(Some(&path)), DEFAULT_MAX_SEQUENCE_TOKENS);

        std::fs::write(&path, "not json").unwrap();
        assert_eq!(max_sequence_tokens(Some(&path)), DEFAULT_MAX_SEQUENCE_TOKENS);
        assert_eq!(max_sequence_tokens(None), DEFAULT_MAX_SEQUENCE_TOKENS);
    }
}
