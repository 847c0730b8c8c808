use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    hash_embedder::{HASH_BACKEND, HashEmbedder},
    model_manager::{DEFAULT_MODEL_ID, SENTENCE_BACKEND, SentenceEmbedder},
    store::IndexMetadata,
};

/// Which backend an index build should use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Try the pretrained model, fall back to hashing if it cannot load.
    #[default]
    Auto,
    /// Always use the hashing backend.
    Hash,
}

/// An embedding backend. Every variant maps a batch of texts to one vector
/// per text, each of length [`dim`](Self::dim).
#[derive(Debug)]
pub enum EmbeddingBackend {
    Hash(HashEmbedder),
    Sentence(SentenceEmbedder),
}

impl EmbeddingBackend {
    /// Discriminator persisted as `embedding_backend`.
    pub fn name(&self) -> &'static str {
        match self {
            EmbeddingBackend::Hash(_) => HASH_BACKEND,
            EmbeddingBackend::Sentence(_) => SENTENCE_BACKEND,
        }
    }

    pub fn dim(&self) -> usize {
        match self {
            EmbeddingBackend::Hash(h) => h.dim(),
            EmbeddingBackend::Sentence(s) => s.dim(),
        }
    }

    /// Pretrained model identifier, persisted as `embedding_model`.
    pub fn model_id(&self) -> Option<&str> {
        match self {
            EmbeddingBackend::Hash(_) => None,
            EmbeddingBackend::Sentence(s) => Some(s.model_id()),
        }
    }

    pub fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self {
            EmbeddingBackend::Hash(h) => Ok(h.encode(texts)),
            EmbeddingBackend::Sentence(s) => s.encode(texts),
        }
    }

    /// Reconstruct the backend an index was built with.
    ///
    /// Follows the persisted `embedding_backend` only. The hash variant is
    /// built with the configured `hash_dim`, so a changed dimension shows up
    /// as a mismatch against `vector_dim`. An index built with the
    /// pretrained model never falls back to hashing: if the model cannot be
    /// loaded this fails with [`Error::IndexBackendUnavailable`].
    pub fn for_query(metadata: &IndexMetadata, hash_dim: usize) -> Result<Self> {
        match metadata.backend_name() {
            None | Some(HASH_BACKEND) => {
                Ok(EmbeddingBackend::Hash(HashEmbedder::new(hash_dim)))
            }
            Some(SENTENCE_BACKEND) => {
                let model = metadata.model_id().unwrap_or(DEFAULT_MODEL_ID);
                SentenceEmbedder::load(model)
                    .map(EmbeddingBackend::Sentence)
                    .map_err(|e| match e {
                        Error::BackendUnavailable { model, reason } => {
                            Error::IndexBackendUnavailable { model, reason }
                        }
                        other => other,
                    })
            }
            Some(other) => Err(Error::UnknownBackend(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{META_EMBEDDING_BACKEND, META_EMBEDDING_MODEL, META_VECTOR_DIM};

    #[test]
    fn missing_backend_means_hash() {
        let backend = EmbeddingBackend::for_query(&IndexMetadata::default(), 256).unwrap();
        assert_eq!(backend.name(), HASH_BACKEND);
        assert_eq!(backend.dim(), 256);
        assert_eq!(backend.model_id(), None);
    }

    #[test]
    fn hash_backend_uses_configured_dim() {
        let mut meta = IndexMetadata::default();
        meta.insert(META_EMBEDDING_BACKEND, HASH_BACKEND.to_string());
        meta.insert(META_VECTOR_DIM, "64".to_string());

        let backend = EmbeddingBackend::for_query(&meta, 128).unwrap();
        assert_eq!(backend.dim(), 128);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let mut meta = IndexMetadata::default();
        meta.insert(META_EMBEDDING_BACKEND, "word2vec".to_string());

        assert!(matches!(
            EmbeddingBackend::for_query(&meta, 256),
            Err(Error::UnknownBackend(name)) if name == "word2vec"
        ));
    }

    #[test]
    fn unloadable_model_never_falls_back_to_hash() {
        let tmp = tempfile::tempdir().unwrap();
        let mut meta = IndexMetadata::default();
        meta.insert(META_EMBEDDING_BACKEND, SENTENCE_BACKEND.to_string());
        meta.insert(
            META_EMBEDDING_MODEL,
            tmp.path().to_string_lossy().to_string(),
        );

        assert!(matches!(
            EmbeddingBackend::for_query(&meta, 256),
            Err(Error::IndexBackendUnavailable { .. })
        ));
    }

    #[test]
    fn hash_encode_shapes() {
        let backend = EmbeddingBackend::Hash(HashEmbedder::new(16));
        let vectors = backend
            .encode(&["alpha beta".to_string(), "gamma".to_string()])
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|v| v.len() == 16));
    }

    #[test]
    fn preference_parses_lowercase() {
        let pref: BackendPreference = serde_json::from_str("\"hash\"").unwrap();
        assert_eq!(pref, BackendPreference::Hash);
        let pref: BackendPreference = serde_json::from_str("\"auto\"").unwrap();
        assert_eq!(pref, BackendPreference::Auto);
        assert!(serde_json::from_str::<BackendPreference>("\"bert\"").is_err());
    }
}
