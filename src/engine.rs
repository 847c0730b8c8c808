use std::{collections::BTreeMap, path::PathBuf};

use serde::Serialize;

use crate::{
    config::Settings,
    embedding::{BackendPreference, EmbeddingBackend},
    error::Result,
    hash_embedder::HashEmbedder,
    ingestion::{self, BuildReport},
    model_manager::SentenceEmbedder,
    search::{self, QueryParams, SearchHit},
    store::{self, IndexMetadata, IndexReader},
    walker::SourceTag,
};

/// Owns resolved settings and the build-time embedding backend.
///
/// The build backend is chosen on first use and kept for the life of the
/// engine, so a failed model load is attempted (and warned about) once.
/// Queries always reconstruct the backend recorded in the index instead.
#[derive(Debug)]
pub struct SearchEngine {
    settings: Settings,
    build_backend: Option<EmbeddingBackend>,
}

/// Snapshot of the on-disk index for `status`.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub root: PathBuf,
    pub store_path: PathBuf,
    pub exists: bool,
    pub metadata: IndexMetadata,
    pub chunks: usize,
    pub chunks_by_source: BTreeMap<SourceTag, usize>,
    pub documents: usize,
}

fn select_build_backend(settings: &Settings) -> EmbeddingBackend {
    let hash = || EmbeddingBackend::Hash(HashEmbedder::new(settings.hash_dim));
    match settings.backend {
        BackendPreference::Hash => hash(),
        BackendPreference::Auto => match SentenceEmbedder::load(&settings.model_id) {
            Ok(model) => {
                tracing::info!(model = %model.model_id(), dim = model.dim(), "using pretrained embeddings");
                EmbeddingBackend::Sentence(model)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "pretrained embeddings unavailable, falling back to hash embeddings"
                );
                hash()
            }
        },
    }
}

impl SearchEngine {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            build_backend: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The backend used for index builds, loading it on first call.
    pub fn build_backend(&mut self) -> &EmbeddingBackend {
        let settings = &self.settings;
        self.build_backend
            .get_or_insert_with(|| select_build_backend(settings))
    }

    /// Rebuild the index from scratch.
    pub fn rebuild(&mut self) -> Result<BuildReport> {
        ingestion::rebuild_index(self)
    }

    pub fn query(&self, params: &QueryParams) -> Result<Vec<SearchHit>> {
        search::query_index(&self.settings, params)
    }

    pub fn status(&self) -> Result<IndexStatus> {
        let mut status = IndexStatus {
            root: self.settings.root.clone(),
            store_path: self.settings.store_path.clone(),
            exists: self.settings.store_path.is_file(),
            metadata: IndexMetadata::default(),
            chunks: 0,
            chunks_by_source: SourceTag::ALL.iter().map(|&t| (t, 0)).collect(),
            documents: 0,
        };
        if !status.exists {
            return Ok(status);
        }

        status.metadata = store::load_metadata(&self.settings.store_path);
        let records = IndexReader::open(&self.settings.store_path)?.scan()?;
        status.chunks = records.len();
        // chunk_index 0 marks the first chunk of each document
        status.documents = records.iter().filter(|r| r.chunk_index == 0).count();
        for record in &records {
            *status.chunks_by_source.entry(record.source).or_default() += 1;
        }
        Ok(status)
    }
}
