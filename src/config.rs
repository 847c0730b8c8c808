//! User configuration.
//!
//! Settings come from a JSON file shared with the other research tooling.
//! Only `arxiv_root` and the `brain` object are read; other keys are
//! ignored. Every field is optional.
//!
//! ```json
//! {
//!   "arxiv_root": "~/knowledge/arxiv",
//!   "brain": {
//!     "chunk_chars": 1200,
//!     "chunk_overlap": 200,
//!     "hash_dim": 256,
//!     "embedding_model": "sentence-transformers/all-MiniLM-L6-v2",
//!     "embedding_backend": "auto",
//!     "code_globs": ["*.py"]
//!   }
//! }
//! ```

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::{
    chunking::{ChunkingConfig, DEFAULT_CHUNK_CHARS, DEFAULT_CHUNK_OVERLAP},
    data_dir::{DataDir, home_dir},
    embedding::BackendPreference,
    error::{Error, Result},
    hash_embedder::DEFAULT_HASH_DIM,
    model_manager::{DEFAULT_MODEL_ID, model_id_from_env},
};

const CONFIG_FILE_NAME: &str = "config.json";
const LEGACY_CONFIG_FILE: &str = ".arxiv_researcher_config.json";
const DEFAULT_CODE_GLOB: &str = "*.py";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub arxiv_root: Option<String>,
    pub brain: BrainConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrainConfig {
    pub chunk_chars: usize,
    pub chunk_overlap: usize,
    pub hash_dim: usize,
    pub embedding_model: String,
    pub embedding_backend: BackendPreference,
    pub code_globs: Vec<String>,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            chunk_chars: DEFAULT_CHUNK_CHARS,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            hash_dim: DEFAULT_HASH_DIM,
            embedding_model: DEFAULT_MODEL_ID.to_string(),
            embedding_backend: BackendPreference::Auto,
            code_globs: vec![DEFAULT_CODE_GLOB.to_string()],
        }
    }
}

/// Config file locations tried when none is given explicitly.
fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = xdg::BaseDirectories::with_prefix("arxiv-brain").get_config_home() {
        paths.push(dir.join(CONFIG_FILE_NAME));
    }
    if let Some(home) = home_dir() {
        paths.push(home.join(LEGACY_CONFIG_FILE));
    }
    paths
}

impl ConfigFile {
    /// Parse a config file.
    pub fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            Error::Config(format!("invalid config {}: {e}", path.display()))
        })
    }

    /// Load configuration.
    ///
    /// An explicit path must exist and parse. Otherwise the first existing
    /// default location is used; if it is malformed a warning is logged and
    /// defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::read(path);
        }

        let Some(path) = default_config_paths().into_iter().find(|p| p.is_file())
        else {
            return Ok(Self::default());
        };

        match Self::read(&path) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "loaded config");
                Ok(config)
            }
            Err(e) => {
                tracing::warn!(error = %e, "ignoring config file");
                Ok(Self::default())
            }
        }
    }
}

/// Resolved settings for one engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub root: PathBuf,
    pub store_path: PathBuf,
    pub chunking: ChunkingConfig,
    pub hash_dim: usize,
    pub model_id: String,
    pub backend: BackendPreference,
    pub code_globs: Vec<String>,
}

impl Settings {
    /// Default settings for a knowledge root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let data_dir = DataDir::new(root);
        let brain = BrainConfig::default();
        Self {
            root: data_dir.root().to_path_buf(),
            store_path: data_dir.store_path(),
            chunking: ChunkingConfig {
                max_chars: brain.chunk_chars,
                overlap: brain.chunk_overlap,
            },
            hash_dim: brain.hash_dim,
            model_id: brain.embedding_model,
            backend: brain.embedding_backend,
            code_globs: brain.code_globs,
        }
    }

    /// Settings from a resolved root and a config file.
    ///
    /// `ARXIV_BRAIN_MODEL` overrides the configured model.
    pub fn from_config(data_dir: &DataDir, config: &ConfigFile) -> Result<Self> {
        let brain = &config.brain;
        if brain.chunk_chars == 0 {
            return Err(Error::Config("brain.chunk_chars must be positive".into()));
        }
        if brain.hash_dim == 0 {
            return Err(Error::Config("brain.hash_dim must be positive".into()));
        }
        if brain.chunk_overlap >= brain.chunk_chars {
            tracing::warn!(
                chunk_chars = brain.chunk_chars,
                chunk_overlap = brain.chunk_overlap,
                "chunk overlap is not smaller than chunk size; chunks will not overlap"
            );
        }

        let settings = Self {
            root: data_dir.root().to_path_buf(),
            store_path: data_dir.store_path(),
            chunking: ChunkingConfig {
                max_chars: brain.chunk_chars,
                overlap: brain.chunk_overlap,
            },
            hash_dim: brain.hash_dim,
            model_id: model_id_from_env(&brain.embedding_model),
            backend: brain.embedding_backend,
            code_globs: brain.code_globs.clone(),
        };
        settings.code_matcher()?;
        Ok(settings)
    }

    pub fn with_backend(mut self, backend: BackendPreference) -> Self {
        self.backend = backend;
        self
    }

    /// File-name matcher for code files under `playground/`.
    pub fn code_matcher(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.code_globs {
            let glob = Glob::new(pattern).map_err(|e| {
                Error::Config(format!("invalid code glob {pattern:?}: {e}"))
            })?;
            builder.add(glob);
        }
        builder
            .build()
            .map_err(|e| Error::Config(format!("invalid code globs: {e}")))
    }
}
