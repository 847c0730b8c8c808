//! arxiv-brain - local semantic search over an arXiv research knowledge base.
//!
//! arxiv-brain walks a `<root>/<category>/<project>/` tree, splits each
//! project's `SUMMARY.md`, `info.yaml` and playground code into overlapping
//! chunks, embeds them, and stores everything in a single
//! [redb](https://github.com/cberner/redb) file. Queries are embedded with
//! the backend recorded in the index and ranked by dot product.
//!
//! Two embedding backends are available: a pretrained BERT sentence encoder
//! run with [candle](https://github.com/huggingface/candle), and a
//! dependency-free feature-hashing fallback.
//!
//! # Quick start
//!
//! ```no_run
//! use arxiv_brain::{BackendPreference, SearchEngine, Settings};
//! use arxiv_brain::search::{self, QueryParams};
//!
//! let settings = Settings::new("/home/me/knowledge/arxiv")
//!     .with_backend(BackendPreference::Hash);
//! let mut engine = SearchEngine::new(settings);
//!
//! let report = engine.rebuild().unwrap();
//! println!("indexed {} chunks", report.chunks);
//!
//! let hits = engine.query(&QueryParams::new("rotary position embeddings")).unwrap();
//! print!("{}", search::format_human(&hits));
//! ```

pub mod chunking;
pub mod config;
pub mod data_dir;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod hash_embedder;
pub mod ingestion;
pub mod model_manager;
pub mod search;
pub mod store;
pub mod text_util;
pub mod walker;

pub use config::{ConfigFile, Settings};
pub use data_dir::DataDir;
pub use embedding::{BackendPreference, EmbeddingBackend};
pub use engine::SearchEngine;
pub use error::{Error, Result};
pub use store::{IndexReader, IndexStore};
