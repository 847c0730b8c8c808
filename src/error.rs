use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database open error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("tensor computation error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(
        "knowledge root not found: {0} (set `arxiv_root` in the config file or pass --root)"
    )]
    RootNotFound(PathBuf),

    #[error("index not found at {0}. Run: arxiv-brain index")]
    IndexMissing(PathBuf),

    #[error("could not load embedding model '{model}': {reason}")]
    BackendUnavailable { model: String, reason: String },

    #[error(
        "index was built with the sentence-transformers model '{model}', which could not be loaded ({reason}). \
         Make the model available (network access or a populated Hugging Face cache) and retry"
    )]
    IndexBackendUnavailable { model: String, reason: String },

    #[error("unknown embedding backend: {0}. Rebuild index: arxiv-brain index")]
    UnknownBackend(String),

    #[error(
        "index vector dimension mismatch (index: {index}, backend: {backend}). Rebuild index: arxiv-brain index"
    )]
    DimensionMismatch { index: usize, backend: usize },

    #[error("query is empty after tokenization")]
    EmptyQuery,

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("corrupt index: {0}")]
    CorruptIndex(String),
}
