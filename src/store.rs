use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use redb::{
    Database,
    ReadOnlyDatabase,
    ReadableDatabase,
    ReadableTable,
    TableDefinition,
    WriteTransaction,
};
use serde::Serialize;

use crate::{
    chunking::{Chunk, ChunkingConfig},
    embedding::EmbeddingBackend,
    error::{Error, Result},
    walker::SourceTag,
};

const CHUNKS: TableDefinition<u64, &[u8]> = TableDefinition::new("chunks");
const META: TableDefinition<&str, &str> = TableDefinition::new("meta");
const SEQUENCE: TableDefinition<&str, u64> = TableDefinition::new("sequence");

const CHUNK_SEQUENCE: &str = "chunk_id";

/// chunk_index, path_len, content_len, dim (u32 LE each) + source tag byte.
const HEADER_SIZE: usize = 17;

pub const META_VECTOR_DIM: &str = "vector_dim";
pub const META_CHUNK_CHARS: &str = "chunk_chars";
pub const META_CHUNK_OVERLAP: &str = "chunk_overlap";
pub const META_EMBEDDING_BACKEND: &str = "embedding_backend";
pub const META_EMBEDDING_MODEL: &str = "embedding_model";

/// A stored chunk with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub id: u64,
    pub source: SourceTag,
    pub path: PathBuf,
    pub chunk_index: usize,
    pub content: String,
    pub vector: Vec<f32>,
}

/// Serialize a chunk record value.
///
/// Binary format:
/// - 4 bytes: chunk index (u32 LE)
/// - 4 bytes: path length P (u32 LE)
/// - 4 bytes: content length C (u32 LE)
/// - 4 bytes: vector dimension D (u32 LE)
/// - 1 byte: source tag
/// - P bytes path, C bytes content (UTF-8)
/// - D * 4 bytes: f32 LE vector
fn encode_record(
    source: SourceTag,
    path: &str,
    chunk_index: usize,
    content: &str,
    vector: &[f32],
) -> Result<Vec<u8>> {
    let field = |value: usize, what: &str| {
        u32::try_from(value).map_err(|_| {
            Error::CorruptIndex(format!("{what} too large to store: {value}"))
        })
    };

    let mut bytes = Vec::with_capacity(
        HEADER_SIZE + path.len() + content.len() + std::mem::size_of_val(vector),
    );
    bytes.extend_from_slice(&field(chunk_index, "chunk index")?.to_le_bytes());
    bytes.extend_from_slice(&field(path.len(), "path")?.to_le_bytes());
    bytes.extend_from_slice(&field(content.len(), "content")?.to_le_bytes());
    bytes.extend_from_slice(&field(vector.len(), "vector")?.to_le_bytes());
    bytes.push(source.to_byte());
    bytes.extend_from_slice(path.as_bytes());
    bytes.extend_from_slice(content.as_bytes());
    bytes.extend_from_slice(bytemuck::cast_slice(vector));
    Ok(bytes)
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<usize> {
    let raw: [u8; 4] = bytes.get(offset..offset + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(raw) as usize)
}

/// Parse a chunk record value. Returns `None` for malformed bytes.
fn decode_record(id: u64, bytes: &[u8]) -> Option<ChunkRecord> {
    let chunk_index = read_u32(bytes, 0)?;
    let path_len = read_u32(bytes, 4)?;
    let content_len = read_u32(bytes, 8)?;
    let dim = read_u32(bytes, 12)?;
    let source = SourceTag::from_byte(*bytes.get(16)?)?;

    let path_end = HEADER_SIZE.checked_add(path_len)?;
    let content_end = path_end.checked_add(content_len)?;
    let vector_end = content_end.checked_add(dim.checked_mul(4)?)?;
    if bytes.len() != vector_end {
        return None;
    }

    let path = std::str::from_utf8(&bytes[HEADER_SIZE..path_end]).ok()?;
    let content = std::str::from_utf8(&bytes[path_end..content_end]).ok()?;
    let vector = bytes[content_end..]
        .chunks_exact(4)
        .map(bytemuck::pod_read_unaligned::<f32>)
        .collect();

    Some(ChunkRecord {
        id,
        source,
        path: PathBuf::from(path),
        chunk_index,
        content: content.to_string(),
        vector,
    })
}

/// Build-time key/value metadata persisted next to the chunk records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IndexMetadata {
    entries: BTreeMap<String, String>,
}

impl IndexMetadata {
    /// Metadata describing an index built with `backend` and `chunking`.
    pub fn for_build(backend: &EmbeddingBackend, chunking: &ChunkingConfig) -> Self {
        let mut meta = Self::default();
        meta.insert(META_VECTOR_DIM, backend.dim().to_string());
        meta.insert(META_CHUNK_CHARS, chunking.max_chars.to_string());
        meta.insert(META_CHUNK_OVERLAP, chunking.overlap.to_string());
        meta.insert(META_EMBEDDING_BACKEND, backend.name().to_string());
        if let Some(model) = backend.model_id() {
            meta.insert(META_EMBEDDING_MODEL, model.to_string());
        }
        meta
    }

    pub fn insert(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The declared vector dimension, if any.
    pub fn vector_dim(&self) -> Result<Option<usize>> {
        self.get(META_VECTOR_DIM)
            .map(|raw| {
                raw.trim().parse::<usize>().map_err(|_| {
                    Error::CorruptIndex(format!("invalid {META_VECTOR_DIM}: {raw:?}"))
                })
            })
            .transpose()
    }

    pub fn backend_name(&self) -> Option<&str> {
        self.get(META_EMBEDDING_BACKEND)
    }

    pub fn model_id(&self) -> Option<&str> {
        self.get(META_EMBEDDING_MODEL)
    }
}

/// The on-disk index: chunk records plus build metadata in one redb file.
pub struct IndexStore {
    db: Database,
    path: PathBuf,
}

impl IndexStore {
    /// Open or create a store at `path` for writing.
    ///
    /// # Examples
    ///
    /// ```
    /// # let tmp = tempfile::tempdir().unwrap();
    /// use arxiv_brain::{IndexStore, store::IndexReader};
    ///
    /// let path = tmp.path().join(".brain.redb");
    /// drop(IndexStore::create(&path).unwrap());
    ///
    /// let reader = IndexReader::open(&path).unwrap();
    /// assert!(reader.scan().unwrap().is_empty());
    /// assert!(reader.metadata().is_empty());
    /// ```
    pub fn create(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(CHUNKS)?;
        txn.open_table(META)?;
        txn.open_table(SEQUENCE)?;
        txn.commit()?;

        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drop every chunk record and metadata row in one committed transaction.
    ///
    /// The id sequence is kept so ids keep increasing across rebuilds.
    pub fn clear(&self) -> Result<()> {
        let txn = self.db.begin_write()?;
        txn.delete_table(CHUNKS)?;
        txn.delete_table(META)?;
        txn.open_table(CHUNKS)?;
        txn.open_table(META)?;
        txn.commit()?;
        Ok(())
    }

    /// Start populating the store. Nothing is visible until
    /// [`RebuildWriter::commit`]; dropping the writer discards everything.
    pub fn begin_rebuild(&self, metadata: &IndexMetadata) -> Result<RebuildWriter> {
        let txn = self.db.begin_write()?;
        let next_id = {
            let sequence = txn.open_table(SEQUENCE)?;
            sequence.get(CHUNK_SEQUENCE)?.map_or(0, |v| v.value())
        };
        {
            let mut meta = txn.open_table(META)?;
            for (key, value) in metadata.iter() {
                meta.insert(key, value)?;
            }
        }

        Ok(RebuildWriter {
            txn,
            next_id,
            inserted: 0,
        })
    }

    /// Overwrite a single metadata row.
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(META)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

}

/// Pending rebuild: metadata plus every inserted chunk, committed together.
pub struct RebuildWriter {
    txn: WriteTransaction,
    next_id: u64,
    inserted: usize,
}

impl RebuildWriter {
    /// Insert one record per `(chunk, vector)` pair. Returns how many
    /// records were written.
    pub fn insert_document(
        &mut self,
        source: SourceTag,
        path: &Path,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<usize> {
        let path = path.to_string_lossy();
        let mut table = self.txn.open_table(CHUNKS)?;

        let mut written = 0;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let bytes =
                encode_record(source, &path, chunk.index, &chunk.text, vector)?;
            table.insert(self.next_id, bytes.as_slice())?;
            self.next_id += 1;
            written += 1;
        }

        self.inserted += written;
        Ok(written)
    }

    /// Persist the id sequence and commit. Returns the number of records.
    pub fn commit(self) -> Result<usize> {
        {
            let mut sequence = self.txn.open_table(SEQUENCE)?;
            sequence.insert(CHUNK_SEQUENCE, self.next_id)?;
        }
        self.txn.commit()?;
        Ok(self.inserted)
    }
}

/// Read-only view of a built index, used by queries and `status`.
///
/// Opening never creates, repairs or otherwise writes the store file.
pub struct IndexReader {
    db: ReadOnlyDatabase,
}

impl IndexReader {
    /// Open the store at `path`. A missing file is [`Error::IndexMissing`].
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::IndexMissing(path.to_path_buf()));
        }
        let db = ReadOnlyDatabase::open(path)?;
        Ok(Self { db })
    }

    /// Persisted build metadata. Unreadable metadata is logged and read as
    /// empty.
    pub fn metadata(&self) -> IndexMetadata {
        self.read_metadata().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "index metadata unreadable");
            IndexMetadata::default()
        })
    }

    fn read_metadata(&self) -> Result<IndexMetadata> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(META)?;
        let mut meta = IndexMetadata::default();
        for entry in table.iter()? {
            let (k, v) = entry?;
            meta.insert(k.value(), v.value().to_string());
        }
        Ok(meta)
    }

    /// Every chunk record in id order. Malformed records are skipped.
    pub fn scan(&self) -> Result<Vec<ChunkRecord>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(CHUNKS)?;

        let mut records = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            let id = k.value();
            match decode_record(id, v.value()) {
                Some(record) => records.push(record),
                None => tracing::warn!(id, "skipping malformed chunk record"),
            }
        }
        Ok(records)
    }
}

/// Read build metadata from the store at `path`. A missing or unreadable
/// store yields empty metadata.
pub fn load_metadata(path: &Path) -> IndexMetadata {
    match IndexReader::open(path) {
        Ok(reader) => reader.metadata(),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "no readable index metadata");
            IndexMetadata::default()
        }
    }
}
