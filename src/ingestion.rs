use serde::Serialize;

use crate::{
    chunking::ChunkingConfig,
    embedding::EmbeddingBackend,
    engine::SearchEngine,
    error::{Error, Result},
    store::{IndexMetadata, IndexStore, RebuildWriter},
    walker::{SourceDocument, walk_sources},
};

/// Outcome of a full index rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Documents yielded by the corpus walk.
    pub documents_seen: usize,
    /// Documents that contributed at least one chunk.
    pub documents_indexed: usize,
    /// Documents skipped (unreadable, empty, or failed to embed).
    pub documents_skipped: usize,
    /// Chunk records written.
    pub chunks: usize,
    /// Backend discriminator the index was built with.
    pub backend: String,
}

/// Check that a backend returned one vector of the right width per chunk.
fn check_vectors(
    chunk_count: usize,
    vectors: &[Vec<f32>],
    dim: usize,
) -> std::result::Result<(), String> {
    if vectors.len() != chunk_count {
        return Err(format!(
            "backend returned {} vectors for {chunk_count} chunks",
            vectors.len()
        ));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
        return Err(format!(
            "backend returned a {}-dimensional vector, expected {dim}",
            bad.len()
        ));
    }
    Ok(())
}

/// Chunk, embed and insert one document. Returns the number of chunks
/// written; per-document problems are logged and yield 0. Only storage
/// errors are returned.
fn index_document(
    writer: &mut RebuildWriter,
    backend: &EmbeddingBackend,
    chunking: &ChunkingConfig,
    doc: &SourceDocument,
) -> Result<usize> {
    let text = match std::fs::read_to_string(&doc.path) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(path = %doc.path.display(), error = %e, "skipping unreadable document");
            return Ok(0);
        }
    };

    let chunks = chunking.split(&text);
    if chunks.is_empty() {
        tracing::debug!(path = %doc.path.display(), "skipping empty document");
        return Ok(0);
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = match backend.encode(&texts) {
        Ok(vectors) => vectors,
        Err(e) => {
            tracing::warn!(path = %doc.path.display(), error = %e, "skipping document: embedding failed");
            return Ok(0);
        }
    };
    if let Err(reason) = check_vectors(chunks.len(), &vectors, backend.dim()) {
        tracing::warn!(path = %doc.path.display(), %reason, "skipping document");
        return Ok(0);
    }

    writer.insert_document(doc.tag, &doc.path, &chunks, &vectors)
}

/// Rebuild the index under the engine's knowledge root from scratch.
///
/// Existing records and metadata are cleared in their own commit first.
/// Metadata and every new record are then written in a single transaction,
/// so a failure while populating leaves an empty index rather than a
/// partial one. Documents that cannot be read or embedded are skipped.
pub fn rebuild_index(engine: &mut SearchEngine) -> Result<BuildReport> {
    rebuild_with(engine, index_document)
}

fn rebuild_with<F>(engine: &mut SearchEngine, mut index: F) -> Result<BuildReport>
where
    F: FnMut(
        &mut RebuildWriter,
        &EmbeddingBackend,
        &ChunkingConfig,
        &SourceDocument,
    ) -> Result<usize>,
{
    let settings = engine.settings().clone();
    if !settings.root.is_dir() {
        return Err(Error::RootNotFound(settings.root));
    }
    let code_files = settings.code_matcher()?;

    let store = IndexStore::create(&settings.store_path)?;
    let backend = engine.build_backend();
    let metadata = IndexMetadata::for_build(backend, &settings.chunking);

    tracing::info!(
        root = %settings.root.display(),
        store = %store.path().display(),
        backend = backend.name(),
        dim = backend.dim(),
        "rebuilding index"
    );

    store.clear()?;
    let mut writer = store.begin_rebuild(&metadata)?;

    let mut report = BuildReport {
        backend: backend.name().to_string(),
        ..Default::default()
    };
    for doc in walk_sources(&settings.root, &code_files) {
        report.documents_seen += 1;
        let written = index(&mut writer, backend, &settings.chunking, &doc)?;
        if written > 0 {
            tracing::debug!(path = %doc.path.display(), source = %doc.tag, chunks = written, "indexed");
            report.documents_indexed += 1;
        } else {
            report.documents_skipped += 1;
        }
    }

    report.chunks = writer.commit()?;
    tracing::info!(
        documents = report.documents_seen,
        indexed = report.documents_indexed,
        skipped = report.documents_skipped,
        chunks = report.chunks,
        "index rebuilt"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::{
        config::Settings,
        embedding::BackendPreference,
        store::{IndexReader, load_metadata},
        walker::SourceTag,
    };

    fn write(path: &Path, text: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    fn hash_engine(root: &Path) -> SearchEngine {
        SearchEngine::new(Settings::new(root).with_backend(BackendPreference::Hash))
    }

    #[test]
    fn vector_checks() {
        assert!(check_vectors(2, &[vec![0.0; 3], vec![0.0; 3]], 3).is_ok());
        assert!(check_vectors(2, &[vec![0.0; 3]], 3).is_err());
        assert!(check_vectors(1, &[vec![0.0; 2]], 3).is_err());
    }

    #[test]
    fn missing_root_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let mut engine = hash_engine(&tmp.path().join("absent"));
        assert!(matches!(engine.rebuild(), Err(Error::RootNotFound(_))));
    }

    #[test]
    fn empty_root_builds_empty_index() {
        let tmp = tempfile::tempdir().unwrap();
        let mut engine = hash_engine(tmp.path());
        let report = engine.rebuild().unwrap();

        assert_eq!(report.chunks, 0);
        assert_eq!(report.documents_seen, 0);
        assert_eq!(report.backend, "hash");
        assert!(tmp.path().join(".brain.redb").is_file());
    }

    #[test]
    fn long_document_is_chunked_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let summary = tmp.path().join("ml/long/SUMMARY.md");
        write(&summary, "token ".repeat(500).as_bytes());

        let mut engine = hash_engine(tmp.path());
        let report = engine.rebuild().unwrap();
        // 3000 chars, window 1200, step 1000
        assert_eq!(report.chunks, 3);

        let store = IndexReader::open(&tmp.path().join(".brain.redb")).unwrap();
        let records = store.scan().unwrap();
        let indices: Vec<usize> = records.iter().map(|r| r.chunk_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(records.iter().all(|r| r.source == SourceTag::Summary));
        assert!(records.iter().all(|r| r.vector.len() == 256));
    }

    #[test]
    fn unreadable_and_empty_documents_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("cv/vit");
        write(&project.join("SUMMARY.md"), b"vision transformer patches");
        write(&project.join("info.yaml"), b"   \n  ");
        write(&project.join("playground/bad.py"), &[0xff, 0xfe, 0x00, 0x80]);

        let mut engine = hash_engine(tmp.path());
        let report = engine.rebuild().unwrap();

        assert_eq!(report.documents_seen, 3);
        assert_eq!(report.documents_indexed, 1);
        assert_eq!(report.documents_skipped, 2);
        assert_eq!(report.chunks, 1);
    }

    #[test]
    fn rebuild_replaces_previous_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let summary = tmp.path().join("nlp/gpt/SUMMARY.md");
        write(&summary, b"first version");

        let mut engine = hash_engine(tmp.path());
        engine.rebuild().unwrap();
        write(&summary, b"second version");
        engine.rebuild().unwrap();

        let store = IndexReader::open(&tmp.path().join(".brain.redb")).unwrap();
        let contents: Vec<String> =
            store.scan().unwrap().into_iter().map(|r| r.content).collect();
        assert_eq!(contents, vec!["second version"]);
    }

    #[test]
    fn storage_failure_while_populating_leaves_empty_index() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("nlp/bert/SUMMARY.md"), b"masked language modelling");
        write(&tmp.path().join("nlp/gpt/SUMMARY.md"), b"autoregressive decoding");

        let mut engine = hash_engine(tmp.path());
        assert_eq!(engine.rebuild().unwrap().chunks, 2);

        let mut calls = 0;
        let result = rebuild_with(&mut engine, |writer, backend, chunking, doc| {
            calls += 1;
            if calls == 2 {
                return Err(Error::Io(std::io::Error::other("disk full")));
            }
            index_document(writer, backend, chunking, doc)
        });
        assert!(matches!(result, Err(Error::Io(_))));

        let store_path = tmp.path().join(".brain.redb");
        assert!(load_metadata(&store_path).is_empty());
        assert!(IndexReader::open(&store_path).unwrap().scan().unwrap().is_empty());
    }

    #[test]
    fn unopenable_store_fails_the_build() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("nlp/bert/SUMMARY.md"), b"masked language modelling");
        std::fs::create_dir(tmp.path().join(".brain.redb")).unwrap();

        let mut engine = hash_engine(tmp.path());
        let err = engine.rebuild().unwrap_err();
        assert!(!matches!(err, Error::RootNotFound(_) | Error::Config(_)));
    }
}
