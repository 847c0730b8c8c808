use std::{fmt::Write as _, path::PathBuf};

use serde::Serialize;

use crate::{
    config::Settings,
    embedding::EmbeddingBackend,
    error::{Error, Result},
    store::IndexReader,
    text_util::{DEFAULT_PREVIEW_CHARS, format_preview, tokenize},
    walker::SourceTag,
};

pub const DEFAULT_TOP_K: usize = 5;

/// A semantic query against the index.
#[derive(Debug, Clone)]
pub struct QueryParams {
    pub text: String,
    pub top_k: usize,
    /// Results must score at least this much (and always above zero).
    pub min_score: f32,
}

impl QueryParams {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            top_k: DEFAULT_TOP_K,
            min_score: 0.0,
        }
    }
}

/// A ranked chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub rank: usize,
    pub score: f32,
    pub source: SourceTag,
    pub path: PathBuf,
    pub chunk_index: usize,
    pub content: String,
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Score every stored chunk against the query and return the best matches.
///
/// 1. Open the store read-only (missing store is [`Error::IndexMissing`])
/// 2. Rebuild the backend recorded in the index metadata
/// 3. Reject a backend whose dimension differs from `vector_dim`
/// 4. Embed the query; a query without tokens is [`Error::EmptyQuery`]
/// 5. Dot-product score, drop non-positive and below `min_score`
/// 6. Stable sort by descending score, keep `top_k`
pub fn query_index(settings: &Settings, params: &QueryParams) -> Result<Vec<SearchHit>> {
    let store = IndexReader::open(&settings.store_path)?;
    let metadata = store.metadata();
    let backend = EmbeddingBackend::for_query(&metadata, settings.hash_dim)?;

    if let Some(dim) = metadata.vector_dim()?
        && dim != backend.dim()
    {
        return Err(Error::DimensionMismatch {
            index: dim,
            backend: backend.dim(),
        });
    }

    if tokenize(&params.text).is_empty() {
        return Err(Error::EmptyQuery);
    }
    let query = backend
        .encode(std::slice::from_ref(&params.text))?
        .into_iter()
        .next()
        .ok_or_else(|| Error::Embedding("backend returned no query vector".into()))?;
    if query.iter().all(|&x| x == 0.0) {
        return Err(Error::EmptyQuery);
    }

    let records = store.scan()?;
    let total = records.len();
    let mut skipped = 0usize;
    let mut hits: Vec<SearchHit> = records
        .into_iter()
        .filter_map(|record| {
            if record.vector.len() != query.len() {
                skipped += 1;
                return None;
            }
            let score = dot(&query, &record.vector);
            (score > 0.0 && score >= params.min_score).then(|| SearchHit {
                rank: 0,
                score,
                source: record.source,
                path: record.path,
                chunk_index: record.chunk_index,
                content: record.content,
            })
        })
        .collect();

    if skipped > 0 {
        tracing::warn!(skipped, "skipped chunks with mismatched vector length");
    }
    tracing::debug!(scanned = total, matched = hits.len(), "scored index");

    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(params.top_k);
    for (i, hit) in hits.iter_mut().enumerate() {
        hit.rank = i + 1;
    }
    Ok(hits)
}

/// Render hits for the terminal.
pub fn format_human(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No matches found.\n".to_string();
    }

    let mut out = String::new();
    for hit in hits {
        let _ = writeln!(
            out,
            "[{:.3}] {} (source={}, chunk={})",
            hit.score,
            hit.path.display(),
            hit.source,
            hit.chunk_index
        );
        let _ = writeln!(out, "{}", format_preview(&hit.content, DEFAULT_PREVIEW_CHARS));
        out.push('\n');
    }
    out
}

/// Render hits as a JSON document.
pub fn format_json(query: &str, hits: &[SearchHit]) -> serde_json::Value {
    serde_json::json!({
        "query": query,
        "result_count": hits.len(),
        "results": hits,
    })
}
