use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use triage_core::config::{EmbeddingConfig, RetrievalConfig};
use triage_core::domain::NormalizedQuery;
use triage_core::error::{codes, AppError};

use crate::corpus::{CorpusSnapshot, DocumentChunk};
use crate::embeddings::Embedder;

pub mod similarity;

#[derive(Debug, Clone)]
pub struct RetrievalHit {
    pub chunk: Arc<DocumentChunk>,
    pub similarity: f32,
}

#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub hits: Vec<RetrievalHit>,
    pub corpus_version: String,
}

impl RetrievalResult {
    pub fn empty(corpus_version: impl Into<String>) -> Self {
        Self {
            hits: Vec::new(),
            corpus_version: corpus_version.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Unique source labels in rank order.
    pub fn sources(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for h in &self.hits {
            if !out.iter().any(|s| s == &h.chunk.source_label) {
                out.push(h.chunk.source_label.clone());
            }
        }
        out
    }
}

/// Rank corpus chunks for a normalized query.
///
/// Only canonical tokens are embedded; free text never reaches the index. The result holds at
/// most `top_k` hits with no more than `per_source_max` from one source.
pub fn retrieve(
    query: &NormalizedQuery,
    snapshot: &CorpusSnapshot,
    embedder: &dyn Embedder,
    embedding: &EmbeddingConfig,
    cfg: &RetrievalConfig,
) -> Result<RetrievalResult, AppError> {
    let manifest = snapshot.manifest();
    if query.tokens().is_empty() {
        return Ok(RetrievalResult::empty(&manifest.version));
    }

    if manifest.embedding_model != embedding.model {
        return Err(AppError::new(
            codes::CORPUS_VERSION_MISMATCH,
            "Query embedding model does not match corpus",
        )
        .with_details(format!(
            "corpus_model={}; query_model={}; corpus_version={}",
            manifest.embedding_model, embedding.model, manifest.version
        )));
    }

    let qv = embedder
        .embed(&embedding.model, &query.tokens().join(" "))
        .map_err(|e| {
            AppError::new(codes::RETRIEVAL_UNAVAILABLE, "Failed to embed query")
                .with_details(format!("code={}; err={}", e.code, e.message))
                .with_retryable(true)
        })?;
    if qv.len() != manifest.dims as usize {
        return Err(AppError::new(
            codes::CORPUS_VERSION_MISMATCH,
            "Query embedding dims do not match corpus dims",
        )
        .with_details(format!("corpus_dims={}; query_dims={}", manifest.dims, qv.len())));
    }

    let qnorm = similarity::l2_norm(&qv);
    if qnorm == 0.0 {
        return Ok(RetrievalResult::empty(&manifest.version));
    }

    let malaria_only = query.malaria_associated();
    let mut candidates: Vec<(&Arc<DocumentChunk>, f32)> = Vec::new();
    for chunk in snapshot.chunks() {
        if chunk.language != query.language() && !chunk.cross_language {
            continue;
        }
        if malaria_only && !chunk.malaria_relevant {
            continue;
        }
        let vnorm = similarity::l2_norm(&chunk.embedding);
        let score = similarity::cosine_similarity(&qv, &chunk.embedding, qnorm, vnorm);
        if score < cfg.min_similarity {
            continue;
        }
        candidates.push((chunk, score));
    }

    candidates.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.chunk_id.cmp(&b.0.chunk_id))
    });
    let candidate_count = candidates.len();

    let hits = select_diverse(candidates, cfg);
    tracing::debug!(
        candidates = candidate_count,
        selected = hits.len(),
        malaria_only,
        "retrieval ranked"
    );

    Ok(RetrievalResult {
        hits,
        corpus_version: manifest.version.clone(),
    })
}

/// Walk ranked candidates, enforcing the per-source cap and skipping near-duplicates of
/// already selected chunks. Skipped slots refill from the next best candidate.
fn select_diverse(candidates: Vec<(&Arc<DocumentChunk>, f32)>, cfg: &RetrievalConfig) -> Vec<RetrievalHit> {
    let mut per_source: BTreeMap<&str, usize> = BTreeMap::new();
    let mut selected_words: Vec<BTreeSet<String>> = Vec::new();
    let mut hits = Vec::new();

    for (chunk, score) in candidates {
        if hits.len() >= cfg.top_k {
            break;
        }
        let count = per_source.get(chunk.source.as_str()).copied().unwrap_or(0);
        if count >= cfg.per_source_max {
            continue;
        }
        let words = similarity::word_set(&chunk.text);
        if selected_words
            .iter()
            .any(|w| similarity::jaccard(w, &words) > cfg.near_duplicate_jaccard)
        {
            continue;
        }
        per_source.insert(chunk.source.as_str(), count + 1);
        selected_words.push(words);
        hits.push(RetrievalHit {
            chunk: Arc::clone(chunk),
            similarity: score,
        });
    }
    hits
}
