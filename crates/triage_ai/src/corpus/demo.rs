use serde::Deserialize;
use triage_core::error::{codes, AppError};

use super::handle::CorpusSnapshot;
use super::model::ChunkDraft;
use super::store::build_with_embedder;
use crate::embeddings::hashing::{HashingEmbedder, HASHING_MODEL};

const DEMO_CORPUS: &str = include_str!("../../assets/demo_corpus.json");

/// Fixed so that demo builds are byte-identical across runs.
pub const DEMO_BUILT_AT: &str = "2026-10-01T00:00:00Z";

/// Small bilingual corpus of public-health guidance used for demos and tests.
#[derive(Debug, Clone, Deserialize)]
pub struct DemoCorpus {
    pub version: String,
    pub chunks: Vec<ChunkDraft>,
}

pub fn demo_corpus() -> Result<DemoCorpus, AppError> {
    serde_json::from_str(DEMO_CORPUS).map_err(|e| {
        AppError::new(codes::CORPUS_STORE_FAILED, "Failed to decode demo corpus").with_details(e.to_string())
    })
}

pub fn demo_drafts() -> Result<Vec<ChunkDraft>, AppError> {
    Ok(demo_corpus()?.chunks)
}

/// Demo corpus embedded with the hashing model.
pub fn demo_snapshot(dims: usize) -> Result<CorpusSnapshot, AppError> {
    let demo = demo_corpus()?;
    let embedder = HashingEmbedder::new(dims);
    build_with_embedder(&demo.chunks, &embedder, HASHING_MODEL, &demo.version, DEMO_BUILT_AT)
}
