use serde::{Deserialize, Serialize};
use triage_core::domain::{AuthorityTier, Language};

/// Authoring form of a chunk, before hashing and embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkDraft {
    pub chunk_id: String,
    pub text: String,
    pub source: String,
    pub source_label: String,
    pub authority: AuthorityTier,
    pub language: Language,
    /// Guidance that applies regardless of the query language.
    #[serde(default)]
    pub cross_language: bool,
    pub malaria_relevant: bool,
    /// Canonical symptom ids the chunk is about. These, not the prose, feed the embedder, so
    /// English and Hindi chunks share one vector space.
    pub symptoms: Vec<String>,
}

impl ChunkDraft {
    pub fn embedding_input(&self) -> String {
        self.symptoms.join(" ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    pub chunk_id: String,
    pub text: String,
    pub source: String,
    pub source_label: String,
    pub authority: AuthorityTier,
    pub language: Language,
    #[serde(default)]
    pub cross_language: bool,
    pub malaria_relevant: bool,
    pub symptoms: Vec<String>,
    pub text_sha256: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CorpusManifest {
    pub version: String,
    pub embedding_model: String,
    pub dims: u32,
    pub chunk_count: u32,
    pub content_sha256: String,
    pub built_at: String, // RFC3339
}
