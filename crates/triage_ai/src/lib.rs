use std::sync::Arc;

use triage_core::classify::RuleClassifier;
use triage_core::config::TriageConfig;
use triage_core::error::AppError;
use triage_core::lexicon::Lexicon;

pub mod corpus;
pub mod embeddings;
pub mod gate;
pub mod guardrails;
pub mod ollama;
pub mod retrieve;
pub mod scoring;

/// Service over the builtin lexicon and rules, the demo corpus and the hashing embedder.
pub fn demo_service(config: TriageConfig) -> Result<gate::TriageService, AppError> {
    let lexicon = Lexicon::builtin()?;
    let classifier = RuleClassifier::new(triage_core::classify::RuleSet::builtin()?, &lexicon)?;
    let snapshot = corpus::demo::demo_snapshot(config.embedding.dims)?;
    let embedder = embeddings::HashingEmbedder::new(config.embedding.dims);
    Ok(gate::TriageService::new(
        Arc::new(lexicon),
        Arc::new(classifier),
        Arc::new(corpus::CorpusHandle::new(snapshot)),
        Arc::new(embedder),
        config,
    ))
}
