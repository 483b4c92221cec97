use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::{oneshot, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::Instrument;
use triage_core::classify::SeverityClassifier;
use triage_core::config::TriageConfig;
use triage_core::domain::{EmergencySignal, FaultKind, Language, NormalizedQuery, SeverityTier, TriageCategory};
use triage_core::error::{codes, AppError};
use triage_core::lexicon::Lexicon;
use triage_core::normalize::normalize;

use crate::corpus::CorpusHandle;
use crate::embeddings::Embedder;
use crate::guardrails::enforce_assessment;
use crate::retrieve::{retrieve, RetrievalResult};
use crate::scoring::score;

mod assessment;
mod compose;
mod state;

pub use assessment::{Assessment, Recommendation, RecommendationKind};
pub use state::{GateState, GateTrace};

/// Corpus version reported when no snapshot is loaded.
pub const CORPUS_UNAVAILABLE: &str = "unavailable";

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct ServiceStats {
    pub queries: u64,
    pub emergencies: u64,
    pub degraded: u64,
}

#[derive(Debug, Default)]
struct Counters {
    queries: AtomicU64,
    emergencies: AtomicU64,
    degraded: AtomicU64,
}

/// Result of the classifier-only screening path.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EmergencyCheck {
    pub emergency_alert: bool,
    pub severity_tier: SeverityTier,
    pub rule_id: String,
    pub matched: Vec<String>,
    pub rationale: String,
    pub faults: Vec<String>,
    pub lexicon_version: String,
}

enum RetrievalOutcome {
    Ready(RetrievalResult),
    Unavailable(AppError),
    Mismatch(AppError),
}

/// Query safety pipeline: normalize, classify and retrieve concurrently, score, compose, and
/// check the result before it leaves.
///
/// `assess` never fails. Every fault is absorbed into the returned assessment and listed in
/// its `faults`.
pub struct TriageService {
    lexicon: Arc<Lexicon>,
    classifier: Arc<dyn SeverityClassifier>,
    corpus: Arc<CorpusHandle>,
    embedder: Arc<dyn Embedder>,
    config: Arc<TriageConfig>,
    permits: Arc<Semaphore>,
    counters: Counters,
}

impl TriageService {
    pub fn new(
        lexicon: Arc<Lexicon>,
        classifier: Arc<dyn SeverityClassifier>,
        corpus: Arc<CorpusHandle>,
        embedder: Arc<dyn Embedder>,
        config: TriageConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.gate.max_concurrent.max(1)));
        Self {
            lexicon,
            classifier,
            corpus,
            embedder,
            config: Arc::new(config),
            permits,
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    pub fn corpus(&self) -> &Arc<CorpusHandle> {
        &self.corpus
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            queries: self.counters.queries.load(Ordering::Relaxed),
            emergencies: self.counters.emergencies.load(Ordering::Relaxed),
            degraded: self.counters.degraded.load(Ordering::Relaxed),
        }
    }

    pub async fn assess(&self, text: &str, language_hint: Option<&str>) -> Assessment {
        self.assess_traced(text, language_hint).await.0
    }

    /// Like `assess`, also returning the gate states the query visited.
    pub async fn assess_traced(&self, text: &str, language_hint: Option<&str>) -> (Assessment, GateTrace) {
        let span = tracing::info_span!(
            "assess",
            query_id = %query_id(text),
            hint = language_hint.unwrap_or("auto")
        );
        self.run(text, language_hint).instrument(span).await
    }

    async fn run(&self, text: &str, language_hint: Option<&str>) -> (Assessment, GateTrace) {
        let started = Instant::now();
        // Excess queries wait here instead of being rejected. The permit travels with an
        // abandoned retrieval, so it bounds running work rather than waiting callers.
        let mut permit = Arc::clone(&self.permits).acquire_owned().await.ok();
        self.counters.queries.fetch_add(1, Ordering::Relaxed);

        let mut trace = GateTrace::new();
        let snapshot = self.corpus.snapshot();
        let corpus_version = snapshot
            .as_ref()
            .map(|s| s.version().to_string())
            .unwrap_or_else(|| CORPUS_UNAVAILABLE.to_string());

        let query = match normalize(text, language_hint, &self.lexicon) {
            Ok(q) => Arc::new(q),
            Err(err) => {
                tracing::warn!(
                    code = %err.code,
                    details = err.details.as_deref().unwrap_or(""),
                    "query rejected by normalizer"
                );
                let ctx = compose::Context {
                    language: Language::English,
                    query: None,
                    lexicon_version: self.lexicon.version(),
                    corpus_version: &corpus_version,
                    sources: Vec::new(),
                    faults: vec![FaultKind::UnsupportedInput],
                };
                let candidate = compose::unsupported_input(&ctx);
                return self.emit(candidate, GateState::Degraded, trace, started);
            }
        };
        trace.advance(GateState::ClassifyingRetrieving);

        let classify_task = spawn_classification(Arc::clone(&self.classifier), Arc::clone(&query));
        let retrieve_task = snapshot.map(|snap| {
            let embedder = Arc::clone(&self.embedder);
            let config = Arc::clone(&self.config);
            let q = Arc::clone(&query);
            tokio::task::spawn_blocking(move || {
                retrieve(&q, &snap, embedder.as_ref(), &config.embedding, &config.retrieval)
            })
        });

        let (classified, retrieved) = tokio::join!(
            await_classification(classify_task, self.config.gate.classification_ceiling()),
            await_retrieval(retrieve_task, self.config.gate.budget(), &mut permit),
        );

        let mut faults = Vec::new();
        let (result, mismatch) = match retrieved {
            RetrievalOutcome::Ready(r) => (r, false),
            RetrievalOutcome::Unavailable(e) => {
                tracing::warn!(code = %e.code, message = %e.message, "retrieval unavailable; scoring without evidence");
                faults.push(FaultKind::RetrievalUnavailable);
                (RetrievalResult::empty(&corpus_version), false)
            }
            RetrievalOutcome::Mismatch(e) => {
                tracing::warn!(
                    code = %e.code,
                    details = e.details.as_deref().unwrap_or(""),
                    "corpus version mismatch"
                );
                faults.push(FaultKind::CorpusVersionMismatch);
                (RetrievalResult::empty(&corpus_version), true)
            }
        };
        let signal = match classified {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::warn!(code = %e.code, message = %e.message, "classification fell back to moderate");
                faults.push(FaultKind::ClassificationTimeout);
                None
            }
        };

        let ctx = compose::Context {
            language: query.language(),
            query: Some(query.as_ref()),
            lexicon_version: query.lexicon_version(),
            corpus_version: &corpus_version,
            sources: result.sources(),
            faults,
        };

        let (candidate, terminal) = match signal {
            None => {
                let a = compose::degraded(&ctx, SeverityTier::Moderate, &self.config.scoring);
                (a, GateState::Degraded)
            }
            Some(signal) if mismatch && !signal.is_emergency() => {
                let a = compose::degraded(&ctx, signal.tier, &self.config.scoring);
                (a, GateState::Degraded)
            }
            Some(signal) => {
                trace.advance(GateState::Scoring);
                let confidence = score(&result, signal.tier, &self.config.scoring);
                if let Some(c) = confidence.components {
                    tracing::debug!(
                        retrieval = c.retrieval,
                        agreement = c.agreement,
                        authority = c.authority,
                        malaria_share = c.malaria_share,
                        "confidence components"
                    );
                }
                trace.advance(GateState::Composing);
                let a = if signal.is_emergency() {
                    compose::emergency(&ctx, &signal, &confidence)
                } else {
                    compose::standard(&ctx, &signal, &confidence, &self.config.bands)
                };
                (a, GateState::Emitted)
            }
        };

        self.emit(candidate, terminal, trace, started)
    }

    fn emit(
        &self,
        candidate: Assessment,
        terminal: GateState,
        mut trace: GateTrace,
        started: Instant,
    ) -> (Assessment, GateTrace) {
        let mut assessment = match enforce_assessment(&candidate, &self.config.scoring) {
            Ok(()) => {
                trace.advance(terminal);
                candidate
            }
            Err(e) => {
                tracing::warn!(code = %e.code, message = %e.message, "assessment failed guardrail; using fallback");
                trace.advance(GateState::Degraded);
                compose::cautious_fallback(&candidate, &self.config.scoring)
            }
        };
        assessment.processing_time_ms = started.elapsed().as_millis() as u64;

        if assessment.emergency_alert() {
            self.counters.emergencies.fetch_add(1, Ordering::Relaxed);
        }
        if matches!(
            assessment.category(),
            TriageCategory::Degraded | TriageCategory::UnsupportedInput
        ) {
            self.counters.degraded.fetch_add(1, Ordering::Relaxed);
        }

        tracing::info!(
            category = assessment.category().as_str(),
            tier = assessment.severity_tier().as_str(),
            confidence = assessment.confidence(),
            uncertain = assessment.uncertain(),
            faults = assessment.faults().len(),
            elapsed_ms = assessment.processing_time_ms(),
            "assessment emitted"
        );
        (assessment, trace)
    }

    /// Classifier-only screening. Skips retrieval entirely, so it answers even with no corpus.
    pub async fn check_emergency(&self, text: &str, language_hint: Option<&str>) -> EmergencyCheck {
        let span = tracing::info_span!("check_emergency", query_id = %query_id(text));
        async {
            let _permit = self.permits.acquire().await.ok();
            let lexicon_version = self.lexicon.version().to_string();
            let query = match normalize(text, language_hint, &self.lexicon) {
                Ok(q) => Arc::new(q),
                Err(err) => {
                    tracing::warn!(code = %err.code, "query rejected by normalizer");
                    return EmergencyCheck {
                        emergency_alert: false,
                        severity_tier: SeverityTier::None,
                        rule_id: String::new(),
                        matched: Vec::new(),
                        rationale: String::new(),
                        faults: vec![FaultKind::UnsupportedInput.code().to_string()],
                        lexicon_version,
                    };
                }
            };

            let task = spawn_classification(Arc::clone(&self.classifier), Arc::clone(&query));
            let (signal, faults) = match await_classification(task, self.config.gate.classification_ceiling()).await {
                Ok(s) => (s, Vec::new()),
                Err(e) => {
                    tracing::warn!(code = %e.code, "classification fell back to moderate");
                    (
                        moderate_fallback_signal(),
                        vec![FaultKind::ClassificationTimeout.code().to_string()],
                    )
                }
            };
            EmergencyCheck {
                emergency_alert: signal.is_emergency(),
                severity_tier: signal.tier,
                rule_id: signal.rule_id,
                matched: signal.matched,
                rationale: signal.rationale,
                faults,
                lexicon_version,
            }
        }
        .instrument(span)
        .await
    }
}

fn moderate_fallback_signal() -> EmergencySignal {
    EmergencySignal {
        tier: SeverityTier::Moderate,
        matched: Vec::new(),
        rule_id: "fallback:classification".to_string(),
        rationale: "Classification did not complete; treated as moderate".to_string(),
    }
}

/// Short stable id for log correlation. The raw text itself is never logged.
pub fn query_id(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(&digest[..6])
}

/// Run classification on its own thread. It never shares the blocking pool with retrieval, so
/// a backlog of slow or abandoned retrievals cannot delay the emergency decision.
fn spawn_classification(
    classifier: Arc<dyn SeverityClassifier>,
    query: Arc<NormalizedQuery>,
) -> oneshot::Receiver<EmergencySignal> {
    let (tx, rx) = oneshot::channel();
    let spawned = std::thread::Builder::new().name("triage-classify".to_string()).spawn({
        let classifier = Arc::clone(&classifier);
        let query = Arc::clone(&query);
        move || {
            let _ = tx.send(classifier.classify(&query));
        }
    });
    match spawned {
        Ok(_) => rx,
        Err(e) => {
            tracing::warn!(err = %e, "classification thread unavailable; classifying inline");
            let (tx, rx) = oneshot::channel();
            let _ = tx.send(classifier.classify(&query));
            rx
        }
    }
}

/// Classification is never cancelled. Past the ceiling the pipeline stops waiting and the
/// classification thread is left to finish on its own.
async fn await_classification(
    pending: oneshot::Receiver<EmergencySignal>,
    ceiling: Duration,
) -> Result<EmergencySignal, AppError> {
    match tokio::time::timeout(ceiling, pending).await {
        Ok(Ok(signal)) => Ok(signal),
        Ok(Err(_)) => Err(AppError::new(
            codes::CLASSIFICATION_TIMEOUT,
            "Classification ended without a result",
        )),
        Err(_) => Err(
            AppError::new(codes::CLASSIFICATION_TIMEOUT, "Classification exceeded its ceiling")
                .with_details(format!("ceiling_ms={}", ceiling.as_millis())),
        ),
    }
}

async fn await_retrieval(
    task: Option<JoinHandle<Result<RetrievalResult, AppError>>>,
    budget: Duration,
    permit: &mut Option<OwnedSemaphorePermit>,
) -> RetrievalOutcome {
    let Some(mut handle) = task else {
        return RetrievalOutcome::Unavailable(AppError::new(
            codes::RETRIEVAL_UNAVAILABLE,
            "No corpus snapshot is loaded",
        ));
    };
    match tokio::time::timeout(budget, &mut handle).await {
        Ok(Ok(Ok(result))) => RetrievalOutcome::Ready(result),
        Ok(Ok(Err(e))) if e.is(codes::CORPUS_VERSION_MISMATCH) => RetrievalOutcome::Mismatch(e),
        Ok(Ok(Err(e))) => RetrievalOutcome::Unavailable(e),
        Ok(Err(join_err)) => RetrievalOutcome::Unavailable(
            AppError::new(codes::RETRIEVAL_UNAVAILABLE, "Retrieval task failed")
                .with_details(join_err.to_string()),
        ),
        Err(_) => {
            // A started blocking task cannot be interrupted. It keeps the query's permit until
            // it actually ends.
            let held = permit.take();
            tokio::spawn(async move {
                let _ = handle.await;
                drop(held);
            });
            RetrievalOutcome::Unavailable(
                AppError::new(codes::RETRIEVAL_UNAVAILABLE, "Retrieval exceeded the query budget")
                    .with_details(format!("budget_ms={}", budget.as_millis()))
                    .with_retryable(true),
            )
        }
    }
}
