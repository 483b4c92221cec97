use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use triage_ai::corpus::demo::demo_snapshot;
use triage_ai::corpus::CorpusHandle;
use triage_ai::embeddings::{Embedder, HashingEmbedder};
use triage_ai::gate::{GateState, RecommendationKind, TriageService, CORPUS_UNAVAILABLE};
use triage_core::classify::{RuleClassifier, SeverityClassifier};
use triage_core::config::TriageConfig;
use triage_core::domain::{EmergencySignal, FaultKind, NormalizedQuery, SeverityTier, TriageCategory};
use triage_core::error::AppError;
use triage_core::lexicon::Lexicon;

struct SlowEmbedder {
    inner: HashingEmbedder,
    delay: Duration,
}

impl Embedder for SlowEmbedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        std::thread::sleep(self.delay);
        self.inner.embed(model, input)
    }
}

/// Records the most embed calls ever running at once.
struct PeakEmbedder {
    inner: HashingEmbedder,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl PeakEmbedder {
    fn new(ms: u64) -> Self {
        Self {
            inner: HashingEmbedder::new(256),
            delay: Duration::from_millis(ms),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Embedder for PeakEmbedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.embed(model, input)
    }
}

struct SlowClassifier {
    delay: Duration,
}

impl SeverityClassifier for SlowClassifier {
    fn classify(&self, _query: &NormalizedQuery) -> EmergencySignal {
        std::thread::sleep(self.delay);
        EmergencySignal::none()
    }
}

fn config(budget_ms: u64, ceiling_ms: u64) -> TriageConfig {
    let mut cfg = TriageConfig::default();
    cfg.gate.budget_ms = budget_ms;
    cfg.gate.classification_ceiling_ms = ceiling_ms;
    cfg
}

fn build(
    classifier: Arc<dyn SeverityClassifier>,
    corpus: CorpusHandle,
    embedder: Arc<dyn Embedder>,
    cfg: TriageConfig,
) -> TriageService {
    TriageService::new(
        Arc::new(Lexicon::builtin().expect("lexicon")),
        classifier,
        Arc::new(corpus),
        embedder,
        cfg,
    )
}

fn rules() -> Arc<dyn SeverityClassifier> {
    Arc::new(RuleClassifier::builtin().expect("rules"))
}

fn demo_corpus() -> CorpusHandle {
    CorpusHandle::new(demo_snapshot(256).expect("demo"))
}

fn slow_embedder(ms: u64) -> Arc<dyn Embedder> {
    Arc::new(SlowEmbedder {
        inner: HashingEmbedder::new(256),
        delay: Duration::from_millis(ms),
    })
}

#[tokio::test]
async fn slow_retrieval_is_cut_at_the_budget_and_scored_as_empty() {
    let cfg = config(50, 5_000);
    let empty_confidence = cfg.scoring.empty_confidence;
    let svc = build(rules(), demo_corpus(), slow_embedder(400), cfg);

    let (a, trace) = svc.assess_traced("fever and headache", None).await;
    assert_eq!(a.faults(), &[FaultKind::RetrievalUnavailable]);
    assert!(a.sources().is_empty());
    assert_eq!(a.confidence(), empty_confidence);
    assert!(a.uncertain());
    assert_eq!(a.category(), TriageCategory::Inconclusive);
    assert_eq!(trace.current(), GateState::Emitted);
}

#[tokio::test]
async fn emergency_survives_retrieval_timeout() {
    let svc = build(rules(), demo_corpus(), slow_embedder(400), config(50, 5_000));
    let a = svc.assess("fever with convulsions and unconscious", None).await;
    assert!(a.emergency_alert());
    assert_eq!(a.faults(), &[FaultKind::RetrievalUnavailable]);
    assert_eq!(a.recommendations()[0].kind, RecommendationKind::ImmediateAction);
    assert!(a.confidence() >= 0.9);
}

#[tokio::test]
async fn classification_past_the_ceiling_falls_back_to_moderate() {
    let classifier: Arc<dyn SeverityClassifier> = Arc::new(SlowClassifier {
        delay: Duration::from_millis(400),
    });
    let svc = build(
        classifier,
        demo_corpus(),
        Arc::new(HashingEmbedder::new(256)),
        config(50, 60),
    );

    let (a, trace) = svc.assess_traced("fever", None).await;
    assert_eq!(a.category(), TriageCategory::Degraded);
    assert_eq!(a.severity_tier(), SeverityTier::Moderate);
    assert!(a.faults().contains(&FaultKind::ClassificationTimeout));
    assert_eq!(a.recommendations()[0].kind, RecommendationKind::ProfessionalCare);
    assert_eq!(
        trace.path(),
        &[GateState::Received, GateState::ClassifyingRetrieving, GateState::Degraded]
    );
}

#[tokio::test]
async fn classification_is_awaited_past_the_retrieval_budget() {
    let classifier: Arc<dyn SeverityClassifier> = Arc::new(SlowClassifier {
        delay: Duration::from_millis(150),
    });
    let svc = build(
        classifier,
        demo_corpus(),
        Arc::new(HashingEmbedder::new(256)),
        config(20, 5_000),
    );
    let a = svc.assess("fever", None).await;
    assert!(!a.faults().contains(&FaultKind::ClassificationTimeout));
    assert_ne!(a.category(), TriageCategory::Degraded);
}

#[tokio::test]
async fn corpus_dimension_mismatch_degrades_with_low_confidence() {
    let mut cfg = TriageConfig::default();
    cfg.embedding.dims = 128;
    let degraded_confidence = cfg.scoring.degraded_confidence;
    // Corpus built at 256 dims, queries embedded at 128.
    let svc = build(rules(), demo_corpus(), Arc::new(HashingEmbedder::new(128)), cfg);

    let a = svc.assess("fever and headache", None).await;
    assert_eq!(a.category(), TriageCategory::Degraded);
    assert_eq!(a.confidence(), degraded_confidence);
    assert_eq!(a.faults(), &[FaultKind::CorpusVersionMismatch]);

    let e = svc.assess("high fever and confusion", None).await;
    assert!(e.emergency_alert());
    assert_eq!(e.category(), TriageCategory::Emergency);
    assert_eq!(e.faults(), &[FaultKind::CorpusVersionMismatch]);
}

#[tokio::test]
async fn missing_corpus_reports_unavailable() {
    let svc = build(
        rules(),
        CorpusHandle::empty(),
        Arc::new(HashingEmbedder::new(256)),
        TriageConfig::default(),
    );
    let a = svc.assess("fever", None).await;
    assert_eq!(a.corpus_version(), CORPUS_UNAVAILABLE);
    assert_eq!(a.faults(), &[FaultKind::RetrievalUnavailable]);
    assert!(!a.emergency_alert());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn queries_beyond_the_limit_queue_instead_of_failing() {
    let mut cfg = config(5_000, 5_000);
    cfg.gate.max_concurrent = 2;
    let embedder = Arc::new(PeakEmbedder::new(50));
    let svc = Arc::new(build(rules(), demo_corpus(), embedder.clone(), cfg));

    let mut handles = Vec::new();
    for _ in 0..6 {
        let svc = Arc::clone(&svc);
        handles.push(tokio::spawn(async move { svc.assess("fever and chills", None).await }));
    }
    for h in handles {
        let a = h.await.expect("join");
        assert!(a.faults().is_empty());
        assert_eq!(a.severity_tier(), SeverityTier::Moderate);
    }
    assert_eq!(svc.stats().queries, 6);
    let peak = embedder.peak();
    assert!((1..=2).contains(&peak), "peak concurrent retrievals: {peak}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abandoned_retrieval_keeps_its_slot_until_it_ends() {
    let mut cfg = config(30, 5_000);
    cfg.gate.max_concurrent = 1;
    let embedder = Arc::new(PeakEmbedder::new(300));
    let svc = build(rules(), demo_corpus(), embedder.clone(), cfg);

    let first = svc.assess("fever and headache", None).await;
    assert_eq!(first.faults(), &[FaultKind::RetrievalUnavailable]);
    // The next query waits for the cut-off embed to finish before starting its own.
    let _second = svc.assess("fever and chills", None).await;
    assert_eq!(embedder.peak(), 1);
}

#[test]
fn emergency_is_classified_while_the_blocking_pool_is_saturated() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .max_blocking_threads(4)
        .enable_all()
        .build()
        .expect("runtime");
    let mut cfg = config(50, 300);
    cfg.gate.max_concurrent = 8;
    let svc = Arc::new(build(rules(), demo_corpus(), slow_embedder(1_500), cfg));

    let a = rt.block_on(async {
        // Four abandoned retrievals occupy every blocking thread for well past the ceiling.
        let mut handles = Vec::new();
        for _ in 0..4 {
            let svc = Arc::clone(&svc);
            handles.push(tokio::spawn(async move { svc.assess("fever and headache", None).await }));
        }
        for h in handles {
            let a = h.await.expect("join");
            assert_eq!(a.faults(), &[FaultKind::RetrievalUnavailable]);
        }
        svc.assess("high fever and confusion", None).await
    });

    assert!(a.emergency_alert());
    assert!(!a.faults().contains(&FaultKind::ClassificationTimeout));
    assert_eq!(a.recommendations()[0].kind, RecommendationKind::ImmediateAction);
    rt.shutdown_timeout(Duration::from_millis(100));
}

#[tokio::test]
async fn published_corpus_is_used_by_later_queries() {
    let svc = build(
        rules(),
        CorpusHandle::empty(),
        Arc::new(HashingEmbedder::new(256)),
        TriageConfig::default(),
    );
    assert_eq!(svc.assess("fever", None).await.corpus_version(), CORPUS_UNAVAILABLE);

    let snapshot = demo_snapshot(256).expect("demo");
    let version = snapshot.version().to_string();
    svc.corpus().publish(snapshot);

    let a = svc.assess("fever", None).await;
    assert_eq!(a.corpus_version(), version);
    assert!(a.faults().is_empty());
    assert!(!a.sources().is_empty());
}
