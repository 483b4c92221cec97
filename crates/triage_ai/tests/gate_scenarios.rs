use pretty_assertions::assert_eq;
use triage_ai::demo_service;
use triage_ai::gate::{GateState, RecommendationKind};
use triage_core::config::TriageConfig;
use triage_core::domain::{SeverityTier, TriageCategory};

fn service() -> triage_ai::gate::TriageService {
    demo_service(TriageConfig::default()).expect("demo service")
}

#[tokio::test]
async fn danger_signs_raise_the_emergency_alert() {
    let svc = service();
    let (a, trace) = svc
        .assess_traced("High fever with confusion and difficulty breathing", None)
        .await;

    assert!(a.emergency_alert());
    assert_eq!(a.category(), TriageCategory::Emergency);
    assert_eq!(a.severity_tier(), SeverityTier::Emergency);
    assert!(a.confidence() >= svc.config().scoring.emergency_floor);
    assert_eq!(a.recommendations()[0].kind, RecommendationKind::ImmediateAction);
    assert!(a.faults().is_empty());
    assert_eq!(
        trace.path(),
        &[
            GateState::Received,
            GateState::ClassifyingRetrieving,
            GateState::Scoring,
            GateState::Composing,
            GateState::Emitted,
        ]
    );
}

#[tokio::test]
async fn cold_symptoms_stay_inconclusive_without_malaria_guidelines() {
    let svc = service();
    let a = svc.assess("Cough and runny nose", None).await;

    assert!(!a.emergency_alert());
    assert!(matches!(
        a.category(),
        TriageCategory::Inconclusive | TriageCategory::Possible
    ));
    for label in a.sources() {
        assert!(
            !label.contains("WHO") && !label.contains("NVBDCP") && !label.contains("ICMR"),
            "unexpected malaria guideline source {label}"
        );
    }
    assert!(a
        .recommendations()
        .iter()
        .any(|r| r.kind == RecommendationKind::ProfessionalCare));
}

#[tokio::test]
async fn hindi_and_english_queries_agree() {
    let svc = service();
    let hi = svc.assess("बुखार और सिर दर्द", None).await;
    let en = svc.assess("fever and headache", None).await;

    assert_eq!(hi.emergency_alert(), en.emergency_alert());
    assert_eq!(hi.severity_tier(), en.severity_tier());
    assert_eq!(hi.category(), en.category());
    assert!(!en.emergency_alert());
    assert!(hi.disclaimer().contains("निदान"));
    assert!(en.disclaimer().contains("not a medical diagnosis"));
}

#[tokio::test]
async fn unsupported_script_degrades_instead_of_failing() {
    let svc = service();
    let (a, trace) = svc.assess_traced("জ্বর এবং মাথাব্যথা", None).await;

    assert_eq!(a.category(), TriageCategory::UnsupportedInput);
    assert!(!a.emergency_alert());
    assert!(!a.disclaimer().is_empty());
    assert_eq!(trace.path(), &[GateState::Received, GateState::Degraded]);

    let json = serde_json::to_value(&a).expect("json");
    assert_eq!(json["faults"], serde_json::json!(["TRIAGE_UNSUPPORTED_INPUT"]));
}

#[tokio::test]
async fn identical_queries_produce_identical_assessments() {
    let svc = service();
    let a = svc.assess("fever with chills and sweating for 4 days", Some("en")).await;
    let b = svc.assess("fever with chills and sweating for 4 days", Some("en")).await;
    assert_eq!(a.without_timing(), b.without_timing());
    assert_eq!(a.severity_tier(), SeverityTier::Moderate);
}

#[tokio::test]
async fn wire_record_has_every_field() {
    let svc = service();
    let a = svc.assess("pregnant woman with fever", None).await;
    let json = serde_json::to_value(&a).expect("json");
    let obj = json.as_object().expect("object");

    for key in [
        "assessment",
        "confidence",
        "emergency_alert",
        "severity_tier",
        "recommendations",
        "disclaimer",
        "sources",
        "uncertain",
        "faults",
        "lexicon_version",
        "corpus_version",
        "processing_time_ms",
    ] {
        assert!(obj.contains_key(key), "missing {key}");
        assert!(!obj[key].is_null(), "null {key}");
    }
    assert_eq!(json["severity_tier"], "severe");
    assert!(json["recommendations"][0].is_string());
    assert!(a.disclaimer().contains("pregnancy"));
    assert!(a.confidence() >= svc.config().scoring.severe_floor);
}

#[tokio::test]
async fn quick_emergency_check_skips_retrieval() {
    let svc = service();
    let check = svc.check_emergency("बच्चे को बुखार और दौरे", None).await;
    assert!(check.emergency_alert);
    assert_eq!(check.rule_id, "EMG-004");
    assert!(check.faults.is_empty());

    let calm = svc.check_emergency("mild headache", None).await;
    assert!(!calm.emergency_alert);
    assert_eq!(calm.severity_tier, SeverityTier::Mild);
}

#[tokio::test]
async fn stats_count_queries_emergencies_and_degradations() {
    let svc = service();
    svc.assess("fever and seizures", None).await;
    svc.assess("fever", None).await;
    svc.assess("🤒", None).await;

    let stats = svc.stats();
    assert_eq!(stats.queries, 3);
    assert_eq!(stats.emergencies, 1);
    assert_eq!(stats.degraded, 1);
}
