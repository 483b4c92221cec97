use std::fs;

use pretty_assertions::assert_eq;
use tempfile::tempdir;
use triage_core::classify::{RuleClassifier, RuleSet, SeverityClassifier};
use triage_core::domain::SeverityTier;
use triage_core::lexicon::Lexicon;
use triage_core::normalize::normalize;

fn tier_of(classifier: &RuleClassifier, lex: &Lexicon, text: &str) -> (SeverityTier, String) {
    let q = normalize(text, None, lex).expect("normalize");
    let s = classifier.classify(&q);
    (s.tier, s.rule_id)
}

#[test]
fn builtin_rules_cover_danger_signs() {
    let lex = Lexicon::builtin().expect("lexicon");
    let c = RuleClassifier::new(RuleSet::builtin().expect("rules"), &lex).expect("classifier");

    let cases = [
        ("High fever with confusion and difficulty breathing", SeverityTier::Emergency, "EMG-001"),
        ("तेज बुखार और बेहोशी", SeverityTier::Emergency, "EMG-003"),
        ("fever and fits", SeverityTier::Emergency, "EMG-004"),
        ("dark urine, jaundice and bleeding gums", SeverityTier::Emergency, "EMG-008"),
        ("my child has fever and cannot drink", SeverityTier::Emergency, "EMG-007"),
        ("pregnant with fever", SeverityTier::Severe, "SEV-001"),
        ("fever and yellow eyes", SeverityTier::Severe, "SEV-002"),
        ("fever for 4 days", SeverityTier::Moderate, "MOD-001"),
        ("fever with headache and body aches", SeverityTier::Moderate, "MOD-004"),
        ("fever after mosquito bites", SeverityTier::Moderate, "MOD-005"),
        ("my child has fever and can't breathe", SeverityTier::Emergency, "lexicon:difficulty_breathing"),
        ("not breathing and fever", SeverityTier::Emergency, "lexicon:difficulty_breathing"),
        ("fever, getting worse", SeverityTier::Severe, "SEV-004"),
        ("बुखार है, तुरंत बताइए", SeverityTier::Severe, "SEV-004"),
        ("unbearable pain in my back", SeverityTier::Severe, "lexicon:severe_pain"),
        ("this is urgent", SeverityTier::Moderate, "lexicon:urgent_request"),
        ("cough and runny nose", SeverityTier::None, ""),
        ("fever", SeverityTier::Mild, "lexicon:fever"),
    ];
    for (text, tier, rule) in cases {
        assert_eq!(tier_of(&c, &lex, text), (tier, rule.to_string()), "text={text}");
    }
}

#[test]
fn custom_rule_file_is_loaded_from_disk() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("rules.toml");
    fs::write(
        &path,
        r#"
version = "local-1"

[[rule]]
id = "LOCAL-1"
tier = "severe"
all_of = ["fever", "rash"]
rationale = "Fever with rash needs same-day review"
"#,
    )
    .expect("write rules");

    let lex = Lexicon::builtin().expect("lexicon");
    let c = RuleClassifier::new(RuleSet::load(&path).expect("load"), &lex).expect("classifier");
    assert_eq!(c.rules_version(), "local-1");
    assert_eq!(
        tier_of(&c, &lex, "fever and skin rash"),
        (SeverityTier::Severe, "LOCAL-1".to_string())
    );
    // Lexicon tier hints still apply without any builtin rule.
    assert_eq!(
        tier_of(&c, &lex, "seizures"),
        (SeverityTier::Emergency, "lexicon:seizures".to_string())
    );
}

#[test]
fn missing_rule_file_is_an_error() {
    let dir = tempdir().expect("tempdir");
    assert!(RuleSet::load(&dir.path().join("nope.toml")).is_err());
}

#[test]
fn ambiguous_term_classifies_at_the_higher_tier() {
    let raw = r#"{
        "version": "amb-1",
        "symptoms": [
            {"id": "fever", "tier_hint": "mild", "malaria_associated": true, "rationale": "fever"},
            {"id": "high_fever", "tier_hint": "severe", "malaria_associated": true, "rationale": "high fever"}
        ],
        "terms": [
            {"term": "tez", "language": "hi", "canonical": "fever"},
            {"term": "tez", "language": "hi", "canonical": "high_fever"}
        ]
    }"#;
    let lex = Lexicon::from_json(raw).expect("lexicon");
    let rules = RuleSet::from_toml("version = \"amb-rules\"\n").expect("rules");
    let c = RuleClassifier::new(rules, &lex).expect("classifier");

    let q = normalize("tez", None, &lex).expect("normalize");
    assert_eq!(q.tokens(), &["high_fever"]);
    assert_eq!(tier_of(&c, &lex, "tez"), (SeverityTier::Severe, "lexicon:high_fever".to_string()));
}
