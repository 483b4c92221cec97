use proptest::prelude::*;
use triage_core::classify::{RuleClassifier, SeverityClassifier};
use triage_core::lexicon::Lexicon;
use triage_core::normalize::normalize;

const PHRASES: [&str; 16] = [
    "fever",
    "high fever",
    "chills",
    "headache",
    "confusion",
    "seizures",
    "jaundice",
    "dark urine",
    "vomiting",
    "cough",
    "runny nose",
    "pregnant",
    "child",
    "for 5 days",
    "mosquito bites",
    "unable to drink",
];

proptest! {
    #[test]
    fn adding_symptoms_never_lowers_the_tier(
        base in proptest::collection::vec(0usize..PHRASES.len(), 0..5),
        extra in proptest::collection::vec(0usize..PHRASES.len(), 1..4),
    ) {
        let lex = Lexicon::builtin().expect("lexicon");
        let classifier = RuleClassifier::builtin().expect("classifier");

        let base_text: Vec<&str> = base.iter().map(|i| PHRASES[*i]).collect();
        let mut full_text = base_text.clone();
        full_text.extend(extra.iter().map(|i| PHRASES[*i]));

        let base_q = normalize(&format!("x {}", base_text.join(", ")), Some("en"), &lex).expect("base");
        let full_q = normalize(&format!("x {}", full_text.join(", ")), Some("en"), &lex).expect("full");

        let base_tier = classifier.classify(&base_q).tier;
        let full_tier = classifier.classify(&full_q).tier;
        prop_assert!(full_tier >= base_tier);
    }

    #[test]
    fn classification_is_deterministic(idx in proptest::collection::vec(0usize..PHRASES.len(), 1..6)) {
        let lex = Lexicon::builtin().expect("lexicon");
        let classifier = RuleClassifier::builtin().expect("classifier");
        let text: Vec<&str> = idx.iter().map(|i| PHRASES[*i]).collect();
        let q = normalize(&text.join(" and "), None, &lex).expect("normalize");
        prop_assert_eq!(classifier.classify(&q), classifier.classify(&q));
    }
}
