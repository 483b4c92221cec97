use triage_core::config::{BandConfig, ScoringConfig};
use triage_core::domain::{
    EmergencySignal, FaultKind, Language, NormalizedQuery, Population, SeverityTier, TriageCategory,
};

use super::assessment::{Assessment, Recommendation, RecommendationKind};
use crate::scoring::ConfidenceScore;

const SEEK_EMERGENCY_CARE: &str =
    "Seek emergency medical care now: go to the nearest hospital or call 108 for an ambulance.";
const DO_NOT_WAIT: &str =
    "Do not wait for a test result or try home remedies before getting help.";
const SEVERE_SEE_DOCTOR: &str =
    "See a doctor today: these symptoms can be a sign of severe malaria.";
const PREGNANCY_CARE: &str =
    "Pregnant women with fever need a same-day medical check; malaria in pregnancy is dangerous for mother and baby.";
const CHILD_CARE: &str =
    "Children with fever should be seen by a health worker the same day.";
const TEST_TODAY: &str =
    "Get a malaria test (rapid diagnostic test or blood smear) today at the nearest health centre or from an ASHA worker.";
const TEST_WITHIN_DAY: &str =
    "Get a malaria test within 24 hours at the nearest health centre or from an ASHA worker.";
const TREAT_AFTER_TEST: &str =
    "Take antimalarial medicine only as prescribed by a health worker after a positive test, and finish the full course.";
const CONSULT_IF_PERSISTS: &str =
    "Your symptoms do not clearly point to malaria. See a health worker if they last more than two days or get worse.";
const LONG_FEVER: &str =
    "Fever lasting three days or more should always be tested for malaria.";
const MIXED_EVIDENCE: &str =
    "The available guidance does not agree clearly for these symptoms; a health worker should evaluate you in person.";
const DANGER_SIGNS: &str =
    "Watch for danger signs: confusion, fits, difficulty breathing, dark urine, yellow eyes or inability to drink. If any appear, seek emergency care.";
const REST_AND_FLUIDS: &str =
    "Rest and drink plenty of fluids.";
const DEGRADED_SEE_WORKER: &str =
    "This assessment could not be completed reliably. Please see a health worker for an in-person evaluation.";
const UNSUPPORTED_SEE_WORKER: &str =
    "We could not understand this description. Please describe the symptoms in English or Hindi, or see a health worker.";
const UNSUPPORTED_DANGER: &str =
    "If the person is unconscious, having fits or struggling to breathe, go to the nearest hospital immediately.";

const DISCLAIMER_EN: &str = "This is not a medical diagnosis. It is automated guidance based on public health information. Always consult a qualified health worker; in an emergency go to the nearest hospital immediately.";
const DISCLAIMER_HI: &str = "यह चिकित्सीय निदान नहीं है। यह सार्वजनिक स्वास्थ्य जानकारी पर आधारित स्वचालित मार्गदर्शन है। हमेशा किसी योग्य स्वास्थ्य कार्यकर्ता से सलाह लें; आपात स्थिति में तुरंत नजदीकी अस्पताल जाएं।";
const EMERGENCY_DISCLAIMER_EN: &str = "EMERGENCY: danger signs were detected. This tool cannot replace urgent medical care. Go to the nearest hospital now.";
const EMERGENCY_DISCLAIMER_HI: &str = "आपातकाल: खतरे के लक्षण पाए गए हैं। यह उपकरण तत्काल चिकित्सा देखभाल का विकल्प नहीं है। अभी नजदीकी अस्पताल जाएं।";
const PREGNANCY_DISCLAIMER_EN: &str = "Malaria during pregnancy is dangerous for both mother and baby; see a doctor without delay.";
const PREGNANCY_DISCLAIMER_HI: &str = "गर्भावस्था में मलेरिया मां और बच्चे दोनों के लिए खतरनाक है; बिना देरी डॉक्टर को दिखाएं।";

/// Per-query facts every composition needs.
#[derive(Debug, Clone)]
pub(crate) struct Context<'a> {
    pub language: Language,
    pub query: Option<&'a NormalizedQuery>,
    pub lexicon_version: &'a str,
    pub corpus_version: &'a str,
    pub sources: Vec<String>,
    pub faults: Vec<FaultKind>,
}

impl Context<'_> {
    fn pregnancy(&self) -> bool {
        self.query.is_some_and(|q| q.has_population(Population::Pregnancy))
    }

    fn child(&self) -> bool {
        self.query.is_some_and(|q| q.has_population(Population::Child))
    }

    fn assessment(
        &self,
        category: TriageCategory,
        tier: SeverityTier,
        confidence: f32,
        uncertain: bool,
        recommendations: Recs,
        disclaimer: String,
    ) -> Assessment {
        Assessment {
            assessment: category,
            confidence: confidence.clamp(0.0, 1.0),
            emergency_alert: tier == SeverityTier::Emergency,
            severity_tier: tier,
            recommendations: recommendations.0,
            disclaimer,
            sources: self.sources.clone(),
            uncertain,
            faults: self.faults.clone(),
            lexicon_version: self.lexicon_version.to_string(),
            corpus_version: self.corpus_version.to_string(),
            processing_time_ms: 0,
        }
    }
}

#[derive(Debug, Default)]
struct Recs(Vec<Recommendation>);

impl Recs {
    fn push(&mut self, kind: RecommendationKind, text: &str) {
        if !self.0.iter().any(|r| r.text == text) {
            self.0.push(Recommendation::new(kind, text));
        }
    }
}

fn disclaimer(language: Language, emergency: bool, pregnancy: bool) -> String {
    let (base, addendum) = match (language, emergency) {
        (Language::English, false) => (DISCLAIMER_EN, PREGNANCY_DISCLAIMER_EN),
        (Language::English, true) => (EMERGENCY_DISCLAIMER_EN, PREGNANCY_DISCLAIMER_EN),
        (Language::Hindi, false) => (DISCLAIMER_HI, PREGNANCY_DISCLAIMER_HI),
        (Language::Hindi, true) => (EMERGENCY_DISCLAIMER_HI, PREGNANCY_DISCLAIMER_HI),
    };
    if pregnancy {
        format!("{base} {addendum}")
    } else {
        base.to_string()
    }
}

fn symptom_list(matched: &[String]) -> String {
    matched
        .iter()
        .map(|t| t.replace('_', " "))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Short-circuit for EMERGENCY: escalation first, no self-care, minimal disclaimer.
pub(crate) fn emergency(ctx: &Context<'_>, signal: &EmergencySignal, score: &ConfidenceScore) -> Assessment {
    let mut recs = Recs::default();
    recs.push(RecommendationKind::ImmediateAction, SEEK_EMERGENCY_CARE);
    recs.push(RecommendationKind::ImmediateAction, DO_NOT_WAIT);
    if !signal.matched.is_empty() {
        let told = format!(
            "Tell the health worker about these danger signs: {}.",
            symptom_list(&signal.matched)
        );
        recs.push(RecommendationKind::ProfessionalCare, &told);
    }
    if ctx.pregnancy() {
        recs.push(RecommendationKind::ProfessionalCare, PREGNANCY_CARE);
    }

    ctx.assessment(
        TriageCategory::Emergency,
        SeverityTier::Emergency,
        score.value,
        score.uncertain,
        recs,
        disclaimer(ctx.language, true, ctx.pregnancy()),
    )
}

/// Full composition for non-emergency tiers.
pub(crate) fn standard(
    ctx: &Context<'_>,
    signal: &EmergencySignal,
    score: &ConfidenceScore,
    bands: &BandConfig,
) -> Assessment {
    let tier = signal.tier;
    let category = bands.category_for(score.value);
    let mut recs = Recs::default();

    if tier == SeverityTier::Severe {
        recs.push(RecommendationKind::ProfessionalCare, SEVERE_SEE_DOCTOR);
    }
    if ctx.pregnancy() {
        recs.push(RecommendationKind::ProfessionalCare, PREGNANCY_CARE);
    }
    if ctx.child() {
        recs.push(RecommendationKind::ProfessionalCare, CHILD_CARE);
    }

    match category {
        TriageCategory::Likely => {
            recs.push(RecommendationKind::Testing, TEST_TODAY);
            recs.push(RecommendationKind::ProfessionalCare, TREAT_AFTER_TEST);
        }
        TriageCategory::Possible => {
            recs.push(RecommendationKind::Testing, TEST_WITHIN_DAY);
            recs.push(RecommendationKind::ProfessionalCare, TREAT_AFTER_TEST);
        }
        _ => {
            if tier >= SeverityTier::Moderate {
                recs.push(RecommendationKind::Testing, TEST_WITHIN_DAY);
            }
            recs.push(RecommendationKind::ProfessionalCare, CONSULT_IF_PERSISTS);
        }
    }

    let long_fever = ctx
        .query
        .is_some_and(|q| q.malaria_associated() && q.duration_days().is_some_and(|d| d >= 3));
    if long_fever {
        recs.push(RecommendationKind::Testing, LONG_FEVER);
    }
    if score.uncertain {
        recs.push(RecommendationKind::ProfessionalCare, MIXED_EVIDENCE);
    }
    recs.push(RecommendationKind::Monitoring, DANGER_SIGNS);
    if category == TriageCategory::Inconclusive && tier <= SeverityTier::Mild && !score.uncertain {
        recs.push(RecommendationKind::SelfCare, REST_AND_FLUIDS);
    }

    ctx.assessment(
        category,
        tier,
        score.value,
        score.uncertain,
        recs,
        disclaimer(ctx.language, false, ctx.pregnancy()),
    )
}

/// Cautious output for a query whose classification or evidence could not be trusted.
/// Never lowers the tier below MODERATE.
pub(crate) fn degraded(ctx: &Context<'_>, tier: SeverityTier, scoring: &ScoringConfig) -> Assessment {
    let tier = tier.max(SeverityTier::Moderate);
    let mut recs = Recs::default();
    recs.push(RecommendationKind::ProfessionalCare, DEGRADED_SEE_WORKER);
    if tier == SeverityTier::Severe {
        recs.push(RecommendationKind::ProfessionalCare, SEVERE_SEE_DOCTOR);
    }
    if ctx.pregnancy() {
        recs.push(RecommendationKind::ProfessionalCare, PREGNANCY_CARE);
    }
    recs.push(RecommendationKind::Testing, TEST_WITHIN_DAY);
    recs.push(RecommendationKind::Monitoring, DANGER_SIGNS);

    ctx.assessment(
        TriageCategory::Degraded,
        tier,
        scoring.degraded_confidence,
        true,
        recs,
        disclaimer(ctx.language, false, ctx.pregnancy()),
    )
}

/// Output for text the normalizer rejected. The language is unknown, so both disclaimers
/// are included.
pub(crate) fn unsupported_input(ctx: &Context<'_>) -> Assessment {
    let mut recs = Recs::default();
    recs.push(RecommendationKind::ProfessionalCare, UNSUPPORTED_SEE_WORKER);
    recs.push(RecommendationKind::Monitoring, UNSUPPORTED_DANGER);
    ctx.assessment(
        TriageCategory::UnsupportedInput,
        SeverityTier::None,
        0.0,
        true,
        recs,
        format!("{DISCLAIMER_EN} {DISCLAIMER_HI}"),
    )
}

/// Replacement for an assessment that failed the guardrail. An emergency stays an emergency.
pub(crate) fn cautious_fallback(failed: &Assessment, scoring: &ScoringConfig) -> Assessment {
    let emergency = failed.emergency_alert || failed.severity_tier == SeverityTier::Emergency;
    let mut recs = Recs::default();
    let (category, tier, confidence, text) = if emergency {
        recs.push(RecommendationKind::ImmediateAction, SEEK_EMERGENCY_CARE);
        recs.push(RecommendationKind::ImmediateAction, DO_NOT_WAIT);
        (
            TriageCategory::Emergency,
            SeverityTier::Emergency,
            scoring.emergency_floor,
            EMERGENCY_DISCLAIMER_EN,
        )
    } else {
        recs.push(RecommendationKind::ProfessionalCare, DEGRADED_SEE_WORKER);
        recs.push(RecommendationKind::Testing, TEST_WITHIN_DAY);
        recs.push(RecommendationKind::Monitoring, DANGER_SIGNS);
        (
            TriageCategory::Degraded,
            failed.severity_tier.max(SeverityTier::Moderate),
            scoring.degraded_confidence,
            DISCLAIMER_EN,
        )
    };

    let mut sources: Vec<String> = Vec::new();
    for s in &failed.sources {
        if !sources.contains(s) {
            sources.push(s.clone());
        }
    }

    Assessment {
        assessment: category,
        confidence: confidence.clamp(0.0, 1.0),
        emergency_alert: emergency,
        severity_tier: tier,
        recommendations: recs.0,
        disclaimer: text.to_string(),
        sources,
        uncertain: true,
        faults: failed.faults.clone(),
        lexicon_version: failed.lexicon_version.clone(),
        corpus_version: failed.corpus_version.clone(),
        processing_time_ms: 0,
    }
}
