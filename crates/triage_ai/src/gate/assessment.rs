use serde::{Serialize, Serializer};
use triage_core::domain::{FaultKind, SeverityTier, TriageCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    ImmediateAction,
    ProfessionalCare,
    Testing,
    Monitoring,
    SelfCare,
}

/// One line of guidance. Serialized as its text only; the kind exists for guardrail checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub text: String,
}

impl Recommendation {
    pub fn new(kind: RecommendationKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

impl Serialize for Recommendation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

fn serialize_fault_codes<S: Serializer>(faults: &[FaultKind], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(faults.iter().map(|f| f.code()))
}

/// Final, safety-reviewed output of the pipeline. Every field except `processing_time_ms` is
/// a pure function of the query text, hint and asset versions.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Assessment {
    pub(crate) assessment: TriageCategory,
    pub(crate) confidence: f32,
    pub(crate) emergency_alert: bool,
    pub(crate) severity_tier: SeverityTier,
    pub(crate) recommendations: Vec<Recommendation>,
    pub(crate) disclaimer: String,
    pub(crate) sources: Vec<String>,
    pub(crate) uncertain: bool,
    #[serde(serialize_with = "serialize_fault_codes")]
    pub(crate) faults: Vec<FaultKind>,
    pub(crate) lexicon_version: String,
    pub(crate) corpus_version: String,
    pub(crate) processing_time_ms: u64,
}

impl Assessment {
    pub fn category(&self) -> TriageCategory {
        self.assessment
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn emergency_alert(&self) -> bool {
        self.emergency_alert
    }

    pub fn severity_tier(&self) -> SeverityTier {
        self.severity_tier
    }

    pub fn recommendations(&self) -> &[Recommendation] {
        &self.recommendations
    }

    pub fn disclaimer(&self) -> &str {
        &self.disclaimer
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn uncertain(&self) -> bool {
        self.uncertain
    }

    pub fn faults(&self) -> &[FaultKind] {
        &self.faults
    }

    pub fn lexicon_version(&self) -> &str {
        &self.lexicon_version
    }

    pub fn corpus_version(&self) -> &str {
        &self.corpus_version
    }

    pub fn processing_time_ms(&self) -> u64 {
        self.processing_time_ms
    }

    /// Copy with the timing field zeroed, for determinism comparisons.
    pub fn without_timing(&self) -> Self {
        Self {
            processing_time_ms: 0,
            ..self.clone()
        }
    }
}
