use serde::{Deserialize, Serialize};

use crate::error::codes;

/// Query languages the normalizer and disclaimers support.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Language {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "hi")]
    Hindi,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Hindi => "hi",
        }
    }

    pub fn from_code(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "eng" | "english" => Some(Self::English),
            "hi" | "hin" | "hindi" => Some(Self::Hindi),
            _ => None,
        }
    }
}

/// Ordered symptom urgency. Declaration order is the severity order, so `max()` picks the
/// most urgent tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeverityTier {
    #[default]
    None,
    Mild,
    Moderate,
    Severe,
    Emergency,
}

impl SeverityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityTier::None => "none",
            SeverityTier::Mild => "mild",
            SeverityTier::Moderate => "moderate",
            SeverityTier::Severe => "severe",
            SeverityTier::Emergency => "emergency",
        }
    }
}

/// Weighting class of a document's originating institution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorityTier {
    PrimaryGuideline,
    NationalHealthBody,
    General,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Population {
    Pregnancy,
    Child,
    Elderly,
}

/// Annotation extracted alongside the canonical tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Qualifier {
    Duration { text: String, days: u32 },
    Population { population: Population },
}

/// Output of the query normalizer. Fields are read-only once produced.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NormalizedQuery {
    raw: String,
    language: Language,
    tokens: Vec<String>,
    free_text: Vec<String>,
    qualifiers: Vec<Qualifier>,
    malaria_associated: bool,
    lexicon_version: String,
}

impl NormalizedQuery {
    pub(crate) fn new(
        raw: String,
        language: Language,
        tokens: Vec<String>,
        free_text: Vec<String>,
        qualifiers: Vec<Qualifier>,
        malaria_associated: bool,
        lexicon_version: String,
    ) -> Self {
        Self {
            raw,
            language,
            tokens,
            free_text,
            qualifiers,
            malaria_associated,
            lexicon_version,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Canonical symptom tokens in order of first appearance.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Words the lexicon did not recognize. Never used for matching.
    pub fn free_text(&self) -> &[String] {
        &self.free_text
    }

    pub fn qualifiers(&self) -> &[Qualifier] {
        &self.qualifiers
    }

    pub fn has_token(&self, id: &str) -> bool {
        self.tokens.iter().any(|t| t == id)
    }

    pub fn malaria_associated(&self) -> bool {
        self.malaria_associated
    }

    pub fn lexicon_version(&self) -> &str {
        &self.lexicon_version
    }

    /// Longest reported duration in days, if any duration was mentioned.
    pub fn duration_days(&self) -> Option<u32> {
        self.qualifiers
            .iter()
            .filter_map(|q| match q {
                Qualifier::Duration { days, .. } => Some(*days),
                _ => None,
            })
            .max()
    }

    pub fn has_population(&self, population: Population) -> bool {
        self.qualifiers
            .iter()
            .any(|q| matches!(q, Qualifier::Population { population: p } if *p == population))
    }
}

/// Highest-tier classification outcome together with what triggered it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmergencySignal {
    pub tier: SeverityTier,
    pub matched: Vec<String>,
    /// Rule id (`EMG-001`) or `lexicon:<symptom>` for tier hints taken from the lexicon.
    pub rule_id: String,
    pub rationale: String,
}

impl EmergencySignal {
    pub fn none() -> Self {
        Self {
            tier: SeverityTier::None,
            matched: Vec::new(),
            rule_id: String::new(),
            rationale: String::new(),
        }
    }

    pub fn is_emergency(&self) -> bool {
        self.tier == SeverityTier::Emergency
    }
}

/// Recoverable query faults. Each one still resolves to an assessment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    UnsupportedInput,
    RetrievalUnavailable,
    ClassificationTimeout,
    CorpusVersionMismatch,
}

impl FaultKind {
    pub fn code(&self) -> &'static str {
        match self {
            FaultKind::UnsupportedInput => codes::UNSUPPORTED_INPUT,
            FaultKind::RetrievalUnavailable => codes::RETRIEVAL_UNAVAILABLE,
            FaultKind::ClassificationTimeout => codes::CLASSIFICATION_TIMEOUT,
            FaultKind::CorpusVersionMismatch => codes::CORPUS_VERSION_MISMATCH,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            codes::UNSUPPORTED_INPUT => Some(Self::UnsupportedInput),
            codes::RETRIEVAL_UNAVAILABLE => Some(Self::RetrievalUnavailable),
            codes::CLASSIFICATION_TIMEOUT => Some(Self::ClassificationTimeout),
            codes::CORPUS_VERSION_MISMATCH => Some(Self::CorpusVersionMismatch),
            _ => None,
        }
    }
}

/// Coarse output label of an assessment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TriageCategory {
    Likely,
    Possible,
    Inconclusive,
    Emergency,
    UnsupportedInput,
    Degraded,
}

impl TriageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriageCategory::Likely => "likely",
            TriageCategory::Possible => "possible",
            TriageCategory::Inconclusive => "inconclusive",
            TriageCategory::Emergency => "emergency",
            TriageCategory::UnsupportedInput => "unsupported_input",
            TriageCategory::Degraded => "degraded",
        }
    }
}
