use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{AuthorityTier, TriageCategory};
use crate::error::{codes, AppError};

pub mod defaults;

/// Top-level pipeline configuration. Every section falls back to compiled defaults, so a
/// TOML file only needs the keys it overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct TriageConfig {
    pub retrieval: RetrievalConfig,
    pub scoring: ScoringConfig,
    pub bands: BandConfig,
    pub gate: GateConfig,
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Diversity cap: maximum chunks kept from one source.
    pub per_source_max: usize,
    /// Candidates below this cosine similarity are never returned.
    pub min_similarity: f32,
    /// Word-set Jaccard above which a candidate counts as a near-duplicate of a kept chunk.
    pub near_duplicate_jaccard: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: defaults::TOP_K,
            per_source_max: defaults::PER_SOURCE_MAX,
            min_similarity: defaults::MIN_SIMILARITY,
            near_duplicate_jaccard: defaults::NEAR_DUPLICATE_JACCARD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthorityWeights {
    pub primary_guideline: f32,
    pub national_health_body: f32,
    pub general: f32,
}

impl Default for AuthorityWeights {
    fn default() -> Self {
        Self {
            primary_guideline: defaults::WEIGHT_PRIMARY_GUIDELINE,
            national_health_body: defaults::WEIGHT_NATIONAL_HEALTH_BODY,
            general: defaults::WEIGHT_GENERAL,
        }
    }
}

impl AuthorityWeights {
    pub fn weight(&self, tier: AuthorityTier) -> f32 {
        match tier {
            AuthorityTier::PrimaryGuideline => self.primary_guideline,
            AuthorityTier::NationalHealthBody => self.national_health_body,
            AuthorityTier::General => self.general,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    /// Number of top hits the scorer looks at.
    pub top_n: usize,
    pub emergency_floor: f32,
    pub severe_floor: f32,
    pub empty_confidence: f32,
    pub degraded_confidence: f32,
    /// Maximum gap in authority-adjusted relevance between the two leading sources before
    /// the result is flagged uncertain.
    pub authority_margin: f32,
    pub authority_weights: AuthorityWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            top_n: defaults::SCORING_TOP_N,
            emergency_floor: defaults::EMERGENCY_FLOOR,
            severe_floor: defaults::SEVERE_FLOOR,
            empty_confidence: defaults::EMPTY_CONFIDENCE,
            degraded_confidence: defaults::DEGRADED_CONFIDENCE,
            authority_margin: defaults::AUTHORITY_MARGIN,
            authority_weights: AuthorityWeights::default(),
        }
    }
}

/// Confidence thresholds mapping a score onto a triage category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BandConfig {
    pub likely: f32,
    pub possible: f32,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            likely: defaults::BAND_LIKELY,
            possible: defaults::BAND_POSSIBLE,
        }
    }
}

impl BandConfig {
    pub fn category_for(&self, confidence: f32) -> TriageCategory {
        if confidence >= self.likely {
            TriageCategory::Likely
        } else if confidence >= self.possible {
            TriageCategory::Possible
        } else {
            TriageCategory::Inconclusive
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GateConfig {
    /// Wall-clock budget per query; retrieval is abandoned once it elapses.
    pub budget_ms: u64,
    /// Hard ceiling for classification. Larger than the budget.
    pub classification_ceiling_ms: u64,
    /// Queries beyond this many in flight wait for a slot.
    pub max_concurrent: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            budget_ms: defaults::BUDGET_MS,
            classification_ceiling_ms: defaults::CLASSIFICATION_CEILING_MS,
            max_concurrent: defaults::MAX_CONCURRENT,
        }
    }
}

impl GateConfig {
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }

    pub fn classification_ceiling(&self) -> Duration {
        Duration::from_millis(self.classification_ceiling_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dims: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: defaults::EMBEDDING_MODEL.to_string(),
            dims: defaults::EMBEDDING_DIMS,
        }
    }
}

/// Overrides supplied on the command line; highest priority.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub budget_ms: Option<u64>,
    pub max_concurrent: Option<usize>,
    pub embedding_model: Option<String>,
}

impl TriageConfig {
    /// Compiled defaults, then the optional TOML file, then overrides. The result is validated.
    pub fn load(path: Option<&Path>, overrides: Option<&ConfigOverrides>) -> Result<Self, AppError> {
        let mut config = match path {
            Some(p) => {
                let raw = fs::read_to_string(p).map_err(|e| {
                    AppError::new(codes::CONFIG_INVALID, "Failed to read config file")
                        .with_details(format!("path={}; err={}", p.display(), e))
                })?;
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };

        if let Some(o) = overrides {
            if let Some(b) = o.budget_ms {
                config.gate.budget_ms = b;
                // A budget raised above the ceiling lifts the ceiling with it.
                config.gate.classification_ceiling_ms = config.gate.classification_ceiling_ms.max(b);
            }
            if let Some(m) = o.max_concurrent {
                config.gate.max_concurrent = m;
            }
            if let Some(model) = o.embedding_model.as_ref() {
                config.embedding.model = model.clone();
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, AppError> {
        toml::from_str(raw).map_err(|e| {
            AppError::new(codes::CONFIG_INVALID, "Failed to parse config TOML").with_details(e.to_string())
        })
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let unit = |name: &str, v: f32| -> Result<(), AppError> {
            if !(0.0..=1.0).contains(&v) || v.is_nan() {
                return Err(AppError::new(codes::CONFIG_INVALID, "Value must be within [0, 1]")
                    .with_details(format!("field={name}; value={v}")));
            }
            Ok(())
        };

        unit("retrieval.min_similarity", self.retrieval.min_similarity)?;
        unit("retrieval.near_duplicate_jaccard", self.retrieval.near_duplicate_jaccard)?;
        unit("scoring.emergency_floor", self.scoring.emergency_floor)?;
        unit("scoring.severe_floor", self.scoring.severe_floor)?;
        unit("scoring.empty_confidence", self.scoring.empty_confidence)?;
        unit("scoring.degraded_confidence", self.scoring.degraded_confidence)?;
        unit("scoring.authority_margin", self.scoring.authority_margin)?;
        unit("scoring.authority_weights.primary_guideline", self.scoring.authority_weights.primary_guideline)?;
        unit(
            "scoring.authority_weights.national_health_body",
            self.scoring.authority_weights.national_health_body,
        )?;
        unit("scoring.authority_weights.general", self.scoring.authority_weights.general)?;
        unit("bands.likely", self.bands.likely)?;
        unit("bands.possible", self.bands.possible)?;

        let invalid = |msg: &str, details: String| AppError::new(codes::CONFIG_INVALID, msg).with_details(details);

        if self.bands.possible > self.bands.likely {
            return Err(invalid(
                "bands.possible must not exceed bands.likely",
                format!("possible={}; likely={}", self.bands.possible, self.bands.likely),
            ));
        }
        if self.scoring.empty_confidence >= self.bands.likely {
            return Err(invalid(
                "scoring.empty_confidence must stay below the likely band",
                format!("empty_confidence={}; likely={}", self.scoring.empty_confidence, self.bands.likely),
            ));
        }
        if self.scoring.degraded_confidence >= self.bands.likely {
            return Err(invalid(
                "scoring.degraded_confidence must stay below the likely band",
                format!("degraded_confidence={}; likely={}", self.scoring.degraded_confidence, self.bands.likely),
            ));
        }
        if self.retrieval.top_k == 0 || self.retrieval.per_source_max == 0 || self.scoring.top_n == 0 {
            return Err(invalid(
                "retrieval.top_k, retrieval.per_source_max and scoring.top_n must be at least 1",
                format!(
                    "top_k={}; per_source_max={}; top_n={}",
                    self.retrieval.top_k, self.retrieval.per_source_max, self.scoring.top_n
                ),
            ));
        }
        if self.gate.budget_ms == 0 || self.gate.max_concurrent == 0 {
            return Err(invalid(
                "gate.budget_ms and gate.max_concurrent must be at least 1",
                format!("budget_ms={}; max_concurrent={}", self.gate.budget_ms, self.gate.max_concurrent),
            ));
        }
        if self.gate.classification_ceiling_ms < self.gate.budget_ms {
            return Err(invalid(
                "gate.classification_ceiling_ms must be at least gate.budget_ms",
                format!(
                    "ceiling_ms={}; budget_ms={}",
                    self.gate.classification_ceiling_ms, self.gate.budget_ms
                ),
            ));
        }
        if self.embedding.dims < 8 || self.embedding.model.trim().is_empty() {
            return Err(invalid(
                "embedding.model is required and embedding.dims must be at least 8",
                format!("model={}; dims={}", self.embedding.model, self.embedding.dims),
            ));
        }
        Ok(())
    }
}
