//! Compiled defaults for `TriageConfig`.

pub const TOP_K: usize = 5;
pub const PER_SOURCE_MAX: usize = 2;
pub const MIN_SIMILARITY: f32 = 0.25;
pub const NEAR_DUPLICATE_JACCARD: f32 = 0.8;

pub const SCORING_TOP_N: usize = 3;
pub const EMERGENCY_FLOOR: f32 = 0.9;
pub const SEVERE_FLOOR: f32 = 0.7;
pub const EMPTY_CONFIDENCE: f32 = 0.2;
pub const DEGRADED_CONFIDENCE: f32 = 0.1;
pub const AUTHORITY_MARGIN: f32 = 0.15;

pub const WEIGHT_PRIMARY_GUIDELINE: f32 = 1.0;
pub const WEIGHT_NATIONAL_HEALTH_BODY: f32 = 0.8;
pub const WEIGHT_GENERAL: f32 = 0.5;

pub const BAND_LIKELY: f32 = 0.8;
pub const BAND_POSSIBLE: f32 = 0.5;

pub const BUDGET_MS: u64 = 3_000;
pub const CLASSIFICATION_CEILING_MS: u64 = 10_000;
pub const MAX_CONCURRENT: usize = 16;

pub const EMBEDDING_MODEL: &str = "hashing-v1";
pub const EMBEDDING_DIMS: usize = 256;
