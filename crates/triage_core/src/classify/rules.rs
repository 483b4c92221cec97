use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{Population, SeverityTier};
use crate::error::{codes, AppError};

const BUILTIN_RULES: &str = include_str!("../../assets/emergency_rules_v1.toml");

/// One `[[rule]]` entry of the emergency rule asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleDef {
    pub id: String,
    pub tier: SeverityTier,
    #[serde(default)]
    pub all_of: Vec<String>,
    #[serde(default)]
    pub any_of: Vec<String>,
    /// Defaults to 1 when `any_of` is non-empty.
    #[serde(default)]
    pub min_any: Option<usize>,
    #[serde(default)]
    pub min_duration_days: Option<u32>,
    #[serde(default)]
    pub population: Option<Population>,
    #[serde(default)]
    pub rationale: String,
}

impl RuleDef {
    pub fn effective_min_any(&self) -> usize {
        match self.min_any {
            Some(n) => n,
            None if self.any_of.is_empty() => 0,
            None => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleSet {
    pub version: String,
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleDef>,
}

impl RuleSet {
    pub fn builtin() -> Result<Self, AppError> {
        Self::from_toml(BUILTIN_RULES)
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::new(codes::RULES_INVALID, "Failed to read emergency rules")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, AppError> {
        let set: RuleSet = toml::from_str(raw).map_err(|e| {
            AppError::new(codes::RULES_INVALID, "Failed to decode emergency rules").with_details(e.to_string())
        })?;
        set.validate()?;
        Ok(set)
    }

    /// Structural checks that need no lexicon.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.version.trim().is_empty() {
            return Err(AppError::new(codes::RULES_INVALID, "Rule set version is required"));
        }
        let mut seen = BTreeSet::new();
        for r in &self.rules {
            if r.id.trim().is_empty() {
                return Err(AppError::new(codes::RULES_INVALID, "Rule id must not be empty"));
            }
            if !seen.insert(r.id.as_str()) {
                return Err(AppError::new(codes::RULES_INVALID, "Duplicate rule id")
                    .with_details(format!("rule={}", r.id)));
            }
            if r.id.starts_with("lexicon:") {
                return Err(AppError::new(codes::RULES_INVALID, "Rule ids must not use the lexicon: prefix")
                    .with_details(format!("rule={}", r.id)));
            }
            if r.tier == SeverityTier::None {
                return Err(AppError::new(codes::RULES_INVALID, "Rule tier must not be none")
                    .with_details(format!("rule={}", r.id)));
            }
            if r.all_of.is_empty() && r.any_of.is_empty() {
                return Err(AppError::new(codes::RULES_INVALID, "Rule needs at least one symptom condition")
                    .with_details(format!("rule={}", r.id)));
            }
            let min_any = r.effective_min_any();
            if min_any > r.any_of.len() {
                return Err(AppError::new(codes::RULES_INVALID, "min_any exceeds any_of length")
                    .with_details(format!("rule={}; min_any={}; any_of={}", r.id, min_any, r.any_of.len())));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_rules_parse() {
        let set = RuleSet::builtin().expect("builtin");
        assert!(!set.version.is_empty());
        assert!(set.rules.iter().any(|r| r.id == "EMG-001"));
        let mod4 = set.rules.iter().find(|r| r.id == "MOD-004").expect("MOD-004");
        assert_eq!(mod4.effective_min_any(), 2);
    }

    #[test]
    fn rejects_structural_problems() {
        let dup = r#"
            version = "t"
            [[rule]]
            id = "A"
            tier = "mild"
            all_of = ["fever"]
            [[rule]]
            id = "A"
            tier = "mild"
            all_of = ["fever"]
        "#;
        assert_eq!(RuleSet::from_toml(dup).unwrap_err().code, codes::RULES_INVALID);

        let no_condition = r#"
            version = "t"
            [[rule]]
            id = "A"
            tier = "mild"
            population = "child"
        "#;
        assert!(RuleSet::from_toml(no_condition).is_err());

        let too_many = r#"
            version = "t"
            [[rule]]
            id = "A"
            tier = "severe"
            any_of = ["fever"]
            min_any = 2
        "#;
        assert!(RuleSet::from_toml(too_many).is_err());

        let none_tier = r#"
            version = "t"
            [[rule]]
            id = "A"
            tier = "none"
            all_of = ["fever"]
        "#;
        assert!(RuleSet::from_toml(none_tier).is_err());
    }
}
