use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::domain::{Language, Population, SeverityTier};
use crate::error::{codes, AppError};

const BUILTIN_LEXICON: &str = include_str!("../../assets/lexicon_v1.json");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SymptomDef {
    pub id: String,
    pub tier_hint: SeverityTier,
    pub malaria_associated: bool,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TermDef {
    pub term: String,
    pub language: Language,
    pub canonical: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PopulationCue {
    pub term: String,
    pub population: Population,
}

/// On-disk shape of the versioned symptom lexicon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LexiconAsset {
    pub version: String,
    pub symptoms: Vec<SymptomDef>,
    pub terms: Vec<TermDef>,
    #[serde(default)]
    pub populations: Vec<PopulationCue>,
}

/// Compiled, read-only lexicon. Phrases are stored case-folded and NFC-normalized with
/// single spaces between words, the same form the normalizer produces.
#[derive(Debug, Clone)]
pub struct Lexicon {
    version: String,
    symptoms: BTreeMap<String, SymptomDef>,
    /// Candidate ids per phrase, highest tier hint first.
    phrases: BTreeMap<String, Vec<String>>,
    populations: BTreeMap<String, Population>,
    max_term_words: usize,
}

/// Case-fold, NFC-normalize, drop apostrophes and collapse whitespace.
///
/// Apostrophes are removed rather than split on, so "can't" and "cant" fold to one word.
pub fn fold_phrase(s: &str) -> String {
    let composed: String = s.nfc().filter(|c| !is_apostrophe(*c)).collect();
    composed
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_apostrophe(c: char) -> bool {
    matches!(c, '\'' | '\u{2018}' | '\u{2019}' | '\u{02BC}' | '`')
}

impl Lexicon {
    pub fn builtin() -> Result<Self, AppError> {
        Self::from_json(BUILTIN_LEXICON)
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::new(codes::LEXICON_INVALID, "Failed to read lexicon")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let asset: LexiconAsset = serde_json::from_str(raw).map_err(|e| {
            AppError::new(codes::LEXICON_INVALID, "Failed to decode lexicon").with_details(e.to_string())
        })?;
        Self::compile(asset)
    }

    pub fn compile(asset: LexiconAsset) -> Result<Self, AppError> {
        if asset.version.trim().is_empty() {
            return Err(AppError::new(codes::LEXICON_INVALID, "Lexicon version is required"));
        }

        let mut symptoms = BTreeMap::new();
        for s in asset.symptoms {
            if s.id.trim().is_empty() {
                return Err(AppError::new(codes::LEXICON_INVALID, "Symptom id must not be empty"));
            }
            if symptoms.contains_key(&s.id) {
                return Err(AppError::new(codes::LEXICON_INVALID, "Duplicate symptom id")
                    .with_details(format!("id={}", s.id)));
            }
            symptoms.insert(s.id.clone(), s);
        }

        let mut phrases: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut max_term_words = 1usize;
        for t in asset.terms {
            let Some(def) = symptoms.get(&t.canonical) else {
                return Err(AppError::new(codes::LEXICON_INVALID, "Term maps to an unknown symptom")
                    .with_details(format!("term={}; canonical={}", t.term, t.canonical)));
            };
            let key = fold_phrase(&t.term);
            if key.is_empty() {
                return Err(AppError::new(codes::LEXICON_INVALID, "Term must not be empty")
                    .with_details(format!("canonical={}", t.canonical)));
            }
            max_term_words = max_term_words.max(key.split(' ').count());

            // An ambiguous term keeps every candidate; the higher tier wins at lookup.
            let candidates = phrases.entry(key).or_default();
            if candidates.contains(&t.canonical) {
                continue;
            }
            let tier = def.tier_hint;
            let at = candidates
                .iter()
                .position(|c| symptoms.get(c).is_some_and(|d| d.tier_hint < tier))
                .unwrap_or(candidates.len());
            candidates.insert(at, t.canonical);
        }

        let mut populations = BTreeMap::new();
        for cue in asset.populations {
            let key = fold_phrase(&cue.term);
            if key.is_empty() {
                continue;
            }
            max_term_words = max_term_words.max(key.split(' ').count());
            populations.insert(key, cue.population);
        }

        tracing::debug!(
            version = %asset.version,
            symptoms = symptoms.len(),
            phrases = phrases.len(),
            "lexicon compiled"
        );

        Ok(Self {
            version: asset.version,
            symptoms,
            phrases,
            populations,
            max_term_words,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Canonical id for an already-folded phrase. When the phrase is ambiguous, the candidate
    /// with the highest tier hint is returned; equal tiers keep lexicon order.
    pub fn canonical_for(&self, folded_phrase: &str) -> Option<&str> {
        self.candidates_for(folded_phrase).first().map(|s| s.as_str())
    }

    /// Every canonical id an already-folded phrase maps to, highest tier hint first.
    pub fn candidates_for(&self, folded_phrase: &str) -> &[String] {
        self.phrases.get(folded_phrase).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn population_for(&self, folded_phrase: &str) -> Option<Population> {
        self.populations.get(folded_phrase).copied()
    }

    pub fn symptom(&self, id: &str) -> Option<&SymptomDef> {
        self.symptoms.get(id)
    }

    pub fn symptoms(&self) -> impl Iterator<Item = &SymptomDef> {
        self.symptoms.values()
    }

    pub fn symptom_ids(&self) -> BTreeSet<&str> {
        self.symptoms.keys().map(|k| k.as_str()).collect()
    }

    pub fn is_malaria_associated(&self, id: &str) -> bool {
        self.symptoms.get(id).map(|s| s.malaria_associated).unwrap_or(false)
    }

    pub fn max_term_words(&self) -> usize {
        self.max_term_words
    }
}
