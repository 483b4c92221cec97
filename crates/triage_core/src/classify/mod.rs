use crate::domain::{EmergencySignal, NormalizedQuery, SeverityTier};
use crate::error::{codes, AppError};
use crate::lexicon::Lexicon;

mod rules;

pub use rules::{RuleDef, RuleSet};

/// Seam between the response gate and whatever decides severity.
///
/// Implementations must be cheap and total: they see only canonical tokens and qualifiers and
/// never depend on retrieval.
pub trait SeverityClassifier: Send + Sync {
    fn classify(&self, query: &NormalizedQuery) -> EmergencySignal;
}

#[derive(Debug, Clone)]
struct CompiledRule {
    id: String,
    tier: SeverityTier,
    all_of: Vec<String>,
    any_of: Vec<String>,
    min_any: usize,
    min_duration_days: Option<u32>,
    population: Option<crate::domain::Population>,
    rationale: String,
}

impl CompiledRule {
    fn evaluate(&self, query: &NormalizedQuery) -> Option<EmergencySignal> {
        if !self.all_of.iter().all(|t| query.has_token(t)) {
            return None;
        }
        let present_any: Vec<&String> = self.any_of.iter().filter(|t| query.has_token(t)).collect();
        if present_any.len() < self.min_any {
            return None;
        }
        if let Some(min_days) = self.min_duration_days {
            match query.duration_days() {
                Some(days) if days >= min_days => {}
                _ => return None,
            }
        }
        if let Some(population) = self.population {
            if !query.has_population(population) {
                return None;
            }
        }

        let mut matched: Vec<String> = Vec::new();
        for t in self.all_of.iter().chain(present_any) {
            if !matched.contains(t) {
                matched.push(t.clone());
            }
        }
        Some(EmergencySignal {
            tier: self.tier,
            matched,
            rule_id: self.id.clone(),
            rationale: self.rationale.clone(),
        })
    }
}

/// Tiered pattern matcher over canonical symptom tokens.
///
/// Explicit rules are evaluated in file order, followed by one implicit rule per lexicon
/// symptom carrying a tier hint. The first match of the highest tier wins, so co-occurrence
/// rules beat single-symptom hints at the same tier.
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    rules_version: String,
    lexicon_version: String,
    rules: Vec<CompiledRule>,
}

impl RuleClassifier {
    pub fn new(rule_set: RuleSet, lexicon: &Lexicon) -> Result<Self, AppError> {
        let known = lexicon.symptom_ids();
        let mut rules = Vec::with_capacity(rule_set.rules.len() + known.len());

        for def in rule_set.rules {
            for t in def.all_of.iter().chain(def.any_of.iter()) {
                if !known.contains(t.as_str()) {
                    return Err(AppError::new(
                        codes::RULES_INVALID,
                        "Rule references a symptom missing from the lexicon",
                    )
                    .with_details(format!(
                        "rule={}; symptom={}; lexicon_version={}",
                        def.id,
                        t,
                        lexicon.version()
                    )));
                }
            }
            let min_any = def.effective_min_any();
            rules.push(CompiledRule {
                id: def.id,
                tier: def.tier,
                all_of: def.all_of,
                any_of: def.any_of,
                min_any,
                min_duration_days: def.min_duration_days,
                population: def.population,
                rationale: def.rationale,
            });
        }

        for symptom in lexicon.symptoms() {
            if symptom.tier_hint == SeverityTier::None {
                continue;
            }
            rules.push(CompiledRule {
                id: format!("lexicon:{}", symptom.id),
                tier: symptom.tier_hint,
                all_of: vec![symptom.id.clone()],
                any_of: Vec::new(),
                min_any: 0,
                min_duration_days: None,
                population: None,
                rationale: symptom.rationale.clone(),
            });
        }

        tracing::debug!(
            rules_version = %rule_set.version,
            rules = rules.len(),
            "emergency rules compiled"
        );

        Ok(Self {
            rules_version: rule_set.version,
            lexicon_version: lexicon.version().to_string(),
            rules,
        })
    }

    /// Builtin rules compiled against the builtin lexicon.
    pub fn builtin() -> Result<Self, AppError> {
        Self::new(RuleSet::builtin()?, &Lexicon::builtin()?)
    }

    pub fn rules_version(&self) -> &str {
        &self.rules_version
    }

    pub fn lexicon_version(&self) -> &str {
        &self.lexicon_version
    }

    /// Every matching signal in evaluation order.
    pub fn classify_all(&self, query: &NormalizedQuery) -> Vec<EmergencySignal> {
        self.rules.iter().filter_map(|r| r.evaluate(query)).collect()
    }
}

impl SeverityClassifier for RuleClassifier {
    fn classify(&self, query: &NormalizedQuery) -> EmergencySignal {
        let mut best: Option<EmergencySignal> = None;
        for rule in &self.rules {
            // Nothing outranks an emergency found earlier in order.
            if matches!(&best, Some(b) if b.tier == SeverityTier::Emergency) {
                break;
            }
            if best.as_ref().is_some_and(|b| b.tier >= rule.tier) {
                continue;
            }
            if let Some(signal) = rule.evaluate(query) {
                best = Some(signal);
            }
        }

        let signal = best.unwrap_or_else(EmergencySignal::none);
        tracing::debug!(
            tier = signal.tier.as_str(),
            rule = %signal.rule_id,
            "severity classified"
        );
        signal
    }
}
