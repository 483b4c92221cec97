use serde::Serialize;
use triage_core::config::ScoringConfig;
use triage_core::domain::SeverityTier;

use crate::retrieve::RetrievalResult;

/// Per-factor breakdown behind a confidence value. Logged, never shown to users.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ScoreComponents {
    pub retrieval: f32,
    pub agreement: f32,
    pub authority: f32,
    pub malaria_share: f32,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ConfidenceScore {
    pub value: f32,
    pub uncertain: bool,
    pub components: Option<ScoreComponents>,
}

/// Confidence that the query is malaria-related, in `[0, 1]`.
///
/// Severity floors are applied last: an EMERGENCY or SEVERE classification can raise the
/// value but evidence can never pull it below the floor.
pub fn score(result: &RetrievalResult, tier: SeverityTier, cfg: &ScoringConfig) -> ConfidenceScore {
    let mut out = if result.is_empty() {
        ConfidenceScore {
            value: cfg.empty_confidence,
            uncertain: true,
            components: None,
        }
    } else {
        evidence_score(result, cfg)
    };

    let floor = match tier {
        SeverityTier::Emergency => Some(cfg.emergency_floor),
        SeverityTier::Severe => Some(cfg.severe_floor),
        _ => None,
    };
    if let Some(floor) = floor {
        out.value = out.value.max(floor);
    }
    out.value = clamp_unit(out.value);

    tracing::debug!(
        value = out.value,
        uncertain = out.uncertain,
        hits = result.hits.len(),
        tier = tier.as_str(),
        "confidence scored"
    );
    out
}

fn evidence_score(result: &RetrievalResult, cfg: &ScoringConfig) -> ConfidenceScore {
    let top: Vec<(f32, f32, bool)> = result
        .hits
        .iter()
        .take(cfg.top_n.max(1))
        .map(|h| {
            (
                clamp_unit(h.similarity),
                cfg.authority_weights.weight(h.chunk.authority),
                h.chunk.malaria_relevant,
            )
        })
        .collect();

    let n = top.len() as f32;
    let weight_sum: f32 = top.iter().map(|(_, w, _)| w).sum();
    let (retrieval, malaria_share) = if weight_sum > 0.0 {
        (
            top.iter().map(|(s, w, _)| s * w).sum::<f32>() / weight_sum,
            top.iter().filter(|(_, _, m)| *m).map(|(_, w, _)| w).sum::<f32>() / weight_sum,
        )
    } else {
        (0.0, 0.0)
    };

    let mean = top.iter().map(|(s, _, _)| s).sum::<f32>() / n;
    let variance = top.iter().map(|(s, _, _)| (s - mean).powi(2)).sum::<f32>() / n;
    let agreement = clamp_unit(1.0 - variance.sqrt());
    let authority = top.iter().map(|(_, w, _)| w).sum::<f32>() / n;

    let value = retrieval
        * (0.7 + 0.3 * agreement)
        * (0.7 + 0.3 * authority)
        * (0.5 + 0.5 * malaria_share);

    ConfidenceScore {
        value: clamp_unit(value),
        uncertain: sources_disagree(result, cfg),
        components: Some(ScoreComponents {
            retrieval,
            agreement,
            authority,
            malaria_share,
        }),
    }
}

/// Compare the best hit of each of the two highest-ranked sources by similarity times
/// authority weight.
fn sources_disagree(result: &RetrievalResult, cfg: &ScoringConfig) -> bool {
    let mut leaders: Vec<(&str, f32)> = Vec::with_capacity(2);
    for h in &result.hits {
        if leaders.iter().any(|(s, _)| *s == h.chunk.source) {
            continue;
        }
        leaders.push((
            h.chunk.source.as_str(),
            h.similarity * cfg.authority_weights.weight(h.chunk.authority),
        ));
        if leaders.len() == 2 {
            break;
        }
    }
    match leaders.as_slice() {
        [(_, a), (_, b)] => (a - b).abs() > cfg.authority_margin,
        _ => false,
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}
