use triage_core::config::ScoringConfig;
use triage_core::domain::{SeverityTier, TriageCategory};
use triage_core::error::{codes, AppError};

use crate::gate::{Assessment, RecommendationKind};

fn violation(message: &str) -> AppError {
    AppError::new(codes::GUARDRAIL_VIOLATION, message)
}

/// Enforce the invariants every emitted assessment must satisfy.
///
/// - A disclaimer is always present and confidence is a finite value in `[0, 1]`.
/// - `emergency_alert` is set exactly when the tier is EMERGENCY, and then the category is
///   `emergency`, the first recommendation is an immediate action, no self-care advice is
///   given and confidence is at least the emergency floor.
/// - Every assessment points the user at professional care.
pub fn enforce_assessment(a: &Assessment, scoring: &ScoringConfig) -> Result<(), AppError> {
    if a.disclaimer().trim().is_empty() {
        return Err(violation("Assessment is missing the disclaimer"));
    }
    let c = a.confidence();
    if !c.is_finite() || !(0.0..=1.0).contains(&c) {
        return Err(violation("Confidence out of range").with_details(format!("confidence={c}")));
    }
    if a.recommendations().is_empty() {
        return Err(violation("Assessment has no recommendations"));
    }

    let is_emergency_tier = a.severity_tier() == SeverityTier::Emergency;
    if a.emergency_alert() != is_emergency_tier {
        return Err(violation("Emergency alert does not match severity tier").with_details(format!(
            "emergency_alert={}; tier={}",
            a.emergency_alert(),
            a.severity_tier().as_str()
        )));
    }
    if (a.category() == TriageCategory::Emergency) != a.emergency_alert() {
        return Err(violation("Emergency category does not match alert"));
    }

    if a.emergency_alert() {
        if a.recommendations()[0].kind != RecommendationKind::ImmediateAction {
            return Err(violation("Emergency guidance must lead with an immediate action"));
        }
        if a
            .recommendations()
            .iter()
            .any(|r| r.kind == RecommendationKind::SelfCare)
        {
            return Err(violation("Emergency guidance must not include self-care advice"));
        }
        if c < scoring.emergency_floor {
            return Err(violation("Emergency confidence below floor")
                .with_details(format!("confidence={c}; floor={}", scoring.emergency_floor)));
        }
    }

    let points_to_care = a.recommendations().iter().any(|r| {
        matches!(
            r.kind,
            RecommendationKind::ImmediateAction | RecommendationKind::ProfessionalCare
        )
    });
    if !points_to_care {
        return Err(violation("Assessment must recommend professional care"));
    }

    Ok(())
}
