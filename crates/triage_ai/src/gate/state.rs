use serde::Serialize;

/// Response gate stages. `Emitted` and `Degraded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateState {
    Received,
    ClassifyingRetrieving,
    Scoring,
    Composing,
    Emitted,
    Degraded,
}

impl GateState {
    pub fn can_transition_to(self, next: GateState) -> bool {
        use GateState::*;
        matches!(
            (self, next),
            (Received, ClassifyingRetrieving)
                | (ClassifyingRetrieving, Scoring)
                | (Scoring, Composing)
                | (Composing, Emitted)
                | (Received | ClassifyingRetrieving | Scoring | Composing, Degraded)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, GateState::Emitted | GateState::Degraded)
    }
}

/// Ordered record of the states one query visited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateTrace {
    path: Vec<GateState>,
}

impl Default for GateTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl GateTrace {
    pub fn new() -> Self {
        Self {
            path: vec![GateState::Received],
        }
    }

    pub fn current(&self) -> GateState {
        self.path.last().copied().unwrap_or(GateState::Received)
    }

    pub fn path(&self) -> &[GateState] {
        &self.path
    }

    /// Record a transition. Illegal transitions are refused and reported.
    pub fn advance(&mut self, next: GateState) -> bool {
        let from = self.current();
        if !from.can_transition_to(next) {
            tracing::warn!(from = ?from, to = ?next, "illegal gate transition refused");
            debug_assert!(false, "illegal gate transition {from:?} -> {next:?}");
            return false;
        }
        self.path.push(next);
        true
    }
}
