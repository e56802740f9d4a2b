use crate::judge::HitTally;
use encore_ports::storage::ModeWeights;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionScores {
    pub timing_score: u32,
    pub accuracy_score: u32,
    pub combined_score: u32,
}

/// Composite score for a finished live session.
///
/// Timing quality weighs perfect/great/good at 100/75/50; the accuracy score is
/// the hit rate. Weights are normalized to sum to 1. An empty tally scores
/// zero across the board.
pub fn score_session(tally: &HitTally, weights: ModeWeights) -> SessionScores {
    let total = tally.total();
    if total == 0 {
        return SessionScores::default();
    }

    let total = total as f64;
    let timing = (tally.perfect as f64 * 100.0 + tally.great as f64 * 75.0 + tally.good as f64 * 50.0)
        / total;
    let accuracy = tally.hits() as f64 / total * 100.0;
    let weights = weights.normalized();
    let combined = timing * weights.timing + accuracy * weights.accuracy;

    SessionScores {
        timing_score: round_score(timing),
        accuracy_score: round_score(accuracy),
        combined_score: round_score(combined),
    }
}

pub(crate) fn round_score(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    value.round() as u32
}
