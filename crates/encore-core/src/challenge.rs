use encore_domain_eval::{letter_grade, score_session, session_feedback, HitTally, LetterGrade};
use encore_ports::model::{ChallengeScore, ChallengeType};
use encore_ports::storage::{GradeCutoffs, ModeWeights, ScoreStore, StorageError};
use encore_ports::types::{CompositionId, TrackId, UnixMillis, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Who is playing what; travels with a session until its score is built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeContext {
    pub user_id: UserId,
    pub original_track_id: TrackId,
    pub composition_id: CompositionId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChallengeSummary {
    pub score: ChallengeScore,
    pub grade: LetterGrade,
    pub feedback: Vec<String>,
}

pub fn now_unix_ms() -> UnixMillis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as UnixMillis)
        .unwrap_or_default()
}

pub fn build_challenge_score(
    context: &ChallengeContext,
    tally: &HitTally,
    weights: ModeWeights,
    challenge_type: ChallengeType,
    completed_at: UnixMillis,
) -> ChallengeScore {
    let scores = score_session(tally, weights);
    ChallengeScore {
        user_id: context.user_id.clone(),
        timing_score: scores.timing_score,
        accuracy_score: scores.accuracy_score,
        combined_score: scores.combined_score,
        perfect_hits: tally.perfect,
        great_hits: tally.great,
        good_hits: tally.good,
        missed_notes: tally.miss,
        completed_at,
        original_track_id: context.original_track_id.clone(),
        challenge_type,
    }
}

pub fn summarize(score: &ChallengeScore, cutoffs: &GradeCutoffs) -> ChallengeSummary {
    let tally = HitTally {
        perfect: score.perfect_hits,
        great: score.great_hits,
        good: score.good_hits,
        miss: score.missed_notes,
    };
    let scores = encore_domain_eval::SessionScores {
        timing_score: score.timing_score,
        accuracy_score: score.accuracy_score,
        combined_score: score.combined_score,
    };
    let grade = letter_grade(score.combined_score, cutoffs);
    ChallengeSummary {
        score: score.clone(),
        grade,
        feedback: session_feedback(&tally, &scores, grade),
    }
}

/// Posts completed scores to the score store, once each.
pub struct ScoreSubmitter {
    store: Arc<dyn ScoreStore>,
    submitted: HashSet<(String, String, UnixMillis, ChallengeType)>,
}

impl ScoreSubmitter {
    pub fn new(store: Arc<dyn ScoreStore>) -> Self {
        Self {
            store,
            submitted: HashSet::new(),
        }
    }

    /// Returns `Ok(false)` when this exact score was already submitted.
    pub fn submit(
        &mut self,
        composition: &CompositionId,
        score: &ChallengeScore,
    ) -> Result<bool, StorageError> {
        let key = (
            score.user_id.0.clone(),
            score.original_track_id.0.clone(),
            score.completed_at,
            score.challenge_type,
        );
        if self.submitted.contains(&key) {
            warn!(user = %score.user_id, "duplicate score submission ignored");
            return Ok(false);
        }

        self.store.submit_score(composition, score)?;
        self.submitted.insert(key);
        info!(
            user = %score.user_id,
            composition = %composition,
            combined = score.combined_score,
            "challenge score submitted"
        );
        Ok(true)
    }
}
