use crate::feedback::comparison_feedback;
use crate::grading::{letter_grade, LetterGrade};
use crate::scoring::round_score;
use encore_ports::model::{NoteEvent, Track};
use encore_ports::storage::{ComparatorSettings, GradeCutoffs};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchStatus {
    Correct,
    Missed,
    Extra,
    TimingOff,
    VelocityOff,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// None only for extra played notes.
    pub target_note: Option<NoteEvent>,
    pub played_note: Option<NoteEvent>,
    pub status: MatchStatus,
    /// played - target, milliseconds
    pub timing_delta_ms: Option<f64>,
    /// played - target
    pub velocity_delta: Option<f32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub results: Vec<ComparisonResult>,
    pub matched_notes: u32,
    pub missed_notes: u32,
    pub extra_notes: u32,
    pub note_accuracy: u32,
    pub timing_accuracy: u32,
    pub velocity_accuracy: u32,
    pub overall_score: u32,
    pub grade: LetterGrade,
    pub feedback: Vec<String>,
}

/// Offline track-vs-track scoring for asynchronous peer challenges.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrackComparator {
    settings: ComparatorSettings,
    cutoffs: GradeCutoffs,
}

impl TrackComparator {
    pub fn new(settings: ComparatorSettings, cutoffs: GradeCutoffs) -> Self {
        Self { settings, cutoffs }
    }

    pub fn compare(&self, original: &Track, recorded: &Track) -> ComparisonReport {
        self.compare_notes(&original.notes, &recorded.notes)
    }

    pub fn compare_notes(&self, original: &[NoteEvent], recorded: &[NoteEvent]) -> ComparisonReport {
        let tolerance_ms = self.settings.timing_tolerance_ms;
        let velocity_tolerance = self.settings.velocity_tolerance;

        let mut used = vec![false; recorded.len()];
        let mut results = Vec::with_capacity(original.len());
        let mut timing_error_sum = 0.0f64;
        let mut velocity_error_sum = 0.0f64;
        let mut matched = 0u32;
        let mut missed = 0u32;

        for target in original {
            let Some(idx) = nearest_match(target, recorded, &used, tolerance_ms) else {
                missed += 1;
                results.push(ComparisonResult {
                    target_note: Some(*target),
                    played_note: None,
                    status: MatchStatus::Missed,
                    timing_delta_ms: None,
                    velocity_delta: None,
                });
                continue;
            };

            used[idx] = true;
            matched += 1;
            let played = recorded[idx];
            let timing_delta = (played.start_time - target.start_time) * 1000.0;
            let velocity_delta = played.velocity.get() - target.velocity.get();
            timing_error_sum += timing_delta.abs();
            velocity_error_sum += velocity_delta.abs() as f64;

            let status = if velocity_delta.abs() > velocity_tolerance {
                MatchStatus::VelocityOff
            } else if timing_delta.abs() > tolerance_ms / 2.0 {
                MatchStatus::TimingOff
            } else {
                MatchStatus::Correct
            };

            results.push(ComparisonResult {
                target_note: Some(*target),
                played_note: Some(played),
                status,
                timing_delta_ms: Some(timing_delta),
                velocity_delta: Some(velocity_delta),
            });
        }

        let mut extra = 0u32;
        for (played, _) in recorded.iter().zip(used.iter()).filter(|(_, used)| !**used) {
            extra += 1;
            results.push(ComparisonResult {
                target_note: None,
                played_note: Some(*played),
                status: MatchStatus::Extra,
                timing_delta_ms: None,
                velocity_delta: None,
            });
        }

        let (note_accuracy, timing_accuracy, velocity_accuracy) = if matched == 0 {
            (0.0, 0.0, 0.0)
        } else {
            let note = matched as f64 / original.len() as f64 * 100.0;
            let avg_timing = timing_error_sum / matched as f64;
            let avg_velocity = velocity_error_sum / matched as f64;
            (
                note,
                tolerance_accuracy(avg_timing, tolerance_ms),
                tolerance_accuracy(avg_velocity, velocity_tolerance as f64),
            )
        };

        let weights = self.settings.weights;
        let overall = note_accuracy * weights.note
            + timing_accuracy * weights.timing
            + velocity_accuracy * weights.velocity;
        let overall_score = round_score(overall);

        let mut report = ComparisonReport {
            results,
            matched_notes: matched,
            missed_notes: missed,
            extra_notes: extra,
            note_accuracy: round_score(note_accuracy),
            timing_accuracy: round_score(timing_accuracy),
            velocity_accuracy: round_score(velocity_accuracy),
            overall_score,
            grade: letter_grade(overall_score, &self.cutoffs),
            feedback: Vec::new(),
        };
        report.feedback = comparison_feedback(&report);
        report
    }
}

fn nearest_match(
    target: &NoteEvent,
    recorded: &[NoteEvent],
    used: &[bool],
    tolerance_ms: f64,
) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, candidate) in recorded.iter().enumerate() {
        if used[idx] || candidate.note != target.note {
            continue;
        }
        let delta = ((candidate.start_time - target.start_time) * 1000.0).abs();
        if delta > tolerance_ms {
            continue;
        }
        match best {
            Some((_, best_delta)) if best_delta <= delta => {}
            _ => best = Some((idx, delta)),
        }
    }
    best.map(|(idx, _)| idx)
}

fn tolerance_accuracy(avg_error: f64, tolerance: f64) -> f64 {
    if tolerance <= 0.0 {
        return if avg_error <= 0.0 { 100.0 } else { 0.0 };
    }
    ((1.0 - avg_error / tolerance) * 100.0).max(0.0)
}
