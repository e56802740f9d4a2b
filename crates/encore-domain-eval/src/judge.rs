use crate::comparator::{ComparisonResult, MatchStatus};
use encore_ports::model::NoteEvent;
use serde::{Deserialize, Serialize};

const PERFECT_ACCURACY: f64 = 95.0;
const GREAT_ACCURACY: f64 = 80.0;
const GOOD_ACCURACY: f64 = 60.0;

const MAX_COMBO_MULTIPLIER: f64 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    Perfect,
    Great,
    Good,
    Miss,
}

/// Outcome of one lane activation against a note inside the hit window.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HitJudgment {
    pub grade: Grade,
    pub accuracy: f64,
    pub base_points: u32,
    pub keeps_combo: bool,
    /// Very late or early tap that still counts as a good.
    pub floor: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitTally {
    pub perfect: u32,
    pub great: u32,
    pub good: u32,
    pub miss: u32,
}

/// Judge a tap that landed `delta_ms` away from the expected hit instant.
///
/// A tap that reaches the judge never becomes a miss: anything under the good
/// threshold is still a good, worth floor points, and breaks the combo.
pub fn judge_hit(delta_ms: f64) -> HitJudgment {
    let accuracy = (100.0 - delta_ms.abs() / 10.0).max(0.0);
    let (grade, base_points, keeps_combo, floor) = if accuracy >= PERFECT_ACCURACY {
        (Grade::Perfect, 100, true, false)
    } else if accuracy >= GREAT_ACCURACY {
        (Grade::Great, 50, true, false)
    } else if accuracy >= GOOD_ACCURACY {
        (Grade::Good, 25, false, false)
    } else {
        (Grade::Good, 10, false, true)
    };

    HitJudgment {
        grade,
        accuracy,
        base_points,
        keeps_combo,
        floor,
    }
}

pub fn combo_multiplier(combo: u32) -> f64 {
    (1.0 + combo as f64 / 10.0).min(MAX_COMBO_MULTIPLIER)
}

/// Bonus for holding a note for (close to) its written duration.
pub fn hold_bonus(held_ms: f64, expected_ms: f64) -> u32 {
    if expected_ms <= 0.0 {
        return 0;
    }
    let ratio = (held_ms.max(0.0) / expected_ms).min(1.0);
    if ratio >= 0.9 {
        50
    } else if ratio >= 0.75 {
        25
    } else if ratio >= 0.5 {
        10
    } else {
        0
    }
}

impl HitTally {
    pub fn record(&mut self, grade: Grade) {
        match grade {
            Grade::Perfect => self.perfect += 1,
            Grade::Great => self.great += 1,
            Grade::Good => self.good += 1,
            Grade::Miss => self.miss += 1,
        }
    }

    pub fn hits(&self) -> u32 {
        self.perfect + self.great + self.good
    }

    pub fn total(&self) -> u32 {
        self.hits() + self.miss
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SequenceEvent {
    Compared(ComparisonResult),
    Stats {
        correct: u32,
        missed: u32,
        remaining: u32,
    },
    Finished,
}

/// Position-by-position judge for replication: `played[i]` against
/// `targets[i]`, by note token only. A wrong note never blocks progress.
pub struct SequenceJudge {
    targets: Vec<NoteEvent>,
    idx: usize,
    results: Vec<ComparisonResult>,
    tally: HitTally,
}

impl SequenceJudge {
    pub fn new(targets: Vec<NoteEvent>) -> Self {
        Self {
            targets,
            idx: 0,
            results: Vec::new(),
            tally: HitTally::default(),
        }
    }

    pub fn on_note(&mut self, played: NoteEvent) -> Vec<SequenceEvent> {
        let mut events = Vec::new();
        let Some(target) = self.current_target().copied() else {
            return events;
        };

        let correct = played.note == target.note;
        let result = ComparisonResult {
            target_note: Some(target),
            played_note: Some(played),
            status: if correct {
                MatchStatus::Correct
            } else {
                MatchStatus::Missed
            },
            timing_delta_ms: None,
            velocity_delta: None,
        };
        self.tally.record(if correct { Grade::Perfect } else { Grade::Miss });
        self.push_result(result, &mut events);
        events
    }

    /// Judge every remaining target as missed.
    pub fn finish(&mut self) -> Vec<SequenceEvent> {
        let mut events = Vec::new();
        while let Some(target) = self.current_target().copied() {
            let result = ComparisonResult {
                target_note: Some(target),
                played_note: None,
                status: MatchStatus::Missed,
                timing_delta_ms: None,
                velocity_delta: None,
            };
            self.tally.record(Grade::Miss);
            self.push_result(result, &mut events);
        }
        if events.is_empty() {
            events.push(SequenceEvent::Finished);
        }
        events
    }

    pub fn is_finished(&self) -> bool {
        self.idx >= self.targets.len()
    }

    pub fn position(&self) -> usize {
        self.idx
    }

    pub fn target_len(&self) -> usize {
        self.targets.len()
    }

    pub fn results(&self) -> &[ComparisonResult] {
        &self.results
    }

    pub fn tally(&self) -> HitTally {
        self.tally
    }

    fn current_target(&self) -> Option<&NoteEvent> {
        self.targets.get(self.idx)
    }

    fn push_result(&mut self, result: ComparisonResult, events: &mut Vec<SequenceEvent>) {
        self.results.push(result.clone());
        self.idx = self.idx.saturating_add(1);
        events.push(SequenceEvent::Compared(result));
        events.push(self.stats_event());
        if self.is_finished() {
            events.push(SequenceEvent::Finished);
        }
    }

    fn stats_event(&self) -> SequenceEvent {
        SequenceEvent::Stats {
            correct: self.tally.perfect,
            missed: self.tally.miss,
            remaining: self.targets.len().saturating_sub(self.idx) as u32,
        }
    }
}
