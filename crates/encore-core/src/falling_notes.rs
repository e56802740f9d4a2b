use crate::challenge::{build_challenge_score, now_unix_ms, ChallengeContext};
use crate::session::SessionError;
use encore_domain_eval::{combo_multiplier, hold_bonus, judge_hit, HitJudgment, HitTally};
use encore_ports::audio::AudioSink;
use encore_ports::clock::{FrameTick, TickFlow};
use encore_ports::model::{ChallengeScore, ChallengeType, Track};
use encore_ports::note::{Instrument, NoteToken};
use encore_ports::storage::{GameSettings, ModeWeights};
use encore_ports::types::{Difficulty, Millis, Velocity01};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

pub const LANE_COUNT: u8 = 4;

/// Missed notes keep falling this far past the window before they are dropped.
const RETIRE_MARGIN: f64 = 100.0;

const DEFAULT_VELOCITY: f32 = 0.8;

#[derive(Clone, Debug, PartialEq)]
pub struct FallingConfig {
    pub difficulty: Difficulty,
    pub instrument: Instrument,
    pub hit_line_distance: f64,
    pub hit_window: f64,
    pub lanes: u8,
    pub weights: ModeWeights,
    /// Length of a random-mode session.
    pub random_session_ms: Millis,
    pub seed: Option<u64>,
}

impl FallingConfig {
    pub fn from_settings(settings: &GameSettings, instrument: Instrument) -> Self {
        Self {
            difficulty: settings.difficulty,
            instrument,
            hit_line_distance: settings.hit_line_distance,
            hit_window: settings.hit_window,
            lanes: LANE_COUNT,
            weights: settings.falling_weights,
            random_session_ms: settings.random_session_ms as Millis,
            seed: settings.random_seed,
        }
    }

    pub fn speed(&self) -> f64 {
        self.difficulty.speed()
    }

    pub fn spawn_interval_ms(&self) -> Millis {
        self.difficulty.spawn_interval_ms()
    }

    /// Time a note needs to fall from the spawn point to the hit line.
    pub fn travel_ms(&self) -> Millis {
        self.hit_line_distance / self.speed() * 1000.0
    }

    /// Time after spawning at which an untouched note is missed.
    pub fn miss_after_ms(&self) -> Millis {
        (self.hit_line_distance + self.hit_window) / self.speed() * 1000.0
    }
}

/// A charted note; `start_ms` is when it reaches the hit line.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthoredNote {
    pub note: NoteToken,
    pub velocity: Velocity01,
    pub start_ms: Millis,
    pub duration_ms: Millis,
}

impl AuthoredNote {
    pub fn new(note: NoteToken, start_ms: Millis, duration_ms: Millis) -> Self {
        Self {
            note,
            velocity: Velocity01::new(DEFAULT_VELOCITY),
            start_ms,
            duration_ms,
        }
    }

    pub fn from_track(track: &Track) -> Vec<AuthoredNote> {
        track
            .notes
            .iter()
            .map(|n| AuthoredNote {
                note: n.note,
                velocity: n.velocity,
                start_ms: n.start_time * 1000.0,
                duration_ms: n.duration * 1000.0,
            })
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiveNoteState {
    InFlight,
    Hit,
    HeldAwaitingRelease,
    Missed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiveNote {
    pub id: u64,
    pub lane: u8,
    pub spawn_time: Millis,
    pub expected_hit_time: Millis,
    pub note: NoteToken,
    pub velocity: Velocity01,
    pub duration_ms: Millis,
    pub state: LiveNoteState,
    pub hold_started: Option<Millis>,
}

impl LiveNote {
    /// Distance fallen from the spawn point.
    pub fn position(&self, now: Millis, speed: f64) -> f64 {
        (now - self.spawn_time) / 1000.0 * speed
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallingState {
    Idle,
    Running,
    Completed,
    Aborted,
}

impl FallingState {
    pub fn as_str(self) -> &'static str {
        match self {
            FallingState::Idle => "idle",
            FallingState::Running => "running",
            FallingState::Completed => "completed",
            FallingState::Aborted => "aborted",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FallingEvent {
    Spawned {
        id: u64,
        lane: u8,
        note: NoteToken,
    },
    Judged {
        id: u64,
        lane: u8,
        judgment: HitJudgment,
        points: u32,
        combo: u32,
    },
    Missed {
        id: u64,
        lane: u8,
    },
    HoldReleased {
        id: u64,
        lane: u8,
        held_ms: Millis,
        bonus: u32,
    },
    Completed {
        score: ChallengeScore,
    },
    Aborted,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FallingStats {
    pub tally: HitTally,
    pub combo: u32,
    pub max_combo: u32,
    pub points: u64,
}

/// Arcade session: notes fall down four lanes and are tapped at the hit line.
///
/// Positions are derived from the clock on every call, never accumulated, so
/// a late frame only changes how far a note has fallen, not where it will be.
pub struct FallingNoteSession {
    config: FallingConfig,
    context: ChallengeContext,
    audio: Arc<dyn AudioSink>,
    chart: Option<Vec<AuthoredNote>>,
    state: FallingState,
    start_time: Millis,
    next_authored: usize,
    next_random_ms: Millis,
    next_id: u64,
    live: Vec<LiveNote>,
    stats: FallingStats,
    events: Vec<FallingEvent>,
    rng: StdRng,
    final_score: Option<ChallengeScore>,
}

impl FallingNoteSession {
    pub fn new(
        config: FallingConfig,
        context: ChallengeContext,
        audio: Arc<dyn AudioSink>,
        chart: Option<Vec<AuthoredNote>>,
    ) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        let chart = chart.map(|mut notes| {
            notes.sort_by(|a, b| a.start_ms.total_cmp(&b.start_ms));
            notes
        });
        Self {
            config,
            context,
            audio,
            chart,
            state: FallingState::Idle,
            start_time: 0.0,
            next_authored: 0,
            next_random_ms: 0.0,
            next_id: 0,
            live: Vec::new(),
            stats: FallingStats::default(),
            events: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
            final_score: None,
        }
    }

    pub fn start(&mut self, now: Millis) -> Result<(), SessionError> {
        if self.state == FallingState::Running {
            return Err(self.invalid_state("not running"));
        }

        self.start_time = now;
        self.next_authored = 0;
        self.next_random_ms = 0.0;
        self.live.clear();
        self.stats = FallingStats::default();
        self.final_score = None;
        self.state = FallingState::Running;
        info!(
            difficulty = %self.config.difficulty,
            instrument = %self.config.instrument,
            charted = self.chart.as_ref().map(Vec::len),
            "falling-notes session started"
        );
        Ok(())
    }

    /// Judge a tap in `lane`. `Ok(None)` when nothing was in reach or the
    /// session is not running; neither is penalized.
    pub fn on_lane_activate(
        &mut self,
        lane: u8,
        now: Millis,
    ) -> Result<Option<HitJudgment>, SessionError> {
        if self.state != FallingState::Running {
            debug!(lane, state = self.state.as_str(), "lane input ignored");
            return Ok(None);
        }
        self.check_lane(lane)?;
        self.spawn_due(now);

        let speed = self.config.speed();
        let hit_line = self.config.hit_line_distance;
        let window = self.config.hit_window;
        let target = self
            .live
            .iter()
            .enumerate()
            .filter(|(_, n)| n.lane == lane && n.state == LiveNoteState::InFlight)
            .map(|(idx, n)| (idx, (n.position(now, speed) - hit_line).abs()))
            .filter(|(_, distance)| *distance <= window)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(idx, _)| idx);
        let Some(idx) = target else {
            debug!(lane, "no note in reach");
            return Ok(None);
        };

        if let Some(held) = self.held_in_lane(lane) {
            self.release(held, now);
        }

        let judgment = judge_hit(now - self.live[idx].expected_hit_time);
        if judgment.keeps_combo {
            self.stats.combo += 1;
        } else {
            self.stats.combo = 0;
        }
        self.stats.max_combo = self.stats.max_combo.max(self.stats.combo);
        self.stats.tally.record(judgment.grade);
        let points =
            (judgment.base_points as f64 * combo_multiplier(self.stats.combo)).round() as u32;
        self.stats.points += u64::from(points);

        let note = &mut self.live[idx];
        note.state = LiveNoteState::HeldAwaitingRelease;
        note.hold_started = Some(now);
        self.audio
            .play_note(self.config.instrument, &note.note, note.velocity);
        debug!(
            id = note.id,
            lane,
            grade = ?judgment.grade,
            accuracy = judgment.accuracy,
            points,
            "note judged"
        );
        self.events.push(FallingEvent::Judged {
            id: note.id,
            lane,
            judgment,
            points,
            combo: self.stats.combo,
        });
        self.live.retain(|n| n.state != LiveNoteState::Hit);
        Ok(Some(judgment))
    }

    /// Release the held note in `lane`; returns the hold bonus awarded.
    pub fn on_lane_release(&mut self, lane: u8, now: Millis) -> Result<Option<u32>, SessionError> {
        if self.state != FallingState::Running {
            return Ok(None);
        }
        self.check_lane(lane)?;

        let Some(idx) = self.held_in_lane(lane) else {
            return Ok(None);
        };
        let bonus = self.release(idx, now);
        self.live.retain(|n| n.state != LiveNoteState::Hit);
        Ok(Some(bonus))
    }

    pub fn abort(&mut self) -> Result<(), SessionError> {
        if self.state != FallingState::Running {
            return Err(self.invalid_state("running"));
        }
        self.state = FallingState::Aborted;
        self.live.clear();
        self.events.push(FallingEvent::Aborted);
        info!(points = self.stats.points, "falling-notes session aborted");
        Ok(())
    }

    pub fn state(&self) -> FallingState {
        self.state
    }

    pub fn stats(&self) -> FallingStats {
        self.stats
    }

    pub fn config(&self) -> &FallingConfig {
        &self.config
    }

    pub fn live_notes(&self) -> &[LiveNote] {
        &self.live
    }

    pub fn final_score(&self) -> Option<&ChallengeScore> {
        self.final_score.as_ref()
    }

    pub fn drain_events(&mut self) -> Vec<FallingEvent> {
        std::mem::take(&mut self.events)
    }

    fn spawn_due(&mut self, now: Millis) {
        let elapsed = now - self.start_time;
        let travel = self.config.travel_ms();
        let lanes = self.config.lanes.max(1);

        if let Some(chart) = &self.chart {
            let mut spawned = Vec::new();
            while let Some(authored) = chart.get(self.next_authored) {
                if elapsed < authored.start_ms - travel {
                    break;
                }
                let lane = (self.next_authored % usize::from(lanes)) as u8;
                let expected = self.start_time + authored.start_ms;
                spawned.push((lane, expected - travel, *authored));
                self.next_authored += 1;
            }
            for (lane, spawn_time, authored) in spawned {
                self.spawn(lane, spawn_time, authored);
            }
            return;
        }

        let palette = self.config.instrument.palette();
        while self.next_random_ms <= elapsed
            && self.next_random_ms < self.config.random_session_ms
            && !palette.is_empty()
        {
            let note = palette[self.rng.gen_range(0..palette.len())];
            let lane = self.rng.gen_range(0..lanes);
            let spawn_time = self.start_time + self.next_random_ms;
            self.next_random_ms += self.config.spawn_interval_ms();
            self.spawn(
                lane,
                spawn_time,
                AuthoredNote::new(note, self.next_random_ms, 0.0),
            );
        }
    }

    fn spawn(&mut self, lane: u8, spawn_time: Millis, authored: AuthoredNote) {
        let id = self.next_id;
        self.next_id += 1;
        self.live.push(LiveNote {
            id,
            lane,
            spawn_time,
            expected_hit_time: spawn_time + self.config.travel_ms(),
            note: authored.note,
            velocity: authored.velocity,
            duration_ms: authored.duration_ms,
            state: LiveNoteState::InFlight,
            hold_started: None,
        });
        debug!(id, lane, note = %authored.note, "note spawned");
        self.events.push(FallingEvent::Spawned {
            id,
            lane,
            note: authored.note,
        });
    }

    fn resolve(&mut self, now: Millis) {
        let speed = self.config.speed();
        let miss_at = self.config.hit_line_distance + self.config.hit_window;

        for idx in 0..self.live.len() {
            let note = &self.live[idx];
            match note.state {
                LiveNoteState::InFlight if note.position(now, speed) > miss_at => {
                    let (id, lane) = (note.id, note.lane);
                    self.live[idx].state = LiveNoteState::Missed;
                    self.stats.combo = 0;
                    self.stats.tally.miss += 1;
                    debug!(id, lane, "note missed");
                    self.events.push(FallingEvent::Missed { id, lane });
                }
                LiveNoteState::HeldAwaitingRelease => {
                    let held = now - note.hold_started.unwrap_or(now);
                    if held >= note.duration_ms {
                        self.release(idx, now);
                    }
                }
                _ => {}
            }
        }

        let retire_at = miss_at + RETIRE_MARGIN;
        self.live.retain(|n| match n.state {
            LiveNoteState::Hit => false,
            LiveNoteState::Missed => n.position(now, speed) <= retire_at,
            LiveNoteState::InFlight | LiveNoteState::HeldAwaitingRelease => true,
        });
    }

    fn release(&mut self, idx: usize, now: Millis) -> u32 {
        let note = &mut self.live[idx];
        let held_ms = (now - note.hold_started.unwrap_or(now)).max(0.0);
        let bonus = hold_bonus(held_ms, note.duration_ms);
        note.state = LiveNoteState::Hit;
        note.hold_started = None;
        let (id, lane) = (note.id, note.lane);
        self.stats.points += u64::from(bonus);
        debug!(id, lane, held_ms, bonus, "hold released");
        self.events.push(FallingEvent::HoldReleased {
            id,
            lane,
            held_ms,
            bonus,
        });
        bonus
    }

    fn spawning_exhausted(&self, now: Millis) -> bool {
        match &self.chart {
            Some(chart) => self.next_authored >= chart.len(),
            None => now - self.start_time >= self.config.random_session_ms,
        }
    }

    fn complete(&mut self) {
        self.state = FallingState::Completed;
        self.live.clear();
        let score = build_challenge_score(
            &self.context,
            &self.stats.tally,
            self.config.weights,
            ChallengeType::FallingNotes,
            now_unix_ms(),
        );
        info!(
            combined = score.combined_score,
            points = self.stats.points,
            max_combo = self.stats.max_combo,
            "falling-notes session completed"
        );
        self.final_score = Some(score.clone());
        self.events.push(FallingEvent::Completed { score });
    }

    fn held_in_lane(&self, lane: u8) -> Option<usize> {
        self.live
            .iter()
            .position(|n| n.lane == lane && n.state == LiveNoteState::HeldAwaitingRelease)
    }

    fn check_lane(&self, lane: u8) -> Result<(), SessionError> {
        if lane < self.config.lanes {
            Ok(())
        } else {
            Err(SessionError::LaneOutOfRange {
                lane,
                lanes: self.config.lanes,
            })
        }
    }

    fn invalid_state(&self, expected: &'static str) -> SessionError {
        SessionError::InvalidState {
            expected,
            actual: self.state.as_str(),
        }
    }
}

impl FrameTick for FallingNoteSession {
    fn tick(&mut self, now_ms: Millis) -> TickFlow {
        if self.state != FallingState::Running {
            return TickFlow::Stop;
        }

        self.spawn_due(now_ms);
        self.resolve(now_ms);

        let unresolved = self.live.iter().any(|n| {
            matches!(
                n.state,
                LiveNoteState::InFlight | LiveNoteState::HeldAwaitingRelease
            )
        });
        if self.spawning_exhausted(now_ms) && !unresolved {
            self.complete();
            return TickFlow::Stop;
        }
        TickFlow::Continue
    }
}
