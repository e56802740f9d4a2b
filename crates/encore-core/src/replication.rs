use crate::challenge::{build_challenge_score, now_unix_ms, ChallengeContext};
use crate::session::SessionError;
use encore_domain_eval::{ComparisonResult, SequenceEvent, SequenceJudge};
use encore_ports::audio::AudioSink;
use encore_ports::model::{ChallengeScore, ChallengeType, NoteEvent, Track};
use encore_ports::note::NoteToken;
use encore_ports::playback::PlaybackPort;
use encore_ports::storage::ModeWeights;
use encore_ports::types::{Millis, Velocity01};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicationState {
    Idle,
    Listening,
    Completed,
    Aborted,
}

impl ReplicationState {
    pub fn as_str(self) -> &'static str {
        match self {
            ReplicationState::Idle => "idle",
            ReplicationState::Listening => "listening",
            ReplicationState::Completed => "completed",
            ReplicationState::Aborted => "aborted",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReplicationEvent {
    Compared(ComparisonResult),
    Progress {
        correct: u32,
        missed: u32,
        remaining: u32,
    },
    Completed {
        score: ChallengeScore,
    },
    Aborted,
}

/// Reproduce a recorded phrase note by note, without timing pressure.
pub struct ReplicationSession {
    target: Track,
    context: ChallengeContext,
    weights: ModeWeights,
    playback: Arc<dyn PlaybackPort>,
    audio: Arc<dyn AudioSink>,
    judge: SequenceJudge,
    state: ReplicationState,
    listen_started: Millis,
    events: Vec<ReplicationEvent>,
    final_score: Option<ChallengeScore>,
}

impl ReplicationSession {
    pub fn new(
        target: Track,
        context: ChallengeContext,
        weights: ModeWeights,
        playback: Arc<dyn PlaybackPort>,
        audio: Arc<dyn AudioSink>,
    ) -> Self {
        let judge = SequenceJudge::new(target.notes.clone());
        Self {
            target,
            context,
            weights,
            playback,
            audio,
            judge,
            state: ReplicationState::Idle,
            listen_started: 0.0,
            events: Vec::new(),
            final_score: None,
        }
    }

    /// Play the target phrase from the top through the shared playback engine.
    pub fn play_reference(&mut self) -> Result<(), SessionError> {
        if !matches!(
            self.state,
            ReplicationState::Idle | ReplicationState::Listening
        ) {
            return Err(self.invalid_state("idle or listening"));
        }
        self.playback.load_tracks(vec![self.target.clone()])?;
        self.playback.play(0.0)?;
        debug!(track = %self.target.id, "reference playing");
        Ok(())
    }

    pub fn start_listening(&mut self, now: Millis) -> Result<(), SessionError> {
        if self.state != ReplicationState::Idle {
            return Err(self.invalid_state("idle"));
        }
        self.playback.stop()?;
        self.listen_started = now;
        self.state = ReplicationState::Listening;
        info!(
            track = %self.target.id,
            notes = self.judge.target_len(),
            "replication listening"
        );

        if self.judge.is_finished() {
            self.complete();
        }
        Ok(())
    }

    /// Compare the next played note against the next target note.
    pub fn on_note_played(
        &mut self,
        note: NoteToken,
        velocity: Velocity01,
        now: Millis,
    ) -> Result<ComparisonResult, SessionError> {
        if self.state != ReplicationState::Listening {
            return Err(self.invalid_state("listening"));
        }

        self.audio.play_note(self.target.instrument, &note, velocity);
        let played = NoteEvent {
            note,
            velocity,
            start_time: ((now - self.listen_started) / 1000.0).max(0.0),
            duration: 0.0,
        };
        let mut compared = None;
        for event in self.judge.on_note(played) {
            if let SequenceEvent::Compared(result) = &event {
                debug!(position = self.judge.position(), status = ?result.status, "note compared");
                compared = Some(result.clone());
            }
            self.forward(event);
        }
        if self.judge.is_finished() {
            self.complete();
        }

        compared.ok_or(SessionError::InvalidState {
            expected: "listening",
            actual: self.state.as_str(),
        })
    }

    /// Judge every remaining target note as missed and complete.
    pub fn finish_early(&mut self) -> Result<ChallengeScore, SessionError> {
        if self.state != ReplicationState::Listening {
            return Err(self.invalid_state("listening"));
        }
        let remaining = self.judge.target_len() - self.judge.position();
        for event in self.judge.finish() {
            self.forward(event);
        }
        info!(remaining, "replication finished early");
        Ok(self.complete())
    }

    pub fn abort(&mut self) -> Result<(), SessionError> {
        if !matches!(
            self.state,
            ReplicationState::Idle | ReplicationState::Listening
        ) {
            return Err(self.invalid_state("idle or listening"));
        }
        if let Err(err) = self.playback.stop() {
            warn!(%err, "could not stop reference playback");
        }
        self.state = ReplicationState::Aborted;
        self.events.push(ReplicationEvent::Aborted);
        info!("replication aborted");
        Ok(())
    }

    /// Share of target notes played correctly so far, 0..=100.
    pub fn accuracy(&self) -> f64 {
        let total = self.judge.target_len();
        if total == 0 {
            return 0.0;
        }
        self.judge.tally().perfect as f64 / total as f64 * 100.0
    }

    pub fn state(&self) -> ReplicationState {
        self.state
    }

    pub fn target(&self) -> &Track {
        &self.target
    }

    pub fn results(&self) -> &[ComparisonResult] {
        self.judge.results()
    }

    pub fn final_score(&self) -> Option<&ChallengeScore> {
        self.final_score.as_ref()
    }

    pub fn drain_events(&mut self) -> Vec<ReplicationEvent> {
        std::mem::take(&mut self.events)
    }

    fn forward(&mut self, event: SequenceEvent) {
        match event {
            SequenceEvent::Compared(result) => self.events.push(ReplicationEvent::Compared(result)),
            SequenceEvent::Stats {
                correct,
                missed,
                remaining,
            } => self.events.push(ReplicationEvent::Progress {
                correct,
                missed,
                remaining,
            }),
            SequenceEvent::Finished => {}
        }
    }

    fn complete(&mut self) -> ChallengeScore {
        let score = build_challenge_score(
            &self.context,
            &self.judge.tally(),
            self.weights,
            ChallengeType::Replication,
            now_unix_ms(),
        );
        self.state = ReplicationState::Completed;
        info!(
            combined = score.combined_score,
            accuracy = self.accuracy(),
            "replication completed"
        );
        self.final_score = Some(score.clone());
        self.events.push(ReplicationEvent::Completed {
            score: score.clone(),
        });
        score
    }

    fn invalid_state(&self, expected: &'static str) -> SessionError {
        SessionError::InvalidState {
            expected,
            actual: self.state.as_str(),
        }
    }
}
