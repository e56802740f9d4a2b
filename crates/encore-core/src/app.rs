use crate::audio_link::{AudioInitPolicy, AudioLink};
use crate::challenge::{summarize, ChallengeContext, ScoreSubmitter};
use crate::falling_notes::{AuthoredNote, FallingConfig, FallingEvent, FallingNoteSession};
use crate::ipc::{Command, Event, FallingSource, SessionKind};
use crate::playback_engine::PlaybackEngine;
use crate::replication::{ReplicationEvent, ReplicationSession};
use crate::scheduler::SchedulerConfig;
use crate::session::SessionError;
use encore_domain_eval::TrackComparator;
use encore_ports::audio::AudioSink;
use encore_ports::clock::{Clock, FrameTick, TickFlow};
use encore_ports::model::{ChallengeScore, Composition, Track, TrackError};
use encore_ports::playback::{PlaybackError, PlaybackPort, PlaybackState};
use encore_ports::storage::{
    CompositionStore, GameSettings, ScoreStore, SettingsStore, StorageError,
};
use encore_ports::types::{CompositionId, Millis, PostId, TrackId, UserId};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("playback error: {0}")]
    Playback(#[from] PlaybackError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("invalid track: {0}")]
    Track(#[from] TrackError),
    #[error("no composition loaded")]
    NoComposition,
    #[error("unknown track: {0}")]
    UnknownTrack(TrackId),
    #[error("no active session")]
    NoActiveSession,
}

/// Capabilities the game facade is wired with.
pub struct GameServices {
    pub audio: Arc<dyn AudioSink>,
    pub clock: Arc<dyn Clock>,
    pub compositions: Arc<dyn CompositionStore>,
    pub scores: Arc<dyn ScoreStore>,
    pub settings: Option<Arc<dyn SettingsStore>>,
}

enum ActiveSession {
    Falling(FallingNoteSession),
    Replication(ReplicationSession),
}

/// Command/event facade over playback, sessions and stores. Owned by one
/// thread or put behind a single mutex by the host.
pub struct GameCore {
    clock: Arc<dyn Clock>,
    audio: AudioLink,
    playback: Arc<PlaybackEngine>,
    compositions: Arc<dyn CompositionStore>,
    scores: Arc<dyn ScoreStore>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    submitter: ScoreSubmitter,
    settings: GameSettings,
    composition: Option<Composition>,
    session: Option<ActiveSession>,
    events: VecDeque<Event>,
    last_playback: PlaybackState,
}

impl GameCore {
    /// Waits for the audio sink (bounded by the settings' init policy) before
    /// returning, so no frame ever blocks on it.
    pub fn new(services: GameServices) -> Self {
        let settings = match services.settings.as_ref() {
            Some(store) => store.load_settings().unwrap_or_else(|err| {
                warn!(%err, "settings unavailable, using defaults");
                GameSettings::default()
            }),
            None => GameSettings::default(),
        };

        let policy = AudioInitPolicy::from(&settings);
        let audio = AudioLink::establish(services.audio, policy);
        let playback = Arc::new(PlaybackEngine::new(
            audio.sink(),
            services.clock.clone(),
            SchedulerConfig {
                visual_feedback: settings.visual_feedback,
                init_policy: policy,
            },
        ));

        Self {
            clock: services.clock,
            audio,
            playback,
            submitter: ScoreSubmitter::new(services.scores.clone()),
            compositions: services.compositions,
            scores: services.scores,
            settings_store: services.settings,
            settings,
            composition: None,
            session: None,
            events: VecDeque::new(),
            last_playback: PlaybackState::Idle,
        }
    }

    pub fn handle_command(&mut self, cmd: Command) -> Result<(), AppError> {
        let now = self.clock.now_ms();
        match cmd {
            Command::LoadComposition { post_id } => self.load_composition(post_id)?,
            Command::SaveComposition {
                post_id,
                composition,
            } => {
                for layer in &composition.layers {
                    layer.validate()?;
                }
                self.compositions.save_composition(&post_id, &composition)?;
                info!(post = %post_id, composition = %composition.id, "composition saved");
                self.apply_composition(composition)?;
            }
            Command::Play { from_offset } => {
                self.playback.play(from_offset)?;
                self.emit_playback();
            }
            Command::Resume => {
                self.playback.resume()?;
                self.emit_playback();
            }
            Command::Pause => {
                self.playback.pause()?;
                self.emit_playback();
            }
            Command::Stop => {
                self.playback.stop()?;
                self.emit_playback();
            }
            Command::Seek { offset } => {
                self.playback.seek(offset)?;
                self.emit_playback();
            }
            Command::SetMuted { track_id, muted } => {
                self.playback.set_muted(&track_id, muted)?;
            }
            Command::SetSoloed { track_id, soloed } => {
                self.playback.set_soloed(&track_id, soloed)?;
            }
            Command::SetDifficulty { difficulty } => {
                self.settings.difficulty = difficulty;
                self.save_settings();
            }
            Command::StartFallingNotes { user_id, source } => {
                let (context, instrument, chart) = match source {
                    FallingSource::Random { instrument } => {
                        let context = self.context_for(user_id, None)?;
                        (context, instrument, None)
                    }
                    FallingSource::Layer { track_id } => {
                        let track = self.track(&track_id)?.clone();
                        let context = self.context_for(user_id, Some(track.id.clone()))?;
                        (context, track.instrument, Some(AuthoredNote::from_track(&track)))
                    }
                };
                self.ensure_no_session()?;
                self.playback.stop()?;
                let config = FallingConfig::from_settings(&self.settings, instrument);
                let mut session =
                    FallingNoteSession::new(config, context, self.audio.sink(), chart);
                session.start(now)?;
                self.session = Some(ActiveSession::Falling(session));
                self.events.push_back(Event::SessionStarted {
                    kind: SessionKind::FallingNotes,
                    difficulty: self.settings.difficulty,
                });
            }
            Command::StartReplication { user_id, track_id } => {
                let track = self.track(&track_id)?.clone();
                let context = self.context_for(user_id, Some(track.id.clone()))?;
                self.ensure_no_session()?;
                let session = ReplicationSession::new(
                    track,
                    context,
                    self.settings.replication_weights,
                    self.playback.clone(),
                    self.audio.sink(),
                );
                self.session = Some(ActiveSession::Replication(session));
                self.events.push_back(Event::SessionStarted {
                    kind: SessionKind::Replication,
                    difficulty: self.settings.difficulty,
                });
            }
            Command::PlayReference => {
                self.replication()?.play_reference()?;
                self.emit_playback();
            }
            Command::StartListening => {
                self.replication()?.start_listening(now)?;
            }
            Command::LaneActivate { lane } => {
                self.falling()?.on_lane_activate(lane, now)?;
            }
            Command::LaneRelease { lane } => {
                self.falling()?.on_lane_release(lane, now)?;
            }
            Command::NotePlayed { note, velocity } => {
                self.replication()?.on_note_played(note, velocity, now)?;
            }
            Command::FinishEarly => {
                self.replication()?.finish_early()?;
            }
            Command::AbortSession => {
                match self.session.as_mut() {
                    Some(ActiveSession::Falling(session)) => session.abort()?,
                    Some(ActiveSession::Replication(session)) => session.abort()?,
                    None => return Err(AppError::NoActiveSession),
                }
                // nothing scheduled may sound once a session is aborted
                self.playback.stop()?;
                self.emit_playback();
            }
            Command::CompareTracks { original, recorded } => {
                let original = self.track(&original)?;
                let recorded = self.track(&recorded)?;
                let comparator = TrackComparator::new(
                    self.settings.comparator,
                    self.settings.grade_cutoffs,
                );
                let report = comparator.compare(original, recorded);
                info!(
                    overall = report.overall_score,
                    grade = %report.grade,
                    "tracks compared"
                );
                self.events.push_back(Event::ComparisonReady { report });
            }
            Command::LoadLeaderboard => {
                let id = self.composition_id()?;
                let mut scores = self.scores.scores_for(&id)?;
                scores.sort_by(|a, b| b.combined_score.cmp(&a.combined_score));
                self.events.push_back(Event::LeaderboardUpdated { scores });
            }
        }
        self.collect_session_events();
        Ok(())
    }

    /// Drive playback and the active session to `now`.
    pub fn tick(&mut self, now: Millis) -> TickFlow {
        let playback = match self.playback.advance(now) {
            Ok(state) => state,
            Err(err) => {
                warn!(%err, "playback advance failed");
                PlaybackState::Idle
            }
        };
        if playback != self.last_playback {
            self.emit_playback();
        }

        let session_running = match self.session.as_mut() {
            Some(ActiveSession::Falling(session)) => session.tick(now) == TickFlow::Continue,
            Some(ActiveSession::Replication(_)) => true,
            None => false,
        };
        self.collect_session_events();

        if session_running || playback == PlaybackState::Playing {
            TickFlow::Continue
        } else {
            TickFlow::Stop
        }
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn composition(&self) -> Option<&Composition> {
        self.composition.as_ref()
    }

    pub fn playback(&self) -> Arc<PlaybackEngine> {
        self.playback.clone()
    }

    pub fn audio_degraded(&self) -> bool {
        self.audio.is_degraded()
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    fn load_composition(&mut self, post_id: PostId) -> Result<(), AppError> {
        match self.compositions.fetch_composition(&post_id) {
            Ok(composition) => self.apply_composition(composition),
            Err(StorageError::NotFound(_)) => {
                info!(post = %post_id, "post has no composition yet");
                self.composition = None;
                self.events
                    .push_back(Event::CompositionMissing { post_id });
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn apply_composition(&mut self, composition: Composition) -> Result<(), AppError> {
        self.playback.load_tracks(composition.layers.clone())?;
        self.events.push_back(Event::CompositionLoaded {
            composition_id: composition.id.clone(),
            tracks: composition.layers.iter().map(|t| t.id.clone()).collect(),
            duration: composition.duration(),
        });
        info!(
            composition = %composition.id,
            layers = composition.layers.len(),
            "composition loaded"
        );
        self.composition = Some(composition);
        Ok(())
    }

    fn collect_session_events(&mut self) {
        let mut completed: Option<ChallengeScore> = None;
        let mut ended = false;
        let replication = matches!(self.session, Some(ActiveSession::Replication(_)));

        match self.session.as_mut() {
            Some(ActiveSession::Falling(session)) => {
                for event in session.drain_events() {
                    match event {
                        FallingEvent::Spawned { id, lane, note } => {
                            self.events.push_back(Event::NoteSpawned { id, lane, note })
                        }
                        FallingEvent::Judged {
                            id,
                            lane,
                            judgment,
                            points,
                            combo,
                        } => self.events.push_back(Event::NoteJudged {
                            id,
                            lane,
                            grade: judgment.grade,
                            accuracy: judgment.accuracy,
                            points,
                            combo,
                        }),
                        FallingEvent::Missed { id, lane } => {
                            self.events.push_back(Event::NoteMissed { id, lane })
                        }
                        FallingEvent::HoldReleased {
                            id,
                            lane,
                            held_ms,
                            bonus,
                        } => self.events.push_back(Event::HoldReleased {
                            id,
                            lane,
                            held_ms,
                            bonus,
                        }),
                        FallingEvent::Completed { score } => completed = Some(score),
                        FallingEvent::Aborted => ended = true,
                    }
                }
            }
            Some(ActiveSession::Replication(session)) => {
                for event in session.drain_events() {
                    match event {
                        ReplicationEvent::Compared(result) => {
                            self.events.push_back(Event::NoteCompared { result })
                        }
                        ReplicationEvent::Progress {
                            correct,
                            missed,
                            remaining,
                        } => self.events.push_back(Event::ReplicationProgress {
                            correct,
                            missed,
                            remaining,
                        }),
                        ReplicationEvent::Completed { score } => completed = Some(score),
                        ReplicationEvent::Aborted => ended = true,
                    }
                }
            }
            None => {}
        }

        if completed.is_none() && !ended {
            return;
        }
        self.session = None;
        if replication {
            self.restore_layers();
        }
        match completed {
            Some(score) => self.finish_session(score),
            None => self.events.push_back(Event::SessionAborted),
        }
    }

    /// The reference phrase replaces the engine's tracks; put the
    /// composition's layers back once replication is over.
    fn restore_layers(&mut self) {
        let layers = self
            .composition
            .as_ref()
            .map(|c| c.layers.clone())
            .unwrap_or_default();
        match self.playback.load_tracks(layers) {
            Ok(()) => debug!("composition layers restored to playback"),
            Err(err) => warn!(%err, "could not restore composition playback"),
        }
    }

    fn finish_session(&mut self, score: ChallengeScore) {
        let submitted = match self.composition_id() {
            Ok(id) => self.submitter.submit(&id, &score).unwrap_or_else(|err| {
                warn!(%err, "score submission failed");
                false
            }),
            Err(_) => false,
        };
        let summary = summarize(&score, &self.settings.grade_cutoffs);
        self.events
            .push_back(Event::SessionCompleted { summary, submitted });
    }

    fn emit_playback(&mut self) {
        let state = self.playback.state();
        self.last_playback = state;
        self.events.push_back(Event::PlaybackUpdated {
            state,
            elapsed: self.playback.elapsed(),
        });
    }

    fn context_for(
        &self,
        user_id: UserId,
        track: Option<TrackId>,
    ) -> Result<ChallengeContext, AppError> {
        let composition_id = match self.composition.as_ref() {
            Some(composition) => composition.id.clone(),
            None if track.is_none() => CompositionId(String::new()),
            None => return Err(AppError::NoComposition),
        };
        Ok(ChallengeContext {
            user_id,
            original_track_id: track.unwrap_or_else(|| TrackId(String::new())),
            composition_id,
        })
    }

    fn composition_id(&self) -> Result<CompositionId, AppError> {
        self.composition
            .as_ref()
            .map(|c| c.id.clone())
            .ok_or(AppError::NoComposition)
    }

    fn track(&self, id: &TrackId) -> Result<&Track, AppError> {
        let composition = self.composition.as_ref().ok_or(AppError::NoComposition)?;
        composition
            .layer(id)
            .ok_or_else(|| AppError::UnknownTrack(id.clone()))
    }

    fn ensure_no_session(&self) -> Result<(), AppError> {
        if self.session.is_some() {
            return Err(SessionError::InvalidState {
                expected: "no active session",
                actual: "session in progress",
            }
            .into());
        }
        Ok(())
    }

    fn falling(&mut self) -> Result<&mut FallingNoteSession, AppError> {
        match self.session.as_mut() {
            Some(ActiveSession::Falling(session)) => Ok(session),
            _ => Err(AppError::NoActiveSession),
        }
    }

    fn replication(&mut self) -> Result<&mut ReplicationSession, AppError> {
        match self.session.as_mut() {
            Some(ActiveSession::Replication(session)) => Ok(session),
            _ => Err(AppError::NoActiveSession),
        }
    }

    fn save_settings(&self) {
        if let Some(store) = self.settings_store.as_ref() {
            if let Err(err) = store.save_settings(&self.settings) {
                warn!(%err, "failed to save settings");
            }
        }
    }
}

impl FrameTick for GameCore {
    fn tick(&mut self, now_ms: Millis) -> TickFlow {
        GameCore::tick(self, now_ms)
    }
}
