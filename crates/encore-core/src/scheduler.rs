use crate::audio_link::{ensure_ready, AudioInitPolicy};
use encore_ports::audio::{AudioSink, NullAudioSink};
use encore_ports::clock::{Clock, FrameTick, TickFlow};
use encore_ports::model::{NoteEvent, Track};
use encore_ports::playback::{PlaybackError, PlaybackState};
use encore_ports::types::{Millis, Seconds, TrackId};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    pub visual_feedback: bool,
    pub init_policy: AudioInitPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            visual_feedback: true,
            init_policy: AudioInitPolicy::default(),
        }
    }
}

/// A note currently sounding, for visual feedback.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveNote {
    pub track_id: TrackId,
    pub note: NoteEvent,
    pub until_ms: Millis,
}

#[derive(Clone, Copy, Debug)]
struct PendingNote {
    fire_at_ms: Millis,
    track: usize,
    note: usize,
}

/// Schedules one-shot note dispatches for a set of tracks against a clock.
///
/// Absolute fire time of a note is
/// `start_wall_clock + note.start_time - from_offset`. Pending one-shots are
/// cancelled as a whole on pause, seek, stop and mute/solo changes.
pub struct PlaybackScheduler {
    config: SchedulerConfig,
    audio: Arc<dyn AudioSink>,
    clock: Arc<dyn Clock>,
    tracks: Vec<Track>,
    muted: HashSet<TrackId>,
    soloed: HashSet<TrackId>,
    state: PlaybackState,
    offset: Seconds,
    started_at_ms: Millis,
    pending: VecDeque<PendingNote>,
    active: Vec<ActiveNote>,
    dispatched: u64,
}

impl PlaybackScheduler {
    pub fn new(audio: Arc<dyn AudioSink>, clock: Arc<dyn Clock>, config: SchedulerConfig) -> Self {
        Self {
            config,
            audio,
            clock,
            tracks: Vec::new(),
            muted: HashSet::new(),
            soloed: HashSet::new(),
            state: PlaybackState::Idle,
            offset: 0.0,
            started_at_ms: 0.0,
            pending: VecDeque::new(),
            active: Vec::new(),
            dispatched: 0,
        }
    }

    pub fn load_tracks(&mut self, tracks: Vec<Track>) {
        self.stop();
        self.muted.clear();
        self.soloed.clear();
        self.tracks = tracks;
        debug!(tracks = self.tracks.len(), "playback tracks loaded");
    }

    pub fn play(&mut self, from_offset: Seconds) -> Result<(), PlaybackError> {
        validate_offset(from_offset)?;
        if self.tracks.is_empty() {
            return Err(PlaybackError::NothingLoaded);
        }

        self.cancel_pending();
        // Capturing the start time before the engine is ready would make
        // every offset fire early relative to the actual sound.
        if let Err(err) = ensure_ready(self.audio.as_ref(), self.config.init_policy) {
            warn!(%err, "audio not ready, playback continues silently");
            self.audio = Arc::new(NullAudioSink);
        }

        self.started_at_ms = self.clock.now_ms();
        self.offset = from_offset;
        self.state = PlaybackState::Playing;
        self.schedule_from(from_offset);
        info!(
            from = from_offset,
            pending = self.pending.len(),
            "playback started"
        );
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), PlaybackError> {
        if self.state == PlaybackState::Playing {
            return Ok(());
        }
        self.play(self.offset)
    }

    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.offset = self.elapsed_at(self.clock.now_ms());
        self.cancel_pending();
        self.active.clear();
        self.state = PlaybackState::Paused;
        debug!(offset = self.offset, "playback paused");
    }

    pub fn seek(&mut self, offset: Seconds) -> Result<(), PlaybackError> {
        validate_offset(offset)?;
        if self.state == PlaybackState::Playing {
            return self.play(offset);
        }
        self.offset = offset;
        Ok(())
    }

    pub fn stop(&mut self) {
        self.cancel_pending();
        self.active.clear();
        self.offset = 0.0;
        self.state = PlaybackState::Idle;
    }

    pub fn set_muted(&mut self, track: &TrackId, muted: bool) -> Result<(), PlaybackError> {
        self.ensure_track(track)?;
        if muted {
            self.muted.insert(track.clone());
        } else {
            self.muted.remove(track);
        }
        self.reschedule_in_place();
        Ok(())
    }

    pub fn set_soloed(&mut self, track: &TrackId, soloed: bool) -> Result<(), PlaybackError> {
        self.ensure_track(track)?;
        if soloed {
            self.soloed.insert(track.clone());
        } else {
            self.soloed.remove(track);
        }
        self.reschedule_in_place();
        Ok(())
    }

    /// Dispatch every due note and retire expired visual highlights.
    pub fn advance(&mut self, now_ms: Millis) -> PlaybackState {
        if self.state == PlaybackState::Playing {
            while let Some(pending) = self.pending.front().copied() {
                if pending.fire_at_ms > now_ms {
                    break;
                }
                self.pending.pop_front();
                self.dispatch(pending);
            }
        }

        self.active.retain(|active| active.until_ms > now_ms);

        if self.state == PlaybackState::Playing && self.elapsed_at(now_ms) >= self.duration() {
            info!(dispatched = self.dispatched, "playback reached the end");
            self.stop();
        }
        self.state
    }

    pub fn is_audible(&self, track: &TrackId) -> bool {
        if !self.soloed.is_empty() {
            return self.soloed.contains(track);
        }
        !self.muted.contains(track)
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn elapsed(&self) -> Seconds {
        self.elapsed_at(self.clock.now_ms())
    }

    pub fn duration(&self) -> Seconds {
        self.tracks
            .iter()
            .map(|track| track.duration)
            .fold(0.0, f64::max)
    }

    pub fn active_notes(&self) -> &[ActiveNote] {
        &self.active
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn dispatched_count(&self) -> u64 {
        self.dispatched
    }

    fn elapsed_at(&self, now_ms: Millis) -> Seconds {
        match self.state {
            PlaybackState::Playing => {
                self.offset + (now_ms - self.started_at_ms).max(0.0) / 1000.0
            }
            PlaybackState::Paused | PlaybackState::Idle => self.offset,
        }
    }

    fn schedule_from(&mut self, from_offset: Seconds) {
        let mut scheduled = Vec::new();
        for (track_idx, track) in self.tracks.iter().enumerate() {
            if !self.is_audible(&track.id) {
                continue;
            }
            for (note_idx, note) in track.notes.iter().enumerate() {
                if note.start_time < from_offset {
                    continue;
                }
                scheduled.push(PendingNote {
                    fire_at_ms: self.started_at_ms + (note.start_time - from_offset) * 1000.0,
                    track: track_idx,
                    note: note_idx,
                });
            }
        }
        scheduled.sort_by(|a, b| a.fire_at_ms.total_cmp(&b.fire_at_ms));
        self.pending = scheduled.into();
    }

    fn reschedule_in_place(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        let now = self.clock.now_ms();
        let offset = self.elapsed_at(now);
        self.cancel_pending();
        self.offset = offset;
        self.started_at_ms = now;
        self.schedule_from(offset);
    }

    fn dispatch(&mut self, pending: PendingNote) {
        let Some(track) = self.tracks.get(pending.track) else {
            return;
        };
        let Some(note) = track.notes.get(pending.note) else {
            return;
        };

        self.audio.play_note(track.instrument, &note.note, note.velocity);
        self.dispatched += 1;
        if self.config.visual_feedback {
            self.active.push(ActiveNote {
                track_id: track.id.clone(),
                note: *note,
                until_ms: pending.fire_at_ms + note.duration * 1000.0,
            });
        }
    }

    fn cancel_pending(&mut self) {
        if !self.pending.is_empty() {
            debug!(cancelled = self.pending.len(), "pending notes cancelled");
        }
        self.pending.clear();
    }

    fn ensure_track(&self, track: &TrackId) -> Result<(), PlaybackError> {
        if self.tracks.iter().any(|t| &t.id == track) {
            Ok(())
        } else {
            Err(PlaybackError::UnknownTrack(track.clone()))
        }
    }
}

impl FrameTick for PlaybackScheduler {
    fn tick(&mut self, now_ms: Millis) -> TickFlow {
        match self.advance(now_ms) {
            PlaybackState::Playing => TickFlow::Continue,
            PlaybackState::Paused | PlaybackState::Idle => TickFlow::Stop,
        }
    }
}

fn validate_offset(offset: Seconds) -> Result<(), PlaybackError> {
    if offset.is_finite() && offset >= 0.0 {
        Ok(())
    } else {
        Err(PlaybackError::InvalidOffset(offset))
    }
}
