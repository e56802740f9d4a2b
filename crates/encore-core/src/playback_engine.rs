use crate::scheduler::{ActiveNote, PlaybackScheduler, SchedulerConfig};
use encore_ports::audio::AudioSink;
use encore_ports::clock::Clock;
use encore_ports::model::Track;
use encore_ports::playback::{PlaybackError, PlaybackPort, PlaybackState};
use encore_ports::types::{Millis, Seconds, TrackId};
use parking_lot::Mutex;
use std::sync::Arc;

/// Thread-safe playback: one mutex around the scheduler.
pub struct PlaybackEngine {
    state: Mutex<PlaybackScheduler>,
}

impl PlaybackEngine {
    pub fn new(audio: Arc<dyn AudioSink>, clock: Arc<dyn Clock>, config: SchedulerConfig) -> Self {
        Self {
            state: Mutex::new(PlaybackScheduler::new(audio, clock, config)),
        }
    }

    pub fn active_notes(&self) -> Vec<ActiveNote> {
        self.state.lock().active_notes().to_vec()
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending_count()
    }

    pub fn duration(&self) -> Seconds {
        self.state.lock().duration()
    }
}

impl PlaybackPort for PlaybackEngine {
    fn load_tracks(&self, tracks: Vec<Track>) -> Result<(), PlaybackError> {
        let mut state = self.state.lock();
        state.load_tracks(tracks);
        Ok(())
    }

    fn play(&self, from_offset: Seconds) -> Result<(), PlaybackError> {
        let mut state = self.state.lock();
        state.play(from_offset)
    }

    fn resume(&self) -> Result<(), PlaybackError> {
        let mut state = self.state.lock();
        state.resume()
    }

    fn pause(&self) -> Result<(), PlaybackError> {
        let mut state = self.state.lock();
        state.pause();
        Ok(())
    }

    fn stop(&self) -> Result<(), PlaybackError> {
        let mut state = self.state.lock();
        state.stop();
        Ok(())
    }

    fn seek(&self, offset: Seconds) -> Result<(), PlaybackError> {
        let mut state = self.state.lock();
        state.seek(offset)
    }

    fn set_muted(&self, track: &TrackId, muted: bool) -> Result<(), PlaybackError> {
        let mut state = self.state.lock();
        state.set_muted(track, muted)
    }

    fn set_soloed(&self, track: &TrackId, soloed: bool) -> Result<(), PlaybackError> {
        let mut state = self.state.lock();
        state.set_soloed(track, soloed)
    }

    fn advance(&self, now_ms: Millis) -> Result<PlaybackState, PlaybackError> {
        let mut state = self.state.lock();
        Ok(state.advance(now_ms))
    }

    fn state(&self) -> PlaybackState {
        self.state.lock().state()
    }

    fn elapsed(&self) -> Seconds {
        self.state.lock().elapsed()
    }
}
