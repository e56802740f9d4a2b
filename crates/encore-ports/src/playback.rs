use crate::model::Track;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

#[derive(thiserror::Error, Debug)]
pub enum PlaybackError {
    #[error("no tracks loaded")]
    NothingLoaded,
    #[error("unknown track: {0}")]
    UnknownTrack(TrackId),
    #[error("invalid offset: {0}")]
    InvalidOffset(Seconds),
    #[error("backend error: {0}")]
    Backend(String),
}

pub trait PlaybackPort: Send + Sync {
    fn load_tracks(&self, tracks: Vec<Track>) -> Result<(), PlaybackError>;

    /// Start from an explicit offset in seconds.
    fn play(&self, from_offset: Seconds) -> Result<(), PlaybackError>;
    /// Start from the stored offset (after a pause or a seek).
    fn resume(&self) -> Result<(), PlaybackError>;
    fn pause(&self) -> Result<(), PlaybackError>;
    fn stop(&self) -> Result<(), PlaybackError>;
    fn seek(&self, offset: Seconds) -> Result<(), PlaybackError>;

    fn set_muted(&self, track: &TrackId, muted: bool) -> Result<(), PlaybackError>;
    fn set_soloed(&self, track: &TrackId, soloed: bool) -> Result<(), PlaybackError>;

    /// Advance to `now_ms`, dispatching every note that came due.
    fn advance(&self, now_ms: Millis) -> Result<PlaybackState, PlaybackError>;

    fn state(&self) -> PlaybackState;
    fn elapsed(&self) -> Seconds;
}
