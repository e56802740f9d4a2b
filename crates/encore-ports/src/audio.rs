use crate::note::{Instrument, NoteToken};
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum AudioError {
    #[error("audio engine failed to initialize: {0}")]
    InitFailed(String),
    #[error("audio engine not ready after {0} ms")]
    InitTimeout(u64),
    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    pub is_initialized: bool,
}

/// Sound output capability injected into playback and sessions.
///
/// Thread model:
/// - `initialize` may block and is only called outside the frame loop; it must
///   be idempotent
/// - `play_note` is fire-and-forget and is called from inside ticks
pub trait AudioSink: Send + Sync {
    fn initialize(&self) -> Result<(), AudioError>;
    fn play_note(&self, instrument: Instrument, note: &NoteToken, velocity: Velocity01);
    fn engine_state(&self) -> EngineState;
}

/// Stands in when no audio is available; every call is a no-op.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullAudioSink;

impl AudioSink for NullAudioSink {
    fn initialize(&self) -> Result<(), AudioError> {
        Ok(())
    }

    fn play_note(&self, _instrument: Instrument, _note: &NoteToken, _velocity: Velocity01) {}

    fn engine_state(&self) -> EngineState {
        EngineState {
            is_initialized: true,
        }
    }
}
