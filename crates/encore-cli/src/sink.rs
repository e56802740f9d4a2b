use encore_ports::audio::{AudioError, AudioSink, EngineState};
use encore_ports::note::{Instrument, NoteToken};
use encore_ports::types::Velocity01;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::info;

/// Stands in for a synthesizer: every note becomes a log line.
#[derive(Debug, Default)]
pub struct LoggingSink {
    ready: AtomicBool,
    notes: AtomicU64,
}

impl LoggingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notes_played(&self) -> u64 {
        self.notes.load(Ordering::Relaxed)
    }
}

impl AudioSink for LoggingSink {
    fn initialize(&self) -> Result<(), AudioError> {
        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    fn play_note(&self, instrument: Instrument, note: &NoteToken, velocity: Velocity01) {
        self.notes.fetch_add(1, Ordering::Relaxed);
        info!(%instrument, %note, velocity = velocity.get(), "note");
    }

    fn engine_state(&self) -> EngineState {
        EngineState {
            is_initialized: self.ready.load(Ordering::Acquire),
        }
    }
}
