#![allow(dead_code)]

use encore_ports::audio::{AudioError, AudioSink, EngineState};
use encore_ports::model::{ChallengeScore, Composition, CompositionMeta, NoteEvent, Track};
use encore_ports::note::{Instrument, NoteToken};
use encore_ports::storage::{CompositionStore, ScoreStore, StorageError};
use encore_ports::types::{CompositionId, PostId, TrackId, UserId, Velocity01};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Audio sink that records every note and becomes ready after a number of
/// state polls.
pub struct RecordingSink {
    initialized: AtomicBool,
    polls_left: AtomicU32,
    fail_init: bool,
    pub init_calls: AtomicU32,
    played: Mutex<Vec<(Instrument, NoteToken, f32)>>,
}

impl RecordingSink {
    pub fn ready() -> Self {
        Self::ready_after(0)
    }

    pub fn ready_after(polls: u32) -> Self {
        Self {
            initialized: AtomicBool::new(false),
            polls_left: AtomicU32::new(polls),
            fail_init: false,
            init_calls: AtomicU32::new(0),
            played: Mutex::new(Vec::new()),
        }
    }

    pub fn never_ready() -> Self {
        Self::ready_after(u32::MAX)
    }

    pub fn failing() -> Self {
        Self {
            fail_init: true,
            ..Self::ready_after(0)
        }
    }

    pub fn played(&self) -> Vec<(Instrument, NoteToken, f32)> {
        self.played.lock().clone()
    }

    pub fn played_tokens(&self) -> Vec<String> {
        self.played
            .lock()
            .iter()
            .map(|(_, token, _)| token.to_string())
            .collect()
    }
}

impl AudioSink for RecordingSink {
    fn initialize(&self) -> Result<(), AudioError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            return Err(AudioError::InitFailed("no device".to_string()));
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn play_note(&self, instrument: Instrument, note: &NoteToken, velocity: Velocity01) {
        self.played.lock().push((instrument, *note, velocity.get()));
    }

    fn engine_state(&self) -> EngineState {
        if !self.initialized.load(Ordering::SeqCst) {
            return EngineState::default();
        }
        let left = self.polls_left.load(Ordering::SeqCst);
        if left == 0 {
            return EngineState {
                is_initialized: true,
            };
        }
        if left != u32::MAX {
            self.polls_left.store(left - 1, Ordering::SeqCst);
        }
        EngineState::default()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    compositions: Mutex<HashMap<String, Composition>>,
    scores: Mutex<HashMap<String, Vec<ChallengeScore>>>,
}

impl MemoryStore {
    pub fn with_composition(post: &str, composition: Composition) -> Self {
        let store = Self::default();
        store
            .compositions
            .lock()
            .insert(post.to_string(), composition);
        store
    }

    pub fn score_count(&self) -> usize {
        self.scores.lock().values().map(Vec::len).sum()
    }
}

impl CompositionStore for MemoryStore {
    fn fetch_composition(&self, post: &PostId) -> Result<Composition, StorageError> {
        self.compositions
            .lock()
            .get(&post.0)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(post.0.clone()))
    }

    fn save_composition(
        &self,
        post: &PostId,
        composition: &Composition,
    ) -> Result<(), StorageError> {
        self.compositions
            .lock()
            .insert(post.0.clone(), composition.clone());
        Ok(())
    }
}

impl ScoreStore for MemoryStore {
    fn submit_score(
        &self,
        composition: &CompositionId,
        score: &ChallengeScore,
    ) -> Result<(), StorageError> {
        self.scores
            .lock()
            .entry(composition.0.clone())
            .or_default()
            .push(score.clone());
        Ok(())
    }

    fn scores_for(&self, composition: &CompositionId) -> Result<Vec<ChallengeScore>, StorageError> {
        Ok(self
            .scores
            .lock()
            .get(&composition.0)
            .cloned()
            .unwrap_or_default())
    }
}

pub fn note(token: &str, start: f64, duration: f64) -> NoteEvent {
    NoteEvent::new(token.parse().unwrap(), 0.8, start, duration)
}

pub fn track(id: &str, instrument: Instrument, notes: Vec<NoteEvent>, duration: f64) -> Track {
    Track::new(
        TrackId(id.to_string()),
        instrument,
        notes,
        120,
        duration,
        UserId("author".to_string()),
        1_700_000_000_000,
    )
}

pub fn composition(id: &str, layers: Vec<Track>) -> Composition {
    Composition::new(
        CompositionId(id.to_string()),
        layers,
        CompositionMeta::default(),
    )
}

pub fn token(text: &str) -> NoteToken {
    text.parse().unwrap()
}
