use crate::note::{Instrument, NoteToken};
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TrackError {
    #[error("note {index} ({note}) is not playable on {instrument}")]
    WrongInstrument {
        index: usize,
        note: NoteToken,
        instrument: Instrument,
    },
    #[error("note {index} has a negative start time or duration")]
    NegativeTime { index: usize },
    #[error("note {index} has velocity {velocity}, outside 0..=1")]
    BadVelocity { index: usize, velocity: f32 },
    #[error("note {index} ends at {end:.3}s, after the track end {duration:.3}s")]
    PastTrackEnd {
        index: usize,
        end: Seconds,
        duration: Seconds,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub note: NoteToken,
    pub velocity: Velocity01,
    pub start_time: Seconds,
    pub duration: Seconds,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub instrument: Instrument,
    pub notes: Vec<NoteEvent>,
    pub tempo: u32,
    pub duration: Seconds,
    pub owner_id: UserId,
    pub created_at: UnixMillis,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositionMeta {
    pub title: Option<String>,
    pub post_id: Option<PostId>,
    pub created_by: Option<UserId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub id: CompositionId,
    pub layers: Vec<Track>,
    pub meta: CompositionMeta,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
    FallingNotes,
    Replication,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChallengeScore {
    pub user_id: UserId,
    pub timing_score: u32,
    pub accuracy_score: u32,
    pub combined_score: u32,
    pub perfect_hits: u32,
    pub great_hits: u32,
    pub good_hits: u32,
    pub missed_notes: u32,
    pub completed_at: UnixMillis,
    pub original_track_id: TrackId,
    pub challenge_type: ChallengeType,
}

impl NoteEvent {
    pub fn new(note: NoteToken, velocity: f32, start_time: Seconds, duration: Seconds) -> Self {
        Self {
            note,
            velocity: Velocity01::new(velocity),
            start_time,
            duration,
        }
    }

    pub fn end_time(&self) -> Seconds {
        self.start_time + self.duration
    }
}

impl Track {
    pub fn new(
        id: TrackId,
        instrument: Instrument,
        mut notes: Vec<NoteEvent>,
        tempo: u32,
        duration: Seconds,
        owner_id: UserId,
        created_at: UnixMillis,
    ) -> Self {
        // stable: chord members keep their recorded order
        notes.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        Self {
            id,
            instrument,
            notes,
            tempo,
            duration,
            owner_id,
            created_at,
        }
    }

    /// Copy with a fresh identity; the note content is shared by value.
    pub fn duplicate(&self, id: TrackId, created_at: UnixMillis) -> Self {
        Self {
            id,
            created_at,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), TrackError> {
        for (index, note) in self.notes.iter().enumerate() {
            if !self.instrument.accepts(&note.note) {
                return Err(TrackError::WrongInstrument {
                    index,
                    note: note.note,
                    instrument: self.instrument,
                });
            }
            if note.start_time < 0.0 || note.duration < 0.0 {
                return Err(TrackError::NegativeTime { index });
            }
            if !note.velocity.is_valid() {
                return Err(TrackError::BadVelocity {
                    index,
                    velocity: note.velocity.get(),
                });
            }
            // small slack for recorder rounding
            if note.end_time() > self.duration + 1e-3 {
                return Err(TrackError::PastTrackEnd {
                    index,
                    end: note.end_time(),
                    duration: self.duration,
                });
            }
        }
        Ok(())
    }
}

impl Composition {
    pub fn new(id: CompositionId, layers: Vec<Track>, meta: CompositionMeta) -> Self {
        Self { id, layers, meta }
    }

    pub fn duration(&self) -> Seconds {
        self.layers
            .iter()
            .map(|track| track.duration)
            .fold(0.0, f64::max)
    }

    pub fn layer(&self, id: &TrackId) -> Option<&Track> {
        self.layers.iter().find(|track| &track.id == id)
    }
}
