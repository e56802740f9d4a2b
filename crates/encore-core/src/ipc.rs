use crate::challenge::ChallengeSummary;
use encore_domain_eval::{ComparisonReport, ComparisonResult, Grade};
use encore_ports::model::{ChallengeScore, Composition};
use encore_ports::note::{Instrument, NoteToken};
use encore_ports::playback::PlaybackState;
use encore_ports::types::{
    CompositionId, Difficulty, Millis, PostId, Seconds, TrackId, UserId, Velocity01,
};
use serde::{Deserialize, Serialize};

/// Which phrase a falling-notes run is charted from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum FallingSource {
    /// Notes picked at random from the instrument palette.
    Random { instrument: Instrument },
    /// A layer of the loaded composition.
    Layer { track_id: TrackId },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Command {
    LoadComposition { post_id: PostId },
    SaveComposition { post_id: PostId, composition: Composition },
    Play { from_offset: Seconds },
    Resume,
    Pause,
    Stop,
    Seek { offset: Seconds },
    SetMuted { track_id: TrackId, muted: bool },
    SetSoloed { track_id: TrackId, soloed: bool },
    SetDifficulty { difficulty: Difficulty },
    StartFallingNotes { user_id: UserId, source: FallingSource },
    StartReplication { user_id: UserId, track_id: TrackId },
    PlayReference,
    StartListening,
    LaneActivate { lane: u8 },
    LaneRelease { lane: u8 },
    NotePlayed { note: NoteToken, velocity: Velocity01 },
    FinishEarly,
    AbortSession,
    CompareTracks { original: TrackId, recorded: TrackId },
    LoadLeaderboard,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionKind {
    FallingNotes,
    Replication,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    CompositionLoaded {
        composition_id: CompositionId,
        tracks: Vec<TrackId>,
        duration: Seconds,
    },
    /// The post has no composition yet; the host should offer to create one.
    CompositionMissing { post_id: PostId },
    PlaybackUpdated { state: PlaybackState, elapsed: Seconds },
    SessionStarted { kind: SessionKind, difficulty: Difficulty },
    NoteSpawned { id: u64, lane: u8, note: NoteToken },
    NoteJudged {
        id: u64,
        lane: u8,
        grade: Grade,
        accuracy: f64,
        points: u32,
        combo: u32,
    },
    NoteMissed { id: u64, lane: u8 },
    HoldReleased { id: u64, lane: u8, held_ms: Millis, bonus: u32 },
    NoteCompared { result: ComparisonResult },
    ReplicationProgress { correct: u32, missed: u32, remaining: u32 },
    SessionCompleted { summary: ChallengeSummary, submitted: bool },
    SessionAborted,
    ComparisonReady { report: ComparisonReport },
    LeaderboardUpdated { scores: Vec<ChallengeScore> },
}
