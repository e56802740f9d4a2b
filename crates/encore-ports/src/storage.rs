use crate::model::{ChallengeScore, Composition};
use crate::types::*;
use serde::{Deserialize, Serialize};

fn default_hit_window() -> f64 {
    100.0
}

fn default_hit_line_distance() -> f64 {
    500.0
}

fn default_random_session_ms() -> u64 {
    60_000
}

fn default_falling_weights() -> ModeWeights {
    ModeWeights::FALLING_NOTES
}

fn default_replication_weights() -> ModeWeights {
    ModeWeights::REPLICATION
}

fn default_audio_init_timeout_ms() -> u64 {
    5_000
}

fn default_audio_init_poll_ms() -> u64 {
    50
}

fn default_visual_feedback() -> bool {
    true
}

fn default_frame_interval_ms() -> u64 {
    16
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

/// Blend of timing quality and hit rate for a live session.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModeWeights {
    pub timing: f64,
    pub accuracy: f64,
}

impl ModeWeights {
    pub const FALLING_NOTES: ModeWeights = ModeWeights {
        timing: 0.7,
        accuracy: 0.3,
    };
    pub const REPLICATION: ModeWeights = ModeWeights {
        timing: 0.3,
        accuracy: 0.7,
    };

    /// Scaled to sum to 1; negative or non-finite parts count as 0.
    pub fn normalized(self) -> ModeWeights {
        let clean = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
        let (timing, accuracy) = (clean(self.timing), clean(self.accuracy));
        let total = timing + accuracy;
        if total <= 0.0 {
            return ModeWeights {
                timing: 0.0,
                accuracy: 0.0,
            };
        }
        ModeWeights {
            timing: timing / total,
            accuracy: accuracy / total,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComparatorWeights {
    pub note: f64,
    pub timing: f64,
    pub velocity: f64,
}

impl Default for ComparatorWeights {
    fn default() -> Self {
        Self {
            note: 0.5,
            timing: 0.3,
            velocity: 0.2,
        }
    }
}

/// Minimum overall score for each letter; anything below `c` is a D.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradeCutoffs {
    pub s: u32,
    pub a: u32,
    pub b: u32,
    pub c: u32,
}

impl Default for GradeCutoffs {
    fn default() -> Self {
        Self {
            s: 95,
            a: 85,
            b: 70,
            c: 55,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparatorSettings {
    pub timing_tolerance_ms: f64,
    pub velocity_tolerance: f32,
    pub weights: ComparatorWeights,
}

impl Default for ComparatorSettings {
    fn default() -> Self {
        Self {
            timing_tolerance_ms: 100.0,
            velocity_tolerance: 0.2,
            weights: ComparatorWeights::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub difficulty: Difficulty,
    #[serde(default = "default_hit_window")]
    pub hit_window: f64,
    #[serde(default = "default_hit_line_distance")]
    pub hit_line_distance: f64,
    #[serde(default = "default_random_session_ms")]
    pub random_session_ms: u64,
    #[serde(default = "default_falling_weights")]
    pub falling_weights: ModeWeights,
    #[serde(default = "default_replication_weights")]
    pub replication_weights: ModeWeights,
    pub comparator: ComparatorSettings,
    pub grade_cutoffs: GradeCutoffs,
    #[serde(default = "default_audio_init_timeout_ms")]
    pub audio_init_timeout_ms: u64,
    #[serde(default = "default_audio_init_poll_ms")]
    pub audio_init_poll_ms: u64,
    #[serde(default = "default_visual_feedback")]
    pub visual_feedback: bool,
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    pub random_seed: Option<u64>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Medium,
            hit_window: 100.0,
            hit_line_distance: 500.0,
            random_session_ms: 60_000,
            falling_weights: ModeWeights::FALLING_NOTES,
            replication_weights: ModeWeights::REPLICATION,
            comparator: ComparatorSettings::default(),
            grade_cutoffs: GradeCutoffs::default(),
            audio_init_timeout_ms: 5_000,
            audio_init_poll_ms: 50,
            visual_feedback: true,
            frame_interval_ms: 16,
            random_seed: None,
        }
    }
}

pub trait SettingsStore: Send + Sync {
    fn load_settings(&self) -> Result<GameSettings, StorageError>;
    fn save_settings(&self, s: &GameSettings) -> Result<(), StorageError>;
}

pub trait CompositionStore: Send + Sync {
    /// `StorageError::NotFound` when the post has no composition yet.
    fn fetch_composition(&self, post: &PostId) -> Result<Composition, StorageError>;
    fn save_composition(&self, post: &PostId, composition: &Composition)
        -> Result<(), StorageError>;
}

pub trait ScoreStore: Send + Sync {
    /// Appends; earlier scores for the same composition are kept.
    fn submit_score(
        &self,
        composition: &CompositionId,
        score: &ChallengeScore,
    ) -> Result<(), StorageError>;
    fn scores_for(&self, composition: &CompositionId) -> Result<Vec<ChallengeScore>, StorageError>;
}
