use serde::{Deserialize, Serialize};
use std::fmt;

pub type Millis = f64; // monotonic clock time, session-local epoch
pub type Seconds = f64; // track-relative time
pub type UnixMillis = u64; // wall-clock timestamps on persisted records

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositionId(pub String);

/// Opaque identifier of the platform post a composition is attached to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
#[error("velocity {0} is outside 0..=1")]
pub struct VelocityError(pub f32);

/// Note loudness in `0..=1`. Deserializing rejects anything else.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(try_from = "f32", into = "f32")]
pub struct Velocity01(pub f32);

impl Velocity01 {
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn get(self) -> f32 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        (0.0..=1.0).contains(&self.0)
    }
}

impl TryFrom<f32> for Velocity01 {
    type Error = VelocityError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        let velocity = Self(value);
        if velocity.is_valid() {
            Ok(velocity)
        } else {
            Err(VelocityError(value))
        }
    }
}

impl From<Velocity01> for f32 {
    fn from(velocity: Velocity01) -> Self {
        velocity.0
    }
}

impl Difficulty {
    pub fn spawn_interval_ms(self) -> Millis {
        match self {
            Difficulty::Easy => 2000.0,
            Difficulty::Medium => 1500.0,
            Difficulty::Hard => 1000.0,
        }
    }

    /// Fall speed in position units per second.
    pub fn speed(self) -> f64 {
        match self {
            Difficulty::Easy => 150.0,
            Difficulty::Medium => 200.0,
            Difficulty::Hard => 250.0,
        }
    }
}

macro_rules! display_id {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

display_id!(TrackId, CompositionId, PostId, UserId);

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}
