use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NoteParseError {
    #[error("empty note token")]
    Empty,
    #[error("unknown note token: {0}")]
    Unknown(String),
    #[error("pitch out of midi range: {0}")]
    OutOfRange(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    Drums,
    Piano,
    Bass,
    Synth,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DrumPiece {
    Kick,
    Snare,
    HiHat,
    OpenHat,
    Crash,
    Ride,
    TomHigh,
    TomLow,
    Clap,
}

/// MIDI note number, 0..=127.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pitch(u8);

/// What a note event sounds: a drum piece or a pitched note.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NoteToken {
    Drum(DrumPiece),
    Pitched(Pitch),
}

const PITCH_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

const DRUM_PALETTE: [NoteToken; 5] = [
    NoteToken::Drum(DrumPiece::Kick),
    NoteToken::Drum(DrumPiece::Snare),
    NoteToken::Drum(DrumPiece::HiHat),
    NoteToken::Drum(DrumPiece::OpenHat),
    NoteToken::Drum(DrumPiece::Crash),
];

// C major, C4..C5
const PIANO_PALETTE: [NoteToken; 8] = [
    NoteToken::Pitched(Pitch(60)),
    NoteToken::Pitched(Pitch(62)),
    NoteToken::Pitched(Pitch(64)),
    NoteToken::Pitched(Pitch(65)),
    NoteToken::Pitched(Pitch(67)),
    NoteToken::Pitched(Pitch(69)),
    NoteToken::Pitched(Pitch(71)),
    NoteToken::Pitched(Pitch(72)),
];

// E1 A1 D2 G2 E2 A2
const BASS_PALETTE: [NoteToken; 6] = [
    NoteToken::Pitched(Pitch(28)),
    NoteToken::Pitched(Pitch(33)),
    NoteToken::Pitched(Pitch(38)),
    NoteToken::Pitched(Pitch(43)),
    NoteToken::Pitched(Pitch(40)),
    NoteToken::Pitched(Pitch(45)),
];

// C minor pentatonic, C3..C4
const SYNTH_PALETTE: [NoteToken; 6] = [
    NoteToken::Pitched(Pitch(48)),
    NoteToken::Pitched(Pitch(51)),
    NoteToken::Pitched(Pitch(53)),
    NoteToken::Pitched(Pitch(55)),
    NoteToken::Pitched(Pitch(58)),
    NoteToken::Pitched(Pitch(60)),
];

impl Instrument {
    pub const ALL: [Instrument; 4] = [
        Instrument::Drums,
        Instrument::Piano,
        Instrument::Bass,
        Instrument::Synth,
    ];

    /// Notes a random falling-note spawner may pick for this instrument.
    pub fn palette(self) -> &'static [NoteToken] {
        match self {
            Instrument::Drums => &DRUM_PALETTE,
            Instrument::Piano => &PIANO_PALETTE,
            Instrument::Bass => &BASS_PALETTE,
            Instrument::Synth => &SYNTH_PALETTE,
        }
    }

    pub fn accepts(self, token: &NoteToken) -> bool {
        match (self, token) {
            (Instrument::Drums, NoteToken::Drum(_)) => true,
            (Instrument::Drums, NoteToken::Pitched(_)) => false,
            (Instrument::Piano | Instrument::Bass | Instrument::Synth, NoteToken::Pitched(_)) => {
                true
            }
            (Instrument::Piano | Instrument::Bass | Instrument::Synth, NoteToken::Drum(_)) => false,
        }
    }
}

impl DrumPiece {
    pub fn name(self) -> &'static str {
        match self {
            DrumPiece::Kick => "kick",
            DrumPiece::Snare => "snare",
            DrumPiece::HiHat => "hihat",
            DrumPiece::OpenHat => "openhat",
            DrumPiece::Crash => "crash",
            DrumPiece::Ride => "ride",
            DrumPiece::TomHigh => "tom1",
            DrumPiece::TomLow => "tom2",
            DrumPiece::Clap => "clap",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        let piece = match name {
            "kick" | "bd" => DrumPiece::Kick,
            "snare" | "sd" => DrumPiece::Snare,
            "hihat" | "hh" | "hi-hat" => DrumPiece::HiHat,
            "openhat" | "oh" | "open-hat" => DrumPiece::OpenHat,
            "crash" => DrumPiece::Crash,
            "ride" => DrumPiece::Ride,
            "tom1" | "tomhigh" => DrumPiece::TomHigh,
            "tom2" | "tomlow" => DrumPiece::TomLow,
            "clap" | "cp" => DrumPiece::Clap,
            _ => return None,
        };
        Some(piece)
    }
}

impl Pitch {
    pub const fn new(midi: u8) -> Option<Self> {
        if midi <= 127 {
            Some(Self(midi))
        } else {
            None
        }
    }

    pub fn midi(self) -> u8 {
        self.0
    }

    pub fn octave(self) -> i32 {
        self.0 as i32 / 12 - 1
    }
}

impl FromStr for Pitch {
    type Err = NoteParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let letter = chars
            .next()
            .ok_or(NoteParseError::Empty)?
            .to_ascii_uppercase();
        let base: i32 = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(NoteParseError::Unknown(s.to_string())),
        };

        let rest = chars.as_str();
        let (accidental, octave_text) = match rest.chars().next() {
            Some('#') => (1, &rest[1..]),
            Some('b') => (-1, &rest[1..]),
            _ => (0, rest),
        };

        let octave: i32 = octave_text
            .parse()
            .map_err(|_| NoteParseError::Unknown(s.to_string()))?;
        if !(-1..=9).contains(&octave) {
            return Err(NoteParseError::OutOfRange(s.to_string()));
        }
        let midi = (octave + 1) * 12 + base + accidental;
        if !(0..=127).contains(&midi) {
            return Err(NoteParseError::OutOfRange(s.to_string()));
        }
        Ok(Pitch(midi as u8))
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = PITCH_NAMES[(self.0 % 12) as usize];
        write!(f, "{}{}", name, self.octave())
    }
}

impl FromStr for NoteToken {
    type Err = NoteParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(NoteParseError::Empty);
        }
        if let Some(piece) = DrumPiece::from_name(&trimmed.to_ascii_lowercase()) {
            return Ok(NoteToken::Drum(piece));
        }
        trimmed.parse::<Pitch>().map(NoteToken::Pitched)
    }
}

impl fmt::Display for NoteToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteToken::Drum(piece) => f.write_str(piece.name()),
            NoteToken::Pitched(pitch) => write!(f, "{pitch}"),
        }
    }
}

impl TryFrom<String> for NoteToken {
    type Error = NoteParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NoteToken> for String {
    fn from(token: NoteToken) -> Self {
        token.to_string()
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Instrument::Drums => "drums",
            Instrument::Piano => "piano",
            Instrument::Bass => "bass",
            Instrument::Synth => "synth",
        };
        f.write_str(name)
    }
}

impl FromStr for Instrument {
    type Err = NoteParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Instrument::ALL
            .into_iter()
            .find(|instrument| instrument.to_string() == wanted)
            .ok_or(NoteParseError::Unknown(wanted))
    }
}
