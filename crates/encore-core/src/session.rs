use encore_ports::playback::PlaybackError;

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("session is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("lane {lane} out of range (0..{lanes})")]
    LaneOutOfRange { lane: u8, lanes: u8 },
    #[error("playback error: {0}")]
    Playback(#[from] PlaybackError),
}
