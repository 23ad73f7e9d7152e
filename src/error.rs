use thiserror::Error;

/// Hard failure for a single file: the input could not be turned into an `AudioBuffer`.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to read audio input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported audio format: {0}")]
    Unsupported(String),

    #[error("Corrupt audio stream: {0}")]
    Corrupt(String),

    #[error("No audio tracks found")]
    NoTrack,

    #[error("Unknown sample rate")]
    UnknownSampleRate,

    #[error("Audio contains no samples")]
    Empty,

    #[error("Channel {index} has {got} frames, expected {expected}")]
    ChannelLengthMismatch {
        index: usize,
        expected: usize,
        got: usize,
    },
}

impl From<symphonia::core::errors::Error> for DecodeError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        use symphonia::core::errors::Error;
        match err {
            Error::IoError(e) => DecodeError::Io(e),
            Error::Unsupported(what) => DecodeError::Unsupported(what.to_string()),
            Error::DecodeError(what) => DecodeError::Corrupt(what.to_string()),
            Error::LimitError(what) => DecodeError::Corrupt(format!("limit exceeded: {}", what)),
            Error::SeekError(kind) => DecodeError::Corrupt(format!("seek failed: {:?}", kind)),
            Error::ResetRequired => DecodeError::Corrupt("decoder reset required".into()),
        }
    }
}

/// Failure reported by an advanced signal library. Never leaves the provider boundary.
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Signal library failed to initialise: {0}")]
    Init(String),

    #[error("Signal library could not produce an estimate: {0}")]
    NoEstimate(String),

    #[error("Signal library call failed: {0}")]
    Call(String),
}
