//! Error types for the digit wheel engine

use thiserror::Error;

/// Configuration and engine errors
#[derive(Error, Debug)]
pub enum WheelError {
    #[error("Machine needs at least one wheel")]
    NoWheels,

    #[error("Too many wheels: {0} (final number must fit in u64, max {max})", max = crate::config::MAX_WHEELS)]
    TooManyWheels(usize),

    #[error("Invalid range on wheel {index}: [{min}, {max}] (need min <= max <= 9)")]
    InvalidRange { index: usize, min: u8, max: u8 },

    #[error("Invalid tick period on wheel {0}: must be between 1 and {max} ms", max = crate::timing::MAX_DELAY_MS)]
    InvalidTick(usize),

    #[error("Invalid timing: {0}")]
    InvalidTiming(String),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type WheelResult<T> = Result<T, WheelError>;

/// Lookup errors (collaborator level, never surfaced as orchestration errors)
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Lookup backend unavailable: {0}")]
    Unavailable(String),

    #[error("Lookup timed out after {0} ms")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed record: {0}")]
    Malformed(String),

    #[error("Roster error: {0}")]
    Roster(#[from] WheelError),
}

/// Audio cue errors (fire-and-forget, logged and ignored)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    #[error("Audio cue unavailable")]
    Unavailable,

    #[error("Playback failed: {0}")]
    Playback(String),
}
