//! Core error types for zenring-core.
//!
//! Audio failures are split in two: [`AudioError`] covers the
//! output graph and track loading, [`PlaybackError`] is the result of a single
//! `play()` and must be cheap to clone because an in-flight play is awaited by
//! more than one party.

use std::path::PathBuf;
use thiserror::Error;

use crate::audio::Track;

/// Core error type for zenring-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Audio output errors
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Config directory could not be resolved or created
    #[error("Config directory unavailable: {0}")]
    DirUnavailable(String),
}

/// Errors from the audio output graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// The output could not be resumed (device missing, context suspended).
    #[error("Audio output unavailable: {0}")]
    OutputUnavailable(String),

    /// Attaching a track to the output was refused, typically because no
    /// user gesture preceded it.
    #[error("Output refused to attach the {track} track")]
    AttachRejected { track: Track },

    /// A track source could not be loaded.
    #[error("Failed to load {url} into the {track} track: {message}")]
    LoadFailed {
        track: Track,
        url: String,
        message: String,
    },

    /// The output has been closed.
    #[error("Audio output is closed")]
    Closed,
}

/// Outcome of a single `play()` on a track.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// A pause arrived before the play resolved. Expected, never surfaced.
    #[error("Playback interrupted by pause")]
    Interrupted,

    /// Format, network or permission failure.
    #[error("Playback failed: {0}")]
    Failed(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_into_core_error() {
        let err: CoreError = ConfigError::UnknownKey("timing.nope".into()).into();
        assert!(matches!(err, CoreError::Config(ConfigError::UnknownKey(_))));
        assert_eq!(
            err.to_string(),
            "Configuration error: Unknown configuration key: timing.nope"
        );
    }

    #[test]
    fn attach_rejection_names_the_track() {
        let err = AudioError::AttachRejected {
            track: Track::Chime,
        };
        assert_eq!(err.to_string(), "Output refused to attach the chime track");
    }
}
