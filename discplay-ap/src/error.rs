//! Error types for discplay-ap
//!
//! Device-level failures keep their own enums ([`DiscError`], [`SinkError`])
//! so adapters can report them without knowing about the player.

use crate::audio::SinkError;
use crate::disc::DiscError;
use thiserror::Error;

/// Main error type for discplay-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Disc device errors
    #[error("Disc error: {0}")]
    Disc(#[from] DiscError),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    Sink(#[from] SinkError),

    /// Playlist index outside the enqueued tracks
    #[error("Track index {index} out of bounds (playlist has {track_count} tracks)")]
    TrackOutOfBounds { index: usize, track_count: usize },

    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(#[from] discplay_common::Error),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Convenience Result type using discplay-ap Error
pub type Result<T> = std::result::Result<T, Error>;
