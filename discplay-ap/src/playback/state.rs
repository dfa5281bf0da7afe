//! Playback state and status snapshots

use discplay_common::{Msf, Msfs};
use serde::Serialize;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
    #[default]
    Stopped,
    /// A disc or sink failure stopped playback; only `stop()` leaves this state
    Error,
}

impl PlaybackState {
    /// States in which the ring buffer is kept filled
    pub fn is_active(self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Paused)
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Stopped => write!(f, "stopped"),
            PlaybackState::Error => write!(f, "error"),
        }
    }
}

/// What the listener is hearing right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerStatus {
    pub state: PlaybackState,
    pub current_track_index: usize,
    pub current_track_name: String,

    /// Audible position on the disc (track start + position in track)
    pub position: Msfs,

    /// Audible position relative to the track start: samples read from the
    /// disc minus those still waiting in the ring buffer and the sink
    pub position_in_track: Msfs,
}

impl PlayerStatus {
    /// Fixed payload reported while in [`PlaybackState::Error`]
    pub fn error() -> Self {
        Self {
            state: PlaybackState::Error,
            current_track_index: 0,
            current_track_name: "Error".to_string(),
            position: Msfs::ZERO,
            position_in_track: Msfs::ZERO,
        }
    }

    /// Status with no track selected
    pub fn idle(state: PlaybackState) -> Self {
        Self {
            state,
            current_track_index: 0,
            current_track_name: String::new(),
            position: Msfs::ZERO,
            position_in_track: Msfs::ZERO,
        }
    }

    /// Frame-granular audible position, e.g. for a time display
    pub fn position_msf(&self) -> Msf {
        self.position.msf()
    }
}
