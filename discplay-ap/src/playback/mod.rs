//! Playback pipeline: frame cache, track cursor, sample ring and the player

pub mod driver;
pub mod frame_cache;
pub mod player;
pub mod reader;
pub mod sample_ring;
pub mod state;
pub mod track_cursor;

pub use driver::{drive, DriveEnd};
pub use frame_cache::FrameCache;
pub use player::Player;
pub use sample_ring::SampleRing;
pub use state::{PlaybackState, PlayerStatus};
pub use track_cursor::TrackCursor;
