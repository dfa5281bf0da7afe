//! Test helper modules for discplay-ap integration tests
//!
//! - MockDisc: in-memory disc whose samples encode their own disc position
//! - MockSink: scripted audio sink that records what it was given

#![allow(dead_code)]

pub mod mock_disc;
pub mod mock_sink;

pub use mock_disc::{sample_index, MockDisc};
pub use mock_sink::{MockSink, MockSinkHandle};

use discplay_common::config::{PlayerSettings, ReaderMode};
use discplay_common::msf::SAMPLES_PER_FRAME;

/// Samples in one disc frame
pub const FRAME: usize = SAMPLES_PER_FRAME as usize;

/// Small watermarks and quanta so a handful of ticks exercise every path
pub fn test_settings(reader_mode: ReaderMode) -> PlayerSettings {
    PlayerSettings {
        cache_frames: 64,
        ring_initial_capacity: FRAME,
        low_watermark: FRAME * 4,
        high_watermark: FRAME * 8,
        fill_quantum: FRAME,
        sink_sufficient: FRAME,
        sink_quantum: FRAME,
        reader_throttle_ms: 1,
        reader_mode,
    }
}
