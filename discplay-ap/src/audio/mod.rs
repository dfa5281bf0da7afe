//! Audio output boundary
//!
//! The player talks to the output device only through [`AudioSink`]. The
//! device keeps a small queue of its own that drains in real time; the player
//! polls its occupancy and tops it up from the sample ring.

pub mod output;

use thiserror::Error;

/// One stereo 16-bit PCM sample (one sample per channel)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sample {
    pub left: i16,
    pub right: i16,
}

impl Sample {
    /// Bytes occupied by one sample in a raw disc frame
    pub const BYTES: usize = 4;

    pub const SILENCE: Sample = Sample { left: 0, right: 0 };

    pub fn new(left: i16, right: i16) -> Self {
        Self { left, right }
    }

    /// Decode little-endian left/right 16-bit values
    pub fn from_le_bytes(bytes: [u8; 4]) -> Self {
        Self {
            left: i16::from_le_bytes([bytes[0], bytes[1]]),
            right: i16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }
}

/// Audio output device errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Device could not be opened or answered with an error
    #[error("Audio device error: {0}")]
    Device(String),

    /// Output stream failed to build, start or keep running
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// Device cannot play 44.1kHz stereo
    #[error("Unsupported audio format: {0}")]
    Unsupported(String),
}

/// Real-time audio output with a small internal queue.
pub trait AudioSink: Send {
    /// True once the device accepts samples
    fn is_ready(&self) -> bool;

    /// Queue samples for playback.
    ///
    /// Returns how many samples (from the front of `samples`) were accepted.
    /// Zero means the device is momentarily full; the caller keeps the samples
    /// and tries again later.
    fn enqueue(&mut self, samples: &[Sample]) -> Result<usize, SinkError>;

    /// Samples accepted but not yet played
    fn queued_sample_count(&self) -> Result<usize, SinkError>;

    /// Ready the device for a fresh stream
    fn prepare(&mut self) -> Result<(), SinkError>;

    fn pause(&mut self) -> Result<(), SinkError>;

    fn resume(&mut self) -> Result<(), SinkError>;

    /// Drop everything queued and stop output
    fn reset(&mut self) -> Result<(), SinkError>;
}
