//! Disc device boundary
//!
//! Everything the playback core needs from a drive: the table of contents,
//! raw 2352-byte audio frames addressed by physical position, and tray/spin
//! control. Reads are slow and blocking; callers must not hold player locks
//! across them unless the frame is known to be cached.

pub mod image;

use crate::audio::Sample;
use discplay_common::msf::SAMPLES_PER_FRAME;
use discplay_common::{DiscToc, Msf};
use thiserror::Error;

/// Bytes in one raw audio frame
pub const FRAME_BYTES: usize = 2352;

/// One decoded disc frame
pub type FrameSamples = [Sample; SAMPLES_PER_FRAME as usize];

/// Disc device errors
#[derive(Error, Debug)]
pub enum DiscError {
    /// The drive reported a failure (code is the device's own error number)
    #[error("Device error {code}: {message}")]
    Device { code: i32, message: String },

    #[error("Drive not ready")]
    NotReady,

    #[error("Tray is open")]
    TrayOpen,

    /// Requested position lies outside the disc
    #[error("Position {0} is out of range")]
    OutOfRange(Msf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed cue sheet
    #[error("Cue sheet error: {0}")]
    Cue(String),
}

/// Drive state as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveStatus {
    NoInfo,
    NoDisc,
    TrayOpen,
    NotReady,
    DiscOk,
}

/// Kind of disc in the drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscType {
    /// Audio tracks only
    Audio,
    /// Audio and data tracks
    Mixed,
    Unsupported,
}

/// One raw frame as returned by the drive, with its subchannel position data
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: [u8; FRAME_BYTES],
    pub track_number: u8,
    pub index_number: u8,
    /// Physical position on the disc
    pub absolute: Msf,
    /// Position relative to the start of the track
    pub relative: Msf,
}

impl RawFrame {
    /// Decode the frame into 588 stereo samples
    pub fn samples(&self) -> FrameSamples {
        let mut samples = [Sample::SILENCE; SAMPLES_PER_FRAME as usize];
        for (sample, bytes) in samples.iter_mut().zip(self.data.chunks_exact(Sample::BYTES)) {
            *sample = Sample::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        samples
    }
}

/// An optical drive (or anything that behaves like one).
pub trait DiscDevice: Send + Sync {
    fn is_ready(&self) -> bool;

    fn read_table_of_contents(&self) -> Result<DiscToc, DiscError>;

    /// Read the frame at a physical disc position
    fn read_frame(&self, position: Msf) -> Result<RawFrame, DiscError>;

    /// Spin up
    fn start(&self) -> Result<(), DiscError>;

    /// Spin down
    fn stop(&self) -> Result<(), DiscError>;

    fn eject(&self) -> Result<(), DiscError>;

    fn close_tray(&self) -> Result<(), DiscError>;

    fn drive_status(&self) -> Result<DriveStatus, DiscError>;

    fn disc_type(&self) -> DiscType;
}
