//! Disc position algebra
//!
//! Audio discs address time as minute:second:frame with 60 seconds per minute
//! and 75 frames per second. The player also tracks the offset inside a frame,
//! counted in stereo samples (588 per frame at 44.1kHz).
//!
//! All arithmetic carries and borrows field by field, least significant first,
//! and keeps every field inside `[0, radix)`. Nothing here returns an error:
//! results below zero saturate to [`Msf::ZERO`] (use `checked_sub` to detect
//! that case) and results past 255 minutes saturate to the maximum position.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

/// Seconds per minute
pub const SECONDS_PER_MINUTE: u8 = 60;

/// Frames per second
pub const FRAMES_PER_SECOND: u8 = 75;

/// Stereo samples per frame (2352 bytes / 4 bytes per sample)
pub const SAMPLES_PER_FRAME: u16 = 588;

/// Frames per minute
pub const FRAMES_PER_MINUTE: u32 = SECONDS_PER_MINUTE as u32 * FRAMES_PER_SECOND as u32;

/// Frames between the physical address 00:00:00 and logical block 0 (2 seconds)
pub const LEAD_IN_FRAMES: u32 = 150;

/// Disc position with frame granularity.
///
/// Field order matters: the derived `Ord` compares minute, then second, then
/// frame, which is the lexicographic ordering of disc time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Msf {
    pub minute: u8,
    pub second: u8,
    pub frame: u8,
}

impl Msf {
    /// 00:00:00
    pub const ZERO: Msf = Msf { minute: 0, second: 0, frame: 0 };

    /// Largest representable position, 255:59:74
    pub const MAX: Msf = Msf {
        minute: u8::MAX,
        second: SECONDS_PER_MINUTE - 1,
        frame: FRAMES_PER_SECOND - 1,
    };

    /// Create a position, normalizing out-of-range seconds and frames by carrying.
    pub fn new(minute: u8, second: u8, frame: u8) -> Self {
        Self::from_frames(minute as u32 * FRAMES_PER_MINUTE + second as u32 * FRAMES_PER_SECOND as u32 + frame as u32)
    }

    /// Build a position from a linear frame count (saturates at [`Msf::MAX`]).
    pub fn from_frames(total: u32) -> Self {
        let minute = total / FRAMES_PER_MINUTE;
        if minute > u8::MAX as u32 {
            return Self::MAX;
        }
        Self {
            minute: minute as u8,
            second: ((total / FRAMES_PER_SECOND as u32) % SECONDS_PER_MINUTE as u32) as u8,
            frame: (total % FRAMES_PER_SECOND as u32) as u8,
        }
    }

    /// Linear frame count of this position
    pub fn to_frames(&self) -> u32 {
        self.minute as u32 * FRAMES_PER_MINUTE
            + self.second as u32 * FRAMES_PER_SECOND as u32
            + self.frame as u32
    }

    /// Physical position of a logical block address
    pub fn from_lba(lba: u32) -> Self {
        Self::from_frames(lba.saturating_add(LEAD_IN_FRAMES))
    }

    /// Logical block address of this physical position (positions inside the
    /// lead-in map to block 0)
    pub fn to_lba(&self) -> u32 {
        self.to_frames().saturating_sub(LEAD_IN_FRAMES)
    }

    /// Advance by a number of whole frames
    pub fn add_frames(self, frames: u32) -> Self {
        self + Self::from_frames(frames)
    }

    /// Advance by a raw sample count; the part smaller than a frame is dropped
    pub fn add_samples(self, samples: usize) -> Self {
        let frames = samples / SAMPLES_PER_FRAME as usize;
        self.add_frames(u32::try_from(frames).unwrap_or(u32::MAX))
    }

    /// Field-wise addition with an incoming frame carry.
    ///
    /// Returns the sum and whether the minute field overflowed.
    fn carrying_add(self, rhs: Self, carry_in: u32) -> (Self, bool) {
        let frames = self.frame as u32 + rhs.frame as u32 + carry_in;
        let seconds = self.second as u32 + rhs.second as u32 + frames / FRAMES_PER_SECOND as u32;
        let minutes = self.minute as u32 + rhs.minute as u32 + seconds / SECONDS_PER_MINUTE as u32;

        if minutes > u8::MAX as u32 {
            return (Self::MAX, true);
        }

        (
            Self {
                minute: minutes as u8,
                second: (seconds % SECONDS_PER_MINUTE as u32) as u8,
                frame: (frames % FRAMES_PER_SECOND as u32) as u8,
            },
            false,
        )
    }

    /// Field-wise subtraction with an incoming frame borrow.
    ///
    /// A field that goes below zero takes its radix from the next more
    /// significant field. `None` when the minute field itself underflows.
    fn borrowing_sub(self, rhs: Self, borrow_in: i32) -> Option<Self> {
        let mut frame = self.frame as i32 - rhs.frame as i32 - borrow_in;
        let mut borrow = 0;
        while frame < 0 {
            frame += FRAMES_PER_SECOND as i32;
            borrow += 1;
        }

        let mut second = self.second as i32 - rhs.second as i32 - borrow;
        borrow = 0;
        while second < 0 {
            second += SECONDS_PER_MINUTE as i32;
            borrow += 1;
        }

        let minute = self.minute as i32 - rhs.minute as i32 - borrow;
        if minute < 0 {
            return None;
        }

        Some(Self {
            minute: minute as u8,
            second: second as u8,
            frame: frame as u8,
        })
    }

    /// Subtraction that reports an underflow instead of saturating
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.borrowing_sub(rhs, 0)
    }
}

impl Add for Msf {
    type Output = Msf;

    fn add(self, rhs: Msf) -> Msf {
        self.carrying_add(rhs, 0).0
    }
}

impl Sub for Msf {
    type Output = Msf;

    fn sub(self, rhs: Msf) -> Msf {
        self.checked_sub(rhs).unwrap_or(Msf::ZERO)
    }
}

impl AddAssign for Msf {
    fn add_assign(&mut self, rhs: Msf) {
        *self = *self + rhs;
    }
}

impl SubAssign for Msf {
    fn sub_assign(&mut self, rhs: Msf) {
        *self = *self - rhs;
    }
}

impl fmt::Display for Msf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.minute, self.second, self.frame)
    }
}

impl FromStr for Msf {
    type Err = Error;

    /// Parse `MM:SS:FF` as written in cue sheets
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 3 {
            return Err(Error::Parse(format!("Invalid MSF format: {}", s)));
        }

        let field = |text: &str, limit: Option<u8>| -> Result<u8> {
            let value: u8 = text
                .parse()
                .map_err(|e| Error::Parse(format!("Invalid MSF field '{}' in {}: {}", text, s, e)))?;
            match limit {
                Some(limit) if value >= limit => {
                    Err(Error::Parse(format!("MSF field {} out of range in {}", value, s)))
                }
                _ => Ok(value),
            }
        };

        Ok(Self {
            minute: field(parts[0], None)?,
            second: field(parts[1], Some(SECONDS_PER_MINUTE))?,
            frame: field(parts[2], Some(FRAMES_PER_SECOND))?,
        })
    }
}

/// Disc position with sample granularity (minute:second:frame.sample).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Msfs {
    pub minute: u8,
    pub second: u8,
    pub frame: u8,
    pub samples: u16,
}

impl Msfs {
    /// 00:00:00.000
    pub const ZERO: Msfs = Msfs { minute: 0, second: 0, frame: 0, samples: 0 };

    /// Largest representable position, 255:59:74.587
    pub const MAX: Msfs = Msfs {
        minute: Msf::MAX.minute,
        second: Msf::MAX.second,
        frame: Msf::MAX.frame,
        samples: SAMPLES_PER_FRAME - 1,
    };

    /// Combine a frame position with an in-frame sample offset (carried if >= 588)
    pub fn new(msf: Msf, samples: u16) -> Self {
        Self::from(msf) + samples as usize
    }

    /// The frame this position falls in, dropping the sample offset
    pub fn msf(&self) -> Msf {
        Msf {
            minute: self.minute,
            second: self.second,
            frame: self.frame,
        }
    }

    /// Build a position from a linear sample count (saturates at [`Msfs::MAX`])
    pub fn from_samples(total: u64) -> Self {
        let frames = total / SAMPLES_PER_FRAME as u64;
        if frames > Msf::MAX.to_frames() as u64 {
            return Self::MAX;
        }
        Self::from(Msf::from_frames(frames as u32)).with_samples((total % SAMPLES_PER_FRAME as u64) as u16)
    }

    /// Linear sample count of this position
    pub fn to_samples(&self) -> u64 {
        self.msf().to_frames() as u64 * SAMPLES_PER_FRAME as u64 + self.samples as u64
    }

    /// Subtraction that reports an underflow instead of saturating
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        let mut samples = self.samples as i32 - rhs.samples as i32;
        let mut borrow = 0;
        while samples < 0 {
            samples += SAMPLES_PER_FRAME as i32;
            borrow += 1;
        }

        let msf = self.msf().borrowing_sub(rhs.msf(), borrow)?;
        Some(Self::from(msf).with_samples(samples as u16))
    }

    /// Move back by a raw sample count, saturating at zero
    pub fn sub_samples(self, count: usize) -> Self {
        self.checked_sub(Self::from_sample_count(count)).unwrap_or(Self::ZERO)
    }

    /// Split a raw sample count into whole frames plus a remainder
    fn from_sample_count(count: usize) -> Self {
        let frames = count / SAMPLES_PER_FRAME as usize;
        let remainder = (count % SAMPLES_PER_FRAME as usize) as u16;
        Self::from(Msf::from_frames(u32::try_from(frames).unwrap_or(u32::MAX))).with_samples(remainder)
    }

    fn with_samples(mut self, samples: u16) -> Self {
        self.samples = samples;
        self
    }
}

impl From<Msf> for Msfs {
    fn from(msf: Msf) -> Self {
        Self {
            minute: msf.minute,
            second: msf.second,
            frame: msf.frame,
            samples: 0,
        }
    }
}

impl Add for Msfs {
    type Output = Msfs;

    fn add(self, rhs: Msfs) -> Msfs {
        let samples = self.samples as u32 + rhs.samples as u32;
        let carry = samples / SAMPLES_PER_FRAME as u32;
        match self.msf().carrying_add(rhs.msf(), carry) {
            (_, true) => Msfs::MAX,
            (msf, false) => Msfs::from(msf).with_samples((samples % SAMPLES_PER_FRAME as u32) as u16),
        }
    }
}

/// Advance by a raw sample count
impl Add<usize> for Msfs {
    type Output = Msfs;

    fn add(self, count: usize) -> Msfs {
        self + Msfs::from_sample_count(count)
    }
}

impl Sub for Msfs {
    type Output = Msfs;

    fn sub(self, rhs: Msfs) -> Msfs {
        self.checked_sub(rhs).unwrap_or(Msfs::ZERO)
    }
}

impl AddAssign for Msfs {
    fn add_assign(&mut self, rhs: Msfs) {
        *self = *self + rhs;
    }
}

impl AddAssign<usize> for Msfs {
    fn add_assign(&mut self, count: usize) {
        *self = *self + count;
    }
}

impl SubAssign for Msfs {
    fn sub_assign(&mut self, rhs: Msfs) {
        *self = *self - rhs;
    }
}

impl fmt::Display for Msfs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.msf(), self.samples)
    }
}
