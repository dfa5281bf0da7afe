//! In-memory disc device
//!
//! Every sample carries its absolute sample index on the disc (low 16 bits in
//! the left channel, high 16 bits in the right), so tests can check that
//! audio arrives in order and without gaps.

use discplay_ap::audio::Sample;
use discplay_ap::disc::{DiscDevice, DiscError, DiscType, DriveStatus, RawFrame, FRAME_BYTES};
use discplay_common::{DiscToc, Msf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::FRAME;

/// Absolute sample index encoded in a sample produced by [`MockDisc`]
pub fn sample_index(sample: Sample) -> u32 {
    (sample.left as u16 as u32) | ((sample.right as u16 as u32) << 16)
}

pub struct MockDisc {
    starts: Vec<(u8, Msf)>,
    leadout: Option<Msf>,
    reads: AtomicUsize,
    fail_from: Mutex<Option<Msf>>,
    read_delay: Mutex<Duration>,
    tray_open: AtomicBool,
}

impl MockDisc {
    /// Disc with tracks starting at `starts` and ending at `leadout`
    pub fn new(starts: &[(u8, Msf)], leadout: Option<Msf>) -> Self {
        Self {
            starts: starts.to_vec(),
            leadout,
            reads: AtomicUsize::new(0),
            fail_from: Mutex::new(None),
            read_delay: Mutex::new(Duration::ZERO),
            tray_open: AtomicBool::new(false),
        }
    }

    /// Two tracks at 00:02:00 and 00:30:00, lead-out at 01:00:00
    pub fn two_tracks() -> Self {
        Self::new(
            &[(1, Msf::new(0, 2, 0)), (2, Msf::new(0, 30, 0))],
            Some(Msf::new(1, 0, 0)),
        )
    }

    pub fn toc(&self) -> DiscToc {
        let first = self.starts.first().map(|s| s.0).unwrap_or(1);
        let last = self.starts.last().map(|s| s.0).unwrap_or(1);
        DiscToc::from_starts(first, last, &self.starts, self.leadout)
    }

    /// Frames read so far
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Make every read at or past `position` fail (None = never fail)
    pub fn fail_from(&self, position: Option<Msf>) {
        *self.fail_from.lock().unwrap() = position;
    }

    /// Slow every read down, like a real drive
    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = delay;
    }
}

impl DiscDevice for MockDisc {
    fn is_ready(&self) -> bool {
        !self.tray_open.load(Ordering::SeqCst)
    }

    fn read_table_of_contents(&self) -> Result<DiscToc, DiscError> {
        Ok(self.toc())
    }

    fn read_frame(&self, position: Msf) -> Result<RawFrame, DiscError> {
        let delay = *self.read_delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if self.tray_open.load(Ordering::SeqCst) {
            return Err(DiscError::TrayOpen);
        }
        if self.fail_from.lock().unwrap().is_some_and(|f| position >= f) {
            return Err(DiscError::Device {
                code: 5,
                message: format!("Input/output error at {}", position),
            });
        }

        self.reads.fetch_add(1, Ordering::SeqCst);

        let mut data = [0u8; FRAME_BYTES];
        let base = position.to_frames() * FRAME as u32;
        for (i, chunk) in data.chunks_exact_mut(4).enumerate() {
            let index = base + i as u32;
            chunk[0..2].copy_from_slice(&(index as u16).to_le_bytes());
            chunk[2..4].copy_from_slice(&((index >> 16) as u16).to_le_bytes());
        }

        let track = self.starts.iter().rev().find(|(_, start)| position >= *start);
        Ok(RawFrame {
            data,
            track_number: track.map(|t| t.0).unwrap_or(0),
            index_number: 1,
            absolute: position,
            relative: track.map(|t| position - t.1).unwrap_or(Msf::ZERO),
        })
    }

    fn start(&self) -> Result<(), DiscError> {
        Ok(())
    }

    fn stop(&self) -> Result<(), DiscError> {
        Ok(())
    }

    fn eject(&self) -> Result<(), DiscError> {
        self.tray_open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close_tray(&self) -> Result<(), DiscError> {
        self.tray_open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn drive_status(&self) -> Result<DriveStatus, DiscError> {
        Ok(if self.tray_open.load(Ordering::SeqCst) {
            DriveStatus::TrayOpen
        } else {
            DriveStatus::DiscOk
        })
    }

    fn disc_type(&self) -> DiscType {
        DiscType::Audio
    }
}
