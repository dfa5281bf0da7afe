//! Per-track read head
//!
//! Turns the frames of one track into a flat stream of samples. Positions are
//! kept relative to the track start with sample granularity; the frame cache
//! is keyed by the relative frame position.
//!
//! Cloning a cursor is cheap: the clone shares the disc device and the frame
//! cache, so a clone can warm the cache while the original stays put.

use crate::audio::Sample;
use crate::disc::{DiscDevice, DiscError, FrameSamples};
use crate::playback::frame_cache::FrameCache;
use discplay_common::msf::SAMPLES_PER_FRAME;
use discplay_common::{Msf, Msfs, TocEntry};
use std::sync::Arc;
use tracing::{debug, trace};

const FRAME_SAMPLES: usize = SAMPLES_PER_FRAME as usize;

#[derive(Clone)]
pub struct TrackCursor {
    device: Arc<dyn DiscDevice>,
    entry: TocEntry,
    cache: Arc<FrameCache>,
    position: Msfs,
}

impl TrackCursor {
    /// Cursor at the start of `entry` with its own cache of `cache_frames` frames
    pub fn new(device: Arc<dyn DiscDevice>, entry: TocEntry, cache_frames: usize) -> Self {
        Self::with_cache(device, entry, Arc::new(FrameCache::new(cache_frames)))
    }

    pub fn with_cache(device: Arc<dyn DiscDevice>, entry: TocEntry, cache: Arc<FrameCache>) -> Self {
        debug!(
            "Track cursor for track {} (start {}, length {})",
            entry.track_number, entry.start, entry.duration
        );
        Self {
            device,
            entry,
            cache,
            position: Msfs::ZERO,
        }
    }

    /// Read exactly `count` samples and advance past them.
    ///
    /// On a disc error nothing is returned; the cursor keeps whatever progress
    /// it made before the failing frame.
    pub fn pop_samples(&mut self, count: usize) -> Result<Vec<Sample>, DiscError> {
        let mut samples = Vec::with_capacity(count);

        while samples.len() < count {
            let offset = self.position.samples as usize;
            let take = (FRAME_SAMPLES - offset).min(count - samples.len());

            let frame = self.position.msf();
            let data = match self.cache.read(frame) {
                Some(data) => data,
                None => {
                    let data = self.read_frame(frame)?;
                    self.cache.add(frame, data);
                    self.cache.read(frame).unwrap_or(data)
                }
            };

            samples.extend_from_slice(&data[offset..offset + take]);
            self.position += take;
        }

        Ok(samples)
    }

    /// Warm the cache with the frames covering the next `count` samples.
    ///
    /// Stops quietly at the first read failure or at the end of the track;
    /// the cursor does not move.
    pub fn prefetch(&self, count: usize) {
        let span = self.position.samples as usize + count;
        let frames = span.div_ceil(FRAME_SAMPLES);
        let limit = self.length_frames();

        let mut frame = self.position.msf();
        for _ in 0..frames {
            if limit.is_some_and(|limit| frame.to_frames() >= limit) {
                break;
            }
            if !self.cache.has(frame) {
                match self.read_frame(frame) {
                    Ok(data) => self.cache.add(frame, data),
                    Err(e) => {
                        debug!("Prefetch of track {} stopped at {}: {}", self.entry.track_number, frame, e);
                        break;
                    }
                }
            }
            frame = frame.add_frames(1);
        }
    }

    /// Back to the start of the track
    pub fn reset(&mut self) {
        self.position = Msfs::ZERO;
    }

    /// Read position relative to the track start
    pub fn current_location(&self) -> Msfs {
        self.position
    }

    pub fn track_name(&self) -> String {
        format!("CD Track {:02}", self.entry.track_number)
    }

    pub fn entry(&self) -> &TocEntry {
        &self.entry
    }

    pub fn cache(&self) -> &Arc<FrameCache> {
        &self.cache
    }

    /// Track length in samples, `None` when the duration is unknown
    pub fn length_samples(&self) -> Option<usize> {
        self.length_frames().map(|frames| frames as usize * FRAME_SAMPLES)
    }

    /// Samples left before the end of the track
    pub fn remaining_samples(&self) -> Option<usize> {
        self.length_samples()
            .map(|length| length.saturating_sub(self.position.to_samples() as usize))
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_samples() == Some(0)
    }

    fn length_frames(&self) -> Option<u32> {
        (!self.entry.duration_unknown()).then(|| self.entry.duration.to_frames())
    }

    fn read_frame(&self, frame: Msf) -> Result<FrameSamples, DiscError> {
        let address = self.entry.start + frame;
        trace!("Reading frame {} of track {} at {}", frame, self.entry.track_number, address);
        Ok(self.device.read_frame(address)?.samples())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disc::{DiscType, DriveStatus, RawFrame, FRAME_BYTES};
    use discplay_common::DiscToc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Each sample's left channel holds the low 16 bits of its absolute sample index
    struct CountingDisc {
        reads: AtomicUsize,
        fail_from: Option<Msf>,
    }

    impl CountingDisc {
        fn new(fail_from: Option<Msf>) -> Arc<Self> {
            Arc::new(Self {
                reads: AtomicUsize::new(0),
                fail_from,
            })
        }
    }

    impl DiscDevice for CountingDisc {
        fn is_ready(&self) -> bool {
            true
        }
        fn read_table_of_contents(&self) -> Result<DiscToc, DiscError> {
            Err(DiscError::NotReady)
        }
        fn read_frame(&self, position: Msf) -> Result<RawFrame, DiscError> {
            if self.fail_from.is_some_and(|f| position >= f) {
                return Err(DiscError::Device {
                    code: 5,
                    message: "read error".to_string(),
                });
            }
            self.reads.fetch_add(1, Ordering::SeqCst);
            let mut data = [0u8; FRAME_BYTES];
            let base = position.to_frames() as usize * FRAME_SAMPLES;
            for (i, chunk) in data.chunks_exact_mut(4).enumerate() {
                chunk[0..2].copy_from_slice(&((base + i) as i16).to_le_bytes());
            }
            Ok(RawFrame {
                data,
                track_number: 1,
                index_number: 1,
                absolute: position,
                relative: Msf::ZERO,
            })
        }
        fn start(&self) -> Result<(), DiscError> {
            Ok(())
        }
        fn stop(&self) -> Result<(), DiscError> {
            Ok(())
        }
        fn eject(&self) -> Result<(), DiscError> {
            Ok(())
        }
        fn close_tray(&self) -> Result<(), DiscError> {
            Ok(())
        }
        fn drive_status(&self) -> Result<DriveStatus, DiscError> {
            Ok(DriveStatus::DiscOk)
        }
        fn disc_type(&self) -> DiscType {
            DiscType::Audio
        }
    }

    fn entry(start: Msf, duration: Msf) -> TocEntry {
        TocEntry {
            track_number: 3,
            start,
            duration,
        }
    }

    #[test]
    fn test_pop_crosses_frame_boundary() {
        let disc = CountingDisc::new(None);
        let start = Msf::new(0, 2, 0);
        let mut cursor = TrackCursor::new(disc.clone(), entry(start, Msf::new(0, 10, 0)), 100);

        let first = cursor.pop_samples(500).unwrap();
        let second = cursor.pop_samples(200).unwrap();

        let base = start.to_frames() as usize * FRAME_SAMPLES;
        assert_eq!(first[0].left, base as i16);
        assert_eq!(second[0].left, (base + 500) as i16);
        assert_eq!(second[199].left, (base + 699) as i16);
        assert_eq!(cursor.current_location(), Msfs::new(Msf::new(0, 0, 1), 112));
        assert_eq!(disc.reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_read_keeps_progress() {
        let start = Msf::new(0, 2, 0);
        let disc = CountingDisc::new(Some(start.add_frames(2)));
        let mut cursor = TrackCursor::new(disc, entry(start, Msf::new(0, 10, 0)), 100);

        let result = cursor.pop_samples(FRAME_SAMPLES * 3);
        assert!(matches!(result, Err(DiscError::Device { code: 5, .. })));
        assert_eq!(cursor.current_location(), Msfs::from(Msf::new(0, 0, 2)));
    }

    #[test]
    fn test_prefetch_does_not_move_cursor() {
        let disc = CountingDisc::new(None);
        let mut cursor = TrackCursor::new(disc.clone(), entry(Msf::new(0, 2, 0), Msf::new(0, 10, 0)), 100);

        cursor.prefetch(FRAME_SAMPLES * 4 + 1);
        assert_eq!(disc.reads.load(Ordering::SeqCst), 5);
        assert_eq!(cursor.current_location(), Msfs::ZERO);

        cursor.pop_samples(FRAME_SAMPLES * 5).unwrap();
        assert_eq!(disc.reads.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_prefetch_stops_at_track_end_and_on_error() {
        let disc = CountingDisc::new(None);
        let cursor = TrackCursor::new(disc.clone(), entry(Msf::new(0, 2, 0), Msf::new(0, 0, 3)), 100);
        cursor.prefetch(FRAME_SAMPLES * 10);
        assert_eq!(disc.reads.load(Ordering::SeqCst), 3);

        let failing = CountingDisc::new(Some(Msf::new(0, 2, 1)));
        let cursor = TrackCursor::new(failing.clone(), entry(Msf::new(0, 2, 0), Msf::new(0, 10, 0)), 100);
        cursor.prefetch(FRAME_SAMPLES * 10);
        assert_eq!(failing.reads.load(Ordering::SeqCst), 1);
        assert_eq!(cursor.cache().len(), 1);
    }

    #[test]
    fn test_remaining_and_name() {
        let disc = CountingDisc::new(None);
        let mut cursor = TrackCursor::new(disc, entry(Msf::new(0, 2, 0), Msf::new(0, 0, 2)), 100);

        assert_eq!(cursor.track_name(), "CD Track 03");
        assert_eq!(cursor.length_samples(), Some(FRAME_SAMPLES * 2));

        cursor.pop_samples(FRAME_SAMPLES * 2).unwrap();
        assert!(cursor.is_exhausted());

        cursor.reset();
        assert_eq!(cursor.remaining_samples(), Some(FRAME_SAMPLES * 2));
    }

    #[test]
    fn test_unknown_length() {
        let disc = CountingDisc::new(None);
        let cursor = TrackCursor::new(disc, entry(Msf::new(0, 2, 0), Msf::ZERO), 100);
        assert_eq!(cursor.length_samples(), None);
        assert!(!cursor.is_exhausted());
    }
}
