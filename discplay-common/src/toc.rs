//! Disc table of contents
//!
//! Built once per inserted disc and never modified afterwards. Durations are
//! derived from neighbouring start positions; the final track needs the
//! lead-out position, which some drives fail to report.

use crate::msf::Msf;
use serde::{Deserialize, Serialize};

/// One track listed in the table of contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// Track number as recorded on the disc (usually 1-based)
    pub track_number: u8,

    /// Physical start position
    pub start: Msf,

    /// Track length; [`Msf::ZERO`] when unknown (final track without lead-out)
    pub duration: Msf,
}

impl TocEntry {
    /// True when the duration could not be determined
    pub fn duration_unknown(&self) -> bool {
        self.duration == Msf::ZERO
    }

    /// Physical position one frame past the end of the track
    pub fn end(&self) -> Option<Msf> {
        (!self.duration_unknown()).then(|| self.start + self.duration)
    }
}

/// Table of contents of an audio disc
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscToc {
    /// First track number on the disc
    pub first_track: u8,

    /// Last track number on the disc
    pub last_track: u8,

    /// Entries ordered by track number
    pub entries: Vec<TocEntry>,
}

impl DiscToc {
    /// Build a table of contents from track start positions.
    ///
    /// `starts` holds `(track_number, start)` pairs in disc order. Each
    /// non-final duration is the distance to the next start; the final track
    /// is measured against `leadout`, or left unknown when it is `None`.
    pub fn from_starts(first_track: u8, last_track: u8, starts: &[(u8, Msf)], leadout: Option<Msf>) -> Self {
        let mut entries: Vec<TocEntry> = Vec::with_capacity(starts.len());

        for &(track_number, start) in starts {
            if let Some(previous) = entries.last_mut() {
                previous.duration = start - previous.start;
            }
            entries.push(TocEntry {
                track_number,
                start,
                duration: Msf::ZERO,
            });
        }

        if let (Some(last), Some(leadout)) = (entries.last_mut(), leadout) {
            last.duration = leadout - last.start;
        }

        Self {
            first_track,
            last_track,
            entries,
        }
    }

    /// Number of tracks
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the disc lists no tracks
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by its track number
    pub fn track(&self, track_number: u8) -> Option<&TocEntry> {
        self.entries.iter().find(|e| e.track_number == track_number)
    }
}
