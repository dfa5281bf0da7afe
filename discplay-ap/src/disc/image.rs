//! Disc image device (cue sheet + raw BIN)
//!
//! Lets the player run without an optical drive. The BIN file holds raw
//! 2352-byte sectors starting at logical block 0; the cue sheet lists where
//! each track begins. Positions handed out through the table of contents are
//! physical, i.e. shifted by the 2 second lead-in, exactly as a drive reports
//! them.

use super::{DiscDevice, DiscError, DiscType, DriveStatus, RawFrame, FRAME_BYTES};
use crate::lock;
use discplay_common::msf::LEAD_IN_FRAMES;
use discplay_common::{DiscToc, Msf};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};

/// Track data layout declared by a `TRACK` line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueTrackType {
    Audio,
    /// Any data mode (MODE1/2352, MODE2/2352, ...)
    Data,
}

/// One `TRACK` block of a cue sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueTrack {
    pub number: u8,
    pub track_type: CueTrackType,
    /// `INDEX 00`, start of the pregap when present
    pub pregap: Option<Msf>,
    /// `INDEX 01`, position relative to the start of the BIN file
    pub start: Msf,
}

/// Parsed cue sheet restricted to a single BINARY file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueSheet {
    pub file: String,
    pub tracks: Vec<CueTrack>,
}

/// Parse cue sheet text.
///
/// Supports `FILE "..." BINARY`, `TRACK nn <type>`, `INDEX 00|01 MM:SS:FF`;
/// `REM`, `TITLE`, `PERFORMER` and other metadata lines are ignored.
pub fn parse_cue(text: &str) -> Result<CueSheet, DiscError> {
    let mut file: Option<String> = None;
    let mut tracks: Vec<CueTrack> = Vec::new();
    let mut current: Option<(u8, CueTrackType, Option<Msf>, Option<Msf>)> = None;

    let finish = |current: Option<(u8, CueTrackType, Option<Msf>, Option<Msf>)>,
                  tracks: &mut Vec<CueTrack>|
     -> Result<(), DiscError> {
        if let Some((number, track_type, pregap, start)) = current {
            let start = start.ok_or_else(|| DiscError::Cue(format!("Track {} has no INDEX 01", number)))?;
            tracks.push(CueTrack {
                number,
                track_type,
                pregap,
                start,
            });
        }
        Ok(())
    };

    for (line_number, line) in text.lines().enumerate() {
        let line = line.trim();
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(keyword) = parts.first() else {
            continue;
        };
        let malformed = || DiscError::Cue(format!("Malformed line {}: {}", line_number + 1, line));

        match *keyword {
            "FILE" => {
                if file.is_some() {
                    return Err(DiscError::Cue("Only single-file cue sheets are supported".to_string()));
                }
                let (open, close) = (line.find('"'), line.rfind('"'));
                let name = match (open, close) {
                    (Some(open), Some(close)) if open < close => &line[open + 1..close],
                    _ => parts.get(1).copied().ok_or_else(malformed)?,
                };
                match parts.last() {
                    Some(&"BINARY") => {}
                    Some(other) => return Err(DiscError::Cue(format!("Unsupported file type: {}", other))),
                    None => return Err(malformed()),
                }
                file = Some(name.to_string());
            }
            "TRACK" => {
                finish(current.take(), &mut tracks)?;
                let number = parts
                    .get(1)
                    .and_then(|n| n.parse::<u8>().ok())
                    .ok_or_else(malformed)?;
                let track_type = match parts.get(2) {
                    Some(&"AUDIO") => CueTrackType::Audio,
                    Some(mode) if mode.starts_with("MODE") || mode.starts_with("CDI") => CueTrackType::Data,
                    _ => return Err(malformed()),
                };
                current = Some((number, track_type, None, None));
            }
            "INDEX" => {
                let Some(track) = current.as_mut() else {
                    return Err(DiscError::Cue(format!("INDEX outside of TRACK on line {}", line_number + 1)));
                };
                let index = parts
                    .get(1)
                    .and_then(|n| n.parse::<u8>().ok())
                    .ok_or_else(malformed)?;
                let position: Msf = parts
                    .get(2)
                    .ok_or_else(malformed)?
                    .parse()
                    .map_err(|e| DiscError::Cue(format!("Line {}: {}", line_number + 1, e)))?;
                match index {
                    0 => track.2 = Some(position),
                    1 => track.3 = Some(position),
                    _ => {}
                }
            }
            _ => {}
        }
    }
    finish(current, &mut tracks)?;

    let file = file.ok_or_else(|| DiscError::Cue("No FILE entry".to_string()))?;
    if tracks.is_empty() {
        return Err(DiscError::Cue("No tracks".to_string()));
    }
    Ok(CueSheet { file, tracks })
}

/// Disc device reading frames from a BIN image
pub struct ImageDisc {
    bin_path: PathBuf,
    sheet: CueSheet,
    sectors: u32,
    file: Mutex<BufReader<File>>,
    tray_open: AtomicBool,
    spinning: AtomicBool,
}

impl ImageDisc {
    /// Open the cue sheet and the BIN file it names (relative to the cue)
    pub fn open(cue_path: impl AsRef<Path>) -> Result<Self, DiscError> {
        let cue_path = cue_path.as_ref();
        let sheet = parse_cue(&std::fs::read_to_string(cue_path)?)?;

        let bin_path = cue_path
            .parent()
            .map(|dir| dir.join(&sheet.file))
            .unwrap_or_else(|| PathBuf::from(&sheet.file));
        let file = File::open(&bin_path)?;
        let sectors = u32::try_from(file.metadata()?.len() / FRAME_BYTES as u64)
            .map_err(|_| DiscError::Cue(format!("{} is too large", bin_path.display())))?;

        info!(
            "Opened disc image {} ({} tracks, {} sectors)",
            bin_path.display(),
            sheet.tracks.len(),
            sectors
        );

        Ok(Self {
            bin_path,
            sheet,
            sectors,
            file: Mutex::new(BufReader::new(file)),
            tray_open: AtomicBool::new(false),
            spinning: AtomicBool::new(false),
        })
    }

    pub fn bin_path(&self) -> &Path {
        &self.bin_path
    }

    pub fn cue_sheet(&self) -> &CueSheet {
        &self.sheet
    }

    /// Whether the last start/stop left the (virtual) drive spinning
    pub fn is_spinning(&self) -> bool {
        self.spinning.load(Ordering::Relaxed)
    }

    fn physical(position: Msf) -> Msf {
        position.add_frames(LEAD_IN_FRAMES)
    }

    fn leadout(&self) -> Msf {
        Msf::from_lba(self.sectors)
    }

    /// Track containing a physical position, with its index number
    fn locate(&self, position: Msf) -> Option<(&CueTrack, u8)> {
        self.sheet.tracks.iter().rev().find_map(|track| {
            if position >= Self::physical(track.start) {
                Some((track, 1))
            } else {
                match track.pregap {
                    Some(pregap) if position >= Self::physical(pregap) => Some((track, 0)),
                    _ => None,
                }
            }
        })
    }
}

impl DiscDevice for ImageDisc {
    fn is_ready(&self) -> bool {
        !self.tray_open.load(Ordering::Relaxed)
    }

    fn read_table_of_contents(&self) -> Result<DiscToc, DiscError> {
        if !self.is_ready() {
            return Err(DiscError::TrayOpen);
        }

        let starts: Vec<(u8, Msf)> = self
            .sheet
            .tracks
            .iter()
            .map(|t| (t.number, Self::physical(t.start)))
            .collect();
        let first = starts.first().map(|s| s.0).unwrap_or(1);
        let last = starts.last().map(|s| s.0).unwrap_or(1);

        Ok(DiscToc::from_starts(first, last, &starts, Some(self.leadout())))
    }

    fn read_frame(&self, position: Msf) -> Result<RawFrame, DiscError> {
        if !self.is_ready() {
            return Err(DiscError::TrayOpen);
        }
        if position.to_frames() < LEAD_IN_FRAMES || position.to_lba() >= self.sectors {
            return Err(DiscError::OutOfRange(position));
        }

        let mut data = [0u8; FRAME_BYTES];
        {
            let mut file = lock(&self.file);
            file.seek(SeekFrom::Start(position.to_lba() as u64 * FRAME_BYTES as u64))?;
            file.read_exact(&mut data)?;
        }

        let (track_number, index_number, relative) = match self.locate(position) {
            Some((track, index)) => (track.number, index, position - Self::physical(track.start)),
            None => (0, 0, Msf::ZERO),
        };

        Ok(RawFrame {
            data,
            track_number,
            index_number,
            absolute: position,
            relative,
        })
    }

    fn start(&self) -> Result<(), DiscError> {
        debug!("Image disc spin up");
        self.spinning.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&self) -> Result<(), DiscError> {
        debug!("Image disc spin down");
        self.spinning.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn eject(&self) -> Result<(), DiscError> {
        info!("Image disc ejected");
        self.tray_open.store(true, Ordering::Relaxed);
        self.spinning.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn close_tray(&self) -> Result<(), DiscError> {
        info!("Image disc tray closed");
        self.tray_open.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn drive_status(&self) -> Result<DriveStatus, DiscError> {
        if self.tray_open.load(Ordering::Relaxed) {
            Ok(DriveStatus::TrayOpen)
        } else {
            Ok(DriveStatus::DiscOk)
        }
    }

    fn disc_type(&self) -> DiscType {
        let audio = self.sheet.tracks.iter().filter(|t| t.track_type == CueTrackType::Audio).count();
        match audio {
            0 => DiscType::Unsupported,
            n if n == self.sheet.tracks.len() => DiscType::Audio,
            _ => DiscType::Mixed,
        }
    }
}
