//! Cue/BIN disc image tests
//!
//! Images are written to a temp directory: 20 sectors where every sample
//! holds (sector number, sample number within the sector).

mod helpers;

use discplay_ap::disc::image::ImageDisc;
use discplay_ap::disc::{DiscDevice, DiscError, DiscType, DriveStatus, FRAME_BYTES};
use discplay_ap::playback::{PlaybackState, Player};
use discplay_common::config::ReaderMode;
use discplay_common::Msf;
use helpers::{test_settings, MockSink, FRAME};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const SECTORS: usize = 20;

const TWO_TRACKS: &str = r#"REM COMMENT "test image"
FILE "disc.bin" BINARY
  TRACK 01 AUDIO
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    INDEX 00 00:00:08
    INDEX 01 00:00:10
"#;

fn write_image(cue: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();

    let mut bin = Vec::with_capacity(SECTORS * FRAME_BYTES);
    for sector in 0..SECTORS {
        for sample in 0..FRAME {
            bin.extend_from_slice(&(sector as i16).to_le_bytes());
            bin.extend_from_slice(&(sample as i16).to_le_bytes());
        }
    }
    std::fs::write(dir.path().join("disc.bin"), bin).unwrap();

    let cue_path = dir.path().join("disc.cue");
    std::fs::write(&cue_path, cue).unwrap();
    (dir, cue_path)
}

#[test]
fn test_toc_is_offset_by_lead_in() {
    let (_dir, cue) = write_image(TWO_TRACKS);
    let disc = ImageDisc::open(&cue).unwrap();

    let toc = disc.read_table_of_contents().unwrap();
    assert_eq!(toc.first_track, 1);
    assert_eq!(toc.last_track, 2);
    assert_eq!(toc.entries[0].start, Msf::new(0, 2, 0));
    assert_eq!(toc.entries[0].duration, Msf::new(0, 0, 10));
    assert_eq!(toc.entries[1].start, Msf::new(0, 2, 10));
    assert_eq!(toc.entries[1].duration, Msf::new(0, 0, 10));
    assert_eq!(disc.disc_type(), DiscType::Audio);
    assert_eq!(disc.bin_path(), cue.with_file_name("disc.bin"));
}

#[test]
fn test_read_frame_returns_sector_data_and_position() {
    let (_dir, cue) = write_image(TWO_TRACKS);
    let disc = ImageDisc::open(&cue).unwrap();

    let frame = disc.read_frame(Msf::new(0, 2, 12)).unwrap();
    let samples = frame.samples();
    assert_eq!(samples[0].left, 12);
    assert_eq!(samples[587].right, 587);
    assert_eq!(frame.track_number, 2);
    assert_eq!(frame.index_number, 1);
    assert_eq!(frame.absolute, Msf::new(0, 2, 12));
    assert_eq!(frame.relative, Msf::new(0, 0, 2));

    let pregap = disc.read_frame(Msf::new(0, 2, 9)).unwrap();
    assert_eq!(pregap.track_number, 2);
    assert_eq!(pregap.index_number, 0);
}

#[test]
fn test_read_outside_image_is_out_of_range() {
    let (_dir, cue) = write_image(TWO_TRACKS);
    let disc = ImageDisc::open(&cue).unwrap();

    assert!(matches!(
        disc.read_frame(Msf::new(0, 1, 74)),
        Err(DiscError::OutOfRange(_))
    ));
    assert!(matches!(
        disc.read_frame(Msf::new(0, 2, 20)),
        Err(DiscError::OutOfRange(_))
    ));
    assert!(disc.read_frame(Msf::new(0, 2, 19)).is_ok());
}

#[test]
fn test_tray_and_spin_control() {
    let (_dir, cue) = write_image(TWO_TRACKS);
    let disc = ImageDisc::open(&cue).unwrap();

    disc.start().unwrap();
    assert!(disc.is_spinning());
    disc.stop().unwrap();
    assert!(!disc.is_spinning());

    disc.eject().unwrap();
    assert!(!disc.is_ready());
    assert_eq!(disc.drive_status().unwrap(), DriveStatus::TrayOpen);
    assert!(matches!(disc.read_frame(Msf::new(0, 2, 0)), Err(DiscError::TrayOpen)));
    assert!(matches!(disc.read_table_of_contents(), Err(DiscError::TrayOpen)));

    disc.close_tray().unwrap();
    assert_eq!(disc.drive_status().unwrap(), DriveStatus::DiscOk);
    assert!(disc.read_frame(Msf::new(0, 2, 0)).is_ok());
}

#[test]
fn test_mixed_and_data_only_images() {
    let (_dir, cue) = write_image(
        "FILE \"disc.bin\" BINARY\nTRACK 01 MODE1/2352\nINDEX 01 00:00:00\nTRACK 02 AUDIO\nINDEX 01 00:00:10\n",
    );
    assert_eq!(ImageDisc::open(&cue).unwrap().disc_type(), DiscType::Mixed);

    let (_dir, cue) = write_image("FILE \"disc.bin\" BINARY\nTRACK 01 MODE2/2352\nINDEX 01 00:00:00\n");
    assert_eq!(ImageDisc::open(&cue).unwrap().disc_type(), DiscType::Unsupported);
}

#[test]
fn test_missing_bin_is_io_error() {
    let dir = TempDir::new().unwrap();
    let cue = dir.path().join("lonely.cue");
    std::fs::write(&cue, TWO_TRACKS).unwrap();

    assert!(matches!(ImageDisc::open(&cue), Err(DiscError::Io(_))));
}

#[test]
fn test_player_plays_whole_image() {
    let (_dir, cue) = write_image(TWO_TRACKS);
    let disc = Arc::new(ImageDisc::open(&cue).unwrap());
    let toc = disc.read_table_of_contents().unwrap();

    let (sink, handle) = MockSink::new();
    let mut player = Player::new(Box::new(sink), test_settings(ReaderMode::Inline));
    player.enqueue_disc(disc, &toc);
    player.play();

    let mut spins = 0;
    while player.state() == PlaybackState::Playing {
        player.tick();
        handle.play(FRAME);
        spins += 1;
        assert!(spins < 1_000);
    }

    assert_eq!(player.state(), PlaybackState::Stopped);
    let played = handle.played();
    assert_eq!(played.len(), SECTORS * FRAME);
    for (sector, frame) in played.chunks(FRAME).enumerate() {
        assert_eq!(frame[0].left, sector as i16);
        assert_eq!(frame[FRAME - 1].right, (FRAME - 1) as i16);
    }
}
