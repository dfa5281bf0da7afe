//! Blocking drive loop: end of disc, failures and prompt interruption

mod helpers;

use discplay_ap::disc::DiscDevice;
use discplay_ap::playback::{drive, DriveEnd, PlaybackState, Player};
use discplay_common::config::ReaderMode;
use discplay_common::Msf;
use helpers::{test_settings, MockDisc, MockSink, MockSinkHandle, FRAME};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn ten_frame_tracks() -> Arc<MockDisc> {
    Arc::new(MockDisc::new(
        &[(1, Msf::new(0, 2, 0)), (2, Msf::new(0, 2, 10))],
        Some(Msf::new(0, 2, 20)),
    ))
}

fn inline_player(disc: &Arc<MockDisc>) -> (Player, MockSinkHandle) {
    let (sink, handle) = MockSink::new();
    let player = Player::new(Box::new(sink), test_settings(ReaderMode::Inline));
    let device: Arc<dyn DiscDevice> = Arc::clone(disc) as Arc<dyn DiscDevice>;
    player.enqueue_disc(device, &disc.toc());
    (player, handle)
}

#[test]
fn test_drive_runs_to_end_of_disc() {
    let disc = ten_frame_tracks();
    let (mut player, sink) = inline_player(&disc);
    sink.set_drain_per_query(FRAME / 2);
    let stop = AtomicBool::new(false);

    player.play();
    let mut reports = Vec::new();
    let end = drive(&mut player, Duration::ZERO, Duration::ZERO, &stop, |status| {
        reports.push(status.current_track_index)
    });

    assert_eq!(end, DriveEnd::EndOfDisc);
    assert_eq!(player.state(), PlaybackState::Stopped);
    assert_eq!(sink.played().len(), 20 * FRAME);
    assert_eq!(reports.first(), Some(&0));
    assert!(reports.contains(&1));
}

#[test]
fn test_drive_reports_failure_cause() {
    let disc = ten_frame_tracks();
    disc.fail_from(Some(Msf::new(0, 2, 4)));
    let (mut player, sink) = inline_player(&disc);
    sink.set_drain_per_query(FRAME / 2);
    let stop = AtomicBool::new(false);

    player.play();
    let end = drive(&mut player, Duration::ZERO, Duration::from_secs(60), &stop, |_| {});

    match end {
        DriveEnd::Failed(cause) => {
            assert!(cause.starts_with("Error reading samples from disc"), "{}", cause)
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[test]
fn test_stop_flag_interrupts_slow_reads_promptly() {
    let disc = ten_frame_tracks();
    disc.set_read_delay(Duration::from_millis(30));
    let (mut player, sink) = inline_player(&disc);
    sink.set_drain_per_query(FRAME);
    let stop = Arc::new(AtomicBool::new(false));

    player.play();
    let handle = thread::spawn({
        let stop = Arc::clone(&stop);
        move || {
            let tick = Duration::from_millis(1);
            let end = drive(&mut player, tick, Duration::from_secs(60), &stop, |_| {});
            player.stop();
            end
        }
    });

    thread::sleep(Duration::from_millis(100));
    let raised = Instant::now();
    stop.store(true, Ordering::Relaxed);
    let end = handle.join().unwrap();

    assert_eq!(end, DriveEnd::Interrupted);
    // At most one in-flight tick (one slow frame read) after the flag
    assert!(raised.elapsed() < Duration::from_millis(500), "took {:?}", raised.elapsed());
    assert!(disc.reads() < 20);
}
