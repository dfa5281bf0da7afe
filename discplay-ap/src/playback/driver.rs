//! Blocking drive loop
//!
//! Ticks a player at a fixed cadence on the calling thread until the disc
//! ends, playback fails or the stop flag is raised. Inline disc reads happen
//! inside `tick`, so async front ends run this on a blocking thread and keep
//! their own task free for signal handling.

use super::player::Player;
use super::state::{PlaybackState, PlayerStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default cadence of the drive step
pub const TICK_INTERVAL: Duration = Duration::from_millis(20);

/// Why the drive loop returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveEnd {
    /// The stop flag was raised
    Interrupted,
    /// The last track finished playing
    EndOfDisc,
    /// Playback entered the error state with this cause
    Failed(String),
}

/// Drive `player` until it stops, fails or `stop` is set.
///
/// `on_status` receives a status snapshot every `status_interval` (and once
/// right away). The stop flag is checked before every tick, so the loop ends
/// at most one tick after it is raised.
pub fn drive<F>(
    player: &mut Player,
    tick_interval: Duration,
    status_interval: Duration,
    stop: &AtomicBool,
    mut on_status: F,
) -> DriveEnd
where
    F: FnMut(&PlayerStatus),
{
    let mut next_status = Instant::now();

    loop {
        if stop.load(Ordering::Relaxed) {
            debug!("Drive loop interrupted");
            return DriveEnd::Interrupted;
        }

        player.tick();
        match player.state() {
            PlaybackState::Error => {
                return DriveEnd::Failed(player.error_cause().unwrap_or_default());
            }
            PlaybackState::Stopped => {
                info!("End of disc");
                return DriveEnd::EndOfDisc;
            }
            PlaybackState::Playing | PlaybackState::Paused => {}
        }

        if Instant::now() >= next_status {
            on_status(&player.get_status());
            next_status += status_interval;
        }

        if !tick_interval.is_zero() {
            std::thread::sleep(tick_interval);
        }
    }
}
