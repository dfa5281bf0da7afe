//! Background disc reader
//!
//! Keeps the sample ring between the low and high watermarks. The drive step
//! sets the `filling` flag and signals the condition variable when the ring
//! runs low; the reader then pulls one quantum per burst, pausing between
//! bursts so the drive is not kept spinning for nothing, until the high
//! watermark is reached.
//!
//! Disc reads are slow. A burst therefore warms the cache through a clone of
//! the reading cursor with no player lock held, and only then takes the
//! playlist lock to pop the (now cached) samples from the real cursor. If a
//! transport command cleared the ring while the clone was reading, the burst
//! is dropped.

use super::player::Shared;
use crate::disc::DiscError;
use crate::lock;
use std::sync::{Arc, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, trace};

/// Outcome of one refill burst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fill {
    /// Samples appended to the ring
    Pushed(usize),
    /// A transport command invalidated the burst
    Stale,
    /// The last track has nothing left (or the playlist is empty)
    Exhausted,
}

/// Refill the ring from the reading track with the cache-warming protocol.
///
/// A read failure puts the player into the error state before returning.
pub(crate) fn fill_burst(shared: &Shared) -> Result<Fill, DiscError> {
    let (warmer, generation, quantum) = {
        let mut playlist = lock(&shared.playlist);
        let Some(cursor) = playlist.reading_mut() else {
            return Ok(Fill::Exhausted);
        };
        let quantum = cursor
            .remaining_samples()
            .map_or(shared.settings.fill_quantum, |left| left.min(shared.settings.fill_quantum));
        (cursor.clone(), shared.ring.generation(), quantum)
    };
    if quantum == 0 {
        return Ok(Fill::Exhausted);
    }

    warmer.prefetch(quantum);

    let mut playlist = lock(&shared.playlist);
    if shared.ring.generation() != generation {
        return Ok(Fill::Stale);
    }
    let Some(cursor) = playlist.reading_mut() else {
        return Ok(Fill::Exhausted);
    };
    let samples = cursor.pop_samples(quantum).inspect_err(|e| {
        // Playlist lock still held: no transport command can interleave
        shared.fail(format!("Error reading samples from disc: {}", e));
    })?;
    if !shared.ring.push_if_current(generation, &samples) {
        return Ok(Fill::Stale);
    }
    Ok(Fill::Pushed(samples.len()))
}

/// Refill the ring directly under the playlist lock (no background thread)
pub(crate) fn fill_inline(shared: &Shared) -> Result<Fill, DiscError> {
    let mut playlist = lock(&shared.playlist);
    let Some(cursor) = playlist.reading_mut() else {
        return Ok(Fill::Exhausted);
    };
    let quantum = cursor
        .remaining_samples()
        .map_or(shared.settings.fill_quantum, |left| left.min(shared.settings.fill_quantum));
    if quantum == 0 {
        return Ok(Fill::Exhausted);
    }
    let samples = cursor
        .pop_samples(quantum)
        .inspect_err(|e| shared.fail(format!("Error reading samples from disc: {}", e)))?;
    shared.ring.push(&samples);
    Ok(Fill::Pushed(samples.len()))
}

/// Handle to the reader thread; dropping it stops and joins the thread
pub struct DiscReader {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl DiscReader {
    pub(crate) fn spawn(shared: Arc<Shared>) -> std::io::Result<Self> {
        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("disc-reader".to_string())
            .spawn(move || Self::worker_loop(worker_shared))?;

        debug!("Disc reader thread started");
        Ok(Self {
            shared,
            thread: Some(handle),
        })
    }

    /// Signal the worker that the ring wants samples
    pub fn wake(&self) {
        self.shared.wake.notify_all();
    }

    fn worker_loop(shared: Arc<Shared>) {
        let throttle = Duration::from_millis(shared.settings.reader_throttle_ms);

        loop {
            {
                let mut control = lock(&shared.control);
                while !control.shutdown && !(control.filling && control.state.is_active()) {
                    control = shared.wake.wait(control).unwrap_or_else(PoisonError::into_inner);
                }
                if control.shutdown {
                    break;
                }
            }

            if shared.ring.size() >= shared.settings.high_watermark {
                trace!("Sample ring above high watermark, reader idle");
                shared.set_filling(false);
                continue;
            }

            match fill_burst(&shared) {
                Ok(Fill::Pushed(count)) => trace!("Reader pushed {} samples (ring: {})", count, shared.ring.size()),
                Ok(Fill::Stale) => trace!("Reader burst dropped after transport change"),
                Ok(Fill::Exhausted) => {
                    trace!("Current track fully read");
                    shared.set_filling(false);
                    continue;
                }
                Err(e) => {
                    debug!("Reader parked after read failure: {}", e);
                    continue;
                }
            }

            let control = lock(&shared.control);
            let (control, _) = shared
                .wake
                .wait_timeout_while(control, throttle, |c| !c.shutdown)
                .unwrap_or_else(PoisonError::into_inner);
            if control.shutdown {
                break;
            }
        }

        debug!("Disc reader thread exiting");
    }
}

impl Drop for DiscReader {
    fn drop(&mut self) {
        lock(&self.shared.control).shutdown = true;
        self.shared.wake.notify_all();
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("Disc reader thread panicked");
            }
        }
    }
}
