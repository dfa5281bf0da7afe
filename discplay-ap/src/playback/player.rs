//! Player state machine
//!
//! Owns the playlist (one cursor per enqueued track), the sample ring, the
//! audio sink and, in background mode, the disc reader thread.
//!
//! ```text
//!  Stopped ──play──▶ Playing ◀──play/pause──▶ Paused
//!     ▲                 │                        │
//!     └──────stop───────┴────────────────────────┘
//!  any state ──disc/sink failure──▶ Error ──stop──▶ Stopped
//! ```
//!
//! The caller drives the pipeline by calling [`Player::tick`] at a steady
//! cadence (every 20ms or so). Each tick tops up the ring buffer (or asks the
//! reader to), then moves one quantum from the ring into the sink if the sink
//! is running low.
//!
//! Track ends are gapless: the reader continues into the next track as soon
//! as the current one is read to the end, and the audible track index follows
//! once the sink has played the last sample of the old track. Only transport
//! commands flush the ring and the sink.
//!
//! Lock order: playlist before control. Transport commands hold the playlist
//! lock for their whole duration so the reader never sees a half-applied
//! change.

use super::reader::{self, DiscReader, Fill};
use super::sample_ring::SampleRing;
use super::state::{PlaybackState, PlayerStatus};
use super::track_cursor::TrackCursor;
use crate::audio::{AudioSink, SinkError};
use crate::disc::DiscDevice;
use crate::error::{Error, Result};
use crate::lock;
use discplay_common::config::{PlayerSettings, ReaderMode};
use discplay_common::{DiscToc, Msfs};
use std::sync::{Arc, Condvar, Mutex};
use tracing::{debug, error, info, trace, warn};

/// Enqueued tracks addressed by index; every access is bounds-checked.
///
/// Two heads move through the list: `current` is the track being heard and
/// `reading` the track the ring is filled from. Near the end of a track the
/// reader moves on to the next one while the sink still plays the old one, so
/// the ring may hold the tail of `current` followed by the head of later
/// tracks.
#[derive(Default)]
pub(crate) struct Playlist {
    tracks: Vec<TrackCursor>,
    current: usize,
    reading: usize,
}

impl Playlist {
    pub(crate) fn current(&self) -> Option<&TrackCursor> {
        self.tracks.get(self.current)
    }

    /// Cursor the ring is filled from, moving on to the next track once the
    /// reading one is exhausted
    pub(crate) fn reading_mut(&mut self) -> Option<&mut TrackCursor> {
        while self.reading + 1 < self.tracks.len() && self.tracks.get(self.reading).is_some_and(|c| c.is_exhausted()) {
            self.reading += 1;
            if let Some(next) = self.tracks.get_mut(self.reading) {
                next.reset();
            }
            debug!("Reading ahead into track {}", self.reading + 1);
        }
        self.tracks.get_mut(self.reading)
    }

    /// Point both heads at `index`, rewinding every track read so far
    fn select(&mut self, index: usize) {
        let touched = self.reading.saturating_sub(self.current) + 1;
        for cursor in self.tracks.iter_mut().skip(self.current).take(touched) {
            cursor.reset();
        }
        self.current = index;
        self.reading = index;
        if let Some(cursor) = self.tracks.get_mut(index) {
            cursor.reset();
        }
    }

    /// Track being heard and the position inside it, given `pending` samples
    /// that were read but not yet played
    fn audible(&self, pending: usize) -> Option<(usize, &TrackCursor, Msfs)> {
        let read = |index: usize| {
            self.tracks
                .get(index)
                .map_or(0, |c| c.current_location().to_samples() as usize)
        };

        // Everything read from tracks after `current` is still pending
        let mut ahead: usize = (self.current + 1..=self.reading).map(read).sum();
        let mut index = self.current;
        while index < self.reading && pending <= ahead {
            index += 1;
            ahead -= read(index);
        }

        let cursor = self.tracks.get(index)?;
        let position = cursor.current_location().sub_samples(pending.saturating_sub(ahead));
        Some((index, cursor, position))
    }
}

/// Flags shared with the reader thread
#[derive(Debug, Default)]
pub(crate) struct Control {
    pub(crate) state: PlaybackState,
    pub(crate) cause: Option<String>,
    pub(crate) filling: bool,
    pub(crate) shutdown: bool,
}

/// State shared between the player and its reader thread
pub(crate) struct Shared {
    pub(crate) playlist: Mutex<Playlist>,
    pub(crate) ring: SampleRing,
    pub(crate) control: Mutex<Control>,
    /// Signalled (with `control`) when the ring wants samples or on shutdown
    pub(crate) wake: Condvar,
    pub(crate) settings: PlayerSettings,
}

impl Shared {
    pub(crate) fn set_filling(&self, filling: bool) {
        lock(&self.control).filling = filling;
    }

    /// Enter the error state with a cause
    pub(crate) fn fail(&self, cause: String) {
        error!("{}", cause);
        let mut control = lock(&self.control);
        control.state = PlaybackState::Error;
        control.cause = Some(cause);
        control.filling = false;
    }

    fn state(&self) -> PlaybackState {
        lock(&self.control).state
    }

    fn set_state(&self, state: PlaybackState) {
        lock(&self.control).state = state;
    }
}

/// Streaming CD player
pub struct Player {
    shared: Arc<Shared>,
    sink: Box<dyn AudioSink>,
    reader: Option<DiscReader>,
}

impl Player {
    /// Create an empty, stopped player.
    ///
    /// In background reader mode this spawns the reader thread; if the
    /// thread cannot be started the player falls back to inline reads.
    pub fn new(sink: Box<dyn AudioSink>, settings: PlayerSettings) -> Self {
        let mode = settings.reader_mode;
        let shared = Arc::new(Shared {
            playlist: Mutex::new(Playlist::default()),
            ring: SampleRing::new(settings.ring_initial_capacity),
            control: Mutex::new(Control::default()),
            wake: Condvar::new(),
            settings,
        });

        let reader = match mode {
            ReaderMode::Background => match DiscReader::spawn(Arc::clone(&shared)) {
                Ok(reader) => Some(reader),
                Err(e) => {
                    warn!("Could not start disc reader thread, reading inline: {}", e);
                    None
                }
            },
            ReaderMode::Inline => None,
        };

        debug!(
            "Player created (reader: {}, low watermark: {}, high watermark: {})",
            if reader.is_some() { "background" } else { "inline" },
            shared.settings.low_watermark,
            shared.settings.high_watermark
        );

        Self { shared, sink, reader }
    }

    /// Append one cursor per track of `toc`, all reading from `device`
    pub fn enqueue_disc(&self, device: Arc<dyn DiscDevice>, toc: &DiscToc) {
        let mut playlist = lock(&self.shared.playlist);
        for entry in &toc.entries {
            playlist.tracks.push(TrackCursor::new(
                Arc::clone(&device),
                *entry,
                self.shared.settings.cache_frames,
            ));
        }
        info!(
            "Enqueued disc with {} tracks (playlist now {} tracks)",
            toc.len(),
            playlist.tracks.len()
        );
    }

    pub fn play(&mut self) {
        let mut playlist = lock(&self.shared.playlist);
        if playlist.tracks.is_empty() {
            warn!("play() with an empty playlist ignored");
            return;
        }

        match self.shared.state() {
            PlaybackState::Playing | PlaybackState::Error => {}
            PlaybackState::Paused => {
                if let Err(e) = self.sink.resume() {
                    self.shared.fail(format!("Error resuming audio device: {}", e));
                    return;
                }
                self.shared.set_state(PlaybackState::Playing);
                info!("Playback resumed");
            }
            PlaybackState::Stopped => {
                playlist.select(0);
                self.shared.ring.clear();
                if let Err(e) = self.sink.prepare() {
                    self.shared.fail(format!("Error preparing audio device: {}", e));
                    return;
                }
                self.start_filling(PlaybackState::Playing);
                info!("Playback started at track 1 of {}", playlist.tracks.len());
            }
        }
    }

    pub fn pause(&mut self) {
        let _playlist = lock(&self.shared.playlist);
        if self.shared.state() != PlaybackState::Playing {
            return;
        }
        if let Err(e) = self.sink.pause() {
            self.shared.fail(format!("Error pausing audio device: {}", e));
            return;
        }
        self.shared.set_state(PlaybackState::Paused);
        info!("Playback paused");
    }

    /// Stop playback and rewind to the first track. Also clears an error.
    pub fn stop(&mut self) {
        let shared = Arc::clone(&self.shared);
        let mut playlist = lock(&shared.playlist);
        self.stop_locked(&mut playlist);
    }

    pub fn next_track(&mut self) {
        let shared = Arc::clone(&self.shared);
        let mut playlist = lock(&shared.playlist);
        if self.shared.state() == PlaybackState::Error || playlist.current + 1 >= playlist.tracks.len() {
            debug!("next_track() ignored");
            return;
        }
        let index = playlist.current + 1;
        self.switch_to(&mut playlist, index);
    }

    pub fn prev_track(&mut self) {
        let shared = Arc::clone(&self.shared);
        let mut playlist = lock(&shared.playlist);
        if self.shared.state() == PlaybackState::Error || playlist.current == 0 {
            debug!("prev_track() ignored");
            return;
        }
        let index = playlist.current - 1;
        self.switch_to(&mut playlist, index);
    }

    /// Switch to the track at `index` (0-based playlist position)
    pub fn jump_to_track(&mut self, index: usize) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let mut playlist = lock(&shared.playlist);
        if index >= playlist.tracks.len() {
            return Err(Error::TrackOutOfBounds {
                index,
                track_count: playlist.tracks.len(),
            });
        }
        if self.shared.state() == PlaybackState::Error {
            return Err(Error::InvalidState("Player is in error state; stop() first".to_string()));
        }
        self.switch_to(&mut playlist, index);
        Ok(())
    }

    /// Stop and drop every enqueued track
    pub fn clear_playlist(&mut self) {
        let shared = Arc::clone(&self.shared);
        let mut playlist = lock(&shared.playlist);
        self.stop_locked(&mut playlist);
        playlist.tracks.clear();
        playlist.select(0);
        info!("Playlist cleared");
    }

    /// Drive step: keep the ring filled and feed the sink
    pub fn tick(&mut self) {
        let state = self.shared.state();
        if matches!(state, PlaybackState::Error | PlaybackState::Stopped) {
            return;
        }

        if !self.maintain_fill() {
            return;
        }

        if state != PlaybackState::Playing {
            return;
        }

        let queued = match self.sink.queued_sample_count() {
            Ok(queued) => queued,
            Err(e) => {
                self.fail_sink_query(e);
                return;
            }
        };

        if self.follow_audible_track(queued) {
            return;
        }

        if queued > self.shared.settings.sink_sufficient {
            return;
        }

        let samples = self.shared.ring.peek(self.shared.settings.sink_quantum, 0);
        if samples.is_empty() {
            return;
        }

        match self.sink.enqueue(&samples) {
            Ok(0) => trace!("Audio device full, {} samples kept for next tick", samples.len()),
            Ok(written) => {
                self.shared.ring.discard(written);
            }
            Err(e) => self.shared.fail(format!("Error enqueuing samples for playback: {}", e)),
        }
    }

    /// Snapshot of what is audible right now
    pub fn get_status(&self) -> PlayerStatus {
        let state = self.shared.state();
        if state == PlaybackState::Error {
            return PlayerStatus::error();
        }

        let playlist = lock(&self.shared.playlist);
        if playlist.tracks.is_empty() {
            return PlayerStatus::idle(state);
        }

        let queued = match self.sink.queued_sample_count() {
            Ok(queued) => queued,
            Err(e) => {
                self.fail_sink_query(e);
                return PlayerStatus::error();
            }
        };

        let pending = self.shared.ring.size() + queued;
        let Some((index, cursor, position_in_track)) = playlist.audible(pending) else {
            return PlayerStatus::idle(state);
        };

        PlayerStatus {
            state,
            current_track_index: index,
            current_track_name: cursor.track_name(),
            position: Msfs::from(cursor.entry().start) + position_in_track,
            position_in_track,
        }
    }

    /// Why the player entered the error state
    pub fn error_cause(&self) -> Option<String> {
        lock(&self.shared.control).cause.clone()
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.state()
    }

    pub fn track_count(&self) -> usize {
        lock(&self.shared.playlist).tracks.len()
    }

    pub fn current_track_index(&self) -> usize {
        lock(&self.shared.playlist).current
    }

    /// Samples waiting in the ring buffer
    pub fn ring_size(&self) -> usize {
        self.shared.ring.size()
    }

    /// Watermark bookkeeping plus the inline refill. False if the step must end.
    fn maintain_fill(&mut self) -> bool {
        let size = self.shared.ring.size();
        let filling = {
            let mut control = lock(&self.shared.control);
            if size < self.shared.settings.low_watermark {
                control.filling = true;
            }
            control.filling
        };
        if !filling {
            return true;
        }

        if let Some(reader) = &self.reader {
            reader.wake();
            return true;
        }

        match reader::fill_inline(&self.shared) {
            Ok(Fill::Pushed(_)) => {
                if self.shared.ring.size() >= self.shared.settings.high_watermark {
                    self.shared.set_filling(false);
                }
                true
            }
            Ok(Fill::Exhausted | Fill::Stale) => {
                self.shared.set_filling(false);
                true
            }
            Err(_) => false,
        }
    }

    /// Move `current` past every track whose last sample has been played.
    ///
    /// No sink reset here: the next track's samples are already queued behind
    /// the old ones. True if the last track finished and playback stopped.
    fn follow_audible_track(&mut self, queued: usize) -> bool {
        let shared = Arc::clone(&self.shared);
        let mut playlist = lock(&shared.playlist);
        let pending = self.shared.ring.size() + queued;

        let audible = playlist.audible(pending).map(|(index, _, _)| index);
        if let Some(index) = audible {
            while playlist.current < index {
                let finished = playlist.current;
                info!("Track {} finished, continuing with track {}", finished + 1, finished + 2);
                if let Some(cursor) = playlist.tracks.get_mut(finished) {
                    cursor.reset();
                }
                playlist.current = finished + 1;
            }
        }

        let finished = pending == 0
            && playlist.current == playlist.reading
            && playlist.current + 1 >= playlist.tracks.len()
            && playlist.current().is_some_and(|c| c.is_exhausted());
        if finished {
            info!("Last track finished");
            self.stop_locked(&mut playlist);
        }
        finished
    }

    fn stop_locked(&mut self, playlist: &mut Playlist) {
        playlist.select(0);
        self.shared.ring.clear();
        if let Err(e) = self.sink.reset() {
            warn!("Audio device reset failed during stop: {}", e);
        }

        let mut control = lock(&self.shared.control);
        control.state = PlaybackState::Stopped;
        control.cause = None;
        control.filling = false;
        info!("Playback stopped");
    }

    /// User-requested track change: drop everything queued and start over at `index`
    fn switch_to(&mut self, playlist: &mut Playlist, index: usize) {
        playlist.select(index);
        self.shared.ring.clear();

        if let Err(e) = self.sink.reset() {
            self.shared.fail(format!("Error resetting audio device: {}", e));
            return;
        }

        let state = self.shared.state();
        if state == PlaybackState::Playing {
            if let Err(e) = self.sink.prepare() {
                self.shared.fail(format!("Error preparing audio device: {}", e));
                return;
            }
        }
        if state.is_active() {
            self.start_filling(state);
        }
        info!("Switched to track {}", index + 1);
    }

    fn start_filling(&self, state: PlaybackState) {
        {
            let mut control = lock(&self.shared.control);
            control.state = state;
            control.filling = true;
        }
        if let Some(reader) = &self.reader {
            reader.wake();
        }
    }

    fn fail_sink_query(&self, e: SinkError) {
        self.shared
            .fail(format!("Error reading sample count in audio device buffer: {}", e));
    }
}
