//! # discplay Audio Player Library (discplay-ap)
//!
//! Streams audio straight off a CD (or a cue/bin image of one) to an audio
//! output device without gaps, hiding the drive's seek latency behind a frame
//! cache and a resizable sample ring buffer.
//!
//! **Architecture:** disc device → track cursor (+ frame cache) → sample ring
//! → audio sink, with a background reader thread keeping the ring topped up
//! and a caller-paced drive step feeding the sink.

pub mod audio;
pub mod disc;
pub mod error;
pub mod playback;

pub use error::{Error, Result};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a panicking thread poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
