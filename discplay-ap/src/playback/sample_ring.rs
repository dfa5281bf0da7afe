//! Resizable sample ring buffer
//!
//! Decouples disc reads (producer) from the audio sink (consumer). Unlike the
//! fixed-size SPSC ring feeding the output callback, this one never refuses a
//! push: when an append would overflow, the storage is reallocated at double
//! the capacity (repeatedly if needed) and the queued samples move over in
//! FIFO order.
//!
//! Every operation takes the same lock, so producer and consumer may live on
//! different threads.
//!
//! `clear()` bumps a generation counter. A producer that sampled the
//! generation before a slow read can use [`SampleRing::push_if_current`] to
//! drop audio that a transport command has made stale in the meantime.

use crate::audio::Sample;
use crate::lock;
use ringbuf::{traits::*, HeapRb};
use std::sync::Mutex;
use tracing::debug;

pub struct SampleRing {
    inner: Mutex<RingInner>,
}

struct RingInner {
    buffer: HeapRb<Sample>,
    generation: u64,
}

impl RingInner {
    fn capacity(&self) -> usize {
        self.buffer.capacity().get()
    }

    fn push(&mut self, samples: &[Sample]) {
        let needed = self.buffer.occupied_len() + samples.len();
        let mut capacity = self.capacity();
        if needed > capacity {
            while capacity < needed {
                capacity *= 2;
            }

            let mut grown = HeapRb::new(capacity);
            let (head, tail) = self.buffer.as_slices();
            grown.push_slice(head);
            grown.push_slice(tail);

            debug!(
                "Sample ring grown from {} to {} samples ({} queued)",
                self.capacity(),
                capacity,
                grown.occupied_len()
            );
            self.buffer = grown;
        }

        self.buffer.push_slice(samples);
    }
}

impl SampleRing {
    /// Empty ring with room for `initial_capacity` samples (minimum 1)
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(RingInner {
                buffer: HeapRb::new(initial_capacity.max(1)),
                generation: 0,
            }),
        }
    }

    /// Append samples, growing the storage if needed
    pub fn push(&self, samples: &[Sample]) {
        lock(&self.inner).push(samples);
    }

    /// Append samples only if no `clear()` happened since `generation` was read.
    ///
    /// Returns whether the samples were appended.
    pub fn push_if_current(&self, generation: u64, samples: &[Sample]) -> bool {
        let mut inner = lock(&self.inner);
        if inner.generation != generation {
            return false;
        }
        inner.push(samples);
        true
    }

    /// Remove up to `count` samples from the front
    pub fn pop(&self, count: usize) -> Vec<Sample> {
        let mut inner = lock(&self.inner);
        let count = count.min(inner.buffer.occupied_len());
        let mut samples = vec![Sample::SILENCE; count];
        inner.buffer.pop_slice(&mut samples);
        samples
    }

    /// Copy up to `count` samples starting `offset` samples from the front
    pub fn peek(&self, count: usize, offset: usize) -> Vec<Sample> {
        let inner = lock(&self.inner);
        let (head, tail) = inner.buffer.as_slices();
        head.iter().chain(tail).skip(offset).take(count).copied().collect()
    }

    /// Drop up to `count` samples from the front without copying them.
    ///
    /// Returns how many were dropped.
    pub fn discard(&self, count: usize) -> usize {
        let mut inner = lock(&self.inner);
        let count = count.min(inner.buffer.occupied_len());
        inner.buffer.skip(count)
    }

    /// Samples queued
    pub fn size(&self) -> usize {
        lock(&self.inner).buffer.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn capacity(&self) -> usize {
        lock(&self.inner).capacity()
    }

    /// Drop everything queued and invalidate pending producers
    pub fn clear(&self) {
        let mut inner = lock(&self.inner);
        let queued = inner.buffer.occupied_len();
        inner.buffer.skip(queued);
        inner.generation = inner.generation.wrapping_add(1);
    }

    pub fn generation(&self) -> u64 {
        lock(&self.inner).generation
    }
}
