//! Bounded cache of decoded disc frames
//!
//! Keyed by frame position. Once full, the next insertion of a new key evicts
//! every frame that has been read since the previous eviction pass; those
//! have already been played (or copied into the sample ring) and are the
//! cheapest to lose. If nothing has been read yet the oldest insertion goes.

use crate::disc::FrameSamples;
use crate::lock;
use discplay_common::Msf;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use tracing::{debug, trace};

/// Thread-safe frame cache shared by a track cursor and its clones
pub struct FrameCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

struct CacheInner {
    frames: HashMap<Msf, Box<FrameSamples>>,
    /// Keys in insertion order, oldest first
    order: VecDeque<Msf>,
    /// Keys read since the last eviction pass
    read: HashSet<Msf>,
}

impl CacheInner {
    fn forget(&mut self, position: Msf) {
        self.read.remove(&position);
        self.order.retain(|key| *key != position);
    }

    fn evict(&mut self) {
        if !self.read.is_empty() {
            let read = std::mem::take(&mut self.read);
            self.frames.retain(|key, _| !read.contains(key));
            self.order.retain(|key| !read.contains(key));
            debug!("Frame cache evicted {} read frames", read.len());
            return;
        }

        if let Some(oldest) = self.order.pop_front() {
            self.frames.remove(&oldest);
            trace!("Frame cache evicted oldest frame {}", oldest);
        }
    }
}

impl FrameCache {
    /// Create an empty cache holding at most `capacity` frames (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(CacheInner {
                frames: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
                read: HashSet::new(),
            }),
            capacity,
        }
    }

    pub fn has(&self, position: Msf) -> bool {
        lock(&self.inner).frames.contains_key(&position)
    }

    /// Insert or overwrite a frame.
    ///
    /// A re-added position loses its read flag and counts as newly inserted.
    pub fn add(&self, position: Msf, samples: FrameSamples) {
        let mut inner = lock(&self.inner);

        if inner.frames.contains_key(&position) {
            inner.forget(position);
        } else if inner.frames.len() >= self.capacity {
            inner.evict();
        }

        inner.frames.insert(position, Box::new(samples));
        inner.order.push_back(position);
        trace!("Frame cache stored {}", position);
    }

    /// Fetch a frame and flag it as read; `None` on a miss.
    pub fn read(&self, position: Msf) -> Option<FrameSamples> {
        let mut inner = lock(&self.inner);
        let samples = inner.frames.get(&position).map(|frame| **frame)?;
        inner.read.insert(position);
        Some(samples)
    }

    pub fn discard(&self, position: Msf) {
        let mut inner = lock(&self.inner);
        if inner.frames.remove(&position).is_some() {
            inner.forget(position);
        }
    }

    pub fn discard_all(&self) {
        let mut inner = lock(&self.inner);
        inner.frames.clear();
        inner.order.clear();
        inner.read.clear();
    }

    /// Frames currently cached
    pub fn len(&self) -> usize {
        lock(&self.inner).frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
