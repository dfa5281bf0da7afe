//! Scripted audio sink
//!
//! Samples handed to the sink stay "queued" until the test plays them with
//! [`MockSinkHandle::play`]. The queue limit, enqueue failures and query
//! failures can be changed at any time through the handle.

use discplay_ap::audio::{AudioSink, Sample, SinkError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub struct SinkState {
    pub queued: VecDeque<Sample>,
    pub played: Vec<Sample>,
    /// Maximum samples queued at once (None = unlimited)
    pub limit: Option<usize>,
    pub fail_enqueue: bool,
    pub fail_query: bool,
    pub paused: bool,
    /// Samples played out each time the player asks for the queued count,
    /// standing in for a device that drains on its own
    pub drain_per_query: usize,
    /// Names of the control calls received, in order
    pub calls: Vec<&'static str>,
}

pub struct MockSink {
    state: Arc<Mutex<SinkState>>,
}

/// Test-side view of a [`MockSink`] owned by the player
#[derive(Clone)]
pub struct MockSinkHandle {
    state: Arc<Mutex<SinkState>>,
}

impl MockSink {
    pub fn new() -> (Self, MockSinkHandle) {
        let state = Arc::new(Mutex::new(SinkState::default()));
        (
            Self { state: Arc::clone(&state) },
            MockSinkHandle { state },
        )
    }

    fn call(&self, name: &'static str) {
        self.state.lock().unwrap().calls.push(name);
    }
}

impl AudioSink for MockSink {
    fn is_ready(&self) -> bool {
        true
    }

    fn enqueue(&mut self, samples: &[Sample]) -> Result<usize, SinkError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_enqueue {
            return Err(SinkError::Device("write failed".to_string()));
        }
        let room = state
            .limit
            .map_or(samples.len(), |limit| limit.saturating_sub(state.queued.len()));
        let accepted = room.min(samples.len());
        state.queued.extend(&samples[..accepted]);
        Ok(accepted)
    }

    fn queued_sample_count(&self) -> Result<usize, SinkError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_query {
            return Err(SinkError::Device("query failed".to_string()));
        }
        if !state.paused {
            let count = state.drain_per_query.min(state.queued.len());
            let played: Vec<Sample> = state.queued.drain(..count).collect();
            state.played.extend(played);
        }
        Ok(state.queued.len())
    }

    fn prepare(&mut self) -> Result<(), SinkError> {
        self.call("prepare");
        let mut state = self.state.lock().unwrap();
        state.queued.clear();
        state.paused = false;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), SinkError> {
        self.call("pause");
        self.state.lock().unwrap().paused = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), SinkError> {
        self.call("resume");
        self.state.lock().unwrap().paused = false;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), SinkError> {
        self.call("reset");
        let mut state = self.state.lock().unwrap();
        state.queued.clear();
        state.paused = true;
        Ok(())
    }
}

impl MockSinkHandle {
    /// Move up to `count` queued samples to the played list
    pub fn play(&self, count: usize) -> usize {
        let mut state = self.state.lock().unwrap();
        let count = count.min(state.queued.len());
        let played: Vec<Sample> = state.queued.drain(..count).collect();
        state.played.extend(played);
        count
    }

    pub fn queued(&self) -> usize {
        self.state.lock().unwrap().queued.len()
    }

    pub fn played(&self) -> Vec<Sample> {
        self.state.lock().unwrap().played.clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn set_limit(&self, limit: Option<usize>) {
        self.state.lock().unwrap().limit = limit;
    }

    pub fn set_drain_per_query(&self, count: usize) {
        self.state.lock().unwrap().drain_per_query = count;
    }

    pub fn set_fail_enqueue(&self, fail: bool) {
        self.state.lock().unwrap().fail_enqueue = fail;
    }

    pub fn set_fail_query(&self, fail: bool) {
        self.state.lock().unwrap().fail_query = fail;
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }
}
