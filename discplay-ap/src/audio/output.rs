//! Audio output using cpal
//!
//! The output callback drains a sample queue shared with [`CpalSink`]; the
//! queue's occupancy is what the player sees as the sink's queued sample
//! count.
//!
//! cpal streams cannot move between threads, so the stream lives on its own
//! thread and is started/paused through a command channel.

use crate::audio::{AudioSink, Sample, SinkError};
use crate::lock;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::{traits::*, HeapRb};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Disc audio sample rate; the device must run at exactly this rate
const OUTPUT_SAMPLE_RATE: u32 = 44_100;

/// Default queue size in samples (4 seconds)
pub const DEFAULT_QUEUE_SAMPLES: usize = OUTPUT_SAMPLE_RATE as usize * 4;

type SampleQueue = Arc<Mutex<HeapRb<Sample>>>;
type StreamError = Arc<Mutex<Option<String>>>;

#[derive(Debug, Clone, Copy)]
enum StreamCommand {
    Play,
    Pause,
}

type Reply = SyncSender<Result<(), SinkError>>;

/// Audio sink writing to a cpal output device
pub struct CpalSink {
    queue: SampleQueue,
    stream_error: StreamError,
    commands: Option<Sender<(StreamCommand, Reply)>>,
    thread: Option<JoinHandle<()>>,
    device_name: String,
}

impl CpalSink {
    /// List available audio output devices.
    pub fn list_devices() -> Result<Vec<String>, SinkError> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| SinkError::Device(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open an output device (None = system default) with a queue of
    /// `queue_samples` samples. The stream starts paused.
    ///
    /// A named device that cannot be found falls back to the default device.
    pub fn open(device_name: Option<&str>, queue_samples: usize) -> Result<Self, SinkError> {
        let queue: SampleQueue = Arc::new(Mutex::new(HeapRb::new(queue_samples.max(1))));
        let stream_error: StreamError = Arc::new(Mutex::new(None));
        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let requested = device_name.map(str::to_string);
        let thread_queue = Arc::clone(&queue);
        let thread_error = Arc::clone(&stream_error);
        let thread = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || stream_thread(requested, thread_queue, thread_error, ready_tx, command_rx))
            .map_err(|e| SinkError::Device(format!("Failed to start audio output thread: {}", e)))?;

        let device_name = ready_rx
            .recv()
            .map_err(|_| SinkError::Device("Audio output thread exited during startup".to_string()))??;

        Ok(Self {
            queue,
            stream_error,
            commands: Some(command_tx),
            thread: Some(thread),
            device_name,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    fn command(&self, command: StreamCommand) -> Result<(), SinkError> {
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| SinkError::Device("Audio output is closed".to_string()))?;
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        commands
            .send((command, reply_tx))
            .map_err(|_| SinkError::Device("Audio output thread is gone".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| SinkError::Device("Audio output thread is gone".to_string()))?
    }

    fn check_stream(&self) -> Result<(), SinkError> {
        match lock(&self.stream_error).as_ref() {
            Some(message) => Err(SinkError::Stream(message.clone())),
            None => Ok(()),
        }
    }

    fn clear_queue(&self) {
        let mut queue = lock(&self.queue);
        let queued = queue.occupied_len();
        queue.skip(queued);
    }
}

impl AudioSink for CpalSink {
    fn is_ready(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished()) && lock(&self.stream_error).is_none()
    }

    fn enqueue(&mut self, samples: &[Sample]) -> Result<usize, SinkError> {
        self.check_stream()?;
        Ok(lock(&self.queue).push_slice(samples))
    }

    fn queued_sample_count(&self) -> Result<usize, SinkError> {
        self.check_stream()?;
        Ok(lock(&self.queue).occupied_len())
    }

    fn prepare(&mut self) -> Result<(), SinkError> {
        self.clear_queue();
        self.command(StreamCommand::Play)
    }

    fn pause(&mut self) -> Result<(), SinkError> {
        self.command(StreamCommand::Pause)
    }

    fn resume(&mut self) -> Result<(), SinkError> {
        self.command(StreamCommand::Play)
    }

    fn reset(&mut self) -> Result<(), SinkError> {
        let paused = self.command(StreamCommand::Pause);
        self.clear_queue();
        paused
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        // Closing the channel ends the stream thread
        self.commands.take();
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("Audio output thread panicked");
            }
        }
    }
}

/// Owns the cpal stream for the lifetime of the sink
fn stream_thread(
    requested: Option<String>,
    queue: SampleQueue,
    stream_error: StreamError,
    ready: SyncSender<Result<String, SinkError>>,
    commands: Receiver<(StreamCommand, Reply)>,
) {
    let stream = match open_stream(requested.as_deref(), queue, stream_error) {
        Ok((stream, name)) => {
            let _ = ready.send(Ok(name));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    for (command, reply) in commands {
        let result = match command {
            StreamCommand::Play => stream
                .play()
                .map_err(|e| SinkError::Stream(format!("Failed to start stream: {}", e))),
            StreamCommand::Pause => stream
                .pause()
                .map_err(|e| SinkError::Stream(format!("Failed to pause stream: {}", e))),
        };
        debug!("Audio stream {:?}: {:?}", command, result);
        let _ = reply.send(result);
    }

    debug!("Audio output thread exiting");
}

fn open_stream(
    requested: Option<&str>,
    queue: SampleQueue,
    stream_error: StreamError,
) -> Result<(Stream, String), SinkError> {
    let device = select_device(requested)?;
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    let (config, sample_format) = get_best_config(&device)?;

    debug!(
        "Audio config: sample_rate={}, channels={}, format={:?}",
        config.sample_rate.0, config.channels, sample_format
    );

    let stream = match sample_format {
        SampleFormat::F32 => build_stream(&device, &config, queue, stream_error, |v: i16| v as f32 / 32768.0)?,
        SampleFormat::I16 => build_stream(&device, &config, queue, stream_error, |v: i16| v)?,
        SampleFormat::U16 => build_stream(&device, &config, queue, stream_error, |v: i16| (v as i32 + 32768) as u16)?,
        sample_format => {
            return Err(SinkError::Unsupported(format!(
                "Unsupported sample format: {:?}",
                sample_format
            )));
        }
    };

    // Some backends start streams immediately; hold output until prepare()
    if let Err(e) = stream.pause() {
        warn!("Could not pause new audio stream: {}", e);
    }

    info!("Audio output ready on {}", name);
    Ok((stream, name))
}

fn select_device(requested: Option<&str>) -> Result<Device, SinkError> {
    let host = cpal::default_host();

    if let Some(name) = requested {
        let mut devices = host
            .output_devices()
            .map_err(|e| SinkError::Device(format!("Failed to enumerate devices: {}", e)))?;

        if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
            info!("Found requested audio device: {}", name);
            return Ok(device);
        }
        warn!("Requested device '{}' not found, falling back to default device", name);
    }

    host.default_output_device()
        .ok_or_else(|| SinkError::Device("No default output device found".to_string()))
}

/// Find a 44.1kHz configuration, preferring stereo f32, then stereo i16
fn get_best_config(device: &Device) -> Result<(StreamConfig, SampleFormat), SinkError> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| SinkError::Device(format!("Failed to get device configs: {}", e)))?
        .filter(|c| c.min_sample_rate().0 <= OUTPUT_SAMPLE_RATE && c.max_sample_rate().0 >= OUTPUT_SAMPLE_RATE)
        .collect();

    let rank = |c: &cpal::SupportedStreamConfigRange| {
        let format = match c.sample_format() {
            SampleFormat::F32 => 0,
            SampleFormat::I16 => 1,
            SampleFormat::U16 => 2,
            _ => 3,
        };
        (if c.channels() == 2 { 0 } else { 1 }, format)
    };

    let best = supported
        .into_iter()
        .filter(|c| c.channels() >= 1)
        .min_by_key(rank)
        .ok_or_else(|| SinkError::Unsupported(format!("Device does not support {}Hz output", OUTPUT_SAMPLE_RATE)))?;

    let sample_format = best.sample_format();
    let config = best.with_sample_rate(cpal::SampleRate(OUTPUT_SAMPLE_RATE)).config();
    Ok((config, sample_format))
}

/// Build an output stream converting queued samples with `convert`
fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    queue: SampleQueue,
    stream_error: StreamError,
    convert: fn(i16) -> T,
) -> Result<Stream, SinkError>
where
    T: SizedSample + Send + 'static,
{
    let channels = config.channels as usize;
    let silence = convert(0);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut queue = lock(&queue);
                for frame in data.chunks_mut(channels) {
                    let sample = queue.try_pop().unwrap_or(Sample::SILENCE);
                    write_frame(frame, sample, convert, silence);
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
                *lock(&stream_error) = Some(err.to_string());
            },
            None,
        )
        .map_err(|e| SinkError::Stream(format!("Failed to build stream: {}", e)))
}

/// Spread one stereo sample over a device frame of any channel count
fn write_frame<T: Copy>(frame: &mut [T], sample: Sample, convert: fn(i16) -> T, silence: T) {
    match frame {
        [] => {}
        [mono] => *mono = convert(((sample.left as i32 + sample.right as i32) / 2) as i16),
        [left, right, rest @ ..] => {
            *left = convert(sample.left);
            *right = convert(sample.right);
            rest.fill(silence);
        }
    }
}
