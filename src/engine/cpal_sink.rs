//! Real-time output sink using cpal
//!
//! Each sink gets its own output stream. cpal streams cannot move between
//! threads, so the stream is built and kept alive on a small stream thread
//! while the sink itself only shares the loop buffer and volume with it.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};

use super::sink::{AudioBackend, LoopCount, OutputSink, DEFAULT_BUFFER_SAMPLES};
use crate::error::SinkError;
use crate::synth::SAMPLE_RATE;

/// Opens cpal output streams on the default or a named device
#[derive(Debug, Clone)]
pub struct CpalBackend {
    device: Option<String>,
    requested_rate: u32,
    // What the device actually runs at, looked up on first use
    sample_rate: OnceLock<u32>,
    min_buffer_samples: usize,
}

impl CpalBackend {
    /// Ask for `sample_rate`; devices that cannot run at it use their own rate
    pub fn new(sample_rate: u32, min_buffer_samples: usize) -> Self {
        Self {
            device: None,
            requested_rate: sample_rate,
            sample_rate: OnceLock::new(),
            min_buffer_samples,
        }
    }

    /// Use the first output device whose name contains `name`
    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.device = Some(name.into());
        self.sample_rate = OnceLock::new();
        self
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new(SAMPLE_RATE, DEFAULT_BUFFER_SAMPLES)
    }
}

impl AudioBackend for CpalBackend {
    fn sample_rate(&self) -> u32 {
        *self
            .sample_rate
            .get_or_init(|| negotiate_sample_rate(self.device.as_deref(), self.requested_rate))
    }

    fn min_buffer_samples(&self) -> usize {
        self.min_buffer_samples
    }

    fn open(&self, buffer_samples: usize) -> Result<Box<dyn OutputSink>, SinkError> {
        let sink = CpalSink::open(self.device.clone(), self.sample_rate(), buffer_samples)?;
        Ok(Box::new(sink))
    }
}

/// Looping sample buffer read by the stream callback
struct LoopBuffer {
    samples: Vec<i16>,
    start: usize,
    end: usize,
    loops: LoopCount,
    position: usize,
}

impl LoopBuffer {
    fn next(&mut self) -> Option<i16> {
        if self.position >= self.end {
            match self.loops {
                LoopCount::Infinite => self.position = self.start,
                LoopCount::Times(0) => return None,
                LoopCount::Times(n) => {
                    self.loops = LoopCount::Times(n - 1);
                    self.position = self.start;
                }
            }
        }
        let sample = self.samples.get(self.position).copied();
        self.position += 1;
        sample
    }
}

/// State shared between a sink and its stream callback
struct SharedLoop {
    buffer: Mutex<LoopBuffer>,
    volume: AtomicU32,
    playing: AtomicBool,
}

impl SharedLoop {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(LoopBuffer {
                samples: Vec::with_capacity(capacity),
                start: 0,
                end: 0,
                loops: LoopCount::Times(0),
                position: 0,
            }),
            volume: AtomicU32::new(0f32.to_bits()),
            playing: AtomicBool::new(false),
        }
    }

    fn fill<T: cpal::Sample + cpal::FromSample<f32>>(&self, data: &mut [T], channels: usize) {
        let silence = |data: &mut [T]| {
            for sample in data.iter_mut() {
                *sample = T::from_sample(0.0f32);
            }
        };

        if !self.playing.load(Ordering::Relaxed) {
            silence(data);
            return;
        }

        // Never block the audio thread; skip a callback if the sink holds the lock
        let Ok(mut buffer) = self.buffer.try_lock() else {
            silence(data);
            return;
        };

        let volume = f32::from_bits(self.volume.load(Ordering::Relaxed));
        for frame in data.chunks_mut(channels) {
            let value = buffer
                .next()
                .map(|s| s as f32 / 32768.0 * volume)
                .unwrap_or(0.0);
            for channel_sample in frame.iter_mut() {
                *channel_sample = T::from_sample(value);
            }
        }
    }
}

/// One static looping buffer played through cpal
pub struct CpalSink {
    playback: Arc<SharedLoop>,
    capacity: usize,
    close: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalSink {
    /// Open a stream on the chosen device; returns once the stream runs
    pub fn open(
        device: Option<String>,
        sample_rate: u32,
        buffer_samples: usize,
    ) -> Result<Self, SinkError> {
        let playback = Arc::new(SharedLoop::new(buffer_samples));
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), SinkError>>(1);
        let (close_tx, close_rx) = mpsc::channel::<()>();

        let stream_playback = Arc::clone(&playback);
        let thread = thread::Builder::new()
            .name("tonegen-stream".to_string())
            .spawn(move || {
                let stream = match build_stream(device.as_deref(), sample_rate, stream_playback) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // Returns on release or when the sink is dropped
                let _ = close_rx.recv();
                drop(stream);
            })
            .map_err(|e| SinkError::StreamCreate(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                playback,
                capacity: buffer_samples,
                close: Some(close_tx),
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(SinkError::StreamCreate("stream thread exited".to_string()))
            }
        }
    }

    fn buffer(&self) -> std::sync::MutexGuard<'_, LoopBuffer> {
        self.playback
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl OutputSink for CpalSink {
    fn write_static(&mut self, samples: &[i16]) -> Result<(), SinkError> {
        if samples.len() > self.capacity {
            return Err(SinkError::Write(format!(
                "{} samples do not fit a {} sample buffer",
                samples.len(),
                self.capacity
            )));
        }
        let mut buffer = self.buffer();
        buffer.samples.clear();
        buffer.samples.extend_from_slice(samples);
        buffer.start = 0;
        buffer.end = samples.len();
        buffer.position = 0;
        Ok(())
    }

    fn set_loop_points(
        &mut self,
        start: usize,
        end: usize,
        count: LoopCount,
    ) -> Result<(), SinkError> {
        let mut buffer = self.buffer();
        if start >= end || end > buffer.samples.len() {
            return Err(SinkError::Write(format!("invalid loop points {}..{}", start, end)));
        }
        buffer.start = start;
        buffer.end = end;
        buffer.loops = count;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.playback
            .volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    fn play(&mut self) -> Result<(), SinkError> {
        self.playback.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SinkError> {
        self.playback.playing.store(false, Ordering::SeqCst);
        let mut buffer = self.buffer();
        buffer.position = buffer.start;
        Ok(())
    }

    fn release(mut self: Box<Self>) {
        self.playback.playing.store(false, Ordering::SeqCst);
        drop(self.close.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("audio stream thread panicked");
            }
        }
    }
}

fn find_device(name: Option<&str>) -> Result<Device, SinkError> {
    let host = cpal::default_host();
    match name {
        Some(name) => host
            .output_devices()
            .map_err(|e| SinkError::DeviceInit(e.to_string()))?
            .find(|d| d.name().map(|n| n.contains(name)).unwrap_or(false))
            .ok_or_else(|| SinkError::DeviceNotFound(name.to_string())),
        None => host.default_output_device().ok_or(SinkError::NoDevice),
    }
}

/// Sample rate to open streams at on the named or default device
///
/// Falls back to the requested rate when the device cannot be queried; `open`
/// reports the real problem in that case.
fn negotiate_sample_rate(device_name: Option<&str>, requested: u32) -> u32 {
    let Ok(device) = find_device(device_name) else {
        return requested;
    };
    let Ok(default_config) = device.default_output_config() else {
        return requested;
    };

    // Only ranges matching the channel count and format the stream will use
    let ranges: Vec<(u32, u32)> = match device.supported_output_configs() {
        Ok(configs) => configs
            .filter(|c| {
                c.channels() == default_config.channels()
                    && c.sample_format() == default_config.sample_format()
            })
            .map(|c| (c.min_sample_rate().0, c.max_sample_rate().0))
            .collect(),
        Err(_) => Vec::new(),
    };

    pick_sample_rate(requested, &ranges, default_config.sample_rate().0)
}

/// `requested` if any supported range holds it, the device default otherwise
fn pick_sample_rate(requested: u32, ranges: &[(u32, u32)], device_default: u32) -> u32 {
    if ranges
        .iter()
        .any(|&(min, max)| (min..=max).contains(&requested))
    {
        requested
    } else {
        log::info!(
            "output device does not run at {} Hz, using {} Hz",
            requested,
            device_default
        );
        device_default
    }
}

fn build_stream(
    device_name: Option<&str>,
    sample_rate: u32,
    playback: Arc<SharedLoop>,
) -> Result<Stream, SinkError> {
    let device = find_device(device_name)?;
    let default_config = device
        .default_output_config()
        .map_err(|e| SinkError::DeviceInit(e.to_string()))?;

    let config = StreamConfig {
        channels: default_config.channels(),
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = match default_config.sample_format() {
        SampleFormat::F32 => stream_for::<f32>(&device, &config, playback)?,
        SampleFormat::I16 => stream_for::<i16>(&device, &config, playback)?,
        SampleFormat::U16 => stream_for::<u16>(&device, &config, playback)?,
        other => {
            return Err(SinkError::StreamCreate(format!(
                "unsupported sample format {:?}",
                other
            )))
        }
    };

    stream
        .play()
        .map_err(|e| SinkError::Playback(e.to_string()))?;
    Ok(stream)
}

fn stream_for<T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>>(
    device: &Device,
    config: &StreamConfig,
    playback: Arc<SharedLoop>,
) -> Result<Stream, SinkError> {
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                playback.fill(data, channels);
            },
            |err| log::error!("audio stream error: {}", err),
            None,
        )
        .map_err(|e| SinkError::StreamCreate(e.to_string()))
}

/// Get the default output device name
pub fn default_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_output_device().and_then(|d| d.name().ok())
}

/// List all available output devices with their default configuration
pub fn list_output_devices() -> Vec<(String, StreamConfig)> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    if let Ok(output_devices) = host.output_devices() {
        for device in output_devices {
            if let (Ok(name), Ok(config)) = (device.name(), device.default_output_config()) {
                devices.push((name, config.into()));
            }
        }
    }

    devices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_sample_rate() {
        let ranges = [(8000, 48000)];
        assert_eq!(pick_sample_rate(44100, &ranges, 48000), 44100);

        // Shared-mode devices only offer their own rate
        let fixed = [(48000, 48000)];
        assert_eq!(pick_sample_rate(44100, &fixed, 48000), 48000);
        assert_eq!(pick_sample_rate(44100, &[], 48000), 48000);
    }

    fn looped(samples: Vec<i16>, loops: LoopCount) -> LoopBuffer {
        let end = samples.len();
        LoopBuffer {
            samples,
            start: 0,
            end,
            loops,
            position: 0,
        }
    }

    #[test]
    fn test_loop_buffer_repeats_forever() {
        let mut buffer = looped(vec![1, 2, 3], LoopCount::Infinite);
        let read: Vec<i16> = (0..7).filter_map(|_| buffer.next()).collect();
        assert_eq!(read, vec![1, 2, 3, 1, 2, 3, 1]);
    }

    #[test]
    fn test_loop_buffer_finite_loops() {
        let mut buffer = looped(vec![1, 2], LoopCount::Times(1));
        let read: Vec<Option<i16>> = (0..5).map(|_| buffer.next()).collect();
        assert_eq!(read, vec![Some(1), Some(2), Some(1), Some(2), None]);
    }

    #[test]
    fn test_loop_region() {
        let mut buffer = looped(vec![9, 1, 2, 9], LoopCount::Infinite);
        buffer.start = 1;
        buffer.end = 3;
        let read: Vec<i16> = (0..5).filter_map(|_| buffer.next()).collect();
        assert_eq!(read, vec![9, 1, 2, 1, 2]);
    }

    #[test]
    fn test_fill_scales_by_volume() {
        let playback = SharedLoop::new(4);
        *playback.buffer.lock().unwrap() = looped(vec![16384, -16384], LoopCount::Infinite);
        playback.volume.store(0.5f32.to_bits(), Ordering::Relaxed);

        // Silent until playing
        let mut data = [1.0f32; 4];
        playback.fill(&mut data, 2);
        assert_eq!(data, [0.0; 4]);

        playback.playing.store(true, Ordering::Relaxed);
        playback.fill(&mut data, 2);
        assert_eq!(data, [0.25, 0.25, -0.25, -0.25]);
    }
}
