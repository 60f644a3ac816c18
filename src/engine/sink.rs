//! Output sink abstraction
//!
//! A sink is one static, loopable mono 16-bit playback buffer on some audio
//! device. Backends open sinks; tones own exactly one each.

use crate::error::SinkError;

/// Minimum buffer size used when a device does not report one
pub const DEFAULT_BUFFER_SAMPLES: usize = 2048;

/// How often the loop region repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCount {
    Infinite,
    Times(u32),
}

/// A static playback buffer on an audio device
pub trait OutputSink: Send {
    /// Write the whole sample buffer before playback starts
    fn write_static(&mut self, samples: &[i16]) -> Result<(), SinkError>;

    /// Loop `start..end` of the written buffer
    fn set_loop_points(&mut self, start: usize, end: usize, count: LoopCount)
        -> Result<(), SinkError>;

    /// Set playback volume (0.0-1.0), also while playing
    fn set_volume(&mut self, volume: f32);

    /// Start playback
    fn play(&mut self) -> Result<(), SinkError>;

    /// Stop playback
    fn stop(&mut self) -> Result<(), SinkError>;

    /// Give the device resource back
    fn release(self: Box<Self>);
}

/// Something that can open output sinks
pub trait AudioBackend: Send + Sync {
    /// Output sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Smallest buffer, in samples, the device accepts for static playback
    fn min_buffer_samples(&self) -> usize;

    /// Open a mono 16-bit sink able to hold `buffer_samples` samples
    fn open(&self, buffer_samples: usize) -> Result<Box<dyn OutputSink>, SinkError>;
}

/// Owns a sink and releases it exactly once, on `release()` or drop
pub(crate) struct SinkGuard {
    sink: Option<Box<dyn OutputSink>>,
}

impl SinkGuard {
    pub(crate) fn new(sink: Box<dyn OutputSink>) -> Self {
        Self { sink: Some(sink) }
    }

    pub(crate) fn write_static(&mut self, samples: &[i16]) -> Result<(), SinkError> {
        match self.sink.as_mut() {
            Some(sink) => sink.write_static(samples),
            None => Ok(()),
        }
    }

    pub(crate) fn set_loop_points(
        &mut self,
        start: usize,
        end: usize,
        count: LoopCount,
    ) -> Result<(), SinkError> {
        match self.sink.as_mut() {
            Some(sink) => sink.set_loop_points(start, end, count),
            None => Ok(()),
        }
    }

    pub(crate) fn set_volume(&mut self, volume: f32) {
        if let Some(sink) = self.sink.as_mut() {
            sink.set_volume(volume);
        }
    }

    pub(crate) fn play(&mut self) -> Result<(), SinkError> {
        match self.sink.as_mut() {
            Some(sink) => sink.play(),
            None => Ok(()),
        }
    }

    pub(crate) fn stop(&mut self) -> Result<(), SinkError> {
        match self.sink.as_mut() {
            Some(sink) => sink.stop(),
            None => Ok(()),
        }
    }

    pub(crate) fn release(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.release();
        }
    }

    #[cfg(test)]
    pub(crate) fn is_released(&self) -> bool {
        self.sink.is_none()
    }
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        self.release();
    }
}
