//! In-memory output sink
//!
//! Records every sink call with a timestamp instead of making sound. Used
//! for dry runs and for checking envelope timing without an audio device.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::sink::{AudioBackend, LoopCount, OutputSink, DEFAULT_BUFFER_SAMPLES};
use crate::error::SinkError;
use crate::synth::SAMPLE_RATE;

/// A recorded sink call
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Open { buffer_samples: usize },
    Write { samples: usize },
    LoopPoints { start: usize, end: usize, count: LoopCount },
    Volume(f32),
    Play,
    Stop,
    Release,
}

/// A sink call with the sink it came from and when it happened
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    /// Sinks are numbered in the order they were opened
    pub sink: usize,
    /// Time since the backend was created
    pub at: Duration,
    pub event: SinkEvent,
}

struct TraceLog {
    epoch: Instant,
    entries: Mutex<Vec<TraceEntry>>,
    next_sink: AtomicUsize,
}

impl TraceLog {
    fn record(&self, sink: usize, event: SinkEvent) {
        let entry = TraceEntry {
            sink,
            at: self.epoch.elapsed(),
            event,
        };
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}

/// Backend whose sinks only record what they are asked to do
///
/// Clones share the same log.
#[derive(Clone)]
pub struct TraceBackend {
    log: Arc<TraceLog>,
    sample_rate: u32,
    min_buffer_samples: usize,
    fail_open: bool,
}

impl TraceBackend {
    pub fn new(sample_rate: u32, min_buffer_samples: usize) -> Self {
        Self {
            log: Arc::new(TraceLog {
                epoch: Instant::now(),
                entries: Mutex::new(Vec::new()),
                next_sink: AtomicUsize::new(0),
            }),
            sample_rate,
            min_buffer_samples,
            fail_open: false,
        }
    }

    /// Make every `open` fail as if no device were present
    pub fn failing(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Everything recorded so far, in order
    pub fn entries(&self) -> Vec<TraceEntry> {
        self.log
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events of one sink
    pub fn events(&self, sink: usize) -> Vec<SinkEvent> {
        self.entries()
            .into_iter()
            .filter(|e| e.sink == sink)
            .map(|e| e.event)
            .collect()
    }

    /// Volume changes of one sink with their timestamps
    pub fn volumes(&self, sink: usize) -> Vec<(Duration, f32)> {
        self.entries()
            .into_iter()
            .filter(|e| e.sink == sink)
            .filter_map(|e| match e.event {
                SinkEvent::Volume(v) => Some((e.at, v)),
                _ => None,
            })
            .collect()
    }

    /// When `event` first happened on `sink`
    pub fn first(&self, sink: usize, event: &SinkEvent) -> Option<Duration> {
        self.entries()
            .into_iter()
            .find(|e| e.sink == sink && &e.event == event)
            .map(|e| e.at)
    }

    /// Number of sinks opened
    pub fn opened(&self) -> usize {
        self.count(|e| matches!(e, SinkEvent::Open { .. }))
    }

    /// Number of sinks released
    pub fn released(&self) -> usize {
        self.count(|e| *e == SinkEvent::Release)
    }

    fn count(&self, pred: impl Fn(&SinkEvent) -> bool) -> usize {
        self.entries().iter().filter(|e| pred(&e.event)).count()
    }
}

impl Default for TraceBackend {
    fn default() -> Self {
        Self::new(SAMPLE_RATE, DEFAULT_BUFFER_SAMPLES)
    }
}

impl AudioBackend for TraceBackend {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn min_buffer_samples(&self) -> usize {
        self.min_buffer_samples
    }

    fn open(&self, buffer_samples: usize) -> Result<Box<dyn OutputSink>, SinkError> {
        if self.fail_open {
            return Err(SinkError::DeviceInit("trace backend set to fail".to_string()));
        }
        let id = self.log.next_sink.fetch_add(1, Ordering::SeqCst);
        self.log.record(id, SinkEvent::Open { buffer_samples });
        Ok(Box::new(TraceSink {
            id,
            capacity: buffer_samples,
            written: 0,
            log: Arc::clone(&self.log),
        }))
    }
}

/// Sink handed out by [`TraceBackend`]
struct TraceSink {
    id: usize,
    capacity: usize,
    written: usize,
    log: Arc<TraceLog>,
}

impl OutputSink for TraceSink {
    fn write_static(&mut self, samples: &[i16]) -> Result<(), SinkError> {
        if samples.len() > self.capacity {
            return Err(SinkError::Write(format!(
                "{} samples do not fit a {} sample buffer",
                samples.len(),
                self.capacity
            )));
        }
        self.written = samples.len();
        self.log.record(self.id, SinkEvent::Write { samples: samples.len() });
        Ok(())
    }

    fn set_loop_points(
        &mut self,
        start: usize,
        end: usize,
        count: LoopCount,
    ) -> Result<(), SinkError> {
        if start >= end || end > self.written {
            return Err(SinkError::Write(format!("invalid loop points {}..{}", start, end)));
        }
        self.log.record(self.id, SinkEvent::LoopPoints { start, end, count });
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.log.record(self.id, SinkEvent::Volume(volume));
    }

    fn play(&mut self) -> Result<(), SinkError> {
        self.log.record(self.id, SinkEvent::Play);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SinkError> {
        self.log.record(self.id, SinkEvent::Stop);
        Ok(())
    }

    fn release(self: Box<Self>) {
        self.log.record(self.id, SinkEvent::Release);
    }
}
