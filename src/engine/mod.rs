//! Tone engine
//!
//! `ToneGenerator` holds the envelope and waveform settings and stamps out
//! `Tone`s, each of which plays on its own thread through its own sink.

mod cpal_sink;
mod recorder;
mod sink;
mod tone;
mod trace;

pub use cpal_sink::{default_device_name, list_output_devices, CpalBackend, CpalSink};
pub use recorder::Recorder;
pub use sink::{AudioBackend, LoopCount, OutputSink, DEFAULT_BUFFER_SAMPLES};
pub use tone::{Phase, Playback, Tone, ToneSettings};
pub use trace::{SinkEvent, TraceBackend, TraceEntry};

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::ToneError;
use crate::synth::{millis, Envelope, Waveform};

/// Configures and creates tones
///
/// Setters only affect tones created afterwards; every tone keeps a copy of
/// the settings it was created with.
pub struct ToneGenerator {
    backend: Arc<dyn AudioBackend>,
    envelope: Envelope,
    waveform: Waveform,
    settle: Duration,
}

impl ToneGenerator {
    /// Create a generator with default settings on the given backend
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        let defaults = ToneSettings::default();
        Self {
            backend,
            envelope: defaults.envelope,
            waveform: defaults.waveform,
            settle: defaults.settle,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.backend.sample_rate()
    }

    pub fn set_attack_time_ms(&mut self, ms: f32) {
        self.envelope.set_attack_ms(ms);
    }

    pub fn set_decay_time_ms(&mut self, ms: f32) {
        self.envelope.set_decay_ms(ms);
    }

    /// Sustain level relative to peak (0.0-1.0)
    pub fn set_sustain(&mut self, level: f32) {
        self.envelope.set_sustain(level);
    }

    pub fn set_release_time_ms(&mut self, ms: f32) {
        self.envelope.set_release_ms(ms);
    }

    /// Fixed start delay, counted from tone creation
    ///
    /// Preparing a tone takes a varying amount of time; a delay longer than
    /// that makes tones triggered together start together. Default is 0.
    pub fn set_delay_time_ms(&mut self, ms: f32) {
        self.envelope.set_delay_ms(ms);
    }

    /// Peak volume (0.0-1.0)
    pub fn set_volume(&mut self, volume: f32) {
        self.envelope.set_volume(volume);
    }

    /// Pause before and after the sink is stopped at the end of a tone
    pub fn set_settle_time_ms(&mut self, ms: f32) {
        self.settle = millis(ms);
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn waveform(&self) -> &Waveform {
        &self.waveform
    }

    /// Snapshot of the current settings
    pub fn settings(&self) -> ToneSettings {
        ToneSettings {
            envelope: self.envelope,
            waveform: self.waveform.clone(),
            settle: self.settle,
        }
    }

    /// Prepare a tone without starting it
    pub fn tone(&self, frequency: f32) -> Result<Tone, ToneError> {
        Tone::new(self.backend.as_ref(), frequency, self.settings())
    }

    /// Prepare unstarted tones whose start delays share one origin
    ///
    /// With a delay longer than the total preparation time, tones started
    /// one after another all leave the delay together.
    pub fn tones(&self, frequencies: &[f32]) -> Result<Vec<Tone>, ToneError> {
        let origin = Instant::now();
        frequencies
            .iter()
            .map(|&f| Tone::with_origin(self.backend.as_ref(), f, self.settings(), origin))
            .collect()
    }

    /// Play a tone for `duration_ms`, measured from the start of the attack
    ///
    /// Returns as soon as playback has been handed to the tone's thread.
    pub fn play(&self, frequency: f32, duration_ms: u32) -> Result<Tone, ToneError> {
        let tone = self.tone(frequency)?;
        tone.play(Playback::For(Duration::from_millis(duration_ms as u64)))?;
        Ok(tone)
    }

    /// Start a tone that sustains until [`Tone::end`] is called
    pub fn start(&self, frequency: f32) -> Result<Tone, ToneError> {
        let tone = self.tone(frequency)?;
        tone.play(Playback::Hold)?;
        Ok(tone)
    }
}
