//! Configuration schema definitions

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::engine::{AudioBackend, CpalBackend, ToneGenerator, DEFAULT_BUFFER_SAMPLES};
use crate::synth::{Waveform, SAMPLE_RATE};

/// Main configuration for tonegen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToneConfig {
    /// Audio output settings
    #[serde(default)]
    pub audio: AudioConfig,

    /// Envelope timing and levels
    #[serde(default)]
    pub envelope: EnvelopeConfig,

    /// Peak volume 0.0-1.0 (default: 1.0)
    #[serde(default = "default_volume")]
    pub volume: f32,

    /// Waveform name (default: sine)
    #[serde(default = "default_waveform")]
    pub waveform: String,

    /// Duty cycle for the pulse waveform (default: 0.5)
    #[serde(default = "default_pulse_width")]
    pub pulse_width: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            envelope: EnvelopeConfig::default(),
            volume: default_volume(),
            waveform: default_waveform(),
            pulse_width: default_pulse_width(),
        }
    }
}

impl ToneConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate < 8000 || self.audio.sample_rate > 192000 {
            bail!("Sample rate must be between 8000 and 192000");
        }
        if self.audio.buffer_size < 64 || self.audio.buffer_size > 65536 {
            bail!("Buffer size must be between 64 and 65536");
        }

        if !(0.0..=1.0).contains(&self.volume) {
            bail!("Volume must be between 0.0 and 1.0");
        }
        if !(0.0..=1.0).contains(&self.envelope.sustain) {
            bail!("Sustain must be between 0.0 and 1.0");
        }
        for (name, ms) in self.envelope.times() {
            if !ms.is_finite() || ms < 0.0 {
                bail!("{} must be a non-negative number of milliseconds", name);
            }
        }

        if !(0.0..=1.0).contains(&self.pulse_width) {
            bail!("Pulse width must be between 0.0 and 1.0");
        }
        self.waveform()?;

        Ok(())
    }

    /// The configured waveform
    pub fn waveform(&self) -> Result<Waveform> {
        let waveform = Waveform::from_name(&self.waveform)
            .ok_or_else(|| anyhow!("Unknown waveform '{}'", self.waveform))?;
        Ok(match waveform {
            Waveform::Pulse(_) => Waveform::pulse(self.pulse_width),
            other => other,
        })
    }

    /// Push the settings into a generator
    pub fn apply(&self, generator: &mut ToneGenerator) -> Result<()> {
        let env = &self.envelope;
        generator.set_attack_time_ms(env.attack_ms);
        generator.set_decay_time_ms(env.decay_ms);
        generator.set_sustain(env.sustain);
        generator.set_release_time_ms(env.release_ms);
        generator.set_delay_time_ms(env.delay_ms);
        generator.set_settle_time_ms(env.settle_ms);
        generator.set_volume(self.volume);
        generator.set_waveform(self.waveform()?);
        Ok(())
    }

    /// Audio backend for the configured device
    pub fn backend(&self) -> CpalBackend {
        let backend = CpalBackend::new(self.audio.sample_rate, self.audio.buffer_size);
        match &self.audio.device {
            Some(name) => backend.with_device(name.clone()),
            None => backend,
        }
    }

    /// Build a configured generator on `backend`
    pub fn generator(&self, backend: Arc<dyn AudioBackend>) -> Result<ToneGenerator> {
        let mut generator = ToneGenerator::new(backend);
        self.apply(&mut generator)?;
        Ok(generator)
    }
}

/// Audio output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate in Hz (default: 44100)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Minimum sink buffer in samples (default: 2048)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Output device name (None = default device)
    #[serde(default)]
    pub device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            buffer_size: default_buffer_size(),
            device: None,
        }
    }
}

fn default_sample_rate() -> u32 { SAMPLE_RATE }
fn default_buffer_size() -> usize { DEFAULT_BUFFER_SAMPLES }

/// Envelope configuration, all times in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeConfig {
    #[serde(default = "default_attack")]
    pub attack_ms: f32,

    #[serde(default = "default_decay")]
    pub decay_ms: f32,

    /// Sustain level relative to peak (default: 0.8)
    #[serde(default = "default_sustain")]
    pub sustain: f32,

    #[serde(default = "default_release")]
    pub release_ms: f32,

    /// Start delay counted from tone creation (default: 0)
    #[serde(default)]
    pub delay_ms: f32,

    /// Pause around stopping the sink (default: 500)
    #[serde(default = "default_settle")]
    pub settle_ms: f32,
}

impl EnvelopeConfig {
    fn times(&self) -> [(&'static str, f32); 5] {
        [
            ("attack_ms", self.attack_ms),
            ("decay_ms", self.decay_ms),
            ("release_ms", self.release_ms),
            ("delay_ms", self.delay_ms),
            ("settle_ms", self.settle_ms),
        ]
    }
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            attack_ms: default_attack(),
            decay_ms: default_decay(),
            sustain: default_sustain(),
            release_ms: default_release(),
            delay_ms: 0.0,
            settle_ms: default_settle(),
        }
    }
}

fn default_attack() -> f32 { 10.0 }
fn default_decay() -> f32 { 300.0 }
fn default_sustain() -> f32 { 0.8 }
fn default_release() -> f32 { 150.0 }
fn default_settle() -> f32 { 500.0 }
fn default_volume() -> f32 { 1.0 }
fn default_waveform() -> String { "sine".to_string() }
fn default_pulse_width() -> f32 { 0.5 }
