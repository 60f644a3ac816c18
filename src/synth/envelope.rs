//! ADSR envelope clock
//!
//! Attack-Decay-Sustain-Release envelope evaluated against wall-clock time.
//! Each stage is a linear fade; the tone engine samples it a fixed number of
//! times per stage and pushes the result to the output sink as volume.

use std::time::Duration;

/// Volume updates per envelope stage
pub const ENVELOPE_STEPS: u32 = 100;

/// Shortest wait between two volume updates
pub const MIN_STEP: Duration = Duration::from_micros(100);

/// Envelope stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Linear interpolation with the progress clamped to 0.0-1.0
pub fn fade(from: f32, to: f32, progress: f32) -> f32 {
    let progress = progress.clamp(0.0, 1.0);
    from * (1.0 - progress) + to * progress
}

/// Convert milliseconds to a duration, treating negative and NaN as zero
pub fn millis(ms: f32) -> Duration {
    Duration::from_nanos((ms.max(0.0) as f64 * 1_000_000.0) as u64)
}

/// ADSR envelope parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    /// Fixed start delay, measured from tone construction
    pub delay: Duration,
    pub attack: Duration,
    pub decay: Duration,
    pub release: Duration,
    /// Sustain level relative to peak (0.0-1.0)
    pub sustain: f32,
    /// Peak volume (0.0-1.0)
    pub volume: f32,
}

impl Envelope {
    /// Create an envelope with default parameters
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            attack: millis(10.0),
            decay: millis(300.0),
            release: millis(150.0),
            sustain: 0.8,
            volume: 1.0,
        }
    }

    /// Set attack time in milliseconds
    pub fn set_attack_ms(&mut self, ms: f32) {
        self.attack = millis(ms);
    }

    /// Set decay time in milliseconds
    pub fn set_decay_ms(&mut self, ms: f32) {
        self.decay = millis(ms);
    }

    /// Set release time in milliseconds
    pub fn set_release_ms(&mut self, ms: f32) {
        self.release = millis(ms);
    }

    /// Set the start delay in milliseconds
    pub fn set_delay_ms(&mut self, ms: f32) {
        self.delay = millis(ms);
    }

    /// Set sustain level (0.0-1.0)
    pub fn set_sustain(&mut self, level: f32) {
        self.sustain = level.clamp(0.0, 1.0);
    }

    /// Set peak volume (0.0-1.0)
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    /// Length of a timed stage; sustain has none. Never shorter than 1ns.
    pub fn duration(&self, stage: EnvelopeStage) -> Option<Duration> {
        let duration = match stage {
            EnvelopeStage::Attack => self.attack,
            EnvelopeStage::Decay => self.decay,
            EnvelopeStage::Release => self.release,
            EnvelopeStage::Sustain => return None,
        };
        Some(duration.max(Duration::from_nanos(1)))
    }

    /// Wait between two volume updates in a timed stage
    pub fn step_interval(&self, stage: EnvelopeStage) -> Duration {
        self.duration(stage)
            .map(|d| d / ENVELOPE_STEPS)
            .unwrap_or(MIN_STEP)
            .max(MIN_STEP)
    }

    /// Volume held during sustain
    pub fn sustain_volume(&self) -> f32 {
        self.volume * self.sustain
    }

    /// Volume `elapsed` after playback started
    pub fn attack_volume(&self, elapsed: Duration) -> f32 {
        fade(0.0, self.volume, self.progress(EnvelopeStage::Attack, elapsed))
    }

    /// Volume `elapsed` after the decay stage started
    pub fn decay_volume(&self, elapsed: Duration) -> f32 {
        fade(
            self.volume,
            self.sustain_volume(),
            self.progress(EnvelopeStage::Decay, elapsed),
        )
    }

    /// Volume `elapsed` after release started from volume `from`
    pub fn release_volume(&self, from: f32, elapsed: Duration) -> f32 {
        fade(from, 0.0, self.progress(EnvelopeStage::Release, elapsed))
    }

    fn progress(&self, stage: EnvelopeStage, elapsed: Duration) -> f32 {
        match self.duration(stage) {
            Some(duration) => (elapsed.as_secs_f64() / duration.as_secs_f64()) as f32,
            None => 1.0,
        }
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}
