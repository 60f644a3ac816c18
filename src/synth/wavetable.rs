//! Looped PCM wavetables
//!
//! A wavetable holds a whole number of waveform periods, long enough to fill
//! the output sink's minimum buffer, so the sink can loop it without seams.

use std::sync::{Arc, OnceLock};

use super::Waveform;
use crate::error::ToneError;

/// Default output sample rate in Hz
pub const SAMPLE_RATE: u32 = 44100;

/// Lowest playable frequency in Hz
pub const MIN_FREQUENCY: f32 = 1.0;

/// Highest playable frequency at the default sample rate
pub const MAX_FREQUENCY: f32 = (SAMPLE_RATE / 3) as f32;

/// Highest playable frequency for a given sample rate
pub fn max_frequency(sample_rate: u32) -> f32 {
    (sample_rate / 3) as f32
}

/// Check that `frequency` can be rendered at `sample_rate`
pub fn check_frequency(frequency: f32, sample_rate: u32) -> Result<(), ToneError> {
    let max = max_frequency(sample_rate);
    if (MIN_FREQUENCY..=max).contains(&frequency) {
        Ok(())
    } else {
        Err(ToneError::FrequencyOutOfRange {
            frequency,
            min: MIN_FREQUENCY,
            max,
        })
    }
}

// Shared by every noise tone in the process; sized by the first request.
static NOISE_TABLE: OnceLock<Arc<[i16]>> = OnceLock::new();

fn noise_table(len: usize) -> Arc<[i16]> {
    NOISE_TABLE
        .get_or_init(|| {
            log::debug!("generating noise table ({} samples)", len);
            (0..len)
                .map(|_| to_pcm(rand::random::<f32>() * 2.0 - 1.0))
                .collect()
        })
        .clone()
}

/// Convert an amplitude in -1.0..=1.0 to a 16-bit sample
fn to_pcm(amplitude: f32) -> i16 {
    (i16::MAX as f32 * amplitude)
        .clamp(i16::MIN as f32, i16::MAX as f32)
        .round() as i16
}

/// A looped buffer of `count` repetitions of a `period`-sample waveform cycle
#[derive(Debug, Clone)]
pub struct Wavetable {
    samples: Arc<[i16]>,
    period: usize,
    count: usize,
}

impl Wavetable {
    /// Build the shortest loopable table for `frequency` that holds at least
    /// `min_buffer_samples` samples
    pub fn build(
        waveform: &Waveform,
        frequency: f32,
        sample_rate: u32,
        min_buffer_samples: usize,
    ) -> Result<Self, ToneError> {
        check_frequency(frequency, sample_rate)?;

        if !waveform.is_periodic() {
            return Ok(Self::noise(sample_rate, min_buffer_samples));
        }

        let period = (sample_rate as f32 / frequency).round() as usize;
        let count = min_buffer_samples.div_ceil(period).max(1);

        // Phase runs 0..=1 across the period so both ends come from the same curve
        let last = (period - 1) as f32;
        let cycle: Vec<i16> = (0..period)
            .map(|i| to_pcm(waveform.sample(i as f32 / last)))
            .collect();

        let mut samples = Vec::with_capacity(period * count);
        for _ in 0..count {
            samples.extend_from_slice(&cycle);
        }

        Ok(Self {
            samples: samples.into(),
            period,
            count,
        })
    }

    fn noise(sample_rate: u32, min_buffer_samples: usize) -> Self {
        let wanted = (sample_rate as usize).max(min_buffer_samples);
        let table = noise_table(wanted);
        let period = table.len();

        if period >= wanted {
            return Self {
                samples: table,
                period,
                count: 1,
            };
        }

        log::debug!(
            "noise table has {} samples, repeating to cover {}",
            period,
            wanted
        );
        let count = wanted.div_ceil(period);
        let mut samples = Vec::with_capacity(period * count);
        for _ in 0..count {
            samples.extend_from_slice(&table);
        }
        Self {
            samples: samples.into(),
            period,
            count,
        }
    }

    /// All samples, ready to be written to a sink
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Samples in one waveform cycle
    pub fn period(&self) -> usize {
        self.period
    }

    /// Number of cycles in the table
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// True when both tables point at the same sample memory
    pub fn shares_samples_with(&self, other: &Wavetable) -> bool {
        Arc::ptr_eq(&self.samples, &other.samples)
    }
}
