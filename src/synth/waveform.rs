//! Waveform shapes
//!
//! A waveform maps a normalized phase in `0.0..1.0` to an amplitude in
//! `-1.0..=1.0`. Noise is the exception: it has no phase and is served from
//! a shared sample table when a wavetable is built.

use std::f32::consts::PI;
use std::fmt;
use std::sync::Arc;

/// User supplied wave function
pub type WaveFn = Arc<dyn Fn(f32) -> f32 + Send + Sync>;

/// Waveform types
#[derive(Clone, Default)]
pub enum Waveform {
    #[default]
    Sine,
    Sawtooth,
    Triangle,
    /// High while the phase is at or below the width, low after it
    Pulse(f32),
    /// White noise from the shared noise table
    Noise,
    /// Any function of phase
    Custom(WaveFn),
}

impl Waveform {
    /// Square-ish pulse with the given duty cycle (0.0-1.0)
    pub fn pulse(width: f32) -> Self {
        Waveform::Pulse(width.clamp(0.0, 1.0))
    }

    /// Wrap a custom wave function
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(f32) -> f32 + Send + Sync + 'static,
    {
        Waveform::Custom(Arc::new(f))
    }

    /// Parse a waveform name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Waveform> {
        match name.to_lowercase().as_str() {
            "sine" | "sin" => Some(Waveform::Sine),
            "sawtooth" | "saw" => Some(Waveform::Sawtooth),
            "triangle" | "tri" => Some(Waveform::Triangle),
            "pulse" | "square" => Some(Waveform::pulse(0.5)),
            "noise" => Some(Waveform::Noise),
            _ => None,
        }
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Triangle => "triangle",
            Waveform::Pulse(_) => "pulse",
            Waveform::Noise => "noise",
            Waveform::Custom(_) => "custom",
        }
    }

    /// Whether the waveform repeats with phase (everything except noise)
    pub fn is_periodic(&self) -> bool {
        !matches!(self, Waveform::Noise)
    }

    /// Evaluate the waveform at `phase`
    ///
    /// Noise ignores the phase and returns a fresh random value.
    pub fn sample(&self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (2.0 * PI * phase).sin(),
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Triangle => {
                if phase < 0.5 {
                    4.0 * phase - 1.0
                } else {
                    3.0 - 4.0 * phase
                }
            }
            Waveform::Pulse(width) => {
                if phase > *width {
                    -1.0
                } else {
                    1.0
                }
            }
            Waveform::Noise => rand::random::<f32>() * 2.0 - 1.0,
            Waveform::Custom(f) => f(phase),
        }
    }
}

impl fmt::Debug for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Waveform::Sine => f.write_str("Sine"),
            Waveform::Sawtooth => f.write_str("Sawtooth"),
            Waveform::Triangle => f.write_str("Triangle"),
            Waveform::Pulse(width) => f.debug_tuple("Pulse").field(width).finish(),
            Waveform::Noise => f.write_str("Noise"),
            Waveform::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_waveform() {
        let wave = Waveform::Sine;
        assert!(wave.sample(0.0).abs() < 1e-6);
        assert!((wave.sample(0.25) - 1.0).abs() < 1e-6);
        assert!((wave.sample(0.75) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_sawtooth_waveform() {
        let wave = Waveform::Sawtooth;
        assert_eq!(wave.sample(0.0), -1.0);
        assert_eq!(wave.sample(0.25), -0.5);
        assert_eq!(wave.sample(0.5), 0.0);
        assert_eq!(wave.sample(1.0), 1.0);
    }

    #[test]
    fn test_triangle_waveform() {
        let wave = Waveform::Triangle;
        assert_eq!(wave.sample(0.0), -1.0);
        assert_eq!(wave.sample(0.25), 0.0);
        assert_eq!(wave.sample(0.5), 1.0);
        assert_eq!(wave.sample(1.0), -1.0);
    }

    #[test]
    fn test_pulse_width() {
        let wave = Waveform::pulse(0.25);
        assert_eq!(wave.sample(0.1), 1.0);
        assert_eq!(wave.sample(0.25), 1.0);
        assert_eq!(wave.sample(0.3), -1.0);
        assert_eq!(wave.sample(0.9), -1.0);

        // Out of range widths are clamped
        assert!(matches!(Waveform::pulse(3.0), Waveform::Pulse(w) if w == 1.0));
    }

    #[test]
    fn test_noise_in_range() {
        let wave = Waveform::Noise;
        assert!(!wave.is_periodic());
        for _ in 0..1000 {
            let sample = wave.sample(0.0);
            assert!((-1.0..=1.0).contains(&sample), "Sample out of range: {}", sample);
        }
    }

    #[test]
    fn test_custom_waveform() {
        let wave = Waveform::custom(|x| x * 0.5);
        assert!(wave.is_periodic());
        assert_eq!(wave.sample(0.5), 0.25);
        assert_eq!(format!("{:?}", wave), "Custom(..)");
    }

    #[test]
    fn test_from_name() {
        assert!(matches!(Waveform::from_name("SAW"), Some(Waveform::Sawtooth)));
        assert!(matches!(Waveform::from_name("square"), Some(Waveform::Pulse(w)) if w == 0.5));
        assert!(matches!(Waveform::from_name("noise"), Some(Waveform::Noise)));
        assert!(Waveform::from_name("organ").is_none());
        assert_eq!(Waveform::Triangle.name(), "triangle");
    }
}
