//! Sample generation
//!
//! Waveform shapes, the wavetables built from them and the ADSR envelope
//! that shapes a tone's volume over time.

mod envelope;
mod waveform;
mod wavetable;

pub use envelope::{fade, millis, Envelope, EnvelopeStage, ENVELOPE_STEPS, MIN_STEP};
pub use waveform::{WaveFn, Waveform};
pub use wavetable::{
    check_frequency, max_frequency, Wavetable, MAX_FREQUENCY, MIN_FREQUENCY, SAMPLE_RATE,
};
