//! tonegen - ADSR wavetable tone generator
//!
//! Builds a looped wavetable for one frequency, hands it to an audio output
//! and shapes its volume with an attack-decay-sustain-release envelope on a
//! thread of its own. Each tone owns its output, so any number can play at
//! once.

pub mod config;
pub mod engine;
pub mod error;
pub mod synth;

pub use config::ToneConfig;
pub use engine::{Tone, ToneGenerator};
pub use error::{SinkError, ToneError};
pub use synth::Waveform;
