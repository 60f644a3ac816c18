//! CLI interface for tonegen

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Play ADSR-shaped tones from the command line
#[derive(Parser)]
#[command(name = "tonegen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Play a tone for a fixed duration
    Play {
        #[command(flatten)]
        pitch: Pitch,

        /// Duration in milliseconds, from the start of the attack
        #[arg(short, long, default_value = "1000")]
        duration: u32,

        /// Configuration file path
        #[arg(short, long, default_value = "tonegen.yaml")]
        config: PathBuf,

        /// Print the volume trace instead of using an audio device
        #[arg(long)]
        dry_run: bool,
    },

    /// Hold a tone until Ctrl-C
    Hold {
        #[command(flatten)]
        pitch: Pitch,

        /// Configuration file path
        #[arg(short, long, default_value = "tonegen.yaml")]
        config: PathBuf,
    },

    /// Play several notes together
    Chord {
        /// Note names, e.g. C E G
        #[arg(required = true)]
        notes: Vec<String>,

        /// Duration in milliseconds, from the start of the attack
        #[arg(short, long, default_value = "1000")]
        duration: u32,

        /// Start delay that lines the notes up, in milliseconds
        #[arg(long, default_value = "100")]
        delay: f32,

        /// Configuration file path
        #[arg(short, long, default_value = "tonegen.yaml")]
        config: PathBuf,
    },

    /// Write a tone's wavetable to a WAV file
    Export {
        #[command(flatten)]
        pitch: Pitch,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Duration in seconds
        #[arg(short, long, default_value = "2")]
        duration: f32,

        /// Configuration file path
        #[arg(short, long, default_value = "tonegen.yaml")]
        config: PathBuf,
    },

    /// List available audio output devices
    Devices,

    /// Validate a configuration file
    Check {
        /// Configuration file path
        #[arg(short, long, default_value = "tonegen.yaml")]
        config: PathBuf,
    },

    /// Generate an example configuration file
    Init,
}

/// Pitch given either in Hz or as a note name
#[derive(Args)]
pub struct Pitch {
    /// Frequency in Hz
    #[arg(short, long, conflicts_with = "note")]
    pub frequency: Option<f32>,

    /// Note name (C D E F G A B, sharps like C#, or C5)
    #[arg(short, long)]
    pub note: Option<String>,
}

impl Pitch {
    /// Resolve to a frequency, defaulting to A (440 Hz)
    pub fn frequency(&self) -> Result<f32> {
        match (self.frequency, &self.note) {
            (Some(f), _) => Ok(f),
            (None, Some(name)) => note_frequency(name),
            (None, None) => Ok(440.0),
        }
    }
}

/// Frequencies of the one-octave keyboard, from middle C up to C5
const NOTES: &[(&str, f32)] = &[
    ("C", 261.64),
    ("C#", 277.18),
    ("D", 293.66),
    ("D#", 311.13),
    ("E", 329.63),
    ("F", 349.23),
    ("F#", 369.99),
    ("G", 392.0),
    ("G#", 415.3),
    ("A", 440.0),
    ("A#", 466.16),
    ("B", 493.88),
    ("C5", 523.25),
];

/// Look up a note name (case-insensitive)
pub fn note_frequency(name: &str) -> Result<f32> {
    let name = name.trim().to_uppercase();
    match NOTES.iter().find(|(note, _)| *note == name) {
        Some((_, frequency)) => Ok(*frequency),
        None => bail!("Unknown note '{}'", name),
    }
}
