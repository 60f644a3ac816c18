//! tonegen - ADSR wavetable tone generator

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Builder, Env};
use log::LevelFilter;
use std::sync::{mpsc, Arc};
use std::time::Duration;
use tonegen::config::{self, ToneConfig};
use tonegen::engine::{self, Playback, Recorder, SinkEvent, TraceBackend};
use tonegen::synth::Wavetable;

mod cli;

use cli::{note_frequency, Cli, Commands};

fn main() -> Result<()> {
    Builder::from_env(Env::default().default_filter_or(LevelFilter::Warn.to_string())).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            pitch,
            duration,
            config: config_path,
            dry_run,
        } => {
            let cfg = config::load_or_default(&config_path)?;
            let frequency = pitch.frequency()?;

            if dry_run {
                return dry_run_play(&cfg, frequency, duration);
            }

            let generator = cfg.generator(Arc::new(cfg.backend()))?;
            println!(
                "Playing {:.2} Hz ({}) for {} ms...",
                frequency,
                cfg.waveform,
                duration
            );
            let tone = generator.play(frequency, duration)?;
            tone.wait(None);
        }

        Commands::Hold {
            pitch,
            config: config_path,
        } => {
            let cfg = config::load_or_default(&config_path)?;
            let frequency = pitch.frequency()?;
            let generator = cfg.generator(Arc::new(cfg.backend()))?;

            let (tx, rx) = mpsc::channel();
            ctrlc::set_handler(move || {
                let _ = tx.send(());
            })
            .context("failed to set Ctrl-C handler")?;

            let tone = generator.start(frequency)?;
            println!("Holding {:.2} Hz. Press Ctrl-C to release.", frequency);

            let _ = rx.recv();
            println!("\nReleasing...");
            tone.end();
            tone.wait(None);
        }

        Commands::Chord {
            notes,
            duration,
            delay,
            config: config_path,
        } => {
            let cfg = config::load_or_default(&config_path)?;
            let mut generator = cfg.generator(Arc::new(cfg.backend()))?;
            generator.set_delay_time_ms(delay);

            let frequencies = notes
                .iter()
                .map(|name| note_frequency(name))
                .collect::<Result<Vec<_>>>()?;

            // Prepare every tone first; the shared delay lines up their starts
            let tones = generator.tones(&frequencies)?;

            println!("Playing {} for {} ms...", notes.join(" "), duration);
            for tone in &tones {
                tone.play(Playback::For(Duration::from_millis(duration as u64)))?;
            }
            for tone in &tones {
                tone.wait(None);
            }
        }

        Commands::Export {
            pitch,
            output,
            duration,
            config: config_path,
        } => {
            let cfg = config::load_or_default(&config_path)?;
            let frequency = pitch.frequency()?;
            let sample_rate = cfg.audio.sample_rate;

            let table = Wavetable::build(
                &cfg.waveform()?,
                frequency,
                sample_rate,
                cfg.audio.buffer_size,
            )?;
            let total = (sample_rate as f32 * duration.max(0.0)) as usize;

            println!("Exporting {:.2} Hz to {:?}...", frequency, output);
            println!(
                "  Wavetable: {} periods of {} samples",
                table.count(),
                table.period()
            );

            let mut recorder = Recorder::new(&output, sample_rate)?;
            recorder.write_looped(&table, total)?;
            let written = recorder.samples_written();
            let secs = recorder.duration_secs();
            recorder.finalize()?;
            println!("Wrote {} samples ({:.2}s) to {:?}", written, secs, output);
        }

        Commands::Devices => {
            println!("Available audio devices:\n");

            if let Some(name) = engine::default_device_name() {
                println!("Default output: {}\n", name);
            }

            println!("Output devices:");
            let devices = engine::list_output_devices();
            if devices.is_empty() {
                println!("  (none found)");
            }
            for (name, config) in devices {
                println!(
                    "  - {} ({} Hz, {} ch)",
                    name, config.sample_rate.0, config.channels
                );
            }
        }

        Commands::Check { config: config_path } => {
            println!("Checking configuration at {:?}...", config_path);

            match config::load_config(&config_path) {
                Ok(cfg) => {
                    println!("Configuration is valid!");
                    println!("  Sample rate: {} Hz", cfg.audio.sample_rate);
                    println!("  Buffer size: {}", cfg.audio.buffer_size);
                    println!(
                        "  Device: {}",
                        cfg.audio.device.as_deref().unwrap_or("(default)")
                    );
                    println!("  Volume: {:.0}%", cfg.volume * 100.0);
                    println!("  Waveform: {}", cfg.waveform);
                    let env = &cfg.envelope;
                    println!(
                        "  Envelope: A {} ms, D {} ms, S {:.0}%, R {} ms",
                        env.attack_ms,
                        env.decay_ms,
                        env.sustain * 100.0,
                        env.release_ms
                    );
                    println!("  Delay: {} ms, settle: {} ms", env.delay_ms, env.settle_ms);
                }
                Err(e) => {
                    println!("Configuration is invalid: {:#}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Init => {
            let example_config = include_str!("../tonegen.example.yaml");

            let path = "tonegen.yaml";
            if std::path::Path::new(path).exists() {
                println!("tonegen.yaml already exists. Not overwriting.");
            } else {
                std::fs::write(path, example_config)?;
                println!("Created tonegen.yaml with example configuration.");
            }
        }
    }

    Ok(())
}

/// Run a tone against the trace backend and print what the sink was told
fn dry_run_play(cfg: &ToneConfig, frequency: f32, duration: u32) -> Result<()> {
    let backend = TraceBackend::new(cfg.audio.sample_rate, cfg.audio.buffer_size);
    let generator = cfg.generator(Arc::new(backend.clone()))?;

    let tone = generator.play(frequency, duration)?;
    println!(
        "Dry run: {:.2} Hz, {} samples ({} periods)",
        frequency,
        tone.wavetable().len(),
        tone.wavetable().count()
    );
    tone.wait(None);

    for entry in backend.entries() {
        let ms = entry.at.as_secs_f64() * 1000.0;
        match entry.event {
            SinkEvent::Volume(v) => println!("  {:>9.2} ms  volume {:.3}", ms, v),
            event => println!("  {:>9.2} ms  {:?}", ms, event),
        }
    }
    println!("Phases: {:?}", tone.history());

    Ok(())
}
