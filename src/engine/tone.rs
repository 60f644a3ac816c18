//! Single tone playback
//!
//! A tone owns one output sink and one wavetable. Once started it walks the
//! envelope on its own thread: optional delay, attack, decay, sustain,
//! release, stopped. All of that happens under the tone's lock; the waits in
//! between release the lock so that `end()` can get in from any thread.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use super::sink::{AudioBackend, LoopCount, SinkGuard};
use crate::error::ToneError;
use crate::synth::{Envelope, EnvelopeStage, Waveform, Wavetable};

/// Where a tone is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Delay,
    Attack,
    Decay,
    Sustain,
    Release,
    Stopped,
}

/// How long the sustain stage lasts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    /// Total length measured from the start of the attack
    ///
    /// [`Tone::end`] still cuts the sustain short and moves on to release.
    For(Duration),
    /// Until [`Tone::end`] is called
    Hold,
}

/// Everything a tone copies from its generator when it is created
#[derive(Debug, Clone)]
pub struct ToneSettings {
    pub envelope: Envelope,
    pub waveform: Waveform,
    /// Pause before and after stopping the sink
    pub settle: Duration,
}

impl Default for ToneSettings {
    fn default() -> Self {
        Self {
            envelope: Envelope::new(),
            waveform: Waveform::Sine,
            settle: Duration::from_millis(500),
        }
    }
}

struct ToneState {
    phase: Phase,
    phase_start: Instant,
    history: Vec<Phase>,
    end_requested: bool,
    playback: Option<Playback>,
    volume: f32,
    sink: SinkGuard,
}

impl ToneState {
    fn enter(&mut self, phase: Phase) {
        log::debug!("tone phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
        self.phase_start = Instant::now();
        self.history.push(phase);
    }

    fn set_volume(&mut self, volume: f32) {
        log::trace!("volume {:.3}", volume);
        self.volume = volume;
        self.sink.set_volume(volume);
    }
}

struct Shared {
    state: Mutex<ToneState>,
    signal: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ToneState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, state: MutexGuard<'a, ToneState>) -> MutexGuard<'a, ToneState> {
        self.signal.wait(state).unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_timeout<'a>(
        &self,
        state: MutexGuard<'a, ToneState>,
        timeout: Duration,
    ) -> MutexGuard<'a, ToneState> {
        match self.signal.wait_timeout(state, timeout) {
            Ok((state, _)) => state,
            Err(poisoned) => poisoned.into_inner().0,
        }
    }
}

/// A single playing (or playable) tone
///
/// Created by [`ToneGenerator`](super::ToneGenerator). Dropping the handle of
/// a held tone ends it; fixed-length tones play out regardless.
pub struct Tone {
    frequency: f32,
    wavetable: Wavetable,
    settings: ToneSettings,
    created: Instant,
    shared: Arc<Shared>,
}

impl Tone {
    /// Build the wavetable and open a sink for it, silent and looping
    ///
    /// Fails before touching the backend if the frequency is out of range.
    pub fn new(
        backend: &dyn AudioBackend,
        frequency: f32,
        settings: ToneSettings,
    ) -> Result<Self, ToneError> {
        Self::with_origin(backend, frequency, settings, Instant::now())
    }

    /// Like [`Tone::new`], counting the start delay from `origin`
    ///
    /// Tones prepared with the same origin and a delay longer than their
    /// combined setup time start together.
    pub fn with_origin(
        backend: &dyn AudioBackend,
        frequency: f32,
        settings: ToneSettings,
        created: Instant,
    ) -> Result<Self, ToneError> {
        let wavetable = Wavetable::build(
            &settings.waveform,
            frequency,
            backend.sample_rate(),
            backend.min_buffer_samples(),
        )?;

        let mut sink = SinkGuard::new(backend.open(wavetable.len())?);
        sink.set_volume(0.0);
        sink.write_static(wavetable.samples())?;
        sink.set_loop_points(0, wavetable.len(), LoopCount::Infinite)?;

        let state = ToneState {
            phase: Phase::Created,
            phase_start: created,
            history: vec![Phase::Created],
            end_requested: false,
            playback: None,
            volume: 0.0,
            sink,
        };

        Ok(Self {
            frequency,
            wavetable,
            settings,
            created,
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                signal: Condvar::new(),
            }),
        })
    }

    /// Start playback on a new thread and return immediately
    ///
    /// A tone can only be started once.
    pub fn play(&self, playback: Playback) -> Result<(), ToneError> {
        {
            let mut state = self.shared.lock();
            if state.playback.is_some() {
                return Err(ToneError::AlreadyStarted);
            }
            state.playback = Some(playback);
        }

        let runner = Runner {
            shared: Arc::clone(&self.shared),
            envelope: self.settings.envelope,
            settle: self.settings.settle,
            playback,
            created: self.created,
        };

        thread::Builder::new()
            .name(format!("tone-{:.0}hz", self.frequency))
            .spawn(move || runner.run())?;
        Ok(())
    }

    /// Let the tone go: move on to release, or stop if nothing is audible yet
    ///
    /// Safe to call from any thread, any number of times.
    pub fn end(&self) {
        let mut state = self.shared.lock();
        if state.phase != Phase::Stopped {
            state.end_requested = true;
        }
        drop(state);
        self.shared.signal.notify_all();
    }

    /// Block until the tone has stopped and released its sink
    ///
    /// Returns false on timeout, or right away if the tone was never started.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.shared.lock();

        while state.phase != Phase::Stopped {
            if state.playback.is_none() {
                return false;
            }
            state = match deadline {
                None => self.shared.wait(state),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    self.shared.wait_timeout(state, deadline - now)
                }
            };
        }
        true
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn wavetable(&self) -> &Wavetable {
        &self.wavetable
    }

    /// The settings captured at construction
    pub fn settings(&self) -> &ToneSettings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        self.shared.lock().phase
    }

    /// Volume most recently pushed to the sink
    pub fn volume(&self) -> f32 {
        self.shared.lock().volume
    }

    /// Every phase entered so far, starting with `Created`
    pub fn history(&self) -> Vec<Phase> {
        self.shared.lock().history.clone()
    }

    pub fn is_started(&self) -> bool {
        self.shared.lock().playback.is_some()
    }

    pub fn is_stopped(&self) -> bool {
        self.phase() == Phase::Stopped
    }
}

impl fmt::Debug for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tone")
            .field("frequency", &self.frequency)
            .field("waveform", &self.settings.waveform)
            .field("phase", &self.phase())
            .finish()
    }
}

impl Drop for Tone {
    fn drop(&mut self) {
        let held = self.shared.lock().playback == Some(Playback::Hold);
        if held {
            self.end();
        }
    }
}

/// The envelope state machine, run on the tone's thread
struct Runner {
    shared: Arc<Shared>,
    envelope: Envelope,
    settle: Duration,
    playback: Playback,
    created: Instant,
}

impl Runner {
    fn run(&self) {
        let mut state = self.shared.lock();

        // Even out preparation time so tones triggered together start together
        let remaining = self.envelope.delay.saturating_sub(self.created.elapsed());
        log::debug!("remaining delay {:?}", remaining);
        if !remaining.is_zero() {
            state.enter(Phase::Delay);
            state = self.wait_until(state, Instant::now() + remaining, true);
        }
        if state.end_requested {
            // Ended before anything was audible
            self.finish(state);
            return;
        }

        state.enter(Phase::Attack);
        let start = state.phase_start;
        if let Err(e) = state.sink.play() {
            log::warn!("failed to start playback: {}", e);
            self.finish(state);
            return;
        }

        let env = self.envelope;
        state = self.ramp(state, EnvelopeStage::Attack, |t| env.attack_volume(t));
        if !state.end_requested {
            state.enter(Phase::Decay);
            state = self.ramp(state, EnvelopeStage::Decay, |t| env.decay_volume(t));
        }

        if state.volume > 0.0 {
            if !state.end_requested {
                state.enter(Phase::Sustain);
                state = self.sustain(state, start);
            }

            state.enter(Phase::Release);
            let from = state.volume;
            state = self.ramp(state, EnvelopeStage::Release, |t| {
                env.release_volume(from, t)
            });
        }

        self.finish(state);
    }

    /// Step the volume through one timed stage
    ///
    /// Attack and decay stop early when an end is requested.
    fn ramp<'a>(
        &'a self,
        mut state: MutexGuard<'a, ToneState>,
        stage: EnvelopeStage,
        volume_at: impl Fn(Duration) -> f32,
    ) -> MutexGuard<'a, ToneState> {
        let duration = self.envelope.duration(stage).unwrap_or_default();
        let step = self.envelope.step_interval(stage);
        let interruptible = stage != EnvelopeStage::Release;
        let begin = state.phase_start;

        loop {
            if !(interruptible && state.end_requested) {
                state = self.shared.wait_timeout(state, step);
            }
            // Elapsed time comes from the clock, not the step count
            let elapsed = begin.elapsed();
            state.set_volume(volume_at(elapsed));

            if elapsed >= duration || (interruptible && state.end_requested) {
                return state;
            }
        }
    }

    fn sustain<'a>(
        &'a self,
        mut state: MutexGuard<'a, ToneState>,
        start: Instant,
    ) -> MutexGuard<'a, ToneState> {
        match self.playback {
            Playback::Hold => {
                while !state.end_requested {
                    state = self.shared.wait(state);
                }
                state
            }
            Playback::For(duration) => self.wait_until(state, start + duration, true),
        }
    }

    fn wait_until<'a>(
        &'a self,
        mut state: MutexGuard<'a, ToneState>,
        deadline: Instant,
        interruptible: bool,
    ) -> MutexGuard<'a, ToneState> {
        loop {
            if interruptible && state.end_requested {
                return state;
            }
            let now = Instant::now();
            if now >= deadline {
                return state;
            }
            state = self.shared.wait_timeout(state, deadline - now);
        }
    }

    /// Settle, stop the sink, settle again. The sink is released on drop.
    fn finish(&self, state: MutexGuard<'_, ToneState>) {
        let mut state = self.wait_until(state, Instant::now() + self.settle, false);
        if let Err(e) = state.sink.stop() {
            log::warn!("failed to stop playback: {}", e);
        }
        drop(self.wait_until(state, Instant::now() + self.settle, false));
    }
}

impl Drop for Runner {
    // Runs on every exit from the tone thread, including a panic
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.sink.release();
        if state.phase != Phase::Stopped {
            state.enter(Phase::Stopped);
        }
        drop(state);
        self.shared.signal.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{SinkEvent, TraceBackend};

    const WAIT: Option<Duration> = Some(Duration::from_secs(5));

    fn settings(attack: f32, decay: f32, sustain: f32, release: f32) -> ToneSettings {
        let mut envelope = Envelope::new();
        envelope.set_attack_ms(attack);
        envelope.set_decay_ms(decay);
        envelope.set_sustain(sustain);
        envelope.set_release_ms(release);
        ToneSettings {
            envelope,
            waveform: Waveform::Sine,
            settle: Duration::ZERO,
        }
    }

    /// Volumes pushed after playback started
    fn played_volumes(backend: &TraceBackend) -> Vec<f32> {
        let play_at = backend.first(0, &SinkEvent::Play).unwrap();
        backend
            .volumes(0)
            .into_iter()
            .filter(|(at, _)| *at >= play_at)
            .map(|(_, v)| v)
            .collect()
    }

    #[test]
    fn test_construction_prepares_silent_loop() {
        let backend = TraceBackend::default();
        let tone = Tone::new(&backend, 440.0, settings(10.0, 10.0, 0.5, 10.0)).unwrap();
        let len = tone.wavetable().len();

        assert_eq!(tone.phase(), Phase::Created);
        assert!(!tone.is_started());
        assert_eq!(
            backend.events(0),
            vec![
                SinkEvent::Open { buffer_samples: len },
                SinkEvent::Volume(0.0),
                SinkEvent::Write { samples: len },
                SinkEvent::LoopPoints {
                    start: 0,
                    end: len,
                    count: LoopCount::Infinite
                },
            ]
        );
    }

    #[test]
    fn test_out_of_range_frequency_opens_nothing() {
        let backend = TraceBackend::default();
        for frequency in [0.0, 20000.0] {
            let result = Tone::new(&backend, frequency, ToneSettings::default());
            assert!(matches!(result, Err(ToneError::FrequencyOutOfRange { .. })));
        }
        assert_eq!(backend.opened(), 0);
    }

    #[test]
    fn test_sink_open_failure() {
        let backend = TraceBackend::default().failing();
        let result = Tone::new(&backend, 440.0, ToneSettings::default());
        assert!(matches!(result, Err(ToneError::Sink(_))));
    }

    #[test]
    fn test_unstarted_tone_releases_sink_on_drop() {
        let backend = TraceBackend::default();
        let tone = Tone::new(&backend, 440.0, ToneSettings::default()).unwrap();
        assert!(!tone.wait(WAIT));
        drop(tone);
        assert_eq!(backend.released(), 1);
        assert!(!backend.events(0).contains(&SinkEvent::Play));
    }

    #[test]
    fn test_fixed_duration_runs_full_envelope() {
        let backend = TraceBackend::default();
        let tone = Tone::new(&backend, 440.0, settings(20.0, 40.0, 0.5, 30.0)).unwrap();
        tone.play(Playback::For(Duration::from_millis(100))).unwrap();

        assert!(tone.wait(WAIT));
        assert_eq!(
            tone.history(),
            vec![
                Phase::Created,
                Phase::Attack,
                Phase::Decay,
                Phase::Sustain,
                Phase::Release,
                Phase::Stopped,
            ]
        );

        let volumes = played_volumes(&backend);
        let peak = volumes.iter().cloned().fold(0.0, f32::max);
        assert_eq!(peak, 1.0);

        // Rising up to the peak, never rising after it
        let top = volumes.iter().position(|&v| v == peak).unwrap();
        assert!(volumes[..=top].windows(2).all(|w| w[0] <= w[1]));
        assert!(volumes[top..].windows(2).all(|w| w[0] >= w[1]));
        assert!(volumes.iter().any(|&v| (v - 0.5).abs() < 1e-6));
        assert_eq!(*volumes.last().unwrap(), 0.0);

        // Sustain is anchored to the attack start, then the release follows
        let play_at = backend.first(0, &SinkEvent::Play).unwrap();
        let stop_at = backend.first(0, &SinkEvent::Stop).unwrap();
        assert!(stop_at - play_at >= Duration::from_millis(125));

        let events = backend.events(0);
        assert_eq!(events.last(), Some(&SinkEvent::Release));
        assert_eq!(backend.released(), 1);
    }

    /// Largest drop between two consecutive volume pushes
    fn largest_drop(volumes: &[f32]) -> f32 {
        volumes
            .windows(2)
            .map(|w| w[0] - w[1])
            .fold(0.0, f32::max)
    }

    #[test]
    fn test_end_during_attack_releases_from_current_volume() {
        let backend = TraceBackend::default();
        let tone = Tone::new(&backend, 261.64, settings(1000.0, 300.0, 0.8, 200.0)).unwrap();
        tone.play(Playback::Hold).unwrap();

        thread::sleep(Duration::from_millis(100));
        tone.end();
        assert!(tone.wait(WAIT));

        assert_eq!(
            tone.history(),
            vec![Phase::Created, Phase::Attack, Phase::Release, Phase::Stopped]
        );

        // Release starts well below both the peak and the sustain level
        let volumes = played_volumes(&backend);
        let peak = volumes.iter().cloned().fold(0.0, f32::max);
        assert!(peak > 0.0 && peak < 0.6, "peak {}", peak);

        // and picks up right where the attack left off
        let top = volumes.iter().position(|&v| v == peak).unwrap();
        let first_release = volumes[top + 1];
        assert!(first_release <= peak);
        assert!(first_release >= peak * 0.8, "{} after {}", first_release, peak);
        assert!(volumes[top..].windows(2).all(|w| w[0] >= w[1]));

        assert_eq!(*volumes.last().unwrap(), 0.0);
        assert_eq!(backend.released(), 1);
    }

    #[test]
    fn test_end_during_decay_releases_from_current_volume() {
        let backend = TraceBackend::default();
        let tone = Tone::new(&backend, 440.0, settings(5.0, 1000.0, 0.2, 200.0)).unwrap();
        tone.play(Playback::Hold).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while tone.phase() != Phase::Decay && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        thread::sleep(Duration::from_millis(100));
        let before_end = tone.volume();
        tone.end();
        assert!(tone.wait(WAIT));

        assert_eq!(
            tone.history(),
            vec![
                Phase::Created,
                Phase::Attack,
                Phase::Decay,
                Phase::Release,
                Phase::Stopped,
            ]
        );

        // Still high on the decay curve, nowhere near the sustain level
        assert!(before_end > 0.5, "volume {}", before_end);

        // A release restarted from the sustain level would show up as a jump
        let volumes = played_volumes(&backend);
        let top = volumes.iter().position(|&v| v == 1.0).unwrap();
        assert!(volumes[top..].windows(2).all(|w| w[0] >= w[1]));
        assert!(largest_drop(&volumes[top..]) < 0.1, "drop {}", largest_drop(&volumes));
        assert_eq!(*volumes.last().unwrap(), 0.0);
    }

    #[test]
    fn test_end_before_play_never_plays() {
        let backend = TraceBackend::default();
        let tone = Tone::new(&backend, 440.0, settings(5.0, 5.0, 0.5, 5.0)).unwrap();

        tone.end();
        tone.play(Playback::Hold).unwrap();
        assert!(tone.wait(WAIT));

        assert_eq!(tone.history(), vec![Phase::Created, Phase::Stopped]);
        assert!(!backend.events(0).contains(&SinkEvent::Play));
        // Only the silent volume set while preparing the sink
        assert_eq!(backend.volumes(0).len(), 1);
        assert_eq!(backend.released(), 1);
    }

    #[test]
    fn test_held_tone_ended_early() {
        let backend = TraceBackend::default();
        let mut settings = ToneSettings::default();
        settings.settle = Duration::ZERO;

        let tone = Tone::new(&backend, 261.64, settings).unwrap();
        tone.play(Playback::Hold).unwrap();

        // End 5 ms into the attack, not before the tone thread gets going
        let deadline = Instant::now() + Duration::from_secs(5);
        while tone.phase() == Phase::Created && Instant::now() < deadline {
            thread::sleep(Duration::from_micros(200));
        }
        thread::sleep(Duration::from_millis(5));
        tone.end();
        assert!(tone.wait(WAIT));

        let history = tone.history();
        assert_eq!(history[..2], [Phase::Created, Phase::Attack]);
        assert!(!history.contains(&Phase::Sustain));
        assert_eq!(history.last(), Some(&Phase::Stopped));
        assert!(backend.events(0).contains(&SinkEvent::Play));
        assert_eq!(tone.volume(), 0.0);
        assert_eq!(backend.released(), 1);
    }

    #[test]
    fn test_end_during_sustain() {
        let backend = TraceBackend::default();
        let tone = Tone::new(&backend, 440.0, settings(5.0, 5.0, 0.6, 20.0)).unwrap();
        tone.play(Playback::Hold).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while tone.phase() != Phase::Sustain && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(tone.phase(), Phase::Sustain);
        assert!((tone.volume() - 0.6).abs() < 1e-6);

        // Held tones sustain until told otherwise
        thread::sleep(Duration::from_millis(50));
        assert_eq!(tone.phase(), Phase::Sustain);

        tone.end();
        assert!(tone.wait(WAIT));
        assert_eq!(
            tone.history()[3..],
            [Phase::Sustain, Phase::Release, Phase::Stopped]
        );
        assert_eq!(tone.volume(), 0.0);

        // Once stopped, ending again does nothing
        tone.end();
        assert!(tone.is_stopped());
        assert_eq!(backend.released(), 1);
    }

    #[test]
    fn test_end_cuts_fixed_duration_short() {
        let backend = TraceBackend::default();
        let tone = Tone::new(&backend, 440.0, settings(5.0, 5.0, 0.5, 5.0)).unwrap();
        tone.play(Playback::For(Duration::from_secs(10))).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while tone.phase() != Phase::Sustain && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        tone.end();
        assert!(tone.wait(WAIT));

        assert!(tone.history().contains(&Phase::Release));
        let play_at = backend.first(0, &SinkEvent::Play).unwrap();
        let stop_at = backend.first(0, &SinkEvent::Stop).unwrap();
        assert!(stop_at - play_at < Duration::from_secs(5));
    }

    #[test]
    fn test_zero_sustain_skips_release() {
        let backend = TraceBackend::default();
        let tone = Tone::new(&backend, 440.0, settings(5.0, 10.0, 0.0, 200.0)).unwrap();
        tone.play(Playback::For(Duration::from_millis(500))).unwrap();

        assert!(tone.wait(WAIT));
        assert_eq!(
            tone.history(),
            vec![Phase::Created, Phase::Attack, Phase::Decay, Phase::Stopped]
        );

        // No sustain wait, no release ramp
        let play_at = backend.first(0, &SinkEvent::Play).unwrap();
        let stop_at = backend.first(0, &SinkEvent::Stop).unwrap();
        assert!(stop_at - play_at < Duration::from_millis(400));
    }

    #[test]
    fn test_play_twice_fails() {
        let backend = TraceBackend::default();
        let tone = Tone::new(&backend, 440.0, settings(1.0, 1.0, 0.5, 1.0)).unwrap();

        tone.play(Playback::For(Duration::from_millis(10))).unwrap();
        assert!(matches!(
            tone.play(Playback::Hold),
            Err(ToneError::AlreadyStarted)
        ));
        assert!(tone.wait(WAIT));
        assert!(matches!(
            tone.play(Playback::Hold),
            Err(ToneError::AlreadyStarted)
        ));
        assert_eq!(backend.opened(), 1);
    }

    #[test]
    fn test_delay_holds_back_playback() {
        let backend = TraceBackend::default();
        let mut settings = settings(1.0, 1.0, 0.5, 1.0);
        settings.envelope.set_delay_ms(80.0);

        let tone = Tone::new(&backend, 440.0, settings).unwrap();
        tone.play(Playback::For(Duration::from_millis(10))).unwrap();
        assert!(tone.wait(WAIT));

        assert_eq!(tone.history()[1], Phase::Delay);
        let open_at = backend.first(0, &SinkEvent::Open { buffer_samples: tone.wavetable().len() });
        let play_at = backend.first(0, &SinkEvent::Play).unwrap();
        assert!(play_at - open_at.unwrap() >= Duration::from_millis(75));
    }

    #[test]
    fn test_end_during_delay_never_plays() {
        let backend = TraceBackend::default();
        let mut settings = settings(1.0, 1.0, 0.5, 1.0);
        settings.envelope.set_delay_ms(2000.0);

        let tone = Tone::new(&backend, 440.0, settings).unwrap();
        tone.play(Playback::Hold).unwrap();
        thread::sleep(Duration::from_millis(20));
        tone.end();

        assert!(tone.wait(WAIT));
        assert_eq!(
            tone.history(),
            vec![Phase::Created, Phase::Delay, Phase::Stopped]
        );
        assert!(!backend.events(0).contains(&SinkEvent::Play));
        assert_eq!(backend.released(), 1);
    }

    #[test]
    fn test_dropping_held_tone_ends_it() {
        let backend = TraceBackend::default();
        let tone = Tone::new(&backend, 440.0, settings(1.0, 1.0, 0.5, 1.0)).unwrap();
        tone.play(Playback::Hold).unwrap();
        drop(tone);

        let deadline = Instant::now() + Duration::from_secs(5);
        while backend.released() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(backend.released(), 1);
    }

    #[test]
    fn test_settle_time_before_stop() {
        let backend = TraceBackend::default();
        let mut settings = settings(1.0, 1.0, 0.0, 1.0);
        settings.settle = Duration::from_millis(40);

        let tone = Tone::new(&backend, 440.0, settings).unwrap();
        tone.play(Playback::For(Duration::from_millis(1))).unwrap();
        assert!(tone.wait(WAIT));

        let play_at = backend.first(0, &SinkEvent::Play).unwrap();
        let stop_at = backend.first(0, &SinkEvent::Stop).unwrap();
        let release_at = backend.first(0, &SinkEvent::Release).unwrap();
        assert!(stop_at - play_at >= Duration::from_millis(40));
        assert!(release_at - stop_at >= Duration::from_millis(40));
    }
}
