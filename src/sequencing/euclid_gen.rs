//! Euclidean step generator driven by the 48 PPQN master clock.

use oorandom::Rand32;

use super::{euclid::Pattern, PPQN};

/*
Step Timing
===========

The generator does not keep time itself; it counts rising edges of the
master clock. A step lasts `round(divider × 48)` ticks, so a divider of 0.25
(a sixteenth note) advances every 12 ticks:

    clock  |||||||||||||||||||||||||||||||||||||||||||||||||
    step   0           1           2           3
    gate   ██████      ██████                  ██████          (x x . x)

On each step boundary the step index advances modulo the pattern length and
the pattern decides whether the step fires. A firing step can still be
dropped by the density probability and, independently, flagged as accented.

Gate length is a fraction of the step. Steps are counted in ticks but gates
in samples, so the generator measures the interval between clock edges and
converts: gate = fraction × ticks_per_step × samples_per_tick.

After a reset (input edge or control message) the next clock tick plays
step 0 rather than advancing past it.
*/

const DEFAULT_SEED: u64 = 0xe0c1_1d00;
/// Tick interval assumed until two clock edges have been measured (120 BPM).
const DEFAULT_BPM: f32 = 120.0;
/// Clock edges further apart than this are not used as the tick interval.
const MAX_TICK_SECONDS: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EuclidSettings {
    pub length: usize,
    pub pulses: usize,
    pub rotation: usize,
    /// Step length in quarter notes.
    pub divider: f32,
    pub density: f32,
    pub accent: f32,
    /// Gate length as a fraction of the step.
    pub gate: f32,
}

impl Default for EuclidSettings {
    fn default() -> Self {
        Self {
            length: 16,
            pulses: 4,
            rotation: 0,
            divider: 0.25,
            density: 1.0,
            accent: 0.0,
            gate: 0.5,
        }
    }
}

impl EuclidSettings {
    /// Ticks per step, never less than one.
    pub fn step_ticks(&self) -> u32 {
        let ticks = (self.divider * PPQN as f32).round();
        if ticks.is_finite() {
            ticks.max(1.0) as u32
        } else {
            PPQN / 4
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepEvent {
    pub index: usize,
    pub fired: bool,
    pub accent: bool,
}

/// Output levels for one sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EuclidFrame {
    pub gate: bool,
    pub accent: bool,
    pub step: Option<StepEvent>,
}

pub struct EuclidGenerator {
    pattern: Pattern,
    step: usize,
    tick_in_step: u32,
    restart: bool,

    gate_remaining: u32,
    accent: bool,

    samples_since_tick: u32,
    tick_interval: f32,
    max_tick_samples: u32,
    rng: Rand32,
}

impl EuclidGenerator {
    pub fn new(sample_rate: f32) -> Self {
        Self::with_seed(sample_rate, DEFAULT_SEED)
    }

    pub fn with_seed(sample_rate: f32, seed: u64) -> Self {
        let sample_rate = sample_rate.max(1.0);
        Self {
            pattern: Pattern::default(),
            step: 0,
            tick_in_step: 0,
            restart: true,
            gate_remaining: 0,
            accent: false,
            // No previous edge yet: the first tick is not a measurement.
            samples_since_tick: u32::MAX,
            tick_interval: 60.0 * sample_rate / (DEFAULT_BPM * PPQN as f32),
            max_tick_samples: (MAX_TICK_SECONDS * sample_rate) as u32,
            rng: Rand32::new(seed),
        }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// Restart at step 0 on the next tick.
    pub fn reset(&mut self) {
        self.restart = true;
        self.tick_in_step = 0;
    }

    /// Apply length/pulses/rotation; the pattern is rebuilt only on change.
    pub fn configure(&mut self, settings: &EuclidSettings) -> bool {
        self.pattern
            .update(settings.length, settings.pulses, settings.rotation)
    }

    fn fire(&mut self, settings: &EuclidSettings) -> StepEvent {
        let on_pattern = self.pattern.get(self.step);
        // Both draws happen on every step so the random sequence does not
        // depend on which steps are active.
        let density_roll = self.rng.rand_float();
        let accent_roll = self.rng.rand_float();

        let fired = on_pattern && density_roll < settings.density.clamp(0.0, 1.0);
        let accent = fired && accent_roll < settings.accent.clamp(0.0, 1.0);

        if fired {
            let step_samples = settings.step_ticks() as f32 * self.tick_interval;
            let gate = (settings.gate.clamp(0.05, 0.95) * step_samples).round();
            self.gate_remaining = gate.max(1.0) as u32;
            self.accent = accent;
        }

        StepEvent {
            index: self.step,
            fired,
            accent,
        }
    }

    fn on_tick(&mut self, settings: &EuclidSettings) -> Option<StepEvent> {
        if self.restart {
            self.restart = false;
            self.step = 0;
            self.tick_in_step = 0;
            return Some(self.fire(settings));
        }

        self.tick_in_step += 1;
        if self.tick_in_step < settings.step_ticks() {
            return None;
        }
        self.tick_in_step = 0;
        self.step = (self.step + 1) % self.pattern.len();
        Some(self.fire(settings))
    }

    /// Advance one sample. `tick` is a rising clock edge, `reset` a rising
    /// reset edge (applied before the tick on the same sample).
    pub fn next_sample(&mut self, tick: bool, reset: bool, settings: &EuclidSettings) -> EuclidFrame {
        if reset {
            self.reset();
        }

        self.samples_since_tick = self.samples_since_tick.saturating_add(1);
        let mut step = None;
        if tick {
            if self.samples_since_tick <= self.max_tick_samples {
                self.tick_interval = self.samples_since_tick as f32;
            }
            self.samples_since_tick = 0;
            step = self.on_tick(settings);
        }

        let frame = EuclidFrame {
            gate: self.gate_remaining > 0,
            accent: self.gate_remaining > 0 && self.accent,
            step,
        };
        self.gate_remaining = self.gate_remaining.saturating_sub(1);
        frame
    }
}
