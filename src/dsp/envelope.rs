#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::util::{flush_denormal, one_pole_coeff};
use crate::MIN_TIME;

/*
ADSR Envelope Implementation
============================

The envelope is the workhorse of modular control: a gate goes high, the level
rises, falls back to a plateau, and sinks to zero when the gate drops.

Vocabulary
----------

  level       The envelope's current value (0.0 to 1.0). The unit scales it
              to volts on the way out.

  stage       Which phase we are in: Idle, Attack, Decay, Sustain or Release.

  gate        Rising edge starts Attack, falling edge starts Release from
              wherever we are. Edge detection lives in the unit (Schmitt
              trigger); the envelope only sees `gate_on` / `gate_off`.

  shape       Exponential (one-pole approach) or Linear (counted ramp).


The Shape
---------

  Level
    1.0 ┐     ╱╲
        │    ╱  ╲___________
    S   │   ╱               ╲
        │  ╱                 ╲
    0.0 └─╱───────────────────╲──→ Time
        Attack Decay  Sustain  Release


Exponential Stages
------------------

A one-pole filter chasing a target never arrives, so every exponential stage
ends on a tolerance instead. The time constant is chosen so that tolerance is
crossed inside the stage's window:

    τ = T / ln(2 / ε),  ε = 1e-3

After T seconds the remaining distance is ε/2 of the starting distance, so
the attack is above 99.9 % and the decay within 0.1 % of sustain when their
windows close. Release ends on an absolute floor of 1e-4.


Linear Stages
-------------

Linear stages are driven by a sample counter, not by adding an increment:

    level = start + (target - start) · elapsed / total

When `elapsed == total` the level is assigned the target exactly, so there
is no overshoot and no residual drift from accumulated rounding. Attack keeps
a constant slope: starting from a non-zero level (no retrigger) shortens the
ramp in proportion to the remaining distance.


The State Machine
-----------------

    ┌──────┐ gate_on  ┌────────┐ ceiling  ┌───────┐ sustain ┌─────────┐
    │ Idle │ ───────→ │ Attack │ ───────→ │ Decay │ ──────→ │ Sustain │
    └──────┘          └────────┘          └───────┘         └─────────┘
        ↑                  │ gate_off          │ gate_off        │ gate_off
        │    floor    ┌─────────┐ ←────────────┴─────────────────┘
        └──────────── │ Release │ ←──┘
                      └─────────┘

gate_off from any active stage goes to Release, starting from the CURRENT
level, so releasing mid-attack never clicks. In Sustain the level follows
the sustain setting through a short smoother so knob moves stay click-free.
*/

/// Attack and decay end when they are this close to their target.
pub const STAGE_EPSILON: f32 = 1e-3;
/// Release ends below this level.
pub const RELEASE_FLOOR: f32 = 1e-4;
/// Smoothing applied to sustain-level changes while holding.
const SUSTAIN_SMOOTHING: f32 = 0.005;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeShape {
    Exponential,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeSettings {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
    pub shape: EnvelopeShape,
}

impl Default for EnvelopeSettings {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.2,
            sustain: 0.7,
            release: 0.3,
            shape: EnvelopeShape::Exponential,
        }
    }
}

impl EnvelopeSettings {
    fn sanitized(self) -> Self {
        let time = |t: f32| if t.is_finite() { t.max(MIN_TIME) } else { MIN_TIME };
        Self {
            attack: time(self.attack),
            decay: time(self.decay),
            sustain: if self.sustain.is_finite() {
                self.sustain.clamp(0.0, 1.0)
            } else {
                0.0
            },
            release: time(self.release),
            shape: self.shape,
        }
    }
}

/// Counted linear segment.
#[derive(Debug, Clone, Copy)]
struct Ramp {
    start: f32,
    target: f32,
    total: u32,
    elapsed: u32,
}

impl Ramp {
    fn new(start: f32, target: f32, samples: f32) -> Self {
        Self {
            start,
            target,
            total: samples.round().max(1.0) as u32,
            elapsed: 0,
        }
    }

    fn idle() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }

    /// Advance one sample; returns the level and whether the target was hit.
    #[inline]
    fn next(&mut self) -> (f32, bool) {
        self.elapsed = self.elapsed.saturating_add(1);
        if self.elapsed >= self.total {
            return (self.target, true);
        }
        let progress = self.elapsed as f32 / self.total as f32;
        (self.start + (self.target - self.start) * progress, false)
    }
}

pub struct Envelope {
    settings: EnvelopeSettings,
    sample_rate: f32,

    attack_coeff: f32,
    decay_coeff: f32,
    release_coeff: f32,
    sustain_coeff: f32,

    stage: EnvelopeStage,
    level: f32,
    ramp: Ramp,
}

impl Envelope {
    pub fn new(sample_rate: f32) -> Self {
        Self::with_settings(EnvelopeSettings::default(), sample_rate)
    }

    pub fn adsr(attack: f32, decay: f32, sustain: f32, release: f32, sample_rate: f32) -> Self {
        Self::with_settings(
            EnvelopeSettings {
                attack,
                decay,
                sustain,
                release,
                shape: EnvelopeShape::Exponential,
            },
            sample_rate,
        )
    }

    pub fn with_settings(settings: EnvelopeSettings, sample_rate: f32) -> Self {
        let mut env = Self {
            settings: settings.sanitized(),
            sample_rate: sample_rate.max(1.0),
            attack_coeff: 1.0,
            decay_coeff: 1.0,
            release_coeff: 1.0,
            sustain_coeff: 1.0,
            stage: EnvelopeStage::Idle,
            level: 0.0,
            ramp: Ramp::idle(),
        };
        env.update_coefficients();
        env
    }

    fn update_coefficients(&mut self) {
        let ln = (2.0 / STAGE_EPSILON).ln();
        let s = self.settings;
        self.attack_coeff = one_pole_coeff(s.attack / ln, self.sample_rate);
        self.decay_coeff = one_pole_coeff(s.decay / ln, self.sample_rate);
        self.release_coeff = one_pole_coeff(s.release / ln, self.sample_rate);
        self.sustain_coeff = one_pole_coeff(SUSTAIN_SMOOTHING, self.sample_rate);
    }

    /// Apply new times/levels. Coefficients are only recomputed on change.
    pub fn set_settings(&mut self, settings: EnvelopeSettings) {
        let settings = settings.sanitized();
        if settings != self.settings {
            self.settings = settings;
            self.update_coefficients();
        }
    }

    pub fn settings(&self) -> EnvelopeSettings {
        self.settings
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate.max(1.0);
        self.update_coefficients();
    }

    /// Gate high: enter Attack, from zero when `retrigger` is set.
    pub fn gate_on(&mut self, retrigger: bool) {
        if retrigger {
            self.level = 0.0;
        }
        self.stage = EnvelopeStage::Attack;
        let remaining = (1.0 - self.level).max(0.0);
        self.ramp = Ramp::new(
            self.level,
            1.0,
            self.settings.attack * self.sample_rate * remaining,
        );
    }

    /// Gate low: enter Release from the current level.
    pub fn gate_off(&mut self) {
        if self.stage == EnvelopeStage::Idle || self.stage == EnvelopeStage::Release {
            return;
        }
        self.stage = EnvelopeStage::Release;
        self.ramp = Ramp::new(self.level, 0.0, self.settings.release * self.sample_rate);
    }

    fn enter_decay(&mut self) {
        self.level = 1.0;
        self.stage = EnvelopeStage::Decay;
        self.ramp = Ramp::new(
            1.0,
            self.settings.sustain,
            self.settings.decay * self.sample_rate,
        );
    }

    /// Advance the envelope by one sample and return the new level.
    pub fn next_sample(&mut self) -> f32 {
        let linear = self.settings.shape == EnvelopeShape::Linear;
        let sustain = self.settings.sustain;

        match self.stage {
            EnvelopeStage::Idle => {
                self.level = 0.0;
            }

            EnvelopeStage::Attack => {
                let done = if linear {
                    let (level, done) = self.ramp.next();
                    self.level = level;
                    done
                } else {
                    self.level += (1.0 - self.level) * self.attack_coeff;
                    self.level >= 1.0 - STAGE_EPSILON
                };
                if done {
                    self.enter_decay();
                }
            }

            EnvelopeStage::Decay => {
                let done = if linear {
                    let (level, done) = self.ramp.next();
                    self.level = level;
                    done
                } else {
                    self.level += (sustain - self.level) * self.decay_coeff;
                    (self.level - sustain).abs() <= STAGE_EPSILON
                };
                if done {
                    self.level = sustain;
                    self.stage = EnvelopeStage::Sustain;
                }
            }

            EnvelopeStage::Sustain => {
                self.level = flush_denormal(self.level + (sustain - self.level) * self.sustain_coeff);
            }

            EnvelopeStage::Release => {
                let done = if linear {
                    let (level, done) = self.ramp.next();
                    self.level = level;
                    done
                } else {
                    self.level += -self.level * self.release_coeff;
                    self.level <= RELEASE_FLOOR
                };
                if done {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
        }

        if !self.level.is_finite() {
            self.reset();
        }
        self.level = self.level.clamp(0.0, 1.0);
        self.level
    }

    /// Render a block of envelope values into the buffer.
    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample();
        }
    }

    /// Returns true if the envelope is producing output (not idle).
    pub fn is_active(&self) -> bool {
        self.stage != EnvelopeStage::Idle
    }

    pub fn reset(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.level = 0.0;
        self.ramp = Ramp::idle();
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }
}
