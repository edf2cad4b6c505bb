use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/*
Parameters
==========

Every parameter is an f32 stored as raw bits in an AtomicU32. The control
thread stores, the audio thread loads, both with Relaxed ordering: there is
exactly one writer and one reader, nothing else is published alongside the
value, and a reader seeing the previous value for one more block is fine.

    control thread                         audio thread
    ──────────────                         ────────────
    set("cutoff", 800.0) ──store──→ [ AtomicU32 ] ──load──→ get(Cutoff) → clamp

Stored values are never trusted. `get` clamps into the declared range and
substitutes the default for NaN or infinity, so a bad automation value can
only ever produce an in-range setting.

Cadence
-------

  Block   read once at the start of a block
  Audio   read once per block and ramped linearly across it (ParamRamp), so a
          knob move produces a slope rather than a step
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rate {
    Block,
    Audio,
}

#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub rate: Rate,
}

impl ParamSpec {
    pub const fn new(name: &'static str, min: f32, max: f32, default: f32) -> Self {
        Self {
            name,
            min,
            max,
            default,
            rate: Rate::Block,
        }
    }

    /// Flag on/off parameter (0 or 1).
    pub const fn toggle(name: &'static str, default: bool) -> Self {
        Self::new(name, 0.0, 1.0, if default { 1.0 } else { 0.0 })
    }

    pub const fn audio_rate(self) -> Self {
        Self {
            rate: Rate::Audio,
            ..self
        }
    }

    /// Clamp into range; non-finite values read as the default.
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_finite() {
            value.clamp(self.min, self.max)
        } else {
            self.default
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("unknown parameter `{0}`")]
    UnknownName(String),
    #[error("parameter index {0} out of range")]
    IndexOutOfRange(usize),
}

/// Lock-free store for one unit's parameters.
#[derive(Debug)]
pub struct ParamSet {
    specs: &'static [ParamSpec],
    values: Box<[AtomicU32]>,
}

impl ParamSet {
    pub fn new(specs: &'static [ParamSpec]) -> Self {
        let values = specs
            .iter()
            .map(|s| AtomicU32::new(s.default.to_bits()))
            .collect();
        Self { specs, values }
    }

    pub fn specs(&self) -> &'static [ParamSpec] {
        self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.specs.iter().position(|s| s.name == name)
    }

    /// Clamped current value. Unknown indices read as 0.0.
    #[inline]
    pub fn get(&self, index: usize) -> f32 {
        match (self.specs.get(index), self.values.get(index)) {
            (Some(spec), Some(value)) => spec.clamp(f32::from_bits(value.load(Ordering::Relaxed))),
            _ => 0.0,
        }
    }

    #[inline]
    pub fn get_bool(&self, index: usize) -> bool {
        self.get(index) >= 0.5
    }

    /// Value rounded to the nearest whole number (for mode/selector params).
    #[inline]
    pub fn get_index(&self, index: usize) -> usize {
        crate::dsp::util::to_index(self.get(index), usize::MAX)
    }

    pub fn set_index(&self, index: usize, value: f32) -> Result<(), ParamError> {
        let slot = self
            .values
            .get(index)
            .ok_or(ParamError::IndexOutOfRange(index))?;
        slot.store(value.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    pub fn set(&self, name: &str, value: f32) -> Result<(), ParamError> {
        let index = self
            .index_of(name)
            .ok_or_else(|| ParamError::UnknownName(name.to_string()))?;
        self.set_index(index, value)
    }

    pub fn reset_to_defaults(&self) {
        for (spec, value) in self.specs.iter().zip(self.values.iter()) {
            value.store(spec.default.to_bits(), Ordering::Relaxed);
        }
    }
}

/// Linear per-block ramp for audio-rate parameters.
#[derive(Debug, Clone, Copy)]
pub struct ParamRamp {
    current: f32,
    target: f32,
    step: f32,
    remaining: usize,
    /// False until the first target arrives; that one is taken as is.
    settled: bool,
}

impl ParamRamp {
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            step: 0.0,
            remaining: 0,
            settled: true,
        }
    }

    /// A ramp that jumps to its first target instead of gliding to it, so
    /// values set before a unit's first block apply from sample zero.
    pub fn deferred(initial: f32) -> Self {
        Self {
            settled: false,
            ..Self::new(initial)
        }
    }

    /// Start a ramp that reaches `target` on the last of `samples` samples.
    pub fn set_target(&mut self, target: f32, samples: usize) {
        self.target = target;
        if samples == 0 || target == self.current || !self.settled {
            self.settled = true;
            self.current = target;
            self.step = 0.0;
            self.remaining = 0;
            return;
        }
        self.step = (target - self.current) / samples as f32;
        self.remaining = samples;
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            self.current = if self.remaining == 0 {
                self.target
            } else {
                self.current + self.step
            };
        }
        self.current
    }

    pub fn value(&self) -> f32 {
        self.current
    }

    pub fn jump(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.remaining = 0;
        self.settled = true;
    }
}
