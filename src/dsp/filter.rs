use std::f32::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::util::flush_denormal;

/*
| type              | constructed by       | passes          | rejects      |
| ----------------- | -------------------- | --------------- | ------------ |
| low-pass          | LPF                  | below cutoff    | above cutoff |
| high-pass         | HPF                  | above cutoff    | below cutoff |
| band-pass         | LPF ∘ HPF (series)   | between cutoffs | outside      |
| notch / band-stop | LPF + HPF (parallel) | outside         | between      |
*/

/// Largest usable cutoff as a fraction of the sample rate.
pub const MAX_CUTOFF_RATIO: f32 = 0.45;
/// Integrator gains outside `(0, MAX_G]` are treated as a failed coefficient.
pub const MAX_G: f32 = 1_000.0;
/// Resonance is capped just short of the undamped (k = 0) case.
const MAX_RESONANCE: f32 = 0.98;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    LowPass,
    HighPass,
    BandPass,
    Notch,
}

pub struct FilterOutputs {
    pub lowpass: f32,
    pub bandpass: f32,
    pub highpass: f32,
    pub notch: f32,
}

/// Bilinear-prewarped integrator gain `g = tan(π·fc/fs)`.
///
/// Returns `None` when the coefficient is non-finite or outside the sane
/// range, in which case callers emit silence for the sample.
#[inline]
pub fn prewarp(cutoff_hz: f32, sample_rate: f32) -> Option<f32> {
    if !(sample_rate.is_finite() && sample_rate > 2.0) {
        return None;
    }
    let fc = cutoff_hz.clamp(1.0, sample_rate * MAX_CUTOFF_RATIO);
    let g = (PI * fc / sample_rate).tan();
    if g.is_finite() && g > 0.0 && g <= MAX_G {
        Some(g)
    } else {
        None
    }
}

pub struct SVFilter {
    ic1eq: f32, // First integrator's memory
    ic2eq: f32, // Second integrator's memory

    pub cutoff_hz: f32,
    pub resonance: f32,
    filter_type: FilterType,
}

impl SVFilter {
    pub fn new(filter_type: FilterType) -> Self {
        Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            cutoff_hz: 1000.0,
            resonance: 0.0,
            filter_type,
        }
    }

    /// Damping term for the current resonance (2.0 = no peak).
    #[inline]
    pub fn damping(&self) -> f32 {
        2.0 - 2.0 * self.resonance.clamp(0.0, MAX_RESONANCE)
    }

    pub fn next_sample(&mut self, sample: f32, k: f32, g: f32) -> FilterOutputs {
        let h = 1.0 / (1.0 + g * (g + k));
        let v3 = sample - self.ic2eq;
        let v1 = h * (self.ic1eq + g * v3);
        let v2 = self.ic2eq + g * v1;

        let ic1 = 2.0 * v1 - self.ic1eq;
        let ic2 = 2.0 * v2 - self.ic2eq;
        if ic1.is_finite() && ic2.is_finite() {
            self.ic1eq = flush_denormal(ic1);
            self.ic2eq = flush_denormal(ic2);
        } else {
            self.reset();
            return FilterOutputs {
                lowpass: 0.0,
                bandpass: 0.0,
                highpass: 0.0,
                notch: 0.0,
            };
        }

        FilterOutputs {
            lowpass: v2,
            bandpass: v1,
            highpass: sample - k * v1 - v2,
            notch: sample - k * v1,
        }
    }

    /// Filter one sample with an explicit integrator gain.
    #[inline]
    pub fn tick(&mut self, sample: f32, g: f32) -> f32 {
        let k = self.damping();
        let outputs = self.next_sample(sample, k, g);
        match self.filter_type {
            FilterType::LowPass => outputs.lowpass,
            FilterType::HighPass => outputs.highpass,
            FilterType::BandPass => outputs.bandpass,
            FilterType::Notch => outputs.notch,
        }
    }

    /// Filter a buffer in place at a fixed cutoff.
    pub fn process_buffer(&mut self, buffer: &mut [f32], sample_rate: f32) {
        let Some(g) = prewarp(self.cutoff_hz, sample_rate) else {
            buffer.fill(0.0);
            return;
        };
        for sample in buffer.iter_mut() {
            *sample = self.tick(*sample, g);
        }
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }

    pub fn set_cutoff(&mut self, cutoff: f32) {
        self.cutoff_hz = cutoff;
    }

    pub fn set_resonance(&mut self, resonance: f32) {
        self.resonance = resonance;
    }

    pub fn set_type(&mut self, filter_type: FilterType) {
        self.filter_type = filter_type;
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }
}
