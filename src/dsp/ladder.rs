//! Zero-delay-feedback ladder filter.

use super::{
    distortion::{saturate, soft_knee_limit},
    filter::prewarp,
    util::{db_to_gain, flush_denormal},
};
use crate::AUDIO_PEAK_VOLTS;

/*
Four-Pole Ladder, Zero-Delay Feedback
=====================================

The ladder is four identical one-pole low-passes in series, with the output
of the last stage fed back (inverted) to the input. The feedback amount `K`
sets resonance; at K = 4 the analog circuit self-oscillates.

    x ──(+)──[LP]──[LP]──[LP]──[LP]──┬── y
         ↑-                          │
         └──────── K · HP ←──────────┘

Naive digital versions put a one-sample delay in the feedback path: the
input uses *last* sample's output. That delay shifts the phase of the loop,
detunes the resonance and makes the filter blow up at high cutoffs.


Topology-Preserving One-Pole
----------------------------

Each stage is a trapezoidal ("TPT") integrator. With the bilinear-prewarped
gain g = tan(π·fc/fs) and G = g / (1 + g):

    v = (x - s) · G
    y = v + s
    s' = y + v

Written differently, y = G·x + β with β = s / (1 + g). The output is a known
linear function of the input plus a term depending only on stored state.


Solving the Loop
----------------

Chaining four of those stages gives

    y4 = G⁴·u + S,   S = G³β₁ + G²β₂ + Gβ₃ + β₄

The feedback passes through a one-pole high-pass (it keeps low frequencies
from piling up in the loop). That stage is linear in y4 as well:

    hp = (1 - Gh)·y4 - βh

The loop input is u = x - K·hp. Substituting and solving for u:

    u = α0 · (x - K·((1 - Gh)·S - βh)),   α0 = 1 / (1 + K·(1 - Gh)·G⁴)

One division per sample, no iteration, no delay.


Keeping It Stable
-----------------

`K` is never taken straight from the knob:

  - a smoothstep curve spreads the useful range across the knob travel,
  - below 250 Hz the feedback is de-emphasised (down to 0.7×),
  - a cap that falls with cutoff holds K further from the limit where the
    bilinear warping compresses the response,
  - a hard maximum of 3.92 keeps it strictly below self-oscillation.


Output
------

High resonance costs passband level (roughly 1 / (1 + K)). The output is
scaled by a makeup gain of (1.5 + 9·r) dB and then passes a soft-knee
limiter: transparent up to 4.5 V, tanh compression above, never beyond 6 V.
*/

/// Feedback at which the analog ladder self-oscillates.
pub const K_SELF_OSCILLATION: f32 = 4.0;
/// Hard ceiling on feedback, strictly below self-oscillation.
pub const K_MAX: f32 = 3.92;
/// Corner of the high-pass inside the feedback path.
pub const FEEDBACK_HPF_HZ: f32 = 60.0;
/// Below this cutoff the feedback is progressively reduced.
pub const LF_DEEMPHASIS_HZ: f32 = 250.0;
/// Fraction of feedback left at the lowest cutoffs.
pub const LF_DEEMPHASIS_FLOOR: f32 = 0.7;
/// Frequency-dependent cap: `CAP_BASE - CAP_SLOPE * fc / nyquist`.
const CAP_BASE: f32 = 3.95;
const CAP_SLOPE: f32 = 1.2;
/// Makeup gain terms in dB.
pub const MAKEUP_FIXED_DB: f32 = 1.5;
pub const MAKEUP_RESONANCE_DB: f32 = 9.0;
/// Output limiter.
pub const LIMIT_THRESHOLD: f32 = 4.5;
pub const LIMIT_CEILING: f32 = 6.0;
/// Input gain at full drive.
const DRIVE_GAIN: f32 = 3.0;

/// Shaped resonance → feedback mapping.
pub fn feedback_gain(resonance: f32, cutoff_hz: f32, sample_rate: f32) -> f32 {
    let r = if resonance.is_finite() {
        resonance.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let shaped = r * r * (3.0 - 2.0 * r);
    let mut k = K_SELF_OSCILLATION * shaped;

    let lf = ((cutoff_hz - 20.0) / (LF_DEEMPHASIS_HZ - 20.0)).clamp(0.0, 1.0);
    k *= LF_DEEMPHASIS_FLOOR + (1.0 - LF_DEEMPHASIS_FLOOR) * lf;

    let nyquist = (sample_rate * 0.5).max(1.0);
    let cap = CAP_BASE - CAP_SLOPE * (cutoff_hz / nyquist).clamp(0.0, 1.0);

    let k = k.min(cap).min(K_MAX).max(0.0);
    if k.is_finite() {
        k
    } else {
        0.0
    }
}

/// Input drive: blend toward a hotter, tanh-saturated copy of the input.
#[inline]
pub fn drive(input: f32, amount: f32) -> f32 {
    let amount = amount.clamp(0.0, 1.0);
    let driven = saturate(input * (1.0 + DRIVE_GAIN * amount), AUDIO_PEAK_VOLTS);
    input * (1.0 - amount) + driven * amount
}

/// Output gain compensating the passband loss at high resonance.
#[inline]
pub fn makeup_gain(resonance: f32) -> f32 {
    db_to_gain(MAKEUP_FIXED_DB + MAKEUP_RESONANCE_DB * resonance.clamp(0.0, 1.0))
}

pub struct LadderFilter {
    stages: [f32; 4],
    hp_state: f32,
    hp_g: f32,
    sample_rate: f32,
}

impl LadderFilter {
    pub fn new(sample_rate: f32) -> Self {
        let mut filter = Self {
            stages: [0.0; 4],
            hp_state: 0.0,
            hp_g: 0.0,
            sample_rate,
        };
        filter.set_sample_rate(sample_rate);
        filter
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.hp_g = prewarp(FEEDBACK_HPF_HZ, sample_rate).unwrap_or(0.0);
    }

    /// Filter one sample.
    ///
    /// `resonance` and `drive` are 0..1. A failed coefficient yields silence
    /// for this sample only; a non-finite result clears the filter memory.
    pub fn tick(&mut self, input: f32, cutoff_hz: f32, resonance: f32, drive: f32) -> f32 {
        let Some(g) = prewarp(cutoff_hz, self.sample_rate) else {
            return 0.0;
        };
        let big_g = g / (1.0 + g);
        let inv = 1.0 / (1.0 + g);
        let k = feedback_gain(resonance, cutoff_hz, self.sample_rate);

        let big_gh = self.hp_g / (1.0 + self.hp_g);
        let beta_h = self.hp_state / (1.0 + self.hp_g);

        let x = self::drive(input, drive);

        let [s1, s2, s3, s4] = self.stages;
        let g2 = big_g * big_g;
        let g4 = g2 * g2;
        let cascade = (g2 * big_g) * s1 * inv + g2 * s2 * inv + big_g * s3 * inv + s4 * inv;

        let loop_state = (1.0 - big_gh) * cascade - beta_h;
        let alpha0 = 1.0 / (1.0 + k * (1.0 - big_gh) * g4);
        let u = alpha0 * (x - k * loop_state);

        let mut signal = u;
        for stage in self.stages.iter_mut() {
            let v = (signal - *stage) * big_g;
            let y = v + *stage;
            *stage = flush_denormal(y + v);
            signal = y;
        }
        let y4 = signal;

        let vh = (y4 - self.hp_state) * big_gh;
        self.hp_state = flush_denormal(vh + self.hp_state + vh);

        let out = y4 * makeup_gain(resonance);
        if !out.is_finite() || !self.state_is_finite() {
            self.reset();
            return 0.0;
        }

        soft_knee_limit(out, LIMIT_THRESHOLD, LIMIT_CEILING)
    }

    fn state_is_finite(&self) -> bool {
        self.hp_state.is_finite() && self.stages.iter().all(|s| s.is_finite())
    }

    /// Largest absolute value held in filter memory.
    pub fn state_magnitude(&self) -> f32 {
        self.stages
            .iter()
            .fold(self.hp_state.abs(), |acc, s| acc.max(s.abs()))
    }

    pub fn reset(&mut self) {
        self.stages = [0.0; 4];
        self.hp_state = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn sine_peak(filter: &mut LadderFilter, freq: f32, cutoff: f32, resonance: f32) -> f32 {
        let mut peak = 0.0f32;
        for n in 0..9600 {
            let x = (TAU * freq * n as f32 / SAMPLE_RATE).sin();
            let y = filter.tick(x, cutoff, resonance, 0.0);
            if n > 4800 {
                peak = peak.max(y.abs());
            }
        }
        peak
    }

    #[test]
    fn feedback_never_reaches_self_oscillation() {
        for cutoff in [20.0, 100.0, 1_000.0, 10_000.0, 21_000.0] {
            let k = feedback_gain(1.0, cutoff, SAMPLE_RATE);
            assert!(k < K_SELF_OSCILLATION && k <= K_MAX, "k={k} at {cutoff}");
        }
        assert_eq!(feedback_gain(f32::NAN, 1_000.0, SAMPLE_RATE), 0.0);
        assert_eq!(feedback_gain(-1.0, 1_000.0, SAMPLE_RATE), 0.0);
    }

    #[test]
    fn feedback_is_deemphasised_at_low_cutoff() {
        let low = feedback_gain(1.0, 20.0, SAMPLE_RATE);
        let mid = feedback_gain(1.0, 1_000.0, SAMPLE_RATE);
        assert!(low < mid);
        assert!((low - K_SELF_OSCILLATION * LF_DEEMPHASIS_FLOOR).abs() < 1e-3);
    }

    #[test]
    fn lowpass_attenuates_above_cutoff() {
        let mut filter = LadderFilter::new(SAMPLE_RATE);
        let pass = sine_peak(&mut filter, 200.0, 2_000.0, 0.0);
        filter.reset();
        let stop = sine_peak(&mut filter, 8_000.0, 500.0, 0.0);
        assert!(pass > 0.9, "passband peak {pass}");
        assert!(stop < 0.01, "stopband peak {stop}");
    }

    #[test]
    fn resonance_emphasises_cutoff() {
        let mut filter = LadderFilter::new(SAMPLE_RATE);
        let flat = sine_peak(&mut filter, 1_000.0, 1_000.0, 0.0);
        filter.reset();
        let resonant = sine_peak(&mut filter, 1_000.0, 1_000.0, 0.9);
        assert!(resonant > flat * 2.0, "flat={flat} resonant={resonant}");
    }

    #[test]
    fn impulse_ring_decays_at_maximum_resonance() {
        let mut filter = LadderFilter::new(SAMPLE_RATE);
        filter.tick(5.0, 1_000.0, 1.0, 0.0);
        let mut tail = 0.0f32;
        for n in 0..96_000 {
            let y = filter.tick(0.0, 1_000.0, 1.0, 0.0);
            if n > 90_000 {
                tail = tail.max(y.abs());
            }
        }
        assert!(tail < 1e-3, "resonance should not sustain, tail={tail}");
    }

    #[test]
    fn reset_clears_the_memory() {
        let mut filter = LadderFilter::new(SAMPLE_RATE);
        assert_eq!(filter.state_magnitude(), 0.0);
        for _ in 0..64 {
            filter.tick(5.0, 1_000.0, 0.8, 0.5);
        }
        assert!(filter.state_magnitude() > 0.1);
        filter.reset();
        assert_eq!(filter.state_magnitude(), 0.0);
    }

    #[test]
    fn failed_coefficient_is_silent_for_that_sample() {
        let mut filter = LadderFilter::new(0.0);
        assert_eq!(filter.tick(1.0, 1_000.0, 0.5, 0.0), 0.0);
    }

    #[test]
    fn huge_input_stays_finite_and_limited() {
        let mut filter = LadderFilter::new(SAMPLE_RATE);
        for n in 0..10_000 {
            let x = if n % 2 == 0 { 1e30 } else { -1e30 };
            let y = filter.tick(x, 15_000.0, 1.0, 1.0);
            assert!(y.is_finite());
            assert!(y.abs() <= LIMIT_CEILING);
        }
        assert!(filter.state_magnitude().is_finite());
    }
}
