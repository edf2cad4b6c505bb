//! Voltage-controlled amplifier with a hysteretic hard gate.

use super::{
    dc_blocker::DcBlocker,
    distortion::saturate_mix,
    util::{db_to_gain, one_pole_coeff, sanitize},
};
use crate::{AUDIO_PEAK_VOLTS, CV_REFERENCE_VOLTS};

/*
Gain Computer
=============

    target = clamp01(offset + amount · max(cv, 0) / 5 V)

Negative CV only pulls the gain toward zero; it never flips polarity.

The hard gate watches that target with two thresholds:

    gain ┤
    open ┤· · · · · · · ·╱‾‾‾‾‾‾‾╲· · · · · ·   open  = min(close · 2, 1)
   close ┤· · · · · · · ╱· · · · ·╲ · · · · ·
         └─────────────┴───────────┴──────────→
                     opens       closes

While closed the target is forced to exactly zero, so a trickle of CV cannot
leak audio through. The gap between the two thresholds keeps a CV hovering at
the edge from chattering the gate. Above -6 dB the open threshold is held at
full gain, the largest target the gain computer can produce.

The (gated) target is smoothed with a one-pole whose time constant is the
slew setting. Once the gate is closed and the smoothed gain has fallen under
1e-6 the output is pinned to exactly 0.0 and the output DC blocker is
cleared, so nothing but true silence leaves a closed VCA.
*/

/// Open threshold as a multiple of the close threshold.
pub const OPEN_RATIO: f32 = 2.0;
/// Smoothed gain below which a closed VCA outputs exact silence.
pub const SNAP_TO_ZERO: f32 = 1e-6;
const DC_BLOCK_HZ: f32 = 5.0;

/// Map offset/amount/CV to a gain in 0..1.
#[inline]
pub fn gain_target(offset: f32, amount: f32, cv: f32) -> f32 {
    let cv = sanitize(cv).max(0.0) / CV_REFERENCE_VOLTS;
    sanitize(offset + amount * cv).clamp(0.0, 1.0)
}

pub struct Vca {
    gain: f32,
    open: bool,
    close_threshold: f32,
    slew_coeff: f32,
    saturation: f32,
    dc: DcBlocker,
    sample_rate: f32,
}

impl Vca {
    pub fn new(sample_rate: f32) -> Self {
        let sample_rate = sample_rate.max(1.0);
        let mut vca = Self {
            gain: 0.0,
            open: false,
            close_threshold: db_to_gain(-60.0),
            slew_coeff: 1.0,
            saturation: 0.0,
            dc: DcBlocker::new(DC_BLOCK_HZ, sample_rate),
            sample_rate,
        };
        vca.set_slew(0.002);
        vca
    }

    pub fn set_slew(&mut self, seconds: f32) {
        self.slew_coeff = one_pole_coeff(sanitize(seconds), self.sample_rate);
    }

    pub fn set_gate_threshold_db(&mut self, db: f32) {
        self.close_threshold = db_to_gain(sanitize(db).min(0.0));
    }

    pub fn set_saturation(&mut self, mix: f32) {
        self.saturation = sanitize(mix).clamp(0.0, 1.0);
    }

    pub fn close_threshold(&self) -> f32 {
        self.close_threshold
    }

    pub fn open_threshold(&self) -> f32 {
        (self.close_threshold * OPEN_RATIO).min(1.0)
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    #[inline]
    fn gate(&mut self, target: f32) -> f32 {
        if self.open {
            if target < self.close_threshold {
                self.open = false;
            }
        } else if target >= self.open_threshold() {
            self.open = true;
        }

        if self.open {
            target
        } else {
            0.0
        }
    }

    /// Process one sample. `offset` and `amount` are per-sample values.
    #[inline]
    pub fn process(&mut self, input: f32, cv: f32, offset: f32, amount: f32) -> f32 {
        let target = self.gate(gain_target(offset, amount, cv));
        self.gain += (target - self.gain) * self.slew_coeff;

        if !self.open && self.gain < SNAP_TO_ZERO {
            self.gain = 0.0;
            self.dc.reset();
            return 0.0;
        }

        let amplified = sanitize(input) * self.gain;
        let shaped = saturate_mix(amplified, AUDIO_PEAK_VOLTS, self.saturation);
        sanitize(self.dc.process(shaped))
    }

    pub fn reset(&mut self) {
        self.gain = 0.0;
        self.open = false;
        self.dc.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use more_asserts::{assert_gt, assert_lt};
    use std::f32::consts::TAU;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn sine(n: usize) -> f32 {
        (TAU * 440.0 * n as f32 / SAMPLE_RATE).sin()
    }

    #[test]
    fn negative_cv_never_inverts() {
        assert_eq!(gain_target(0.0, 1.0, -5.0), 0.0);
        assert_eq!(gain_target(0.5, 1.0, -5.0), 0.5);
        assert_eq!(gain_target(0.0, 1.0, 5.0), 1.0);
        assert_eq!(gain_target(0.0, 2.0, 5.0), 1.0);
        assert_eq!(gain_target(f32::NAN, 1.0, 0.0), 0.0);
    }

    #[test]
    fn zero_cv_passes_input_times_offset() {
        let mut vca = Vca::new(SAMPLE_RATE);
        let offset = 0.5;
        let mut worst = 0.0f32;
        for n in 0..48_000 {
            let y = vca.process(sine(n), 0.0, offset, 1.0);
            if n > 24_000 {
                worst = worst.max((y - sine(n) * offset).abs());
            }
        }
        assert_lt!(worst, 0.01);
    }

    #[test]
    fn closed_gate_is_exact_silence() {
        let mut vca = Vca::new(SAMPLE_RATE);
        // Open it first.
        for n in 0..4_800 {
            vca.process(sine(n), 5.0, 0.0, 1.0);
        }
        assert!(vca.is_open());

        // A CV below the close threshold (-60 dB of 5 V is 5 mV).
        for n in 0..4_800 {
            vca.process(sine(n), 0.001, 0.0, 1.0);
        }
        assert!(!vca.is_open());
        for n in 0..4_800 {
            assert_eq!(vca.process(sine(n) * 5.0, 0.001, 0.0, 1.0), 0.0);
        }
    }

    #[test]
    fn gate_has_hysteresis() {
        let mut vca = Vca::new(SAMPLE_RATE);
        let close = vca.close_threshold();
        let between = close * 1.5 * CV_REFERENCE_VOLTS;

        vca.process(0.0, between, 0.0, 1.0);
        assert!(!vca.is_open(), "between thresholds must not open a closed gate");

        vca.process(0.0, close * 3.0 * CV_REFERENCE_VOLTS, 0.0, 1.0);
        assert!(vca.is_open());

        vca.process(0.0, between, 0.0, 1.0);
        assert!(vca.is_open(), "between thresholds must not close an open gate");
    }

    #[test]
    fn high_thresholds_still_open_at_full_gain() {
        for db in [-3.0, 0.0] {
            let mut vca = Vca::new(SAMPLE_RATE);
            vca.set_gate_threshold_db(db);
            assert_eq!(vca.open_threshold(), 1.0);
            assert!(vca.open_threshold() >= vca.close_threshold());

            vca.process(1.0, CV_REFERENCE_VOLTS, 0.0, 1.0);
            assert!(vca.is_open(), "full-scale CV must open the gate at {db} dB");

            vca.process(1.0, 0.5 * CV_REFERENCE_VOLTS, 0.0, 1.0);
            assert!(!vca.is_open());
        }
    }

    #[test]
    fn gain_changes_are_slewed() {
        let mut vca = Vca::new(SAMPLE_RATE);
        vca.set_slew(0.01);
        vca.process(1.0, 5.0, 0.0, 1.0);
        assert_lt!(vca.gain(), 0.01);
        for _ in 0..4_800 {
            vca.process(1.0, 5.0, 0.0, 1.0);
        }
        assert_gt!(vca.gain(), 0.99);
    }
}
