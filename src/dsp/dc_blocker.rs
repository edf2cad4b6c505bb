use std::f32::consts::TAU;

use super::util::flush_denormal;

/*
DC Blocker
==========

A one-pole, one-zero high-pass that removes any constant offset:

    y[n] = x[n] - x[n-1] + R * y[n-1]

The zero sits at DC, the pole just inside the unit circle at R. The closer R
is to 1.0 the lower the corner frequency:

    R = exp(-2π * fc / sample_rate)

Feedback loops (delay lines, resonant filters) accumulate tiny offsets every
time a signal passes through a nonlinearity or an asymmetric gate. Left alone
the offset grows each round trip; a DC blocker inside the loop bleeds it away.
*/

pub struct DcBlocker {
    x1: f32,
    y1: f32,
    r: f32,
}

impl DcBlocker {
    pub fn new(cutoff_hz: f32, sample_rate: f32) -> Self {
        let mut blocker = Self {
            x1: 0.0,
            y1: 0.0,
            r: 0.995,
        };
        blocker.set_cutoff(cutoff_hz, sample_rate);
        blocker
    }

    pub fn set_cutoff(&mut self, cutoff_hz: f32, sample_rate: f32) {
        let r = (-TAU * cutoff_hz.max(0.0) / sample_rate.max(1.0)).exp();
        self.r = if r.is_finite() { r.clamp(0.0, 0.99999) } else { 0.995 };
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = x - self.x1 + self.r * self.y1;
        if !y.is_finite() {
            self.reset();
            return 0.0;
        }
        self.x1 = x;
        self.y1 = flush_denormal(y);
        y
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }
}
