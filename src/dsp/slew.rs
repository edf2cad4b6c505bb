use super::util::{flush_denormal, one_pole_coeff};

/// One-pole smoother used for gain and delay-time glides.
///
/// Each sample moves a fixed fraction of the remaining distance toward the
/// target, so a step input becomes an exponential approach without clicks.
pub struct OnePole {
    value: f32,
    coeff: f32,
}

impl OnePole {
    pub fn new(initial: f32) -> Self {
        Self {
            value: initial,
            coeff: 1.0,
        }
    }

    pub fn set_time(&mut self, seconds: f32, sample_rate: f32) {
        self.coeff = one_pole_coeff(seconds, sample_rate);
    }

    #[inline]
    pub fn next(&mut self, target: f32) -> f32 {
        let next = self.value + (target - self.value) * self.coeff;
        self.value = if next.is_finite() {
            flush_denormal(next)
        } else {
            target
        };
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn set_value(&mut self, value: f32) {
        self.value = value;
    }
}
