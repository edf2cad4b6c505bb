/*
Schmitt Trigger
===============

Gates and clocks arrive as voltages, not booleans. A single threshold turns
slow or noisy edges into bursts of false edges ("chatter"):

    threshold ─ ─ ─ ─╱╲╱╲─ ─ ─ ─
                   ╱
    signal    ────╱

A Schmitt trigger uses two thresholds. The input must rise above `high` to
switch on and fall below `low` to switch off; anything in between keeps the
previous state. On top of the hysteresis a short dead time after every
transition ignores further changes entirely, which suppresses contact-bounce
style chatter that crosses both thresholds.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

pub struct SchmittTrigger {
    high: f32,
    low: f32,
    dead_samples: u32,
    holdoff: u32,
    state: bool,
}

impl SchmittTrigger {
    pub fn new(high: f32, low: f32) -> Self {
        Self {
            high: high.max(low),
            low: low.min(high),
            dead_samples: 0,
            holdoff: 0,
            state: false,
        }
    }

    /// Thresholds used for gate and clock inputs (volts).
    pub fn gate() -> Self {
        Self::new(2.0, 1.0)
    }

    pub fn with_dead_time(mut self, seconds: f32, sample_rate: f32) -> Self {
        self.set_dead_time(seconds, sample_rate);
        self
    }

    pub fn set_dead_time(&mut self, seconds: f32, sample_rate: f32) {
        let samples = (seconds.max(0.0) * sample_rate.max(0.0)).round();
        self.dead_samples = if samples.is_finite() {
            samples.min(u32::MAX as f32) as u32
        } else {
            0
        };
    }

    /// Feed one sample, returning an edge if the state changed.
    #[inline]
    pub fn process(&mut self, x: f32) -> Option<Edge> {
        if self.holdoff > 0 {
            self.holdoff -= 1;
            return None;
        }

        // NaN compares false against both thresholds and so never toggles.
        if !self.state && x >= self.high {
            self.state = true;
            self.holdoff = self.dead_samples;
            Some(Edge::Rising)
        } else if self.state && x <= self.low {
            self.state = false;
            self.holdoff = self.dead_samples;
            Some(Edge::Falling)
        } else {
            None
        }
    }

    pub fn is_high(&self) -> bool {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = false;
        self.holdoff = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hysteresis_ignores_values_between_thresholds() {
        let mut trig = SchmittTrigger::new(2.0, 1.0);
        assert_eq!(trig.process(1.5), None);
        assert_eq!(trig.process(2.5), Some(Edge::Rising));
        assert_eq!(trig.process(1.5), None);
        assert!(trig.is_high());
        assert_eq!(trig.process(0.5), Some(Edge::Falling));
    }

    #[test]
    fn dead_time_suppresses_chatter() {
        let mut trig = SchmittTrigger::new(2.0, 1.0).with_dead_time(0.001, 10_000.0);
        assert_eq!(trig.process(5.0), Some(Edge::Rising));

        // Bounces inside the 10-sample dead time are ignored.
        for x in [0.0, 5.0, 0.0, 5.0] {
            assert_eq!(trig.process(x), None);
        }
        for _ in 0..6 {
            trig.process(5.0);
        }
        assert_eq!(trig.process(0.0), Some(Edge::Falling));
    }

    #[test]
    fn nan_never_toggles() {
        let mut trig = SchmittTrigger::gate();
        assert_eq!(trig.process(f32::NAN), None);
        trig.process(5.0);
        assert_eq!(trig.process(f32::NAN), None);
        assert!(trig.is_high());
    }
}
