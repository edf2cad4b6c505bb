//! Master clock: a 48 PPQN pulse train plus four divided outputs.

use super::{duration::ClockDivision, PPQN};

/*
Ticks and Divisions
===================

The clock runs at a fixed resolution of 48 pulses per quarter note, enough to
express straight and triplet grids down to 1/32 notes with whole ticks:

    quarter = 48 ticks, 1/8 = 24, 1/8T = 16, 1/16 = 12, 1/16T = 8, 1/32 = 6

Time is accumulated in samples; a tick fires whenever the accumulator passes
the tick interval (60 · fs / (bpm · 48)), and the remainder carries over so
tempo stays exact on average even when the interval is fractional.

Each divided output fires on ticks that are a multiple of its division's tick
count, so all outputs stay phase-locked to the master:

    tick   0    6    12   18   24   30   36   42   48
    1/32   █    █    █    █    █    █    █    █    █
    1/16   █         █         █         █         █
    1/8    █                   █                   █
    1/4    █                                       █

Pulse Width
-----------

Each pulse stays high for `width` of its own interval, bounded to at least
1 ms (so slow clocks still produce a visible trigger) and at most one sample
short of the interval (so consecutive pulses always have a falling edge).
*/

/// Shortest pulse, in seconds.
pub const MIN_PULSE_SECONDS: f32 = 0.001;
pub const DEFAULT_DIVISIONS: [ClockDivision; 4] = [
    ClockDivision::Quarter,
    ClockDivision::Eighth,
    ClockDivision::Sixteenth,
    ClockDivision::Half,
];

/// One sample of clock output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockFrame {
    /// The master pulse output level.
    pub ppqn: bool,
    /// Divided output levels.
    pub divisions: [bool; 4],
    /// Set on the sample where a master tick starts.
    pub tick: Option<u64>,
    /// Set on the sample where a new quarter note starts.
    pub beat: Option<u64>,
}

pub struct MasterClock {
    sample_rate: f32,
    tempo: f32,
    width: f32,
    divisions: [ClockDivision; 4],
    running: bool,

    accumulator: f64,
    next_tick: u64,
    ppqn_remaining: u32,
    division_remaining: [u32; 4],
}

impl MasterClock {
    pub fn new(sample_rate: f32) -> Self {
        let mut clock = Self {
            sample_rate: sample_rate.max(1.0),
            tempo: 120.0,
            width: 0.5,
            divisions: DEFAULT_DIVISIONS,
            running: true,
            accumulator: 0.0,
            next_tick: 0,
            ppqn_remaining: 0,
            division_remaining: [0; 4],
        };
        clock.reset();
        clock
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        if sample_rate.is_finite() && sample_rate >= 1.0 {
            self.sample_rate = sample_rate;
        }
    }

    pub fn set_tempo(&mut self, bpm: f32) {
        if bpm.is_finite() {
            self.tempo = bpm.clamp(20.0, 300.0);
        }
    }

    pub fn tempo(&self) -> f32 {
        self.tempo
    }

    pub fn set_width(&mut self, width: f32) {
        if width.is_finite() {
            self.width = width.clamp(0.05, 0.9);
        }
    }

    pub fn set_division(&mut self, output: usize, division: ClockDivision) {
        if let Some(slot) = self.divisions.get_mut(output) {
            *slot = division;
        }
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Samples between master ticks at the current tempo.
    pub fn tick_interval(&self) -> f64 {
        60.0 * self.sample_rate as f64 / (self.tempo as f64 * PPQN as f64)
    }

    /// Pulse length in samples for a pulse train with the given interval.
    pub fn pulse_samples(&self, interval: f64) -> u32 {
        let min = (MIN_PULSE_SECONDS * self.sample_rate) as f64;
        let max = (interval - 1.0).max(1.0);
        (interval * self.width as f64).max(min).min(max).round().max(1.0) as u32
    }

    /// Restart so the next sample fires tick 0.
    pub fn reset(&mut self) {
        self.accumulator = self.tick_interval();
        self.next_tick = 0;
        self.ppqn_remaining = 0;
        self.division_remaining = [0; 4];
    }

    pub fn next_sample(&mut self) -> ClockFrame {
        if !self.running {
            self.ppqn_remaining = 0;
            self.division_remaining = [0; 4];
            return ClockFrame::default();
        }

        let interval = self.tick_interval();
        let mut tick = None;
        let mut beat = None;

        if self.accumulator >= interval {
            self.accumulator -= interval;
            // A large tempo jump must not leave a backlog of ticks.
            if self.accumulator >= interval {
                self.accumulator = 0.0;
            }

            let index = self.next_tick;
            self.next_tick = self.next_tick.wrapping_add(1);
            tick = Some(index);
            self.ppqn_remaining = self.pulse_samples(interval);

            if index % PPQN as u64 == 0 {
                beat = Some(index / PPQN as u64);
            }

            for output in 0..self.divisions.len() {
                let ticks = self.divisions[output].ticks(PPQN) as u64;
                if index % ticks == 0 {
                    let pulse = self.pulse_samples(interval * ticks as f64);
                    self.division_remaining[output] = pulse;
                }
            }
        }
        self.accumulator += 1.0;

        let mut frame = ClockFrame {
            ppqn: self.ppqn_remaining > 0,
            divisions: [false; 4],
            tick,
            beat,
        };
        self.ppqn_remaining = self.ppqn_remaining.saturating_sub(1);
        for (out, remaining) in frame.divisions.iter_mut().zip(self.division_remaining.iter_mut()) {
            *out = *remaining > 0;
            *remaining = remaining.saturating_sub(1);
        }
        frame
    }
}
