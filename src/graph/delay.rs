use std::sync::Arc;

use crate::{
    dsp::{
        delay_pool::{DelayMode, DelayPool, FeedbackSettings, FEEDBACK_MAX},
        schmitt::{Edge, SchmittTrigger},
        util::sanitize,
    },
    graph::{
        node::{Inputs, Outputs, RenderCtx, Unit},
        param::{ParamRamp, ParamSet, ParamSpec},
        port::{PortDef, PortLayout, SignalKind},
    },
    io::message::EventSink,
    sequencing::NoteDivision,
    CV_REFERENCE_VOLTS,
};

/*
Delay Unit
==========

Stereo delay built on the buffer pool in dsp::delay_pool.

    in L/R ──┬──────────────────────────────┬─(1 − mix)─┐
             └──→ [pool: up to 4 buffers] ──┴── mix ────(+)──→ out L/R
                        ↑ feedback loop per buffer

Time
----

    time = base · 2^(−time_cv · time_cv_depth)      halves per volt

`base` is the `time` parameter, or with `sync` on and a clock patched,
the measured clock period times the selected note division:

    clock at 120 BPM quarter notes, division 1/8 dotted
      period 0.5 s · 0.75 quarters = 0.375 s

The clock period is the distance between rising edges, accepted up to 4 s.
Until two edges have been seen the `time` parameter is used.

`stable` (default on) selects the pool's buffer hand-over: time changes
cross-fade between buffers and never alter pitch. With it off the read head
glides to the new time, the familiar tape-style pitch bend.

An unpatched right input follows the left one, so a mono source feeds both
sides.
*/

#[derive(Clone, Copy, Debug)]
pub enum DelayParam {
    Time,
    Feedback,
    Mix,
    Tone,
    Mode,
    Cross,
    Stable,
    Sync,
    Division,
    TimeCvDepth,
    FeedbackCvDepth,
}

pub const MIN_TIME_SECONDS: f32 = 0.001;
pub const MAX_TIME_SECONDS: f32 = 4.0;
/// Clock edges further apart than this do not set the synced time.
const MAX_CLOCK_PERIOD_SECONDS: f32 = 4.0;

static PARAMS: [ParamSpec; 11] = [
    ParamSpec::new("time", MIN_TIME_SECONDS, MAX_TIME_SECONDS, 0.35),
    ParamSpec::new("feedback", 0.0, FEEDBACK_MAX, 0.4),
    ParamSpec::new("mix", 0.0, 1.0, 0.35).audio_rate(),
    ParamSpec::new("tone", 200.0, 20_000.0, 8_000.0),
    ParamSpec::new("mode", 0.0, 3.0, 1.0),
    ParamSpec::new("cross", 0.0, 1.0, 0.5),
    ParamSpec::toggle("stable", true),
    ParamSpec::toggle("sync", false),
    ParamSpec::new("division", 0.0, 15.0, 8.0),
    ParamSpec::new("time_cv_depth", 0.0, 1.0, 1.0),
    ParamSpec::new("feedback_cv_depth", 0.0, 1.0, 0.0),
];

pub const IN_LEFT: usize = 0;
pub const IN_RIGHT: usize = 1;
pub const TIME_CV: usize = 2;
pub const FEEDBACK_CV: usize = 3;
pub const CLOCK: usize = 4;
pub const OUT_LEFT: usize = 0;
pub const OUT_RIGHT: usize = 1;

static LAYOUT: PortLayout = PortLayout {
    inputs: &[
        PortDef::stereo("in", SignalKind::Audio),
        PortDef::mono("time_cv", SignalKind::Cv),
        PortDef::mono("feedback_cv", SignalKind::Cv),
        PortDef::mono("clock", SignalKind::Gate),
    ],
    outputs: &[PortDef::stereo("out", SignalKind::Audio)],
};

pub struct DelayUnit {
    params: Arc<ParamSet>,
    pool: DelayPool,
    mix: ParamRamp,
    clock: SchmittTrigger,
    samples_since_edge: u32,
    clock_period: Option<u32>,
    max_period: u32,
    sample_rate: f32,
}

impl DelayUnit {
    pub fn new(sample_rate: f32) -> Self {
        let sample_rate = sample_rate.max(1.0);
        let params = Arc::new(ParamSet::new(&PARAMS));
        let mix = ParamRamp::deferred(params.get(DelayParam::Mix as usize));
        Self {
            params,
            pool: DelayPool::new(MAX_TIME_SECONDS, sample_rate),
            mix,
            clock: SchmittTrigger::gate(),
            samples_since_edge: u32::MAX,
            clock_period: None,
            max_period: (MAX_CLOCK_PERIOD_SECONDS * sample_rate) as u32,
            sample_rate,
        }
    }

    pub fn pool(&self) -> &DelayPool {
        &self.pool
    }

    /// Measured clock period in samples, once two edges have been seen.
    pub fn clock_period(&self) -> Option<u32> {
        self.clock_period
    }

    fn track_clock(&mut self, level: f32) {
        self.samples_since_edge = self.samples_since_edge.saturating_add(1);
        if self.clock.process(level) == Some(Edge::Rising) {
            if self.samples_since_edge <= self.max_period {
                self.clock_period = Some(self.samples_since_edge);
            }
            self.samples_since_edge = 0;
        }
    }
}

impl Unit for DelayUnit {
    fn type_name(&self) -> &'static str {
        "delay"
    }

    fn layout(&self) -> &'static PortLayout {
        &LAYOUT
    }

    fn params(&self) -> &Arc<ParamSet> {
        &self.params
    }

    fn process(
        &mut self,
        inputs: &Inputs,
        outputs: &mut Outputs,
        ctx: &RenderCtx,
        _events: &mut EventSink,
    ) {
        // The pool is sized at construction; the rack builds units at its
        // own sample rate.
        debug_assert_eq!(ctx.sample_rate.max(1.0), self.sample_rate);

        let p = &self.params;
        let time = p.get(DelayParam::Time as usize);
        let stable = p.get_bool(DelayParam::Stable as usize);
        let sync = p.get_bool(DelayParam::Sync as usize);
        let division = NoteDivision::from_index(p.get_index(DelayParam::Division as usize));
        let time_depth = p.get(DelayParam::TimeCvDepth as usize);
        let feedback = p.get(DelayParam::Feedback as usize);
        let feedback_depth = p.get(DelayParam::FeedbackCvDepth as usize);
        let mut settings = FeedbackSettings::new(
            feedback,
            DelayMode::from_index(p.get_index(DelayParam::Mode as usize)),
            p.get(DelayParam::Cross as usize),
            p.get(DelayParam::Tone as usize),
            self.sample_rate,
        );
        self.mix
            .set_target(p.get(DelayParam::Mix as usize), ctx.block_len);

        let in_left = inputs.lane(IN_LEFT);
        let in_right = if inputs.is_connected(IN_RIGHT) {
            inputs.lane(IN_RIGHT)
        } else {
            in_left
        };
        let time_cv = inputs.is_connected(TIME_CV).then(|| inputs.lane(TIME_CV));
        let feedback_cv = inputs
            .is_connected(FEEDBACK_CV)
            .then(|| inputs.lane(FEEDBACK_CV));
        let clock = inputs.is_connected(CLOCK).then(|| inputs.lane(CLOCK));
        let (out_left, out_right) = outputs.pair_mut(OUT_LEFT, OUT_RIGHT);

        for i in 0..in_left.len() {
            if let Some(clock) = clock {
                self.track_clock(clock[i]);
            }

            let base = match (sync, self.clock_period) {
                (true, Some(period)) if clock.is_some() => {
                    period as f32 / self.sample_rate * division.quarters()
                }
                _ => time,
            };
            let seconds = match time_cv {
                Some(cv) => base * (-sanitize(cv[i]) * time_depth).exp2(),
                None => base,
            };
            let seconds = if seconds.is_finite() {
                seconds.clamp(MIN_TIME_SECONDS, MAX_TIME_SECONDS)
            } else {
                time
            };
            self.pool.set_target(seconds * self.sample_rate, stable);

            if let Some(cv) = feedback_cv {
                settings.feedback = (feedback
                    + sanitize(cv[i]) / CV_REFERENCE_VOLTS * feedback_depth)
                    .clamp(0.0, FEEDBACK_MAX);
            }

            let dry = (sanitize(in_left[i]), sanitize(in_right[i]));
            let wet = self.pool.process(dry, &settings);
            let mix = self.mix.next();
            out_left[i] = sanitize(dry.0 * (1.0 - mix) + wet.0 * mix);
            out_right[i] = sanitize(dry.1 * (1.0 - mix) + wet.1 * mix);
        }
    }

    fn reset(&mut self) {
        self.pool.reset();
        self.mix.jump(self.params.get(DelayParam::Mix as usize));
        self.clock.reset();
        self.samples_since_edge = u32::MAX;
        self.clock_period = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{graph::host::UnitHost, GATE_HIGH_VOLTS};
    use more_asserts::{assert_gt, assert_lt};

    const SAMPLE_RATE: f32 = 48_000.0;
    const BLOCK: usize = 64;

    fn host() -> UnitHost<DelayUnit> {
        let host = UnitHost::new(DelayUnit::new(SAMPLE_RATE), SAMPLE_RATE, BLOCK);
        host.set_param("mix", 1.0).unwrap();
        host.set_param("feedback", 0.0).unwrap();
        host
    }

    /// Feed an impulse on the first sample and return the frame of the
    /// loudest left output in the following `blocks` blocks.
    fn echo_frame(host: &mut UnitHost<DelayUnit>, blocks: usize) -> usize {
        let mut impulse = vec![0.0; BLOCK];
        impulse[0] = 5.0;
        host.feed(IN_LEFT, &impulse);
        let mut best = (0, 0.0f32);
        for block in 0..blocks {
            host.run();
            for (i, y) in host.output(OUT_LEFT).iter().enumerate() {
                if y.abs() > best.1 {
                    best = (block * BLOCK + i, y.abs());
                }
            }
            host.feed_constant(IN_LEFT, 0.0);
        }
        best.0
    }

    #[test]
    fn echo_arrives_after_the_delay_time() {
        let mut host = host();
        host.set_param("time", 0.01).unwrap();
        // Impulse on the very first sample the unit sees.
        assert_eq!(echo_frame(&mut host, 20), 480);
        assert_eq!(host.unit().pool().active_slots(), 1);
    }

    #[test]
    fn reset_restarts_at_the_current_time() {
        let mut host = host();
        host.set_param("time", 0.2).unwrap();
        host.feed_constant(IN_LEFT, 1.0);
        for _ in 0..100 {
            host.run();
        }

        host.set_param("time", 0.05).unwrap();
        host.unit_mut().reset();
        assert_eq!(echo_frame(&mut host, 60), 2_400);
        assert!((host.unit().pool().current_delay() - 2_400.0).abs() < 1e-3);
    }

    #[test]
    fn right_input_follows_left_when_unpatched() {
        let mut host = host();
        host.set_param("time", 0.005).unwrap();
        host.feed_constant(IN_LEFT, 1.0);
        for _ in 0..100 {
            host.run();
        }
        let left = host.output(OUT_LEFT)[BLOCK - 1];
        let right = host.output(OUT_RIGHT)[BLOCK - 1];
        assert_gt!(left, 0.5);
        assert!((left - right).abs() < 1e-4);
    }

    #[test]
    fn dry_only_at_zero_mix() {
        let mut host = host();
        host.set_param("mix", 0.0).unwrap();
        host.unit_mut().reset();
        let ramp: Vec<f32> = (0..BLOCK).map(|n| n as f32 * 0.01).collect();
        host.feed(IN_LEFT, &ramp);
        host.run();
        assert_eq!(host.output(OUT_LEFT), ramp.as_slice());
    }

    #[test]
    fn clock_sync_sets_the_time() {
        let mut host = host();
        host.set_param("sync", 1.0).unwrap();
        // Dotted eighth.
        host.set_param("division", 7.0).unwrap();

        // 0.1 s clock period.
        let period = 4_800;
        let mut phase = 0usize;
        for _ in 0..(3 * period / BLOCK) {
            let clock: Vec<f32> = (0..BLOCK)
                .map(|n| if (phase + n) % period < 100 { GATE_HIGH_VOLTS } else { 0.0 })
                .collect();
            phase += BLOCK;
            host.feed(CLOCK, &clock);
            host.run();
        }
        assert_eq!(host.unit().clock_period(), Some(period as u32));
        // 0.1 s · 0.75 quarters, after the cross-fade settles.
        for _ in 0..200 {
            host.run();
        }
        assert!((host.unit().pool().current_delay() - 3_600.0).abs() < 1.0);
    }

    #[test]
    fn time_cv_halves_per_volt() {
        let mut host = host();
        host.set_param("time", 0.2).unwrap();
        host.feed_constant(TIME_CV, 1.0);
        for _ in 0..300 {
            host.run();
        }
        assert!((host.unit().pool().current_delay() - 4_800.0).abs() < 1.0);
    }

    #[test]
    fn feedback_cv_keeps_the_loop_stable() {
        let mut host = host();
        host.set_param("time", 0.01).unwrap();
        host.set_param("feedback", 0.9).unwrap();
        host.set_param("feedback_cv_depth", 1.0).unwrap();
        host.feed_constant(FEEDBACK_CV, 100.0);
        let mut impulse = vec![0.0; BLOCK];
        impulse[0] = 5.0;
        host.feed(IN_LEFT, &impulse);
        host.run();
        host.feed_constant(IN_LEFT, 0.0);
        let mut peak = 0.0f32;
        for _ in 0..3_000 {
            host.run();
            peak = host.output(OUT_LEFT).iter().fold(0.0, |a, y| a.max(y.abs()));
        }
        assert_lt!(peak, 0.5);
    }
}
