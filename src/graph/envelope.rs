use std::sync::Arc;

use crate::{
    dsp::{
        envelope::{Envelope, EnvelopeSettings, EnvelopeShape, EnvelopeStage},
        schmitt::{Edge, SchmittTrigger},
    },
    graph::{
        node::{Inputs, Outputs, RenderCtx, Unit},
        param::{ParamSet, ParamSpec},
        port::{PortDef, PortLayout, SignalKind},
    },
    io::message::{ControlMessage, EventSink, UnitEvent},
    GATE_HIGH_VOLTS,
};

/// Gate input rejects retriggers closer together than this.
const GATE_DEAD_TIME: f32 = 0.0005;
/// Time multiplier while `long` is set.
const LONG_FACTOR: f32 = 10.0;

#[derive(Clone, Copy, Debug)]
pub enum EnvelopeParam {
    Attack,
    Decay,
    Sustain,
    Release,
    Retrigger,
    Shape,
    Long,
}

static PARAMS: [ParamSpec; 7] = [
    ParamSpec::new("attack", 0.0005, 10.0, 0.01),
    ParamSpec::new("decay", 0.0005, 10.0, 0.2),
    ParamSpec::new("sustain", 0.0, 1.0, 0.7),
    ParamSpec::new("release", 0.0005, 10.0, 0.3),
    ParamSpec::toggle("retrigger", false),
    ParamSpec::new("shape", 0.0, 1.0, 0.0),
    ParamSpec::toggle("long", false),
];

pub const GATE: usize = 0;
pub const ENV: usize = 0;

static LAYOUT: PortLayout = PortLayout {
    inputs: &[PortDef::mono("gate", SignalKind::Gate)],
    outputs: &[PortDef::mono("env", SignalKind::Cv)],
};

/// ADSR with a Schmitt-triggered gate input and a 0–5 V output.
pub struct EnvelopeUnit {
    params: Arc<ParamSet>,
    envelope: Envelope,
    gate: SchmittTrigger,
    sample_rate: f32,
}

impl EnvelopeUnit {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            params: Arc::new(ParamSet::new(&PARAMS)),
            envelope: Envelope::new(sample_rate),
            gate: SchmittTrigger::gate().with_dead_time(GATE_DEAD_TIME, sample_rate),
            sample_rate,
        }
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.envelope.stage()
    }

    fn settings(&self) -> EnvelopeSettings {
        let p = &self.params;
        let scale = if p.get_bool(EnvelopeParam::Long as usize) {
            LONG_FACTOR
        } else {
            1.0
        };
        EnvelopeSettings {
            attack: p.get(EnvelopeParam::Attack as usize) * scale,
            decay: p.get(EnvelopeParam::Decay as usize) * scale,
            sustain: p.get(EnvelopeParam::Sustain as usize),
            release: p.get(EnvelopeParam::Release as usize) * scale,
            shape: match p.get_index(EnvelopeParam::Shape as usize) {
                0 => EnvelopeShape::Exponential,
                _ => EnvelopeShape::Linear,
            },
        }
    }
}

impl Unit for EnvelopeUnit {
    fn type_name(&self) -> &'static str {
        "envelope"
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
        events: &mut EventSink,
    ) {
        if ctx.sample_rate != self.sample_rate {
            self.sample_rate = ctx.sample_rate;
            self.envelope.set_sample_rate(ctx.sample_rate);
            self.gate.set_dead_time(GATE_DEAD_TIME, ctx.sample_rate);
        }
        let settings = self.settings();
        self.envelope.set_settings(settings);
        let retrigger = self.params.get_bool(EnvelopeParam::Retrigger as usize);

        let gate = inputs.lane(GATE);
        let out = outputs.lane_mut(ENV);
        let mut stage = self.envelope.stage();

        for (i, (y, &x)) in out.iter_mut().zip(gate).enumerate() {
            match self.gate.process(x) {
                Some(Edge::Rising) => {
                    self.envelope.gate_on(retrigger);
                    events.emit(i, UnitEvent::Gate { high: true });
                }
                Some(Edge::Falling) => {
                    self.envelope.gate_off();
                    events.emit(i, UnitEvent::Gate { high: false });
                }
                None => {}
            }

            *y = self.envelope.next_sample() * GATE_HIGH_VOLTS;

            let now = self.envelope.stage();
            if now != stage {
                events.emit(i, UnitEvent::Stage(now));
                stage = now;
            }
        }
    }

    fn handle_control(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::Reset => self.reset(),
        }
    }

    fn reset(&mut self) {
        self.envelope.reset();
        self.gate.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::host::UnitHost;
    use more_asserts::{assert_ge, assert_gt, assert_le, assert_lt};

    const SAMPLE_RATE: f32 = 48_000.0;
    const BLOCK: usize = 128;

    fn host() -> UnitHost<EnvelopeUnit> {
        UnitHost::new(EnvelopeUnit::new(SAMPLE_RATE), SAMPLE_RATE, BLOCK)
    }

    fn run_for(host: &mut UnitHost<EnvelopeUnit>, seconds: f32) -> f32 {
        let blocks = (seconds * SAMPLE_RATE / BLOCK as f32).ceil() as usize;
        let mut last = 0.0;
        for _ in 0..blocks {
            host.run();
            last = host.output(ENV)[BLOCK - 1];
        }
        last
    }

    #[test]
    fn idle_without_gate() {
        let mut host = host();
        assert_eq!(run_for(&mut host, 0.1), 0.0);
        assert_eq!(host.unit().stage(), EnvelopeStage::Idle);
    }

    #[test]
    fn full_cycle_in_volts() {
        let mut host = host();
        host.feed_constant(GATE, GATE_HIGH_VOLTS);

        let sustained = run_for(&mut host, 0.5);
        assert_eq!(host.unit().stage(), EnvelopeStage::Sustain);
        assert!((sustained - 0.7 * GATE_HIGH_VOLTS).abs() < 0.01);

        host.feed_constant(GATE, 0.0);
        run_for(&mut host, 0.01);
        assert_eq!(host.unit().stage(), EnvelopeStage::Release);
        let released = run_for(&mut host, 0.5);
        assert_eq!(released, 0.0);
        assert_eq!(host.unit().stage(), EnvelopeStage::Idle);
    }

    #[test]
    fn output_stays_in_range() {
        let mut host = host();
        host.set_param("attack", 0.0005).unwrap();
        host.set_param("release", 0.0005).unwrap();
        for block in 0..400 {
            let gate: Vec<f32> = (0..BLOCK)
                .map(|n| if (block * BLOCK + n) / 700 % 2 == 0 { 5.0 } else { 0.0 })
                .collect();
            host.feed(GATE, &gate);
            host.run();
            for &y in host.output(ENV) {
                assert_ge!(y, 0.0);
                assert_le!(y, GATE_HIGH_VOLTS);
            }
        }
    }

    #[test]
    fn hysteresis_ignores_chatter_between_thresholds() {
        let mut host = host();
        host.feed_constant(GATE, 5.0);
        host.run();
        host.notifications();
        // Wobbling between 1.2 V and 1.8 V never crosses either threshold.
        let wobble: Vec<f32> = (0..BLOCK).map(|n| if n % 2 == 0 { 1.2 } else { 1.8 }).collect();
        for _ in 0..10 {
            host.feed(GATE, &wobble);
            host.run();
        }
        let gates = host
            .notifications()
            .into_iter()
            .filter(|n| matches!(n.event, UnitEvent::Gate { .. }))
            .count();
        assert_eq!(gates, 0);
    }

    #[test]
    fn emits_gate_and_stage_events() {
        let mut host = host();
        host.feed_constant(GATE, 5.0);
        run_for(&mut host, 0.3);
        let events: Vec<UnitEvent> = host.notifications().into_iter().map(|n| n.event).collect();
        assert_eq!(
            events,
            vec![
                UnitEvent::Gate { high: true },
                UnitEvent::Stage(EnvelopeStage::Attack),
                UnitEvent::Stage(EnvelopeStage::Decay),
                UnitEvent::Stage(EnvelopeStage::Sustain),
            ]
        );
    }

    #[test]
    fn long_multiplies_times() {
        let mut short = host();
        short.feed_constant(GATE, 5.0);
        let short_level = run_for(&mut short, 0.005);

        let mut long = host();
        long.set_param("long", 1.0).unwrap();
        long.feed_constant(GATE, 5.0);
        let long_level = run_for(&mut long, 0.005);

        assert_gt!(short_level, 4.0);
        assert_lt!(long_level, 2.5);
    }

    #[test]
    fn reset_message_returns_to_idle() {
        let mut host = host();
        host.feed_constant(GATE, 5.0);
        run_for(&mut host, 0.05);
        host.control(ControlMessage::Reset);
        host.feed_constant(GATE, 0.0);
        assert_eq!(run_for(&mut host, 0.01), 0.0);
        assert_eq!(host.unit().stage(), EnvelopeStage::Idle);
    }
}
