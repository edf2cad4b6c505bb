use std::sync::Arc;

use crate::{
    dsp::schmitt::{Edge, SchmittTrigger},
    graph::{
        node::{Inputs, Outputs, RenderCtx, Unit},
        param::{ParamSet, ParamSpec},
        port::{PortDef, PortLayout, SignalKind},
    },
    io::message::{ControlMessage, EventSink, UnitEvent},
    sequencing::{euclid::MAX_STEPS, EuclidGenerator, EuclidSettings, Pattern},
    GATE_HIGH_VOLTS,
};

#[derive(Clone, Copy, Debug)]
pub enum EuclidParam {
    Length,
    Pulses,
    Rotation,
    Divider,
    Density,
    Accent,
    Gate,
}

static PARAMS: [ParamSpec; 7] = [
    ParamSpec::new("length", 1.0, MAX_STEPS as f32, 16.0),
    ParamSpec::new("pulses", 0.0, MAX_STEPS as f32, 4.0),
    ParamSpec::new("rotation", 0.0, (MAX_STEPS - 1) as f32, 0.0),
    ParamSpec::new("divider", 0.125, 4.0, 0.25),
    ParamSpec::new("density", 0.0, 1.0, 1.0),
    ParamSpec::new("accent", 0.0, 1.0, 0.0),
    ParamSpec::new("gate", 0.05, 0.95, 0.5),
];

pub const CLOCK: usize = 0;
pub const RESET: usize = 1;
pub const GATE_OUT: usize = 0;
pub const ACCENT_OUT: usize = 1;

static LAYOUT: PortLayout = PortLayout {
    inputs: &[
        PortDef::mono("clock", SignalKind::Gate),
        PortDef::mono("reset", SignalKind::Gate),
    ],
    outputs: &[
        PortDef::mono("gate", SignalKind::Gate),
        PortDef::mono("accent", SignalKind::Gate),
    ],
};

/// Euclidean gate sequencer clocked by a 48 PPQN pulse train.
pub struct EuclidUnit {
    params: Arc<ParamSet>,
    generator: EuclidGenerator,
    clock: SchmittTrigger,
    reset: SchmittTrigger,
    pending_reset: bool,
}

impl EuclidUnit {
    pub fn new(sample_rate: f32) -> Self {
        Self::from_generator(EuclidGenerator::new(sample_rate))
    }

    /// Fixed seed for the density and accent draws.
    pub fn with_seed(sample_rate: f32, seed: u64) -> Self {
        Self::from_generator(EuclidGenerator::with_seed(sample_rate, seed))
    }

    fn from_generator(generator: EuclidGenerator) -> Self {
        Self {
            params: Arc::new(ParamSet::new(&PARAMS)),
            generator,
            clock: SchmittTrigger::gate(),
            reset: SchmittTrigger::gate(),
            pending_reset: false,
        }
    }

    pub fn pattern(&self) -> &Pattern {
        self.generator.pattern()
    }

    fn settings(&self) -> EuclidSettings {
        let p = &self.params;
        EuclidSettings {
            length: p.get_index(EuclidParam::Length as usize),
            pulses: p.get_index(EuclidParam::Pulses as usize),
            rotation: p.get_index(EuclidParam::Rotation as usize),
            divider: p.get(EuclidParam::Divider as usize),
            density: p.get(EuclidParam::Density as usize),
            accent: p.get(EuclidParam::Accent as usize),
            gate: p.get(EuclidParam::Gate as usize),
        }
    }
}

impl Unit for EuclidUnit {
    fn type_name(&self) -> &'static str {
        "euclid"
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
        _ctx: &RenderCtx,
        events: &mut EventSink,
    ) {
        let settings = self.settings();
        self.generator.configure(&settings);
        if std::mem::take(&mut self.pending_reset) {
            self.generator.reset();
        }

        let clock = inputs.lane(CLOCK);
        let reset = inputs.lane(RESET);
        let (gate_out, accent_out) = outputs.pair_mut(GATE_OUT, ACCENT_OUT);

        for i in 0..clock.len() {
            let tick = self.clock.process(clock[i]) == Some(Edge::Rising);
            let restart = self.reset.process(reset[i]) == Some(Edge::Rising);
            let frame = self.generator.next_sample(tick, restart, &settings);

            gate_out[i] = if frame.gate { GATE_HIGH_VOLTS } else { 0.0 };
            accent_out[i] = if frame.accent { GATE_HIGH_VOLTS } else { 0.0 };

            if let Some(step) = frame.step {
                events.emit(
                    i,
                    UnitEvent::Step {
                        index: step.index,
                        fired: step.fired,
                        accent: step.accent,
                    },
                );
            }
        }
    }

    fn handle_control(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::Reset => self.pending_reset = true,
        }
    }

    fn reset(&mut self) {
        self.generator.reset();
        self.clock.reset();
        self.reset.reset();
        self.pending_reset = false;
    }
}
