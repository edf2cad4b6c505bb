use std::sync::Arc;

use crate::{
    dsp::schmitt::{Edge, SchmittTrigger},
    graph::{
        node::{Inputs, Outputs, RenderCtx, Unit},
        param::{ParamSet, ParamSpec},
        port::{PortDef, PortLayout, SignalKind},
    },
    io::message::{ControlMessage, EventSink, UnitEvent},
    sequencing::{ClockDivision, MasterClock},
    GATE_HIGH_VOLTS,
};

#[derive(Clone, Copy, Debug)]
pub enum ClockParam {
    Tempo,
    Run,
    Div1,
    Div2,
    Div3,
    Div4,
    Width,
}

static PARAMS: [ParamSpec; 7] = [
    ParamSpec::new("tempo", 20.0, 300.0, 120.0),
    ParamSpec::toggle("run", true),
    ParamSpec::new("div1", 0.0, 8.0, 3.0),
    ParamSpec::new("div2", 0.0, 8.0, 4.0),
    ParamSpec::new("div3", 0.0, 8.0, 6.0),
    ParamSpec::new("div4", 0.0, 8.0, 2.0),
    ParamSpec::new("width", 0.05, 0.9, 0.5),
];

pub const RESET: usize = 0;
pub const PPQN_OUT: usize = 0;
/// First of the four divided outputs.
pub const DIV_OUT: usize = 1;

static LAYOUT: PortLayout = PortLayout {
    inputs: &[PortDef::mono("reset", SignalKind::Gate)],
    outputs: &[
        PortDef::mono("ppqn", SignalKind::Gate),
        PortDef::mono("div1", SignalKind::Gate),
        PortDef::mono("div2", SignalKind::Gate),
        PortDef::mono("div3", SignalKind::Gate),
        PortDef::mono("div4", SignalKind::Gate),
    ],
};

/// 48 PPQN master clock with four divided gate outputs.
pub struct ClockUnit {
    params: Arc<ParamSet>,
    clock: MasterClock,
    reset: SchmittTrigger,
    pending_reset: bool,
}

impl ClockUnit {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            params: Arc::new(ParamSet::new(&PARAMS)),
            clock: MasterClock::new(sample_rate),
            reset: SchmittTrigger::gate(),
            pending_reset: false,
        }
    }

    pub fn clock(&self) -> &MasterClock {
        &self.clock
    }
}

impl Unit for ClockUnit {
    fn type_name(&self) -> &'static str {
        "clock"
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
        let p = &self.params;
        self.clock.set_sample_rate(ctx.sample_rate);
        self.clock.set_tempo(p.get(ClockParam::Tempo as usize));
        self.clock.set_width(p.get(ClockParam::Width as usize));
        self.clock.set_running(p.get_bool(ClockParam::Run as usize));
        for (output, param) in [ClockParam::Div1, ClockParam::Div2, ClockParam::Div3, ClockParam::Div4]
            .into_iter()
            .enumerate()
        {
            let division = ClockDivision::from_index(p.get_index(param as usize));
            self.clock.set_division(output, division);
        }

        if std::mem::take(&mut self.pending_reset) {
            self.clock.reset();
        }

        let reset = inputs.lane(RESET);
        for i in 0..ctx.block_len {
            if self.reset.process(reset[i]) == Some(Edge::Rising) {
                self.clock.reset();
            }

            let frame = self.clock.next_sample();
            outputs.lane_mut(PPQN_OUT)[i] = if frame.ppqn { GATE_HIGH_VOLTS } else { 0.0 };
            for (d, high) in frame.divisions.iter().enumerate() {
                outputs.lane_mut(DIV_OUT + d)[i] = if *high { GATE_HIGH_VOLTS } else { 0.0 };
            }
            if let Some(count) = frame.beat {
                events.emit(i, UnitEvent::Beat { count });
            }
        }
    }

    fn handle_control(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::Reset => self.pending_reset = true,
        }
    }

    fn reset(&mut self) {
        self.clock.reset();
        self.reset.reset();
        self.pending_reset = false;
    }
}
