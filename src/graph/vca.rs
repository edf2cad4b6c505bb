use std::sync::Arc;

use crate::{
    dsp::vca::Vca,
    graph::{
        node::{Inputs, Outputs, RenderCtx, Unit},
        param::{ParamRamp, ParamSet, ParamSpec},
        port::{PortDef, PortLayout, SignalKind},
    },
    io::message::EventSink,
};

#[derive(Clone, Copy, Debug)]
pub enum VcaParam {
    Offset,
    Amount,
    Slew,
    GateThreshold,
    Saturation,
}

static PARAMS: [ParamSpec; 5] = [
    ParamSpec::new("offset", 0.0, 1.0, 0.0).audio_rate(),
    ParamSpec::new("amount", 0.0, 2.0, 1.0).audio_rate(),
    ParamSpec::new("slew", 0.0001, 1.0, 0.002),
    ParamSpec::new("gate_threshold", -120.0, 0.0, -60.0),
    ParamSpec::new("saturation", 0.0, 1.0, 0.0),
];

pub const IN: usize = 0;
pub const CV: usize = 1;
pub const OUT: usize = 0;

static LAYOUT: PortLayout = PortLayout {
    inputs: &[
        PortDef::mono("in", SignalKind::Audio),
        PortDef::mono("cv", SignalKind::Cv),
    ],
    outputs: &[PortDef::mono("out", SignalKind::Audio)],
};

/// CV-controlled amplifier; with no CV the gain is the offset alone.
pub struct VcaUnit {
    params: Arc<ParamSet>,
    vca: Vca,
    offset: ParamRamp,
    amount: ParamRamp,
    slew: f32,
}

impl VcaUnit {
    pub fn new(sample_rate: f32) -> Self {
        let params = Arc::new(ParamSet::new(&PARAMS));
        Self {
            offset: ParamRamp::deferred(params.get(VcaParam::Offset as usize)),
            amount: ParamRamp::deferred(params.get(VcaParam::Amount as usize)),
            slew: params.get(VcaParam::Slew as usize),
            vca: Vca::new(sample_rate),
            params,
        }
    }

    pub fn vca(&self) -> &Vca {
        &self.vca
    }
}

impl Unit for VcaUnit {
    fn type_name(&self) -> &'static str {
        "vca"
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
        let p = &self.params;
        let slew = p.get(VcaParam::Slew as usize);
        if slew != self.slew {
            self.slew = slew;
            self.vca.set_slew(slew);
        }
        self.vca
            .set_gate_threshold_db(p.get(VcaParam::GateThreshold as usize));
        self.vca.set_saturation(p.get(VcaParam::Saturation as usize));
        self.offset
            .set_target(p.get(VcaParam::Offset as usize), ctx.block_len);
        self.amount
            .set_target(p.get(VcaParam::Amount as usize), ctx.block_len);

        let input = inputs.lane(IN);
        let cv = inputs.lane(CV);
        let out = outputs.lane_mut(OUT);
        for ((y, &x), &c) in out.iter_mut().zip(input).zip(cv) {
            *y = self
                .vca
                .process(x, c, self.offset.next(), self.amount.next());
        }
    }

    fn reset(&mut self) {
        self.vca.reset();
        self.offset.jump(self.params.get(VcaParam::Offset as usize));
        self.amount.jump(self.params.get(VcaParam::Amount as usize));
    }
}
