use std::sync::Arc;

use crate::{
    dsp::{
        oscillator::{Oscillator, OscillatorWaveform},
        util::sanitize,
    },
    graph::{
        node::{Inputs, Outputs, RenderCtx, Unit},
        param::{ParamRamp, ParamSet, ParamSpec},
        port::{PortDef, PortLayout, SignalKind},
    },
    io::message::EventSink,
    AUDIO_PEAK_VOLTS,
};

/// Middle C, the pitch of a 0 V input at the default base frequency.
pub const C4_HZ: f32 = 261.63;

#[derive(Clone, Copy, Debug)]
pub enum OscillatorParam {
    Frequency,
    Waveform,
    FmDepth,
    Level,
}

static PARAMS: [ParamSpec; 4] = [
    ParamSpec::new("frequency", 0.1, 20_000.0, C4_HZ),
    ParamSpec::new("waveform", 0.0, 3.0, 0.0),
    ParamSpec::new("fm_depth", 0.0, 1.0, 0.0),
    ParamSpec::new("level", 0.0, 1.0, 1.0).audio_rate(),
];

pub const PITCH: usize = 0;
pub const FM: usize = 1;
pub const OUT: usize = 0;

static LAYOUT: PortLayout = PortLayout {
    inputs: &[
        PortDef::mono("pitch", SignalKind::Pitch),
        PortDef::mono("fm", SignalKind::Cv),
    ],
    outputs: &[PortDef::mono("out", SignalKind::Audio)],
};

/// 1 V/oct oscillator with exponential FM.
///
/// `frequency = base · 2^(pitch + fm · fm_depth)`, output ±5 V × level.
pub struct OscillatorUnit {
    params: Arc<ParamSet>,
    osc: Oscillator,
    level: ParamRamp,
}

impl OscillatorUnit {
    pub fn new(_sample_rate: f32) -> Self {
        let params = Arc::new(ParamSet::new(&PARAMS));
        Self {
            level: ParamRamp::deferred(params.get(OscillatorParam::Level as usize)),
            osc: Oscillator::sine(),
            params,
        }
    }

    pub fn waveform(&self) -> OscillatorWaveform {
        self.osc.waveform()
    }
}

impl Unit for OscillatorUnit {
    fn type_name(&self) -> &'static str {
        "oscillator"
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
        let base = p.get(OscillatorParam::Frequency as usize);
        let fm_depth = p.get(OscillatorParam::FmDepth as usize);
        self.osc.set_waveform(OscillatorWaveform::from_index(
            p.get_index(OscillatorParam::Waveform as usize),
        ));
        self.level
            .set_target(p.get(OscillatorParam::Level as usize), ctx.block_len);

        let pitch = inputs.lane(PITCH);
        let fm = inputs.lane(FM);
        let out = outputs.lane_mut(OUT);
        for ((y, &v), &f) in out.iter_mut().zip(pitch).zip(fm) {
            let octaves = sanitize(v) + sanitize(f) * fm_depth;
            let frequency = base * octaves.exp2();
            let sample = self.osc.next_sample(frequency, ctx.sample_rate);
            *y = sanitize(sample * AUDIO_PEAK_VOLTS * self.level.next());
        }
    }

    fn reset(&mut self) {
        self.osc.reset();
        self.level
            .jump(self.params.get(OscillatorParam::Level as usize));
    }
}
