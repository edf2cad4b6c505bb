use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    dsp::{
        distortion::soft_knee_limit,
        filter::{prewarp, FilterType, SVFilter},
        ladder::{self, LadderFilter, LIMIT_CEILING, LIMIT_THRESHOLD},
        util::sanitize,
    },
    graph::{
        node::{Inputs, Outputs, RenderCtx, Unit},
        param::{ParamSet, ParamSpec},
        port::{PortDef, PortLayout, SignalKind},
    },
    io::message::EventSink,
    CV_REFERENCE_VOLTS,
};

/*
Filter Unit
===========

One unit, two filter cores:

  mode 0      four-pole ZDF ladder, 24 dB/oct low-pass (see dsp::ladder)
  mode 1..4   two-pole TPT state-variable filter: LP, HP, BP, notch

Cutoff (Hz): where the filter takes effect.
  - 200 Hz:    Muffled, like through a wall
  - 1000 Hz:   Warm, round
  - 5000 Hz:   Present, clear

Resonance (0..1): emphasis at the cutoff. The ladder's feedback curve keeps
it strictly below self-oscillation; the SVF caps its damping the same way.

Modulation
----------

    cutoff    = cutoff_param · 2^(cutoff_cv · cutoff_cv_depth)     1 V/oct
    resonance = resonance_param + resonance_cv / 5 V · resonance_cv_depth

Both are evaluated per sample while a CV is patched, and clamped to their
parameter ranges afterwards. With no CV patched the block-rate values are
used directly and the SVF coefficient is computed once per block.

Drive pushes the input into a tanh stage before the filter; it is applied
in both modes. Every output passes the soft-knee limiter (4.5 V knee, 6 V
ceiling).
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Ladder,
    LowPass,
    HighPass,
    BandPass,
    Notch,
}

impl FilterMode {
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => FilterMode::Ladder,
            1 => FilterMode::LowPass,
            2 => FilterMode::HighPass,
            3 => FilterMode::BandPass,
            _ => FilterMode::Notch,
        }
    }

    fn svf_type(self) -> Option<FilterType> {
        match self {
            FilterMode::Ladder => None,
            FilterMode::LowPass => Some(FilterType::LowPass),
            FilterMode::HighPass => Some(FilterType::HighPass),
            FilterMode::BandPass => Some(FilterType::BandPass),
            FilterMode::Notch => Some(FilterType::Notch),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum FilterParam {
    Cutoff,
    Resonance,
    Drive,
    CutoffCvDepth,
    ResonanceCvDepth,
    Mode,
}

const MIN_CUTOFF: f32 = 20.0;
const MAX_CUTOFF: f32 = 20_000.0;

static PARAMS: [ParamSpec; 6] = [
    ParamSpec::new("cutoff", MIN_CUTOFF, MAX_CUTOFF, 1_000.0),
    ParamSpec::new("resonance", 0.0, 1.0, 0.0),
    ParamSpec::new("drive", 0.0, 1.0, 0.0),
    ParamSpec::new("cutoff_cv_depth", 0.0, 1.0, 1.0),
    ParamSpec::new("resonance_cv_depth", 0.0, 1.0, 0.0),
    ParamSpec::new("mode", 0.0, 4.0, 0.0),
];

pub const IN: usize = 0;
pub const CUTOFF_CV: usize = 1;
pub const RESONANCE_CV: usize = 2;
pub const OUT: usize = 0;

static LAYOUT: PortLayout = PortLayout {
    inputs: &[
        PortDef::mono("in", SignalKind::Audio),
        PortDef::mono("cutoff_cv", SignalKind::Cv),
        PortDef::mono("resonance_cv", SignalKind::Cv),
    ],
    outputs: &[PortDef::mono("out", SignalKind::Audio)],
};

pub struct FilterUnit {
    params: Arc<ParamSet>,
    ladder: LadderFilter,
    svf: SVFilter,
    mode: FilterMode,
    sample_rate: f32,
}

impl FilterUnit {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            params: Arc::new(ParamSet::new(&PARAMS)),
            ladder: LadderFilter::new(sample_rate),
            svf: SVFilter::new(FilterType::LowPass),
            mode: FilterMode::Ladder,
            sample_rate,
        }
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    fn select_mode(&mut self, mode: FilterMode) {
        if mode == self.mode {
            return;
        }
        // The core being switched in starts from silence.
        match mode.svf_type() {
            Some(filter_type) => {
                if self.mode == FilterMode::Ladder {
                    self.svf.reset();
                }
                self.svf.set_type(filter_type);
            }
            None => self.ladder.reset(),
        }
        self.mode = mode;
    }
}

#[inline]
fn modulated_cutoff(base: f32, cv: f32, depth: f32) -> f32 {
    let fc = base * (sanitize(cv) * depth).exp2();
    if fc.is_finite() {
        fc.clamp(MIN_CUTOFF, MAX_CUTOFF)
    } else {
        base
    }
}

impl Unit for FilterUnit {
    fn type_name(&self) -> &'static str {
        "filter"
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
        if ctx.sample_rate != self.sample_rate {
            self.sample_rate = ctx.sample_rate;
            self.ladder.set_sample_rate(ctx.sample_rate);
        }

        let p = &self.params;
        let cutoff = p.get(FilterParam::Cutoff as usize);
        let resonance = p.get(FilterParam::Resonance as usize);
        let drive = p.get(FilterParam::Drive as usize);
        let cutoff_depth = p.get(FilterParam::CutoffCvDepth as usize);
        let resonance_depth = p.get(FilterParam::ResonanceCvDepth as usize);
        let mode = FilterMode::from_index(p.get_index(FilterParam::Mode as usize));
        self.select_mode(mode);

        let input = inputs.lane(IN);
        let cutoff_cv = inputs.is_connected(CUTOFF_CV).then(|| inputs.lane(CUTOFF_CV));
        let resonance_cv = inputs
            .is_connected(RESONANCE_CV)
            .then(|| inputs.lane(RESONANCE_CV));
        let out = outputs.lane_mut(OUT);

        // Block-rate coefficient for the unmodulated SVF.
        let block_g = prewarp(cutoff, self.sample_rate);

        for (i, (y, &x)) in out.iter_mut().zip(input).enumerate() {
            let fc = match cutoff_cv {
                Some(cv) => modulated_cutoff(cutoff, cv[i], cutoff_depth),
                None => cutoff,
            };
            let r = match resonance_cv {
                Some(cv) => {
                    (resonance + sanitize(cv[i]) / CV_REFERENCE_VOLTS * resonance_depth)
                        .clamp(0.0, 1.0)
                }
                None => resonance,
            };
            let x = sanitize(x);

            let filtered = match self.mode {
                FilterMode::Ladder => self.ladder.tick(x, fc, r, drive),
                _ => {
                    let g = if cutoff_cv.is_some() {
                        prewarp(fc, self.sample_rate)
                    } else {
                        block_g
                    };
                    match g {
                        Some(g) => {
                            self.svf.set_resonance(r);
                            self.svf.tick(ladder::drive(x, drive), g)
                        }
                        None => 0.0,
                    }
                }
            };

            *y = soft_knee_limit(sanitize(filtered), LIMIT_THRESHOLD, LIMIT_CEILING);
        }
    }

    fn reset(&mut self) {
        self.ladder.reset();
        self.svf.reset();
    }
}
