//! RackApp - builds the demo patch and drives audio + UI

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::RingBuffer;

use saavy_rack::{
    graph::{
        ClockUnit, DelayUnit, EnvelopeUnit, EuclidUnit, FilterUnit, OscillatorUnit, PortLayout,
        VcaUnit,
    },
    sequencing::NoteDivision,
    Patch, RackConfig, Unit, UnitId,
};

use super::ui::{UiApp, VIS_BUFFER_SIZE};

/// Handles to every unit of the demo patch.
#[derive(Debug, Clone, Copy)]
pub struct DemoPatch {
    pub clock: UnitId,
    pub euclid: UnitId,
    pub envelope: UnitId,
    pub oscillator: UnitId,
    pub vca: UnitId,
    pub filter: UnitId,
    pub delay: UnitId,
}

fn input(layout: &PortLayout, name: &str) -> EyreResult<usize> {
    layout
        .input_index(name)
        .ok_or_else(|| eyre!("no input port named {name}"))
}

fn output(layout: &PortLayout, name: &str) -> EyreResult<usize> {
    layout
        .output_index(name)
        .ok_or_else(|| eyre!("no output port named {name}"))
}

/*
Demo patch
==========

    clock ──ppqn──→ euclid ──gate──→ envelope ──┬──→ vca.cv
      │                                         └──→ filter.cutoff_cv
      └──div1 (1/4)──→ delay.clock
    oscillator ──→ vca ──→ filter ──→ delay ──→ out

The delay is synced to a dotted eighth of the clock's quarter output.
*/
pub fn build_demo(patch: &mut Patch, tempo: f32, pulses: usize) -> EyreResult<DemoPatch> {
    let sr = patch.sample_rate();

    let clock = ClockUnit::new(sr);
    let euclid = EuclidUnit::new(sr);
    let envelope = EnvelopeUnit::new(sr);
    let oscillator = OscillatorUnit::new(sr);
    let vca = VcaUnit::new(sr);
    let filter = FilterUnit::new(sr);
    let delay = DelayUnit::new(sr);

    let clock_ports = (output(clock.layout(), "ppqn")?, output(clock.layout(), "div1")?);
    let euclid_ports = (input(euclid.layout(), "clock")?, output(euclid.layout(), "gate")?);
    let env_ports = (input(envelope.layout(), "gate")?, output(envelope.layout(), "env")?);
    let vca_ports = (
        input(vca.layout(), "in")?,
        input(vca.layout(), "cv")?,
        output(vca.layout(), "out")?,
    );
    let filter_ports = (
        input(filter.layout(), "in")?,
        input(filter.layout(), "cutoff_cv")?,
        output(filter.layout(), "out")?,
    );
    let delay_ports = (
        input(delay.layout(), "in")?,
        input(delay.layout(), "clock")?,
        output(delay.layout(), "out")?,
    );
    let osc_out = output(oscillator.layout(), "out")?;

    let demo = DemoPatch {
        clock: patch.add_unit(clock)?,
        euclid: patch.add_unit(euclid)?,
        envelope: patch.add_unit(envelope)?,
        oscillator: patch.add_unit(oscillator)?,
        vca: patch.add_unit(vca)?,
        filter: patch.add_unit(filter)?,
        delay: patch.add_unit(delay)?,
    };

    patch.set_param(demo.clock, "tempo", tempo)?;

    patch.set_param(demo.euclid, "pulses", pulses as f32)?;
    patch.set_param(demo.euclid, "accent", 0.3)?;

    patch.set_param(demo.envelope, "attack", 0.002)?;
    patch.set_param(demo.envelope, "decay", 0.18)?;
    patch.set_param(demo.envelope, "sustain", 0.0)?;
    patch.set_param(demo.envelope, "release", 0.12)?;

    patch.set_param(demo.oscillator, "frequency", 110.0)?;
    patch.set_param(demo.oscillator, "waveform", 1.0)?;
    patch.set_param(demo.oscillator, "level", 0.6)?;

    patch.set_param(demo.filter, "cutoff", 300.0)?;
    patch.set_param(demo.filter, "resonance", 0.55)?;
    patch.set_param(demo.filter, "cutoff_cv_depth", 0.6)?;

    patch.set_param(demo.delay, "feedback", 0.45)?;
    patch.set_param(demo.delay, "mix", 0.3)?;
    patch.set_param(demo.delay, "mode", 2.0)?;
    patch.set_param(demo.delay, "sync", 1.0)?;
    patch.set_param(
        demo.delay,
        "division",
        NoteDivision::ALL
            .iter()
            .position(|d| *d == NoteDivision::DottedEighth)
            .unwrap_or(8) as f32,
    )?;

    patch.connect(demo.clock, clock_ports.0, demo.euclid, euclid_ports.0)?;
    patch.connect(demo.clock, clock_ports.1, demo.delay, delay_ports.1)?;
    patch.connect(demo.euclid, euclid_ports.1, demo.envelope, env_ports.0)?;
    patch.connect(demo.envelope, env_ports.1, demo.vca, vca_ports.1)?;
    patch.connect(demo.envelope, env_ports.1, demo.filter, filter_ports.1)?;
    patch.connect(demo.oscillator, osc_out, demo.vca, vca_ports.0)?;
    patch.connect(demo.vca, vca_ports.2, demo.filter, filter_ports.0)?;
    patch.connect(demo.filter, filter_ports.2, demo.delay, delay_ports.0)?;
    patch.set_output(demo.delay, delay_ports.2)?;

    log::info!("demo patch ready: {demo:?}");
    Ok(demo)
}

/// Main application builder
pub struct RackApp {
    tempo: f32,
    pulses: usize,
}

impl RackApp {
    pub fn new() -> Self {
        Self {
            tempo: 120.0,
            pulses: 4,
        }
    }

    pub fn tempo(mut self, bpm: f32) -> Self {
        self.tempo = bpm;
        self
    }

    pub fn pulses(mut self, pulses: usize) -> Self {
        self.pulses = pulses;
        self
    }

    /// Open the default output device and run until the UI quits.
    pub fn run(self) -> EyreResult<()> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| eyre!("no default output device available"))?;
        let config = device
            .default_output_config()
            .wrap_err("failed to fetch default output config")?;

        let sample_rate = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;
        log::info!("output: {sample_rate} Hz, {channels} channels");

        let (mut patch, mut rack) = Patch::new(RackConfig::default().with_sample_rate(sample_rate));
        let demo = build_demo(&mut patch, self.tempo, self.pulses)?;

        // Left channel tap for the scope and spectrum.
        let (mut tap_tx, tap_rx) = RingBuffer::<f32>::new(VIS_BUFFER_SIZE * 8);

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _| {
                    rack.render_interleaved(data, channels);
                    for frame in data.chunks(channels) {
                        if tap_tx.push(frame[0]).is_err() {
                            break;
                        }
                    }
                },
                |err| log::error!("audio stream error: {err}"),
                None,
            )
            .wrap_err("failed to build output stream")?;
        stream.play().wrap_err("failed to start output stream")?;

        let mut terminal = ratatui::init();
        let result = UiApp::new(patch, demo, tap_rx, sample_rate).run(&mut terminal);
        ratatui::restore();
        drop(stream);
        result
    }
}

impl Default for RackApp {
    fn default() -> Self {
        Self::new()
    }
}
