#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
Ports and Lanes
===============

A unit declares its ports up front as a static table. Each port has one or
two channels, and every channel is one mono lane of samples:

    DelayUnit inputs
    ┌──────────┬────────┬─────────┬─────────────┬───────┐
    │ in (L,R) │        │ time_cv │ feedback_cv │ clock │
    ├──────────┼────────┼─────────┼─────────────┼───────┤
    │ lane 0   │ lane 1 │ lane 2  │ lane 3      │ lane 4│
    └──────────┴────────┴─────────┴─────────────┴───────┘

Lanes are numbered port-major, so units address them with plain constants.

Each input also declares what it reads when nothing is patched into it. The
renderer fills unconnected lanes with that value, which is how "a missing CV
means 0 V" or "a missing calibration input means the reference voltage" is
expressed without any special cases in the units.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// ±5 V nominal audio.
    Audio,
    /// Unipolar or bipolar control voltage.
    Cv,
    /// 1 V/oct pitch.
    Pitch,
    /// 0/5 V gates, triggers and clocks.
    Gate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortDef {
    pub name: &'static str,
    pub channels: usize,
    pub kind: SignalKind,
    /// Value supplied to every lane of this input while it is unpatched.
    pub unconnected: f32,
}

impl PortDef {
    pub const fn mono(name: &'static str, kind: SignalKind) -> Self {
        Self {
            name,
            channels: 1,
            kind,
            unconnected: 0.0,
        }
    }

    pub const fn stereo(name: &'static str, kind: SignalKind) -> Self {
        Self {
            name,
            channels: 2,
            kind,
            unconnected: 0.0,
        }
    }

    pub const fn unconnected(self, value: f32) -> Self {
        Self {
            unconnected: value,
            ..self
        }
    }
}

#[derive(Debug)]
pub struct PortLayout {
    pub inputs: &'static [PortDef],
    pub outputs: &'static [PortDef],
}

fn lane_count(ports: &[PortDef]) -> usize {
    ports.iter().map(|p| p.channels).sum()
}

/// First lane and channel count of `port`.
fn lanes_of(ports: &[PortDef], port: usize) -> Option<(usize, usize)> {
    let def = ports.get(port)?;
    let start = lane_count(&ports[..port]);
    Some((start, def.channels))
}

impl PortLayout {
    pub fn input_lanes(&self) -> usize {
        lane_count(self.inputs)
    }

    pub fn output_lanes(&self) -> usize {
        lane_count(self.outputs)
    }

    pub fn input(&self, port: usize) -> Option<(usize, usize)> {
        lanes_of(self.inputs, port)
    }

    pub fn output(&self, port: usize) -> Option<(usize, usize)> {
        lanes_of(self.outputs, port)
    }

    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|p| p.name == name)
    }

    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|p| p.name == name)
    }

    /// Unconnected default for every input lane, in lane order.
    pub fn input_defaults(&self) -> impl Iterator<Item = f32> + '_ {
        self.inputs
            .iter()
            .flat_map(|p| std::iter::repeat(p.unconnected).take(p.channels))
    }
}
