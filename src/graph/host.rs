//! Drive a single unit outside a rack.
//!
//! Useful for tests, benchmarks and offline rendering of one unit: the host
//! owns the lane buffers, applies the unconnected defaults, and collects the
//! unit's notifications.

use rtrb::{Consumer, Producer, RingBuffer};

use super::{
    node::{Inputs, Outputs, RenderCtx, Unit},
    param::ParamError,
};
use crate::{
    io::message::{ControlMessage, EventSink, Notification, NotificationReceiver},
    patch::UnitId,
    MAX_BLOCK_SIZE,
};

const EVENT_CAPACITY: usize = 4096;

pub struct UnitHost<U: Unit> {
    unit: U,
    defaults: Vec<f32>,
    inputs: Vec<f32>,
    connected: Vec<bool>,
    outputs: Vec<f32>,
    block_len: usize,
    sample_rate: f32,
    frame: u64,
    tx: Producer<Notification>,
    rx: Consumer<Notification>,
    dropped: u64,
}

impl<U: Unit> UnitHost<U> {
    pub fn new(unit: U, sample_rate: f32, block_len: usize) -> Self {
        let block_len = block_len.clamp(1, MAX_BLOCK_SIZE);
        let layout = unit.layout();
        let defaults: Vec<f32> = layout.input_defaults().collect();
        let mut inputs = vec![0.0; defaults.len() * block_len];
        for (lane, value) in inputs.chunks_mut(block_len).zip(&defaults) {
            lane.fill(*value);
        }
        let (tx, rx) = RingBuffer::new(EVENT_CAPACITY);

        Self {
            connected: vec![false; defaults.len()],
            outputs: vec![0.0; layout.output_lanes() * block_len],
            defaults,
            inputs,
            unit,
            block_len,
            sample_rate,
            frame: 0,
            tx,
            rx,
            dropped: 0,
        }
    }

    pub fn unit(&self) -> &U {
        &self.unit
    }

    pub fn unit_mut(&mut self) -> &mut U {
        &mut self.unit
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn set_param(&self, name: &str, value: f32) -> Result<(), ParamError> {
        self.unit.params().set(name, value)
    }

    /// Copy `samples` into an input lane and mark it connected. Shorter
    /// slices are padded with their last value.
    pub fn feed(&mut self, lane: usize, samples: &[f32]) {
        let Some(dst) = self.inputs.chunks_mut(self.block_len).nth(lane) else {
            return;
        };
        let last = samples.last().copied().unwrap_or(0.0);
        for (i, d) in dst.iter_mut().enumerate() {
            *d = samples.get(i).copied().unwrap_or(last);
        }
        self.connected[lane] = true;
    }

    pub fn feed_constant(&mut self, lane: usize, value: f32) {
        self.feed(lane, &[value]);
    }

    /// Return a lane to its unconnected default.
    pub fn disconnect(&mut self, lane: usize) {
        if let (Some(dst), Some(value)) = (
            self.inputs.chunks_mut(self.block_len).nth(lane),
            self.defaults.get(lane),
        ) {
            dst.fill(*value);
            self.connected[lane] = false;
        }
    }

    pub fn control(&mut self, message: ControlMessage) {
        self.unit.handle_control(message);
    }

    /// Process one block.
    pub fn run(&mut self) -> &mut Self {
        let ctx = RenderCtx::new(self.sample_rate, self.block_len).at_frame(self.frame);
        let inputs = Inputs::new(&self.inputs, &self.connected, self.block_len, self.block_len);
        let mut outputs = Outputs::new(&mut self.outputs, self.block_len, self.block_len);
        let mut events = EventSink::new(&mut self.tx, UnitId::DETACHED, self.frame);

        self.unit.process(&inputs, &mut outputs, &ctx, &mut events);

        self.dropped += events.dropped();
        self.frame += self.block_len as u64;
        self
    }

    pub fn output(&self, lane: usize) -> &[f32] {
        self.outputs
            .chunks(self.block_len)
            .nth(lane)
            .unwrap_or(&[])
    }

    /// Drain the notifications emitted so far.
    pub fn notifications(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        self.rx.drain_into(&mut out);
        out
    }

    pub fn dropped_notifications(&self) -> u64 {
        self.dropped
    }
}
