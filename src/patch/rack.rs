use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use arc_swap::ArcSwap;
use rtrb::{Consumer, Producer};

use super::{topology::Topology, RackCommand, RackConfig, UnitId};
use crate::{
    graph::{Inputs, Outputs, RenderCtx, Unit},
    io::message::{EventSink, Notification},
};

struct Mounted {
    generation: u32,
    unit: Box<dyn Unit>,
}

/// Audio-side half of a patch. Move it into the audio callback.
///
/// Everything it touches per block was allocated in [`super::Patch::new`]:
/// lane arenas sized from [`RackConfig`], a fixed table of unit slots, and
/// the queues shared with the control side.
pub struct Rack {
    config: RackConfig,
    units: Vec<Option<Mounted>>,
    inputs: Vec<f32>,
    outputs: Vec<f32>,
    scratch_left: Vec<f32>,
    scratch_right: Vec<f32>,
    topology: Arc<ArcSwap<Topology>>,
    commands: Consumer<RackCommand>,
    garbage: Producer<Box<dyn Unit>>,
    /// Units that did not fit in the garbage queue; retried every block.
    graveyard: Vec<Box<dyn Unit>>,
    notifications: Producer<Notification>,
    dropped: Arc<AtomicU64>,
    frame: u64,
}

impl Rack {
    pub(crate) fn new(
        config: RackConfig,
        topology: Arc<ArcSwap<Topology>>,
        commands: Consumer<RackCommand>,
        garbage: Producer<Box<dyn Unit>>,
        notifications: Producer<Notification>,
        dropped: Arc<AtomicU64>,
    ) -> Self {
        let lanes = config.max_lanes * config.block_size;
        Self {
            units: (0..config.max_units).map(|_| None).collect(),
            inputs: vec![0.0; lanes],
            outputs: vec![0.0; lanes],
            scratch_left: vec![0.0; config.block_size],
            scratch_right: vec![0.0; config.block_size],
            graveyard: Vec::with_capacity(config.max_units * 2),
            config,
            topology,
            commands,
            garbage,
            notifications,
            dropped,
            frame: 0,
        }
    }

    pub fn config(&self) -> &RackConfig {
        &self.config
    }

    /// Frames rendered so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    fn retire(&mut self, unit: Box<dyn Unit>) {
        match self.garbage.push(unit) {
            Ok(()) => {}
            Err(rtrb::PushError::Full(unit)) => {
                if self.graveyard.len() < self.graveyard.capacity() {
                    self.graveyard.push(unit);
                }
                // Otherwise the unit is dropped here. The control side
                // would have to skip `collect_garbage` for a very long time.
            }
        }
    }

    fn apply_commands(&mut self) {
        while let Some(unit) = self.graveyard.pop() {
            if let Err(rtrb::PushError::Full(unit)) = self.garbage.push(unit) {
                self.graveyard.push(unit);
                break;
            }
        }

        while let Ok(command) = self.commands.pop() {
            match command {
                RackCommand::Insert {
                    id,
                    unit,
                    outputs,
                } => {
                    let stride = self.config.block_size;
                    if let Some(lanes) = self
                        .outputs
                        .get_mut(outputs.start * stride..outputs.end * stride)
                    {
                        lanes.fill(0.0);
                    }
                    let mounted = Mounted {
                        generation: id.generation,
                        unit,
                    };
                    if let Some(slot) = self.units.get_mut(id.slot as usize) {
                        if let Some(old) = slot.replace(mounted) {
                            self.retire(old.unit);
                        }
                    } else {
                        self.retire(mounted.unit);
                    }
                }
                RackCommand::Remove { id } => {
                    if let Some(slot) = self.units.get_mut(id.slot as usize) {
                        let matches = slot.as_ref().is_some_and(|m| m.generation == id.generation);
                        if matches {
                            if let Some(old) = slot.take() {
                                self.retire(old.unit);
                            }
                        }
                    }
                }
                RackCommand::Control { id, message } => {
                    if let Some(Some(m)) = self.units.get_mut(id.slot as usize) {
                        if m.generation == id.generation {
                            m.unit.handle_control(message);
                        }
                    }
                }
            }
        }
    }

    /// Render one pass of at most `block_size` frames.
    fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        let len = left.len().min(right.len()).min(self.config.block_size);
        let stride = self.config.block_size;
        let topology = self.topology.load();
        let ctx = RenderCtx::new(self.config.sample_rate, len).at_frame(self.frame);

        for placement in topology.units.iter() {
            let Some(Some(mounted)) = self.units.get_mut(placement.slot) else {
                continue;
            };
            if mounted.generation != placement.generation {
                continue;
            }

            // Gather inputs: defaults for unpatched lanes, summed routes
            // for patched ones. Sources later in the order still hold last
            // block's samples.
            for lane in placement.inputs.clone() {
                let value = if topology.connected[lane] {
                    0.0
                } else {
                    topology.defaults[lane]
                };
                self.inputs[lane * stride..lane * stride + len].fill(value);
            }
            for route in &topology.routes[placement.routes.clone()] {
                let src = route.src_lane * stride;
                let dst = route.dst_lane * stride;
                let (from, to) = (&self.outputs[src..src + len], &mut self.inputs[dst..dst + len]);
                for (d, s) in to.iter_mut().zip(from) {
                    *d += s * route.gain;
                }
            }

            let inputs = Inputs::new(
                &self.inputs[placement.inputs.start * stride..placement.inputs.end * stride],
                &topology.connected[placement.inputs.clone()],
                len,
                stride,
            );
            let mut outputs = Outputs::new(
                &mut self.outputs[placement.outputs.start * stride..placement.outputs.end * stride],
                len,
                stride,
            );
            let id = UnitId {
                slot: placement.slot as u32,
                generation: placement.generation,
            };
            let mut events = EventSink::new(&mut self.notifications, id, self.frame);
            mounted.unit.process(&inputs, &mut outputs, &ctx, &mut events);

            let dropped = events.dropped();
            if dropped > 0 {
                self.dropped.fetch_add(dropped, Ordering::Relaxed);
            }
        }

        match topology.output {
            Some((l, r)) => {
                left[..len].copy_from_slice(&self.outputs[l * stride..l * stride + len]);
                right[..len].copy_from_slice(&self.outputs[r * stride..r * stride + len]);
            }
            None => {
                left[..len].fill(0.0);
                right[..len].fill(0.0);
            }
        }
        self.frame += len as u64;
    }

    /// Render into a pair of channel buffers of any length.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.apply_commands();
        let len = left.len().min(right.len());
        let block = self.config.block_size;
        let (left, right) = (&mut left[..len], &mut right[..len]);
        for (l, r) in left.chunks_mut(block).zip(right.chunks_mut(block)) {
            self.render(l, r);
        }
    }

    /// Render into an interleaved host buffer. Channels past the second are
    /// silent; a mono buffer receives the average of left and right.
    pub fn render_interleaved(&mut self, data: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        self.apply_commands();
        let block = self.config.block_size;
        for chunk in data.chunks_mut(block * channels) {
            let frames = chunk.len() / channels;
            let mut left = std::mem::take(&mut self.scratch_left);
            let mut right = std::mem::take(&mut self.scratch_right);
            self.render(&mut left[..frames], &mut right[..frames]);

            let mut frames_out = chunk.chunks_exact_mut(channels);
            for (frame, (&l, &r)) in frames_out.by_ref().zip(left.iter().zip(right.iter())) {
                if channels == 1 {
                    frame[0] = 0.5 * (l + r);
                    continue;
                }
                frame[0] = l;
                frame[1] = r;
                frame[2..].fill(0.0);
            }
            frames_out.into_remainder().fill(0.0);
            self.scratch_left = left;
            self.scratch_right = right;
        }
    }
}
