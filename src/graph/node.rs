use std::sync::Arc;

use super::{param::ParamSet, port::PortLayout};
use crate::io::message::{ControlMessage, EventSink};

/// Context passed to units during rendering
///
/// - sample_rate: Audio sample rate (e.g., 48000.0)
/// - block_len: Frames in this block (never more than `MAX_BLOCK_SIZE`)
/// - frame: Absolute frame index of the block's first sample
#[derive(Debug, Clone, Copy)]
pub struct RenderCtx {
    pub sample_rate: f32,
    pub block_len: usize,
    pub frame: u64,
}

impl RenderCtx {
    pub fn new(sample_rate: f32, block_len: usize) -> Self {
        Self {
            sample_rate,
            block_len,
            frame: 0,
        }
    }

    pub fn at_frame(self, frame: u64) -> Self {
        Self { frame, ..self }
    }

    /// Time of the block's first sample, in seconds.
    pub fn time(&self) -> f64 {
        self.frame as f64 / self.sample_rate.max(1.0) as f64
    }
}

/// Read-only view of a unit's input lanes for one block.
///
/// Lanes are stored back to back with a fixed stride; only the first
/// `len` samples of each lane belong to the current block.
pub struct Inputs<'a> {
    data: &'a [f32],
    connected: &'a [bool],
    len: usize,
    stride: usize,
}

impl<'a> Inputs<'a> {
    pub fn new(data: &'a [f32], connected: &'a [bool], len: usize, stride: usize) -> Self {
        debug_assert!(len <= stride);
        Self {
            data,
            connected,
            len,
            stride,
        }
    }

    #[inline]
    pub fn lane(&self, lane: usize) -> &'a [f32] {
        let start = lane * self.stride;
        &self.data[start..start + self.len]
    }

    /// True when at least one edge feeds this lane.
    #[inline]
    pub fn is_connected(&self, lane: usize) -> bool {
        self.connected.get(lane).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Writable view of a unit's output lanes for one block.
pub struct Outputs<'a> {
    data: &'a mut [f32],
    len: usize,
    stride: usize,
}

impl<'a> Outputs<'a> {
    pub fn new(data: &'a mut [f32], len: usize, stride: usize) -> Self {
        debug_assert!(len <= stride);
        Self { data, len, stride }
    }

    #[inline]
    pub fn lane_mut(&mut self, lane: usize) -> &mut [f32] {
        let start = lane * self.stride;
        &mut self.data[start..start + self.len]
    }

    /// Two distinct lanes at once (stereo outputs).
    pub fn pair_mut(&mut self, left: usize, right: usize) -> (&mut [f32], &mut [f32]) {
        debug_assert!(left < right);
        let (head, tail) = self.data.split_at_mut(right * self.stride);
        let l = &mut head[left * self.stride..left * self.stride + self.len];
        let r = &mut tail[..self.len];
        (l, r)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Core trait for processing units
///
/// A unit owns all of its state. `process` is called once per block on the
/// audio thread and must not allocate, block or panic; it always fills every
/// output lane with finite samples.
pub trait Unit: Send {
    fn type_name(&self) -> &'static str;

    fn layout(&self) -> &'static PortLayout;

    fn params(&self) -> &Arc<ParamSet>;

    fn process(
        &mut self,
        inputs: &Inputs,
        outputs: &mut Outputs,
        ctx: &RenderCtx,
        events: &mut EventSink,
    );

    /// Default implementation ignores the message.
    fn handle_control(&mut self, _message: ControlMessage) {}

    /// Return to the freshly constructed state, keeping parameters.
    fn reset(&mut self);
}

/// Allow boxed units to be used as units (for dynamic dispatch)
impl Unit for Box<dyn Unit> {
    fn type_name(&self) -> &'static str {
        (**self).type_name()
    }

    fn layout(&self) -> &'static PortLayout {
        (**self).layout()
    }

    fn params(&self) -> &Arc<ParamSet> {
        (**self).params()
    }

    fn process(
        &mut self,
        inputs: &Inputs,
        outputs: &mut Outputs,
        ctx: &RenderCtx,
        events: &mut EventSink,
    ) {
        (**self).process(inputs, outputs, ctx, events)
    }

    fn handle_control(&mut self, message: ControlMessage) {
        (**self).handle_control(message)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
