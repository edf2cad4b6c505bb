//! Pool of delay buffers for click-free delay-time changes.

use std::f32::consts::{FRAC_PI_2, TAU};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{
    dc_blocker::DcBlocker,
    delay::DelayLine,
    slew::OnePole,
    util::{flush_denormal, sanitize},
};

/*
Stable Delay-Time Changes
=========================

Moving the read head of a running delay line has two classic outcomes:

  - jump it, and the output splices two unrelated parts of the buffer (click),
  - glide it, and the echoes are resampled on the way (tape-style pitch bend).

"Stable" mode does neither. The pool owns a handful of pre-allocated ring
buffers. When the requested time settles on a new value (debounced, and only
if the change is big enough to matter) a fresh buffer is assigned that time
and an equal-power cross-fade hands over both the input and the output:

    input ──┬── cos ──→ [old buffer] ──→ cos ──┐
            │                                   (+)──→ wet
            └── sin ──→ [new buffer] ──→ sin ──┘

After the fade the old buffer stops receiving input but keeps running its
feedback loop until its energy falls below a silence threshold; only then is
it cleared and returned to the pool. If every buffer is busy, the quietest
decaying one is reclaimed early rather than refusing the change.


Buffer States
-------------

    Inactive ──claim──→ FadingIn ──fade done──→ Writing
                                                   │ next change
    Inactive ←─silent── Decaying ←──fade done── FadingOut

Exactly one buffer is the designated write target (`current`). A fading-out
buffer still receives the tail of the input fade, but ownership only moves
when the fade window ends.


Feedback
--------

Every live buffer runs its feedback loop every sample, so echo tails keep
decaying with the same character after a hand-over. The loop for each buffer:

    read → cross-feed (mode) → tone low-pass → DC blocker → × feedback → write

  Mono      both channels receive the average of the two reads
  Stereo    channels are independent
  PingPong  left and right feedback swap every repeat
  Matrix    weighted mix: own·(1 − cross) + other·cross

Feedback is capped below 1.0 and every stage in the loop has gain ≤ 1 at
all frequencies, so any echo eventually decays.
*/

pub const POOL_SIZE: usize = 4;
pub const CROSSFADE_SECONDS: f32 = 0.05;
pub const DEBOUNCE_SECONDS: f32 = 0.03;
/// Relative time change below which no new buffer is claimed.
pub const CHANGE_THRESHOLD: f32 = 0.02;
/// Mean-square level under which a decaying buffer counts as silent.
pub const SILENCE_THRESHOLD: f32 = 1e-8;
pub const FEEDBACK_MAX: f32 = 0.95;
/// Glide time of the read head outside stable mode.
pub const GLIDE_SECONDS: f32 = 0.05;
const ENERGY_SECONDS: f32 = 0.05;
const DC_BLOCK_HZ: f32 = 5.0;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayMode {
    Mono,
    Stereo,
    PingPong,
    Matrix,
}

impl DelayMode {
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => DelayMode::Mono,
            1 => DelayMode::Stereo,
            2 => DelayMode::PingPong,
            _ => DelayMode::Matrix,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Inactive,
    FadingIn,
    Writing,
    FadingOut,
    Decaying,
}

/// Per-block feedback configuration.
#[derive(Debug, Clone, Copy)]
pub struct FeedbackSettings {
    pub feedback: f32,
    pub mode: DelayMode,
    pub cross: f32,
    tone_coeff: f32,
}

impl FeedbackSettings {
    pub fn new(feedback: f32, mode: DelayMode, cross: f32, tone_hz: f32, sample_rate: f32) -> Self {
        let tone_coeff = 1.0 - (-TAU * tone_hz.max(1.0) / sample_rate.max(1.0)).exp();
        Self {
            feedback: sanitize(feedback).clamp(0.0, FEEDBACK_MAX),
            mode,
            cross: sanitize(cross).clamp(0.0, 1.0),
            tone_coeff: if tone_coeff.is_finite() {
                tone_coeff.clamp(0.0, 1.0)
            } else {
                1.0
            },
        }
    }

    #[inline]
    fn route(&self, left: f32, right: f32) -> (f32, f32) {
        match self.mode {
            DelayMode::Mono => {
                let m = 0.5 * (left + right);
                (m, m)
            }
            DelayMode::Stereo => (left, right),
            DelayMode::PingPong => (right, left),
            DelayMode::Matrix => {
                let own = 1.0 - self.cross;
                (
                    own * left + self.cross * right,
                    own * right + self.cross * left,
                )
            }
        }
    }

    #[inline]
    fn route_input(&self, left: f32, right: f32) -> (f32, f32) {
        match self.mode {
            DelayMode::Mono => {
                let m = 0.5 * (left + right);
                (m, m)
            }
            // Ping-pong starts every echo on the left.
            DelayMode::PingPong => (0.5 * (left + right), 0.0),
            DelayMode::Stereo | DelayMode::Matrix => (left, right),
        }
    }
}

/// Read-only view of one pool slot.
#[derive(Debug, Clone, Copy)]
pub struct SlotView {
    pub state: SlotState,
    pub delay: f32,
    pub energy: f32,
    pub output_gain: f32,
    pub last_read: (f32, f32),
}

struct Slot {
    left: DelayLine,
    right: DelayLine,
    state: SlotState,
    delay: f32,
    input_gain: f32,
    output_gain: f32,
    energy: f32,
    since_input: usize,
    tone: [f32; 2],
    dc: [DcBlocker; 2],
    last_read: (f32, f32),
}

impl Slot {
    fn new(max_delay_samples: usize, sample_rate: f32) -> Self {
        Self {
            left: DelayLine::new(max_delay_samples),
            right: DelayLine::new(max_delay_samples),
            state: SlotState::Inactive,
            delay: 1.0,
            input_gain: 0.0,
            output_gain: 0.0,
            energy: 0.0,
            since_input: 0,
            tone: [0.0; 2],
            dc: [
                DcBlocker::new(DC_BLOCK_HZ, sample_rate),
                DcBlocker::new(DC_BLOCK_HZ, sample_rate),
            ],
            last_read: (0.0, 0.0),
        }
    }

    /// Prepare for a new delay time: size, clear and zero all loop state.
    fn activate(&mut self, delay: f32, active_len: usize) {
        self.left.set_active_len(active_len);
        self.right.set_active_len(active_len);
        self.delay = delay;
        self.state = SlotState::FadingIn;
        self.input_gain = 0.0;
        self.output_gain = 0.0;
        self.energy = 0.0;
        self.since_input = 0;
        self.tone = [0.0; 2];
        self.dc.iter_mut().for_each(DcBlocker::reset);
        self.last_read = (0.0, 0.0);
    }

    fn deactivate(&mut self) {
        self.left.clear();
        self.right.clear();
        self.state = SlotState::Inactive;
        self.input_gain = 0.0;
        self.output_gain = 0.0;
        self.energy = 0.0;
        self.tone = [0.0; 2];
        self.dc.iter_mut().for_each(DcBlocker::reset);
        self.last_read = (0.0, 0.0);
    }

    fn is_live(&self) -> bool {
        self.state != SlotState::Inactive
    }

    #[inline]
    fn tick(
        &mut self,
        input: (f32, f32),
        settings: &FeedbackSettings,
        energy_coeff: f32,
    ) -> (f32, f32) {
        let read_l = self.left.read_interpolated(self.delay);
        let read_r = self.right.read_interpolated(self.delay);
        self.last_read = (read_l, read_r);

        let power = 0.5 * (read_l * read_l + read_r * read_r);
        self.energy = flush_denormal(self.energy + (sanitize(power) - self.energy) * energy_coeff);

        let (fb_l, fb_r) = settings.route(read_l, read_r);
        self.tone[0] = flush_denormal(self.tone[0] + (fb_l - self.tone[0]) * settings.tone_coeff);
        self.tone[1] = flush_denormal(self.tone[1] + (fb_r - self.tone[1]) * settings.tone_coeff);
        let fb_l = self.dc[0].process(self.tone[0]) * settings.feedback;
        let fb_r = self.dc[1].process(self.tone[1]) * settings.feedback;

        self.left.write(input.0 * self.input_gain + fb_l);
        self.right.write(input.1 * self.input_gain + fb_r);

        (read_l * self.output_gain, read_r * self.output_gain)
    }
}

pub struct DelayPool {
    slots: Vec<Slot>,
    current: usize,
    previous: Option<usize>,
    fade_pos: usize,
    fade_len: usize,
    pending: Option<f32>,
    pending_age: usize,
    debounce_len: usize,
    target: f32,
    stable: bool,
    /// False until the first time request after construction or reset.
    primed: bool,
    glide: OnePole,
    energy_coeff: f32,
    max_delay_samples: usize,
}

impl DelayPool {
    pub fn new(max_delay_seconds: f32, sample_rate: f32) -> Self {
        let sample_rate = sample_rate.max(1.0);
        let max_delay_samples = (max_delay_seconds.max(0.0) * sample_rate).ceil() as usize + 2;
        let slots = (0..POOL_SIZE)
            .map(|_| Slot::new(max_delay_samples, sample_rate))
            .collect();

        let mut glide = OnePole::new(1.0);
        glide.set_time(GLIDE_SECONDS, sample_rate);

        let mut pool = Self {
            slots,
            current: 0,
            previous: None,
            fade_pos: 0,
            fade_len: ((CROSSFADE_SECONDS * sample_rate) as usize).max(1),
            pending: None,
            pending_age: 0,
            debounce_len: ((DEBOUNCE_SECONDS * sample_rate) as usize).max(1),
            target: 1.0,
            stable: true,
            primed: false,
            glide,
            energy_coeff: 1.0 - (-1.0 / (ENERGY_SECONDS * sample_rate)).exp(),
            max_delay_samples,
        };
        pool.reset();
        pool
    }

    /// Longest delay, in samples, any buffer can hold.
    pub fn max_delay_samples(&self) -> f32 {
        self.slots[0].left.capacity() as f32
    }

    /// Request a delay time. Called every sample; cheap when nothing changes.
    pub fn set_target(&mut self, delay_samples: f32, stable: bool) {
        let delay_samples = if delay_samples.is_finite() {
            delay_samples.clamp(1.0, self.max_delay_samples())
        } else {
            self.target
        };
        self.target = delay_samples;
        self.stable = stable;

        // Nothing has been written yet, so the first request is installed in
        // the write slot directly instead of being faded in.
        if !self.primed {
            self.primed = true;
            self.slots[self.current].delay = delay_samples;
            self.glide.set_value(delay_samples);
            return;
        }

        let current = &self.slots[self.current];
        let fits = delay_samples <= current.left.max_delay();

        if !stable && fits {
            self.pending = None;
            self.pending_age = 0;
            return;
        }

        let reference = current.delay;
        if (delay_samples - reference).abs() <= CHANGE_THRESHOLD * reference {
            self.pending = None;
            self.pending_age = 0;
            return;
        }

        match self.pending {
            Some(p) if (delay_samples - p).abs() <= CHANGE_THRESHOLD * p => {
                self.pending_age = self.pending_age.saturating_add(1);
            }
            _ => {
                self.pending = Some(delay_samples);
                self.pending_age = 0;
            }
        }

        // Outside stable mode a target beyond the current buffer skips the
        // debounce; the glide cannot reach it anyway.
        let settled = self.pending_age >= self.debounce_len || !stable;
        if settled && self.previous.is_none() {
            if let Some(target) = self.pending.take() {
                self.start_crossfade(target);
            }
        }
    }

    fn start_crossfade(&mut self, delay: f32) {
        let index = self.claim_slot();
        let active_len = if self.stable {
            delay.ceil() as usize + 1
        } else {
            self.max_delay_samples
        };

        self.slots[index].activate(delay, active_len);
        self.slots[self.current].state = SlotState::FadingOut;
        self.previous = Some(self.current);
        self.current = index;
        self.fade_pos = 0;
        self.pending_age = 0;
        self.glide.set_value(delay);
    }

    /// Pick a slot for a new delay time: a free one if possible, otherwise the
    /// quietest decaying one.
    fn claim_slot(&mut self) -> usize {
        if let Some(free) = self
            .slots
            .iter()
            .enumerate()
            .position(|(i, s)| i != self.current && s.state == SlotState::Inactive)
        {
            return free;
        }

        let quietest = self
            .slots
            .iter()
            .enumerate()
            .filter(|(i, s)| *i != self.current && s.state == SlotState::Decaying)
            .min_by(|(_, a), (_, b)| a.energy.total_cmp(&b.energy))
            .map(|(i, _)| i)
            .unwrap_or((self.current + 1) % POOL_SIZE);

        self.slots[quietest].deactivate();
        quietest
    }

    fn advance_fade(&mut self) {
        let Some(previous) = self.previous else {
            return;
        };

        self.fade_pos += 1;
        let progress = (self.fade_pos as f32 / self.fade_len as f32).min(1.0);
        let fade_in = (progress * FRAC_PI_2).sin();
        let fade_out = (progress * FRAC_PI_2).cos();

        let incoming = &mut self.slots[self.current];
        incoming.input_gain = fade_in;
        incoming.output_gain = fade_in;

        let outgoing = &mut self.slots[previous];
        outgoing.input_gain = fade_out;
        outgoing.output_gain = fade_out;

        if self.fade_pos >= self.fade_len {
            outgoing.state = SlotState::Decaying;
            outgoing.input_gain = 0.0;
            outgoing.output_gain = 0.0;
            outgoing.since_input = 0;

            let incoming = &mut self.slots[self.current];
            incoming.state = SlotState::Writing;
            incoming.input_gain = 1.0;
            incoming.output_gain = 1.0;
            self.previous = None;
        }
    }

    /// Process one stereo sample; returns the wet signal.
    pub fn process(&mut self, input: (f32, f32), settings: &FeedbackSettings) -> (f32, f32) {
        self.advance_fade();

        if !self.stable && self.previous.is_none() {
            let target = self.target.min(self.slots[self.current].left.max_delay());
            self.slots[self.current].delay = self.glide.next(target).max(1.0);
        }

        let input = settings.route_input(sanitize(input.0), sanitize(input.1));
        let mut wet = (0.0, 0.0);

        for slot in self.slots.iter_mut().filter(|s| s.is_live()) {
            let (l, r) = slot.tick(input, settings, self.energy_coeff);
            wet.0 += l;
            wet.1 += r;

            if slot.state == SlotState::Decaying {
                slot.since_input = slot.since_input.saturating_add(1);
                let drained = slot.since_input as f32 > slot.delay;
                if drained && slot.energy < SILENCE_THRESHOLD {
                    slot.deactivate();
                }
            }
        }

        (sanitize(wet.0), sanitize(wet.1))
    }

    /// Slot currently designated as the write target.
    pub fn write_target(&self) -> usize {
        self.current
    }

    /// Progress of the running cross-fade, if any.
    pub fn fade_progress(&self) -> Option<f32> {
        self.previous
            .map(|_| (self.fade_pos as f32 / self.fade_len as f32).min(1.0))
    }

    pub fn fade_len(&self) -> usize {
        self.fade_len
    }

    pub fn current_delay(&self) -> f32 {
        self.slots[self.current].delay
    }

    pub fn active_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_live()).count()
    }

    pub fn slot(&self, index: usize) -> Option<SlotView> {
        self.slots.get(index).map(|s| SlotView {
            state: s.state,
            delay: s.delay,
            energy: s.energy,
            output_gain: s.output_gain,
            last_read: s.last_read,
        })
    }

    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.deactivate();
        }
        let delay = self.glide.value().clamp(1.0, self.max_delay_samples());
        self.current = 0;
        self.previous = None;
        self.pending = None;
        self.pending_age = 0;
        self.fade_pos = 0;
        self.primed = false;

        let first = &mut self.slots[0];
        first.activate(delay, self.max_delay_samples);
        first.state = SlotState::Writing;
        first.input_gain = 1.0;
        first.output_gain = 1.0;
    }
}
