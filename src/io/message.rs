use rtrb::{Consumer, Producer};

use crate::{dsp::envelope::EnvelopeStage, patch::UnitId};

/*
Messages
========

Two small channels sit beside the parameter store:

  control       → unit    coarse, payload-free commands (reset)
  notification  ← unit    advisory events for display (steps, gates, beats)

Both are bounded SPSC ring buffers. Nothing in the audio path waits on
either: a full notification queue drops the new message and bumps a counter,
and units never depend on a message having been delivered. Losing a "step 5
fired" notification costs a UI repaint, not a wrong sample.
*/

/// Commands delivered to a unit at the start of the next block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Restart phase: envelopes go idle, sequencers return to step 0.
    Reset,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UnitEvent {
    Step {
        index: usize,
        fired: bool,
        accent: bool,
    },
    Gate {
        high: bool,
    },
    Stage(EnvelopeStage),
    Beat {
        count: u64,
    },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Notification {
    pub unit: UnitId,
    /// Absolute sample frame at which the event happened.
    pub frame: u64,
    pub event: UnitEvent,
}

/// Audio-side handle a unit uses to emit notifications for one block.
pub struct EventSink<'a> {
    queue: Option<&'a mut Producer<Notification>>,
    unit: UnitId,
    frame: u64,
    dropped: u64,
}

impl<'a> EventSink<'a> {
    pub fn new(queue: &'a mut Producer<Notification>, unit: UnitId, frame: u64) -> Self {
        Self {
            queue: Some(queue),
            unit,
            frame,
            dropped: 0,
        }
    }

    /// A sink that swallows everything.
    pub fn discard() -> EventSink<'static> {
        EventSink {
            queue: None,
            unit: UnitId::DETACHED,
            frame: 0,
            dropped: 0,
        }
    }

    /// Queue an event that happened `offset` samples into the block.
    pub fn emit(&mut self, offset: usize, event: UnitEvent) {
        let Some(queue) = self.queue.as_deref_mut() else {
            return;
        };
        let notification = Notification {
            unit: self.unit,
            frame: self.frame + offset as u64,
            event,
        };
        if queue.push(notification).is_err() {
            self.dropped += 1;
        }
    }

    /// Notifications lost to a full queue during this block.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

pub trait NotificationReceiver {
    fn pop(&mut self) -> Option<Notification>;

    /// Drain everything currently queued.
    fn drain_into(&mut self, out: &mut Vec<Notification>) {
        while let Some(n) = self.pop() {
            out.push(n);
        }
    }
}

impl NotificationReceiver for Consumer<Notification> {
    fn pop(&mut self) -> Option<Notification> {
        Consumer::pop(self).ok()
    }
}
