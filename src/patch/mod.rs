//! Connection graph: which unit output feeds which unit input.
//!
//! [`Patch::new`] returns two halves. [`Patch`] stays on the control thread
//! and owns the description of the graph; [`Rack`] moves into the audio
//! callback and renders it. They share nothing but lock-free channels:
//!
//! - new and removed units travel through an rtrb command queue,
//! - the wiring is published as an immutable [`topology::Topology`] through
//!   `ArcSwap`, loaded once per block,
//! - parameters are written straight into each unit's `Arc<ParamSet>`,
//! - notifications come back through a second rtrb queue.

use std::{
    fmt,
    ops::Range,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use arc_swap::ArcSwap;
use log::{debug, info, warn};
use rtrb::{Consumer, Producer, RingBuffer};
use thiserror::Error;

use crate::{
    graph::{ParamError, ParamSet, Unit},
    io::message::{ControlMessage, Notification, NotificationReceiver},
};

pub mod config;
pub mod rack;
pub mod topology;

pub use config::RackConfig;
pub use rack::Rack;
use topology::{allocate_lanes, Edge, SlotLayout, Topology};

/// Handle to a unit in a patch. The generation changes every time a slot is
/// reused, so a stale handle never reaches the new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId {
    pub slot: u32,
    pub generation: u32,
}

impl UnitId {
    /// Id carried by notifications from units run outside a rack.
    pub const DETACHED: UnitId = UnitId {
        slot: u32::MAX,
        generation: 0,
    };
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}.{}", self.slot, self.generation)
    }
}

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("{0} is not in the patch")]
    UnknownUnit(UnitId),
    #[error("{unit} has no input port {port}")]
    NoSuchInput { unit: UnitId, port: usize },
    #[error("{unit} has no output port {port}")]
    NoSuchOutput { unit: UnitId, port: usize },
    #[error(transparent)]
    Param(#[from] ParamError),
    #[error("all {0} unit slots are in use")]
    UnitCapacity(usize),
    #[error("not enough free lanes for {needed} more (capacity {capacity})")]
    LaneCapacity { needed: usize, capacity: usize },
    #[error("command queue is full")]
    QueueFull,
}

/// Control → audio commands.
pub(crate) enum RackCommand {
    Insert {
        id: UnitId,
        unit: Box<dyn Unit>,
        /// Output lanes to clear before the unit first runs.
        outputs: Range<usize>,
    },
    Remove {
        id: UnitId,
    },
    Control {
        id: UnitId,
        message: ControlMessage,
    },
}

struct SlotInfo {
    layout: SlotLayout,
    type_name: &'static str,
    params: Arc<ParamSet>,
}

/// Control-side half of a patch.
pub struct Patch {
    config: RackConfig,
    slots: Vec<Option<SlotInfo>>,
    generations: Vec<u32>,
    edges: Vec<Edge>,
    output: Option<(usize, usize)>,
    topology: Arc<ArcSwap<Topology>>,
    /// Replaced snapshots the audio side may still be reading.
    retired: Vec<Arc<Topology>>,
    commands: Producer<RackCommand>,
    garbage: Consumer<Box<dyn Unit>>,
    notifications: Consumer<Notification>,
    dropped: Arc<AtomicU64>,
    dropped_reported: u64,
}

impl Patch {
    pub fn new(config: RackConfig) -> (Patch, Rack) {
        let config = config.normalized();
        let topology = Arc::new(ArcSwap::from_pointee(Topology::empty()));
        let (command_tx, command_rx) = RingBuffer::new(config.command_capacity);
        let (garbage_tx, garbage_rx) = RingBuffer::new(config.max_units * 2);
        let (notify_tx, notify_rx) = RingBuffer::new(config.notification_capacity);
        let dropped = Arc::new(AtomicU64::new(0));

        let rack = Rack::new(
            config,
            Arc::clone(&topology),
            command_rx,
            garbage_tx,
            notify_tx,
            Arc::clone(&dropped),
        );
        let patch = Patch {
            config,
            slots: (0..config.max_units).map(|_| None).collect(),
            generations: vec![0; config.max_units],
            edges: Vec::new(),
            output: None,
            topology,
            retired: Vec::new(),
            commands: command_tx,
            garbage: garbage_rx,
            notifications: notify_rx,
            dropped,
            dropped_reported: 0,
        };
        (patch, rack)
    }

    pub fn config(&self) -> &RackConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f32 {
        self.config.sample_rate
    }

    fn slot(&self, id: UnitId) -> Result<&SlotInfo, PatchError> {
        self.slots
            .get(id.slot as usize)
            .and_then(Option::as_ref)
            .filter(|s| s.layout.generation == id.generation)
            .ok_or(PatchError::UnknownUnit(id))
    }

    fn id_of(&self, slot: usize) -> UnitId {
        UnitId {
            slot: slot as u32,
            generation: self.generations[slot],
        }
    }

    /// Currently occupied units in slot order.
    pub fn units(&self) -> impl Iterator<Item = (UnitId, &'static str)> + '_ {
        self.slots.iter().enumerate().filter_map(|(slot, info)| {
            info.as_ref().map(|info| (self.id_of(slot), info.type_name))
        })
    }

    /// Insert a unit. It starts rendering on the next block.
    pub fn add_unit<U: Unit + 'static>(&mut self, unit: U) -> Result<UnitId, PatchError> {
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(PatchError::UnitCapacity(self.config.max_units))?;
        if self.commands.is_full() {
            return Err(PatchError::QueueFull);
        }

        let layout = unit.layout();
        let capacity = self.config.max_lanes;
        let occupied = || self.slots.iter().flatten().map(|s| s.layout);
        let in_start = allocate_lanes(occupied().map(|l| l.inputs()), layout.input_lanes(), capacity)
            .ok_or(PatchError::LaneCapacity {
                needed: layout.input_lanes(),
                capacity,
            })?;
        let out_start =
            allocate_lanes(occupied().map(|l| l.outputs()), layout.output_lanes(), capacity)
                .ok_or(PatchError::LaneCapacity {
                    needed: layout.output_lanes(),
                    capacity,
                })?;

        self.generations[slot] = self.generations[slot].wrapping_add(1);
        let id = self.id_of(slot);
        let info = SlotInfo {
            layout: SlotLayout {
                generation: id.generation,
                layout,
                in_start,
                out_start,
            },
            type_name: unit.type_name(),
            params: Arc::clone(unit.params()),
        };
        let outputs = info.layout.outputs();

        if self
            .commands
            .push(RackCommand::Insert {
                id,
                unit: Box::new(unit),
                outputs,
            })
            .is_err()
        {
            return Err(PatchError::QueueFull);
        }
        info!("added {} as {id}", info.type_name);
        self.slots[slot] = Some(info);
        self.publish();
        Ok(id)
    }

    /// Remove a unit and every edge touching it. The unit itself is handed
    /// back to this side and dropped by [`Patch::collect_garbage`].
    pub fn remove_unit(&mut self, id: UnitId) -> Result<(), PatchError> {
        self.slot(id)?;
        if self.commands.push(RackCommand::Remove { id }).is_err() {
            return Err(PatchError::QueueFull);
        }
        let slot = id.slot as usize;
        self.slots[slot] = None;
        self.edges.retain(|e| e.src != slot && e.dst != slot);
        if self.output.is_some_and(|(s, _)| s == slot) {
            self.output = None;
        }
        info!("removed {id}");
        self.publish();
        Ok(())
    }

    fn edge(
        &self,
        src: UnitId,
        out_port: usize,
        dst: UnitId,
        in_port: usize,
    ) -> Result<Edge, PatchError> {
        if out_port >= self.slot(src)?.layout.layout.outputs.len() {
            return Err(PatchError::NoSuchOutput {
                unit: src,
                port: out_port,
            });
        }
        if in_port >= self.slot(dst)?.layout.layout.inputs.len() {
            return Err(PatchError::NoSuchInput {
                unit: dst,
                port: in_port,
            });
        }
        Ok(Edge {
            src: src.slot as usize,
            out_port,
            dst: dst.slot as usize,
            in_port,
        })
    }

    /// Feed `src`'s output port into `dst`'s input port. Connecting the same
    /// ports twice is a no-op; several sources into one input sum.
    pub fn connect(
        &mut self,
        src: UnitId,
        out_port: usize,
        dst: UnitId,
        in_port: usize,
    ) -> Result<(), PatchError> {
        let edge = self.edge(src, out_port, dst, in_port)?;
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
            debug!("connected {src}:{out_port} -> {dst}:{in_port}");
            self.publish();
        }
        Ok(())
    }

    /// Returns whether the edge existed.
    pub fn disconnect(
        &mut self,
        src: UnitId,
        out_port: usize,
        dst: UnitId,
        in_port: usize,
    ) -> Result<bool, PatchError> {
        let edge = self.edge(src, out_port, dst, in_port)?;
        let before = self.edges.len();
        self.edges.retain(|e| *e != edge);
        let removed = self.edges.len() != before;
        if removed {
            debug!("disconnected {src}:{out_port} -> {dst}:{in_port}");
            self.publish();
        }
        Ok(removed)
    }

    /// Route an output port to the rack output. A mono port feeds both sides.
    pub fn set_output(&mut self, unit: UnitId, port: usize) -> Result<(), PatchError> {
        if port >= self.slot(unit)?.layout.layout.outputs.len() {
            return Err(PatchError::NoSuchOutput { unit, port });
        }
        self.output = Some((unit.slot as usize, port));
        self.publish();
        Ok(())
    }

    pub fn clear_output(&mut self) {
        self.output = None;
        self.publish();
    }

    pub fn set_param(&self, unit: UnitId, name: &str, value: f32) -> Result<(), PatchError> {
        self.slot(unit)?.params.set(name, value)?;
        Ok(())
    }

    /// Shared parameter store of a unit, for UIs that poll or automate it.
    pub fn params(&self, unit: UnitId) -> Result<Arc<ParamSet>, PatchError> {
        Ok(Arc::clone(&self.slot(unit)?.params))
    }

    /// Deliver a control message at the start of the next block.
    pub fn send(&mut self, unit: UnitId, message: ControlMessage) -> Result<(), PatchError> {
        self.slot(unit)?;
        self.commands
            .push(RackCommand::Control { id: unit, message })
            .map_err(|_| {
                warn!("command queue full, dropping {message:?} for {unit}");
                PatchError::QueueFull
            })
    }

    /// Drain pending notifications into `out`.
    pub fn poll_notifications(&mut self, out: &mut Vec<Notification>) -> usize {
        let dropped = self.dropped.load(Ordering::Relaxed);
        if dropped > self.dropped_reported {
            warn!(
                "notification queue overflowed, {} messages lost",
                dropped - self.dropped_reported
            );
            self.dropped_reported = dropped;
        }
        let before = out.len();
        self.notifications.drain_into(out);
        out.len() - before
    }

    /// Notifications lost to a full queue since the patch was created.
    pub fn dropped_notifications(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Drop units the audio side has let go of. Returns how many.
    pub fn collect_garbage(&mut self) -> usize {
        self.release_snapshots();
        let mut count = 0;
        while let Ok(unit) = self.garbage.pop() {
            debug!("dropping retired {}", unit.type_name());
            drop(unit);
            count += 1;
        }
        count
    }

    /// Rebuild the topology and hand it to the audio side.
    fn publish(&mut self) {
        let slots: Vec<Option<SlotLayout>> = self
            .slots
            .iter()
            .map(|s| s.as_ref().map(|s| s.layout))
            .collect();
        let topology = topology::build(&slots, &self.edges, self.output, self.config.max_lanes);
        debug!(
            "publishing topology: {} units, {} routes",
            topology.units.len(),
            topology.routes.len()
        );
        let previous = self.topology.swap(Arc::new(topology));
        self.retired.push(previous);
        self.release_snapshots();
    }

    /// Drop retired snapshots nobody else holds. One still referenced by an
    /// audio-side guard waits for a later call, so the last reference is
    /// always released on the control side.
    fn release_snapshots(&mut self) {
        self.retired.retain(|t| Arc::strong_count(t) > 1);
    }

    /// Slots in the order the audio side processes them.
    pub fn process_order(&self) -> Vec<UnitId> {
        self.topology
            .load()
            .order()
            .map(|slot| self.id_of(slot))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{clock, envelope, filter, EnvelopeUnit, FilterUnit, OscillatorUnit, VcaUnit};

    fn patch() -> (Patch, Rack) {
        Patch::new(RackConfig::default().with_max_units(4).with_max_lanes(16))
    }

    #[test]
    fn ids_are_generational() {
        let (mut patch, _rack) = patch();
        let a = patch.add_unit(VcaUnit::new(48_000.0)).unwrap();
        patch.remove_unit(a).unwrap();
        let b = patch.add_unit(VcaUnit::new(48_000.0)).unwrap();
        assert_eq!(a.slot, b.slot);
        assert_ne!(a, b);
        assert!(matches!(
            patch.set_param(a, "offset", 1.0),
            Err(PatchError::UnknownUnit(_))
        ));
        patch.set_param(b, "offset", 1.0).unwrap();
    }

    #[test]
    fn unit_capacity_is_enforced() {
        let (mut patch, _rack) = patch();
        for _ in 0..4 {
            patch.add_unit(VcaUnit::new(48_000.0)).unwrap();
        }
        assert!(matches!(
            patch.add_unit(VcaUnit::new(48_000.0)),
            Err(PatchError::UnitCapacity(4))
        ));
    }

    #[test]
    fn lane_capacity_is_enforced() {
        let (mut patch, _rack) =
            Patch::new(RackConfig::default().with_max_units(8).with_max_lanes(4));
        patch.add_unit(FilterUnit::new(48_000.0)).unwrap();
        assert!(matches!(
            patch.add_unit(FilterUnit::new(48_000.0)),
            Err(PatchError::LaneCapacity { .. })
        ));
    }

    #[test]
    fn ports_are_validated() {
        let (mut patch, _rack) = patch();
        let osc = patch.add_unit(OscillatorUnit::new(48_000.0)).unwrap();
        let env = patch.add_unit(EnvelopeUnit::new(48_000.0)).unwrap();
        assert!(matches!(
            patch.connect(osc, 3, env, 0),
            Err(PatchError::NoSuchOutput { port: 3, .. })
        ));
        assert!(matches!(
            patch.connect(osc, 0, env, 9),
            Err(PatchError::NoSuchInput { port: 9, .. })
        ));
        patch.connect(osc, 0, env, envelope::GATE).unwrap();
        assert!(patch.disconnect(osc, 0, env, envelope::GATE).unwrap());
        assert!(!patch.disconnect(osc, 0, env, envelope::GATE).unwrap());
    }

    #[test]
    fn unknown_param_is_reported() {
        let (mut patch, _rack) = patch();
        let vca = patch.add_unit(VcaUnit::new(48_000.0)).unwrap();
        assert!(matches!(
            patch.set_param(vca, "cutoff", 1.0),
            Err(PatchError::Param(ParamError::UnknownName(_)))
        ));
    }

    #[test]
    fn order_follows_edges() {
        let (mut patch, _rack) = patch();
        let filter = patch.add_unit(FilterUnit::new(48_000.0)).unwrap();
        let clock = patch.add_unit(crate::graph::ClockUnit::new(48_000.0)).unwrap();
        patch
            .connect(clock, clock::PPQN_OUT, filter, filter::IN)
            .unwrap();
        assert_eq!(patch.process_order(), vec![clock, filter]);
    }

    #[test]
    fn held_snapshots_are_released_on_the_control_side() {
        let (mut patch, _rack) = patch();
        let osc = patch.add_unit(OscillatorUnit::new(48_000.0)).unwrap();
        let env = patch.add_unit(EnvelopeUnit::new(48_000.0)).unwrap();
        assert!(patch.retired.is_empty());

        // Stand-in for the audio side reading while the wiring changes.
        let held = patch.topology.load_full();
        patch.connect(osc, 0, env, envelope::GATE).unwrap();
        assert_eq!(patch.retired.len(), 1);
        assert!(Arc::ptr_eq(&patch.retired[0], &held));

        drop(held);
        assert_eq!(patch.collect_garbage(), 0);
        assert!(patch.retired.is_empty());
    }

    #[test]
    fn removed_units_come_back_for_dropping() {
        let (mut patch, mut rack) = patch();
        let vca = patch.add_unit(VcaUnit::new(48_000.0)).unwrap();
        let (mut l, mut r) = (vec![0.0; 64], vec![0.0; 64]);
        rack.process_block(&mut l, &mut r);
        patch.remove_unit(vca).unwrap();
        rack.process_block(&mut l, &mut r);
        assert_eq!(patch.collect_garbage(), 1);
    }
}
