use std::{collections::BTreeSet, ops::Range};

use crate::graph::PortLayout;

/*
Topology
========

The control side describes the patch as units in slots plus a list of
edges (output port → input port). Before the audio side sees it, that
description is flattened into an immutable `Topology`:

  units    processing order, each with its lane ranges
  routes   for every patched input lane: (source output lane, gain)
  defaults value of every unpatched input lane

The audio side never walks the edge list. For each unit in order it fills
the unit's input lanes from `routes`/`defaults`, then calls `process`.

Ordering
--------

Kahn's algorithm, lowest slot first among the units that are ready:

    clock ─→ euclid ─→ env ─→ vca ─→ filter ─→ delay
                       osc ──┘

A cycle never becomes ready on its own, so the sort runs over groups of
units that can all reach each other (strongly connected components) rather
than single units. A group is emitted whole, in slot order, once everything
feeding it has run:

    0 ─→ [1 ⇄ 2] ─→ 3        order: 0, 1, 2, 3

Inside a group, an edge whose source comes later in the order reads that
source's output from the previous block: every feedback loop is delayed by
exactly one block, and a patch with cycles is never rejected.

Channel Adaptation
------------------

    1 → 1, 2 → 2   lane to lane
    1 → 2          mono fans out to both lanes
    2 → 1          average of the two lanes

Several edges into the same input lane sum.
*/

/// One connection between two slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Edge {
    pub src: usize,
    pub out_port: usize,
    pub dst: usize,
    pub in_port: usize,
}

/// Control-side record of an occupied slot.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SlotLayout {
    pub generation: u32,
    pub layout: &'static PortLayout,
    pub in_start: usize,
    pub out_start: usize,
}

impl SlotLayout {
    pub fn inputs(&self) -> Range<usize> {
        self.in_start..self.in_start + self.layout.input_lanes()
    }

    pub fn outputs(&self) -> Range<usize> {
        self.out_start..self.out_start + self.layout.output_lanes()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Route {
    pub dst_lane: usize,
    pub src_lane: usize,
    pub gain: f32,
}

#[derive(Debug, Clone)]
pub struct Placement {
    pub slot: usize,
    pub generation: u32,
    pub inputs: Range<usize>,
    pub outputs: Range<usize>,
    /// Range into `Topology::routes`.
    pub routes: Range<usize>,
}

/// Immutable snapshot the audio side renders from.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub units: Vec<Placement>,
    pub routes: Vec<Route>,
    pub defaults: Vec<f32>,
    pub connected: Vec<bool>,
    /// Output lanes (left, right) copied to the rack output.
    pub output: Option<(usize, usize)>,
}

impl Topology {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Slots in processing order.
    pub fn order(&self) -> impl Iterator<Item = usize> + '_ {
        self.units.iter().map(|p| p.slot)
    }
}

/// Slots reachable from `start` through at least one edge.
fn reachable(start: usize, successors: &[Vec<usize>]) -> Vec<bool> {
    let mut seen = vec![false; successors.len()];
    let mut stack: Vec<usize> = successors[start].clone();
    while let Some(slot) = stack.pop() {
        if !seen[slot] {
            seen[slot] = true;
            stack.extend(successors[slot].iter().copied());
        }
    }
    seen
}

/// Processing order for the occupied slots. Units on a cycle are emitted
/// together in slot order.
pub(crate) fn process_order(occupied: &[bool], edges: &[Edge]) -> Vec<usize> {
    let n = occupied.len();
    let live = |e: &&Edge| e.src < n && e.dst < n && occupied[e.src] && occupied[e.dst];

    let mut successors = vec![Vec::new(); n];
    for e in edges.iter().filter(live) {
        successors[e.src].push(e.dst);
    }
    let reach: Vec<Vec<bool>> = (0..n).map(|s| reachable(s, &successors)).collect();

    // Each group is named after its lowest slot.
    let group: Vec<usize> = (0..n)
        .map(|i| {
            (0..n)
                .find(|&j| j == i || (reach[i][j] && reach[j][i]))
                .unwrap_or(i)
        })
        .collect();

    let mut in_degree = vec![0usize; n];
    for e in edges.iter().filter(live) {
        if group[e.src] != group[e.dst] {
            in_degree[group[e.dst]] += 1;
        }
    }

    let mut ready: BTreeSet<usize> = (0..n)
        .filter(|&s| occupied[s] && group[s] == s && in_degree[s] == 0)
        .collect();
    let mut order = Vec::with_capacity(n);

    while let Some(g) = ready.pop_first() {
        let members: Vec<usize> = (g..n).filter(|&s| occupied[s] && group[s] == g).collect();
        for &member in &members {
            for &dst in &successors[member] {
                let target = group[dst];
                if target != g {
                    in_degree[target] -= 1;
                    if in_degree[target] == 0 {
                        ready.insert(target);
                    }
                }
            }
        }
        order.extend(members);
    }
    order
}

/// Push the lane mappings for one edge.
fn adapt(routes: &mut Vec<Route>, src: Range<usize>, dst: Range<usize>) {
    let (src_ch, dst_ch) = (src.len(), dst.len());
    if src_ch == 0 || dst_ch == 0 {
        return;
    }
    if dst_ch == 1 && src_ch > 1 {
        let gain = 1.0 / src_ch as f32;
        for src_lane in src {
            routes.push(Route {
                dst_lane: dst.start,
                src_lane,
                gain,
            });
        }
        return;
    }
    for (i, dst_lane) in dst.enumerate() {
        routes.push(Route {
            dst_lane,
            src_lane: src.start + i % src_ch,
            gain: 1.0,
        });
    }
}

fn port_lanes(start: usize, ports: &[crate::graph::PortDef], port: usize) -> Option<Range<usize>> {
    let def = ports.get(port)?;
    let offset: usize = ports[..port].iter().map(|p| p.channels).sum();
    Some(start + offset..start + offset + def.channels)
}

pub(crate) fn build(
    slots: &[Option<SlotLayout>],
    edges: &[Edge],
    output: Option<(usize, usize)>,
    input_lanes: usize,
) -> Topology {
    let occupied: Vec<bool> = slots.iter().map(Option::is_some).collect();
    let mut topology = Topology {
        units: Vec::new(),
        routes: Vec::new(),
        defaults: vec![0.0; input_lanes],
        connected: vec![false; input_lanes],
        output: None,
    };

    for slot in slots.iter().flatten() {
        for (lane, value) in slot.inputs().zip(slot.layout.input_defaults()) {
            topology.defaults[lane] = value;
        }
    }

    for slot in process_order(&occupied, edges) {
        let Some(dst) = slots[slot] else { continue };
        let first_route = topology.routes.len();

        for edge in edges.iter().filter(|e| e.dst == slot) {
            let Some(src) = slots.get(edge.src).copied().flatten() else {
                continue;
            };
            let src_lanes = port_lanes(src.out_start, src.layout.outputs, edge.out_port);
            let dst_lanes = port_lanes(dst.in_start, dst.layout.inputs, edge.in_port);
            if let (Some(s), Some(d)) = (src_lanes, dst_lanes) {
                for lane in d.clone() {
                    topology.connected[lane] = true;
                }
                adapt(&mut topology.routes, s, d);
            }
        }
        // Group by destination lane so the renderer can clear each lane once.
        topology.routes[first_route..].sort_by_key(|r| r.dst_lane);

        topology.units.push(Placement {
            slot,
            generation: dst.generation,
            inputs: dst.inputs(),
            outputs: dst.outputs(),
            routes: first_route..topology.routes.len(),
        });
    }

    topology.output = output.and_then(|(slot, port)| {
        let s = slots.get(slot).copied().flatten()?;
        let lanes = port_lanes(s.out_start, s.layout.outputs, port)?;
        Some(if lanes.len() >= 2 {
            (lanes.start, lanes.start + 1)
        } else {
            (lanes.start, lanes.start)
        })
    });

    topology
}

/// First gap of `len` lanes in `0..capacity` not covered by `used`.
pub(crate) fn allocate_lanes(
    used: impl Iterator<Item = Range<usize>>,
    len: usize,
    capacity: usize,
) -> Option<usize> {
    let mut used: Vec<Range<usize>> = used.filter(|r| !r.is_empty()).collect();
    used.sort_by_key(|r| r.start);
    let mut cursor = 0;
    for r in used {
        if r.start >= cursor + len {
            break;
        }
        cursor = cursor.max(r.end);
    }
    (cursor + len <= capacity).then_some(cursor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(src: usize, dst: usize) -> Edge {
        Edge {
            src,
            out_port: 0,
            dst,
            in_port: 0,
        }
    }

    #[test]
    fn chain_is_ordered_upstream_first() {
        let occupied = [true; 4];
        let edges = [edge(3, 1), edge(1, 0), edge(0, 2)];
        assert_eq!(process_order(&occupied, &edges), vec![3, 1, 0, 2]);
    }

    #[test]
    fn independent_units_keep_slot_order() {
        let occupied = [true, false, true, true];
        assert_eq!(process_order(&occupied, &[]), vec![0, 2, 3]);
    }

    #[test]
    fn cycles_run_as_a_group() {
        let occupied = [true; 4];
        // 1 ⇄ 2, then 2 → 3; 0 feeds the loop.
        let edges = [edge(0, 1), edge(1, 2), edge(2, 1), edge(2, 3)];
        assert_eq!(process_order(&occupied, &edges), vec![0, 1, 2, 3]);

        // The loop feeds slot 0, so it has to run first.
        let edges = [edge(2, 1), edge(1, 2), edge(2, 0)];
        assert_eq!(process_order(&occupied, &edges), vec![1, 2, 0, 3]);
    }

    #[test]
    fn edges_to_empty_slots_are_ignored() {
        let occupied = [true, false, true];
        let edges = [edge(1, 0), edge(0, 2)];
        assert_eq!(process_order(&occupied, &edges), vec![0, 2]);
    }

    #[test]
    fn self_loop_still_renders() {
        let occupied = [true];
        assert_eq!(process_order(&occupied, &[edge(0, 0)]), vec![0]);
    }

    #[test]
    fn mono_fans_out_and_stereo_averages() {
        let mut routes = Vec::new();
        adapt(&mut routes, 4..5, 10..12);
        assert_eq!(
            routes,
            vec![
                Route { dst_lane: 10, src_lane: 4, gain: 1.0 },
                Route { dst_lane: 11, src_lane: 4, gain: 1.0 },
            ]
        );

        routes.clear();
        adapt(&mut routes, 4..6, 10..11);
        assert_eq!(
            routes,
            vec![
                Route { dst_lane: 10, src_lane: 4, gain: 0.5 },
                Route { dst_lane: 10, src_lane: 5, gain: 0.5 },
            ]
        );
    }

    #[test]
    fn lanes_fill_the_first_gap() {
        let used = vec![0..4, 6..10];
        assert_eq!(allocate_lanes(used.clone().into_iter(), 2, 16), Some(4));
        assert_eq!(allocate_lanes(used.clone().into_iter(), 3, 16), Some(10));
        assert_eq!(allocate_lanes(used.into_iter(), 7, 16), None);
        assert_eq!(allocate_lanes(std::iter::empty(), 0, 0), Some(0));
    }
}
