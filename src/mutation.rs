//! The mutation sweep.
//!
//! The request tree is flattened (depth first) into an ordered list of
//! mutation units. A unit is either a single fuzzable leaf or a block bound
//! to a group primitive, which owns its own nested list. Exactly one leaf is
//! away from its default at any time, so the number of cases is the sum of
//! the leaves' candidate counts; a group-bound block multiplies its inner sum
//! by the number of group values.

use crate::blocks::{Item, Node, NodeId};

/// A field with a finite, deterministic list of mutation candidates.
pub trait Mutate {
    /// Number of candidates this field walks through in one sweep.
    fn num_mutations(&self) -> u64;

    /// Candidates consumed so far.
    fn mutant_index(&self) -> u64;

    /// Move to the next candidate. Returns `false` (and changes nothing) once exhausted.
    fn mutate(&mut self) -> bool;

    /// Restore the default value and rewind.
    fn reset(&mut self);
}

#[derive(Debug, Clone)]
enum Unit {
    Leaf(NodeId),
    Grouped(GroupedBlock),
}

/// A block whose inner sweep is replayed once per value of a group primitive.
#[derive(Debug, Clone)]
struct GroupedBlock {
    group: NodeId,
    group_len: usize,
    index: usize,
    inner: Sweep,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Sweep {
    units: Vec<Unit>,
    cursor: usize,
}

fn leaf_mut(items: &mut [Item], id: NodeId) -> Option<&mut dyn Mutate> {
    items.get_mut(id.0).and_then(|item| item.node.as_mutate_mut())
}

fn select_group(items: &mut [Item], group: NodeId, index: usize) {
    if let Some(Node::Primitive(p)) = items.get_mut(group.0).map(|i| &mut i.node) {
        if let Some(g) = p.as_group_mut() {
            g.select(index);
        }
    }
}

impl Sweep {
    /// Flatten the children of `root`.
    pub(crate) fn plan(items: &[Item], root: NodeId) -> Sweep {
        let mut units = Vec::new();
        if let Node::Block(b) = &items[root.0].node {
            for &child in &b.children {
                collect(items, child, &mut units);
            }
        }
        Sweep { units, cursor: 0 }
    }

    pub(crate) fn num_mutations(&self, items: &[Item]) -> u64 {
        self.units
            .iter()
            .map(|u| match u {
                Unit::Leaf(id) => items[id.0]
                    .node
                    .as_mutate()
                    .map_or(0, |m| m.num_mutations()),
                Unit::Grouped(g) => g
                    .inner
                    .num_mutations(items)
                    .saturating_mul(g.group_len as u64),
            })
            .fold(0u64, |acc, n| acc.saturating_add(n))
    }

    /// Advance by one case. `false` means every unit is exhausted; the caller resets.
    pub(crate) fn step(&mut self, items: &mut [Item]) -> bool {
        while let Some(unit) = self.units.get_mut(self.cursor) {
            let advanced = match unit {
                Unit::Leaf(id) => leaf_mut(items, *id).map_or(false, |m| m.mutate()),
                Unit::Grouped(g) => g.step(items),
            };
            if advanced {
                return true;
            }
            unit_reset(unit, items);
            self.cursor += 1;
        }
        false
    }

    pub(crate) fn reset(&mut self, items: &mut [Item]) {
        for unit in &mut self.units {
            unit_reset(unit, items);
        }
        self.cursor = 0;
    }

    /// Leaf currently away from its default, if any.
    pub(crate) fn current(&self) -> Option<NodeId> {
        match self.units.get(self.cursor)? {
            Unit::Leaf(id) => Some(*id),
            Unit::Grouped(g) => g.inner.current().or(Some(g.group)),
        }
    }
}

fn unit_reset(unit: &mut Unit, items: &mut [Item]) {
    match unit {
        Unit::Leaf(id) => {
            if let Some(m) = leaf_mut(items, *id) {
                m.reset();
            }
        }
        Unit::Grouped(g) => {
            g.inner.reset(items);
            g.index = 0;
            select_group(items, g.group, 0);
        }
    }
}

impl GroupedBlock {
    fn step(&mut self, items: &mut [Item]) -> bool {
        while self.index < self.group_len {
            select_group(items, self.group, self.index);
            if self.inner.step(items) {
                return true;
            }
            self.inner.reset(items);
            self.index += 1;
        }
        false
    }
}

fn collect(items: &[Item], id: NodeId, out: &mut Vec<Unit>) {
    match &items[id.0].node {
        Node::Block(b) => {
            let mut units = Vec::new();
            for &child in &b.children {
                if Some(child) != b.group {
                    collect(items, child, &mut units);
                }
            }
            match b.group {
                Some(group) => {
                    let group_len = match &items[group.0].node {
                        Node::Primitive(p) => p.as_group().map_or(0, |g| g.values().len()),
                        _ => 0,
                    };
                    out.push(Unit::Grouped(GroupedBlock {
                        group,
                        group_len,
                        index: 0,
                        inner: Sweep { units, cursor: 0 },
                    }));
                }
                None => out.extend(units),
            }
        }
        node => {
            if node.as_mutate().map_or(false, |m| m.num_mutations() > 0) {
                out.push(Unit::Leaf(id));
            }
        }
    }
}
