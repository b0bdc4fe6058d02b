// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Global operator ordering
//!
//! One true dependency graph is built over every component's operators
//! from their declared footprints, at base-buffer granularity, with the
//! standard hazard rules per base signal:
//!
//! 1. all sets precede all incs
//! 2. all writes (sets and incs) precede all reads
//! 3. everything precedes the signal's unique updater
//!
//! The topological sort breaks ties by insertion order, so the order is
//! reproducible across runs for a fixed model. Synthesized send/receive
//! operators are spliced in afterwards with fractional tags derived from
//! the real operator they must follow or precede.

use crate::error::{ModelError, Result};
use crate::operator::{ModelOp, OpId};
use crate::signal::{Signal, SignalKey};
use crate::Component;
use ahash::AHashMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

/// A position in the global order
///
/// Real operators sit at `(position, 0)`. A synthesized send lands at
/// `(position of its updater, +1)` and a receive at `(position of its
/// first reader, -1)`, so a stable sort interleaves them correctly
/// without renumbering. An integer composite rather than a float: many
/// synthetic ops clustering around one real operator cannot collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderTag {
    pub position: u64,
    pub rank: i8,
}

impl OrderTag {
    pub fn real(position: u64) -> Self {
        OrderTag { position, rank: 0 }
    }

    /// Immediately after the real operator at `position`
    pub fn after(position: u64) -> Self {
        OrderTag { position, rank: 1 }
    }

    /// Immediately before the real operator at `position`
    pub fn before(position: u64) -> Self {
        OrderTag { position, rank: -1 }
    }

    /// The fractional rendering used in artifact descriptions
    pub fn as_f64(&self) -> f64 {
        self.position as f64 + 0.5 * f64::from(self.rank)
    }
}

impl fmt::Display for OrderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rank == 0 {
            write!(f, "{}", self.position)
        } else {
            write!(f, "{:.1}", self.as_f64())
        }
    }
}

/// Hazard-edge dependency graph over `ops`, nodes in insertion order.
fn dependency_graph(ops: &[&ModelOp]) -> DiGraph<OpId, ()> {
    let mut graph = DiGraph::with_capacity(ops.len(), ops.len() * 2);
    let nodes: Vec<NodeIndex> = ops.iter().map(|m| graph.add_node(m.id)).collect();

    let mut sets: AHashMap<SignalKey, Vec<usize>> = AHashMap::new();
    let mut incs: AHashMap<SignalKey, Vec<usize>> = AHashMap::new();
    let mut reads: AHashMap<SignalKey, Vec<usize>> = AHashMap::new();
    let mut ups: AHashMap<SignalKey, Vec<usize>> = AHashMap::new();

    for (i, m) in ops.iter().enumerate() {
        for s in m.op.sets() {
            sets.entry(s.key()).or_default().push(i);
        }
        for s in m.op.incs() {
            incs.entry(s.key()).or_default().push(i);
        }
        for s in m.op.reads() {
            reads.entry(s.key()).or_default().push(i);
        }
        for s in m.op.updates() {
            ups.entry(s.key()).or_default().push(i);
        }
    }

    let connect = |graph: &mut DiGraph<OpId, ()>, from: &[usize], to: &[usize]| {
        for &b in from {
            for &a in to {
                if b != a {
                    graph.update_edge(nodes[b], nodes[a], ());
                }
            }
        }
    };

    // 1) sets precede incs
    for (key, after) in &incs {
        if let Some(before) = sets.get(key) {
            connect(&mut graph, before, after);
        }
    }

    // 2) writes precede reads
    for (key, after) in &reads {
        for before in [sets.get(key), incs.get(key)].into_iter().flatten() {
            connect(&mut graph, before, after);
        }
    }

    // 3) everything precedes the updater
    for (key, after) in &ups {
        for before in [sets.get(key), incs.get(key), reads.get(key)]
            .into_iter()
            .flatten()
        {
            connect(&mut graph, before, after);
        }
    }

    graph
}

/// Kahn's algorithm with the ready set drained lowest-index-first, so
/// ties resolve to insertion order.
fn toposort_stable(graph: &DiGraph<OpId, ()>) -> Result<Vec<usize>> {
    let n = graph.node_count();
    let mut indegree = vec![0usize; n];
    for edge in graph.edge_references() {
        indegree[edge.target().index()] += 1;
    }

    let mut ready: BinaryHeap<Reverse<usize>> = indegree
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(i)) = ready.pop() {
        order.push(i);
        for neighbor in graph.neighbors(NodeIndex::new(i)) {
            let j = neighbor.index();
            indegree[j] -= 1;
            if indegree[j] == 0 {
                ready.push(Reverse(j));
            }
        }
    }

    if order.len() != n {
        return Err(ModelError::DependencyCycle);
    }
    Ok(order)
}

/// Compute the integer position of every step-performing operator in
/// `ops` (all components, concatenated).
pub(crate) fn global_step_order(ops: &[&ModelOp]) -> Result<AHashMap<OpId, u64>> {
    let graph = dependency_graph(ops);
    let sorted = toposort_stable(&graph)?;

    let mut positions = AHashMap::with_capacity(ops.len());
    let mut next = 0u64;
    for i in sorted {
        let m = ops[i];
        if m.op.performs_step() {
            positions.insert(m.id, next);
            next += 1;
        }
    }
    Ok(positions)
}

/// Position of the unique operator in `ops` whose "updates" contain
/// `signal`, i.e. the operator a send must directly follow.
pub(crate) fn send_position(
    ops: &[ModelOp],
    order: &AHashMap<OpId, u64>,
    signal: &Signal,
    component: Component,
) -> Result<u64> {
    let updaters: Vec<&ModelOp> = ops
        .iter()
        .filter(|m| m.op.updates().iter().any(|s| s == signal))
        .collect();

    if updaters.len() != 1 {
        return Err(ModelError::AmbiguousUpdater {
            key: signal.key(),
            component,
            count: updaters.len(),
        });
    }

    order
        .get(&updaters[0].id)
        .copied()
        .ok_or(ModelError::UnorderedOperator(updaters[0].id))
}

/// Position of the first operator in `ops` that reads `signal`, i.e. the
/// operator a receive must directly precede.
pub(crate) fn recv_position(
    ops: &[ModelOp],
    order: &AHashMap<OpId, u64>,
    signal: &Signal,
    component: Component,
) -> Result<u64> {
    ops.iter()
        .filter(|m| m.op.reads().iter().any(|s| s == signal))
        .filter_map(|m| order.get(&m.id).copied())
        .min()
        .ok_or(ModelError::UnreadReceive {
            key: signal.key(),
            component,
        })
}
