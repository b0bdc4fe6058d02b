// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The model aggregate and the finalize step
//!
//! During building the model accumulates, per component, an operator list
//! and a signal registry, plus the pending cross-component transfers the
//! session scheduled. `finalize` then computes the single global order,
//! splices the send/receive operators in with fractional tags, and emits
//! the per-component artifact groups, atomically persisted or handed to
//! an attached live engine.
//!
//! State transitions are enforced by move semantics: `finalize` consumes
//! the model, so a finalized model cannot keep building.

use crate::describe::{describe_operator, describe_probe, OP_DELIM};
use crate::engine::{ExecutionEngine, HostFuncInput, HostFuncSpec};
use crate::error::{ModelError, Result};
use crate::operator::{ModelOp, OpId, Operator};
use crate::order::{global_step_order, recv_position, send_position, OrderTag};
use crate::probe::Probe;
use crate::registry::SignalRegistry;
use crate::signal::Signal;
use crate::{Component, ObjectId};
use ahash::AHashMap;
use neuroshard_artifact::{ComponentGroup, ModelArtifact, ProbeEntry};
use rayon::prelude::*;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Immutable table mapping every graph object (and probe) to a component
#[derive(Debug, Clone, Default)]
pub struct Assignments {
    map: AHashMap<ObjectId, Component>,
}

impl Assignments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, object: ObjectId, component: Component) {
        self.map.insert(object, component);
    }

    pub fn component_of(&self, object: ObjectId) -> Result<Component> {
        self.map
            .get(&object)
            .copied()
            .ok_or(ModelError::MissingAssignment(object))
    }

    fn iter(&self) -> impl Iterator<Item = (ObjectId, Component)> + '_ {
        self.map.iter().map(|(&object, &component)| (object, component))
    }
}

impl FromIterator<(ObjectId, Component)> for Assignments {
    fn from_iter<I: IntoIterator<Item = (ObjectId, Component)>>(iter: I) -> Self {
        Assignments {
            map: iter.into_iter().collect(),
        }
    }
}

/// Where the finalized plan goes
pub enum BuildTarget {
    /// Write the artifact to disk; no engine attached
    Persist { path: PathBuf },
    /// Hand the artifact to a live execution engine
    Live(Box<dyn ExecutionEngine>),
}

impl BuildTarget {
    pub fn persist(path: impl Into<PathBuf>) -> Self {
        BuildTarget::Persist { path: path.into() }
    }

    pub fn live(engine: impl ExecutionEngine + 'static) -> Self {
        BuildTarget::Live(Box::new(engine))
    }
}

impl fmt::Debug for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildTarget::Persist { path } => write!(f, "Persist({})", path.display()),
            BuildTarget::Live(_) => write!(f, "Live(..)"),
        }
    }
}

/// One scheduled cross-component hand-off
#[derive(Debug, Clone)]
pub(crate) struct PendingTransfer {
    pub signal: Signal,
    pub tag: u32,
    pub peer: Component,
}

/// A distributed model under construction
#[derive(Debug)]
pub struct Model {
    dt: f64,
    label: String,
    n_components: usize,
    assignments: Assignments,
    registries: Vec<SignalRegistry>,
    component_ops: Vec<Vec<ModelOp>>,
    pending_sends: Vec<Vec<PendingTransfer>>,
    pending_recvs: Vec<Vec<PendingTransfer>>,
    probes: Vec<Probe>,
    next_op: u64,
    next_tag: u32,
    target: BuildTarget,
}

impl Model {
    pub fn new(
        dt: f64,
        label: impl Into<String>,
        n_components: usize,
        assignments: Assignments,
        target: BuildTarget,
    ) -> Result<Self> {
        for (object, component) in assignments.iter() {
            if component as usize >= n_components {
                return Err(ModelError::AssignmentOutOfRange {
                    object,
                    component,
                    n_components,
                });
            }
        }

        Ok(Model {
            dt,
            label: label.into(),
            n_components,
            assignments,
            registries: (0..n_components).map(|_| SignalRegistry::new()).collect(),
            component_ops: (0..n_components).map(|_| Vec::new()).collect(),
            pending_sends: (0..n_components).map(|_| Vec::new()).collect(),
            pending_recvs: (0..n_components).map(|_| Vec::new()).collect(),
            probes: Vec::new(),
            next_op: 0,
            next_tag: 0,
            target,
        })
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn component_ops(&self, component: Component) -> &[ModelOp] {
        &self.component_ops[component as usize]
    }

    pub fn registry(&self, component: Component) -> &SignalRegistry {
        &self.registries[component as usize]
    }

    pub(crate) fn assignments(&self) -> &Assignments {
        &self.assignments
    }

    pub(crate) fn persist_only(&self) -> bool {
        matches!(self.target, BuildTarget::Persist { .. })
    }

    pub(crate) fn alloc_op(&mut self, op: Operator) -> ModelOp {
        let id = OpId(self.next_op);
        self.next_op += 1;
        ModelOp { id, op }
    }

    pub(crate) fn fresh_tag(&mut self) -> u32 {
        let tag = self.next_tag;
        self.next_tag += 1;
        debug!(tag, "allocated transfer tag");
        tag
    }

    /// Register every signal the operators touch, then append them to the
    /// component's list.
    pub(crate) fn route_ops(&mut self, component: Component, ops: Vec<ModelOp>) {
        let registry = &mut self.registries[component as usize];
        for tracked in &ops {
            for signal in tracked.op.all_signals() {
                registry.register(&signal);
            }
        }
        self.component_ops[component as usize].extend(ops);
    }

    pub(crate) fn register_signal(&mut self, component: Component, signal: &Signal) {
        self.registries[component as usize].register(signal);
    }

    pub(crate) fn add_pending_send(
        &mut self,
        component: Component,
        signal: Signal,
        tag: u32,
        peer: Component,
    ) {
        self.pending_sends[component as usize].push(PendingTransfer { signal, tag, peer });
    }

    pub(crate) fn add_pending_recv(
        &mut self,
        component: Component,
        signal: Signal,
        tag: u32,
        peer: Component,
    ) {
        self.pending_recvs[component as usize].push(PendingTransfer { signal, tag, peer });
    }

    pub(crate) fn pending_sends(&self, component: Component) -> &[PendingTransfer] {
        &self.pending_sends[component as usize]
    }

    pub(crate) fn pending_recvs(&self, component: Component) -> &[PendingTransfer] {
        &self.pending_recvs[component as usize]
    }

    pub(crate) fn add_probe(&mut self, probe: Probe) {
        self.probes.push(probe);
    }

    /// Order, splice, describe, and publish
    ///
    /// Errors abort before anything is written; the artifact is published
    /// atomically or not at all.
    pub fn finalize(mut self) -> Result<ModelArtifact> {
        info!(
            label = %self.label,
            n_components = self.n_components,
            "finalizing model"
        );

        // Receive targets need a writer in the dependency graph.
        for c in 0..self.n_components {
            let signals: Vec<Signal> = self.pending_recvs[c]
                .iter()
                .map(|t| t.signal.clone())
                .collect();
            for signal in signals {
                let op = self.alloc_op(Operator::PreserveValue { dst: signal });
                self.component_ops[c].push(op);
            }
        }

        // One global order across every component.
        let order = {
            let all: Vec<&ModelOp> = self.component_ops.iter().flatten().collect();
            global_step_order(&all)?
        };

        let mut tags: AHashMap<OpId, OrderTag> = order
            .iter()
            .map(|(&id, &position)| (id, OrderTag::real(position)))
            .collect();

        // Splice the communication operators in. A send directly follows
        // the operator that updates its signal; a receive directly
        // precedes the first operator that reads it.
        for c in 0..self.n_components {
            let component = c as Component;

            let sends = std::mem::take(&mut self.pending_sends[c]);
            for transfer in sends {
                let position =
                    send_position(&self.component_ops[c], &order, &transfer.signal, component)?;
                debug!(tag = transfer.tag, dst = transfer.peer, position, "placing send");
                let op = self.alloc_op(Operator::MpiSend {
                    dst: transfer.peer,
                    tag: transfer.tag,
                    signal: transfer.signal,
                });
                tags.insert(op.id, OrderTag::after(position));
                self.component_ops[c].push(op);
            }

            let recvs = std::mem::take(&mut self.pending_recvs[c]);
            for transfer in recvs {
                let position =
                    recv_position(&self.component_ops[c], &order, &transfer.signal, component)?;
                debug!(tag = transfer.tag, src = transfer.peer, position, "placing recv");
                let op = self.alloc_op(Operator::MpiRecv {
                    src: transfer.peer,
                    tag: transfer.tag,
                    signal: transfer.signal,
                });
                tags.insert(op.id, OrderTag::before(position));
                self.component_ops[c].push(op);
            }
        }

        // Final per-component execution order.
        for ops in &mut self.component_ops {
            for tracked in ops.iter() {
                if !tags.contains_key(&tracked.id) {
                    return Err(ModelError::UnorderedOperator(tracked.id));
                }
            }
            ops.sort_by_key(|tracked| {
                tags.get(&tracked.id)
                    .copied()
                    .unwrap_or(OrderTag::real(u64::MAX))
            });
        }

        // Per-component emission. The order map is read-only from here on,
        // so the components can be described in parallel.
        let live = !self.persist_only();
        let dt = self.dt;
        let registries = &self.registries;
        let component_ops = &self.component_ops;
        let probes = &self.probes;
        let assignments = &self.assignments;
        let tag_map = &tags;

        let groups = (0..self.n_components)
            .into_par_iter()
            .map(|c| {
                emit_component(
                    c as Component,
                    &registries[c],
                    &component_ops[c],
                    probes,
                    assignments,
                    tag_map,
                    dt,
                    live,
                )
            })
            .collect::<Result<Vec<ComponentGroup>>>()?;

        let mut probe_index = Vec::with_capacity(self.probes.len());
        for probe in &self.probes {
            probe_index.push(ProbeEntry {
                key: probe.key() as i64,
                component: self.assignments.component_of(probe.object())?,
            });
        }

        let artifact = ModelArtifact {
            dt: self.dt,
            n_components: self.n_components as u32,
            label: self.label.clone(),
            components: groups,
            probe_index,
        };

        // Host functions cannot ride in the artifact; they are registered
        // with the live engine directly, in global order.
        let mut host_funcs: Vec<(OrderTag, HostFuncSpec)> = Vec::new();
        for ops in &self.component_ops {
            for tracked in ops {
                if let Operator::HostFunc {
                    func,
                    time_input,
                    input,
                    output,
                } = &tracked.op
                {
                    let tag = tags
                        .get(&tracked.id)
                        .copied()
                        .ok_or(ModelError::UnorderedOperator(tracked.id))?;
                    host_funcs.push((
                        tag,
                        HostFuncSpec {
                            func: Arc::clone(func),
                            time_input: *time_input,
                            input: input.as_ref().map(|s| HostFuncInput {
                                descriptor: s.descriptor(),
                                initial: s.base_contents().iter().copied().collect(),
                            }),
                            output: output.as_ref().map(|s| s.descriptor()),
                        },
                    ));
                }
            }
        }
        host_funcs.sort_by_key(|(tag, _)| *tag);

        match self.target {
            BuildTarget::Persist { path } => {
                artifact.save(&path)?;
                info!(path = %path.display(), "artifact published");
            }
            BuildTarget::Live(mut engine) => {
                engine.load(&artifact)?;
                for (_, spec) in host_funcs {
                    engine.register_host_func(spec)?;
                }
                engine.build_complete()?;
                info!("model handed to live engine");
            }
        }

        Ok(artifact)
    }
}

#[allow(clippy::too_many_arguments)]
fn emit_component(
    component: Component,
    registry: &SignalRegistry,
    ops: &[ModelOp],
    probes: &[Probe],
    assignments: &Assignments,
    tags: &AHashMap<OpId, OrderTag>,
    dt: f64,
    live: bool,
) -> Result<ComponentGroup> {
    let mut group = ComponentGroup::default();

    group.signal_values.reserve(registry.total_len());
    for signal in registry.signals() {
        group
            .signal_values
            .extend(signal.base_contents().iter().copied());
        group.signal_keys.push(signal.key() as i64);
        let (rows, cols) = signal.base_shape();
        group.signal_shapes.push([rows as u64, cols as u64]);
        group.signal_labels.push(signal.label().to_string());
    }

    for tracked in ops {
        if live && matches!(tracked.op, Operator::HostFunc { .. }) {
            continue; // registered with the engine instead
        }
        let tag = tags
            .get(&tracked.id)
            .copied()
            .ok_or(ModelError::UnorderedOperator(tracked.id))?;
        if let Some(body) = describe_operator(&tracked.op, dt)? {
            group.operators.push(format!("{}{}{}", tag, OP_DELIM, body));
        }
    }

    for probe in probes {
        if assignments.component_of(probe.object())? == component {
            group.probes.push(describe_probe(probe, dt));
        }
    }

    Ok(group)
}
