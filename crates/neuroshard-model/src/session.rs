// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Context-tracking build session
//!
//! The external builder constructs high-level graph objects one at a time
//! and produces primitive operators as it goes. The session keeps a stack
//! of the objects currently being built (`push`/`pop` are paired around
//! each object's construction) and attributes every recorded operator to
//! the top of the stack. When an object is popped, its operators are
//! routed to the component the assignment table names; an edge whose
//! endpoints live on different components takes the splitting path
//! instead.
//!
//! The stack is a field of this session, passed explicitly through the
//! builder call chain. One session builds one model.

use crate::error::{ModelError, Result};
use crate::model::Model;
use crate::operator::{ModelOp, OpId, Operator};
use crate::probe::Probe;
use crate::signal::Signal;
use crate::split::split_edge_ops;
use crate::{Component, ObjectId};
use tracing::debug;

/// A high-level graph object under construction
#[derive(Debug, Clone)]
pub enum GraphObject {
    /// Any non-edge object (population, input node, network, ...)
    Node { id: ObjectId },

    /// A connection between two objects. `filtered_output` is the signal
    /// produced by the edge's filtering stage, if it has one: the only
    /// valid cut point when the edge crosses components.
    Edge {
        id: ObjectId,
        pre: ObjectId,
        post: ObjectId,
        filtered_output: Option<Signal>,
        has_learning_rule: bool,
    },
}

impl GraphObject {
    pub fn id(&self) -> ObjectId {
        match self {
            GraphObject::Node { id } => *id,
            GraphObject::Edge { id, .. } => *id,
        }
    }
}

struct Frame {
    /// None only for the sentinel root frame
    object: Option<GraphObject>,
    ops: Vec<ModelOp>,
}

/// Records which operators belong to which graph object while the
/// external builder runs
pub struct BuildSession {
    model: Model,
    stack: Vec<Frame>,
}

impl BuildSession {
    pub fn new(model: Model) -> Self {
        BuildSession {
            model,
            stack: vec![Frame {
                object: None,
                ops: Vec::new(),
            }],
        }
    }

    /// Enter a graph object. Must be paired with [`pop`](Self::pop).
    pub fn push(&mut self, object: GraphObject) {
        debug!(object = object.id(), "entering graph object");
        self.stack.push(Frame {
            object: Some(object),
            ops: Vec::new(),
        });
    }

    /// Record an operator against the object currently being built.
    pub fn record(&mut self, op: Operator) -> Result<OpId> {
        if self.model.persist_only() && matches!(op, Operator::HostFunc { .. }) {
            // A persisted artifact cannot carry executable code; refuse at
            // construction time rather than when the description fails.
            return Err(ModelError::HostFuncNotSerializable);
        }

        let tracked = self.model.alloc_op(op);
        let id = tracked.id;
        match self.stack.last_mut() {
            Some(frame) => frame.ops.push(tracked),
            None => return Err(ModelError::StackUnderflow),
        }
        Ok(id)
    }

    /// Leave the current graph object, routing its operators to their
    /// component(s).
    pub fn pop(&mut self) -> Result<()> {
        if self.stack.len() <= 1 {
            return Err(ModelError::StackUnderflow);
        }
        let frame = match self.stack.pop() {
            Some(frame) => frame,
            None => return Err(ModelError::StackUnderflow),
        };
        let object = match frame.object {
            Some(object) => object,
            None => return Err(ModelError::StackUnderflow),
        };

        match object {
            GraphObject::Node { id } => {
                let component = self.model.assignments().component_of(id)?;
                self.model.route_ops(component, frame.ops);
            }
            GraphObject::Edge {
                id,
                pre,
                post,
                filtered_output,
                has_learning_rule,
            } => {
                let pre_component = self.model.assignments().component_of(pre)?;
                let post_component = self.model.assignments().component_of(post)?;

                if pre_component == post_component {
                    self.model.route_ops(pre_component, frame.ops);
                } else {
                    self.route_crossing_edge(
                        id,
                        pre_component,
                        post_component,
                        filtered_output,
                        has_learning_rule,
                        frame.ops,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// The hard path: cut the edge's operator chain at its filtered output
    /// and schedule the hand-off between the two components.
    fn route_crossing_edge(
        &mut self,
        object: ObjectId,
        pre: Component,
        post: Component,
        filtered_output: Option<Signal>,
        has_learning_rule: bool,
        ops: Vec<ModelOp>,
    ) -> Result<()> {
        if has_learning_rule {
            return Err(ModelError::LearningRuleAcrossComponents { object, pre, post });
        }

        let signal = filtered_output.ok_or(ModelError::UnfilteredCrossingEdge {
            object,
            pre,
            post,
        })?;

        let tag = self.model.fresh_tag();
        debug!(
            object,
            pre,
            post,
            tag,
            signal = signal.key(),
            "edge crosses components"
        );

        self.model.add_pending_send(pre, signal.clone(), tag, post);
        self.model.add_pending_recv(post, signal.clone(), tag, pre);

        // The cut signal is consumed on both sides.
        self.model.register_signal(pre, &signal);
        self.model.register_signal(post, &signal);

        let (pre_ops, post_ops) = split_edge_ops(ops, &signal)?;
        self.model.route_ops(pre, pre_ops);
        self.model.route_ops(post, post_ops);
        Ok(())
    }

    /// Register a probe. Its component comes from the assignment table.
    pub fn add_probe(&mut self, probe: Probe) -> Result<()> {
        self.model.assignments().component_of(probe.object())?;
        self.model.add_probe(probe);
        Ok(())
    }

    /// Hand the model back once the builder is done.
    pub fn finish(self) -> Result<Model> {
        if self.stack.len() > 1 {
            return Err(ModelError::UnclosedObjects(self.stack.len() - 1));
        }
        let unattributed: usize = self.stack.iter().map(|frame| frame.ops.len()).sum();
        if unattributed > 0 {
            return Err(ModelError::UnattributedOperators(unattributed));
        }
        Ok(self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Assignments, BuildTarget};
    use crate::operator::SynapseFilter;

    fn assignments(pairs: &[(ObjectId, Component)]) -> Assignments {
        pairs.iter().copied().collect()
    }

    fn session(n_components: usize, pairs: &[(ObjectId, Component)]) -> BuildSession {
        let model = Model::new(
            0.001,
            "test",
            n_components,
            assignments(pairs),
            BuildTarget::persist("/tmp/unused.nshrd"),
        )
        .unwrap();
        BuildSession::new(model)
    }

    fn edge(id: ObjectId, pre: ObjectId, post: ObjectId, cut: Option<Signal>) -> GraphObject {
        GraphObject::Edge {
            id,
            pre,
            post,
            filtered_output: cut,
            has_learning_rule: false,
        }
    }

    /// DotInc feeding a synapse that updates `cut`, plus a consumer copy.
    fn record_edge_chain(session: &mut BuildSession, cut: &Signal) {
        let a = Signal::matrix("a", ndarray::Array2::zeros((2, 2)));
        let x = Signal::vector("x", &[1.0, 1.0]);
        let mid = Signal::vector("mid", &[0.0, 0.0]);
        let probed = Signal::vector("probed", &[0.0, 0.0]);

        session
            .record(Operator::DotInc {
                a,
                x,
                y: mid.clone(),
            })
            .unwrap();
        session
            .record(Operator::SynapseUpdate {
                filter: SynapseFilter::Lowpass { num: 0.1, den: 0.9 },
                input: mid,
                output: cut.clone(),
            })
            .unwrap();
        session
            .record(Operator::Copy {
                dst: probed,
                src: cut.clone(),
            })
            .unwrap();
    }

    #[test]
    fn test_node_ops_route_to_assigned_component() {
        let mut session = session(2, &[(1, 1)]);
        let s = Signal::scalar("s", 0.0);

        session.push(GraphObject::Node { id: 1 });
        session.record(Operator::Reset { dst: s, value: 0.0 }).unwrap();
        session.pop().unwrap();

        let model = session.finish().unwrap();
        assert!(model.component_ops(0).is_empty());
        assert_eq!(model.component_ops(1).len(), 1);
        assert_eq!(model.registry(1).len(), 1);
    }

    #[test]
    fn test_same_component_edge_routes_whole_chain() {
        let mut session = session(2, &[(1, 0), (2, 0), (3, 0)]);
        let cut = Signal::vector("cut", &[0.0, 0.0]);

        session.push(edge(3, 1, 2, Some(cut.clone())));
        record_edge_chain(&mut session, &cut);
        session.pop().unwrap();

        let model = session.finish().unwrap();
        assert_eq!(model.component_ops(0).len(), 3);
        assert!(model.pending_sends(0).is_empty());
        assert!(model.pending_recvs(0).is_empty());
    }

    #[test]
    fn test_crossing_edge_splits_and_schedules_transfer() {
        let mut session = session(2, &[(1, 0), (2, 1), (3, 0)]);
        let cut = Signal::vector("cut", &[0.0, 0.0]);

        session.push(edge(3, 1, 2, Some(cut.clone())));
        record_edge_chain(&mut session, &cut);
        session.pop().unwrap();

        let model = session.finish().unwrap();

        // Producer half (DotInc + synapse) on 0, consumer copy on 1.
        assert_eq!(model.component_ops(0).len(), 2);
        assert_eq!(model.component_ops(1).len(), 1);

        let sends = model.pending_sends(0);
        let recvs = model.pending_recvs(1);
        assert_eq!(sends.len(), 1);
        assert_eq!(recvs.len(), 1);
        assert_eq!(sends[0].tag, recvs[0].tag);
        assert_eq!(sends[0].peer, 1);
        assert_eq!(recvs[0].peer, 0);

        // The cut signal is registered on both sides.
        assert!(model.registry(0).contains(cut.key()));
        assert!(model.registry(1).contains(cut.key()));
    }

    #[test]
    fn test_tags_are_unique_per_crossing_edge() {
        let mut session = session(2, &[(1, 0), (2, 1), (3, 0), (4, 0)]);

        for id in [3, 4] {
            let cut = Signal::vector("cut", &[0.0]);
            let input = Signal::vector("input", &[0.0]);
            let probed = Signal::vector("probed", &[0.0]);
            session.push(edge(id, 1, 2, Some(cut.clone())));
            session
                .record(Operator::SynapseUpdate {
                    filter: SynapseFilter::Direct { scale: 1.0 },
                    input,
                    output: cut.clone(),
                })
                .unwrap();
            session
                .record(Operator::Copy {
                    dst: probed,
                    src: cut,
                })
                .unwrap();
            session.pop().unwrap();
        }

        let model = session.finish().unwrap();
        let sends = model.pending_sends(0);
        assert_eq!(sends.len(), 2);
        assert_ne!(sends[0].tag, sends[1].tag);
    }

    #[test]
    fn test_learning_rule_across_components_is_fatal() {
        let mut session = session(2, &[(1, 0), (2, 1), (3, 0)]);
        let cut = Signal::vector("cut", &[0.0]);

        session.push(GraphObject::Edge {
            id: 3,
            pre: 1,
            post: 2,
            filtered_output: Some(cut),
            has_learning_rule: true,
        });
        let err = session.pop().unwrap_err();
        assert!(matches!(
            err,
            ModelError::LearningRuleAcrossComponents { object: 3, .. }
        ));
    }

    #[test]
    fn test_unfiltered_crossing_edge_is_fatal() {
        let mut session = session(2, &[(1, 0), (2, 1), (3, 0)]);

        session.push(edge(3, 1, 2, None));
        let err = session.pop().unwrap_err();
        assert!(matches!(
            err,
            ModelError::UnfilteredCrossingEdge {
                object: 3,
                pre: 0,
                post: 1,
            }
        ));
    }

    #[test]
    fn test_host_func_rejected_for_persisted_target() {
        let mut session = session(1, &[(1, 0)]);
        session.push(GraphObject::Node { id: 1 });

        let err = session
            .record(Operator::HostFunc {
                func: std::sync::Arc::new(|_, _| None),
                time_input: true,
                input: None,
                output: Some(Signal::scalar("out", 0.0)),
            })
            .unwrap_err();
        assert!(matches!(err, ModelError::HostFuncNotSerializable));
    }

    #[test]
    fn test_pop_without_push_is_fatal() {
        let mut session = session(1, &[]);
        assert!(matches!(session.pop(), Err(ModelError::StackUnderflow)));
    }

    #[test]
    fn test_finish_rejects_unclosed_objects() {
        let mut session = session(1, &[(1, 0)]);
        session.push(GraphObject::Node { id: 1 });
        assert!(matches!(
            session.finish(),
            Err(ModelError::UnclosedObjects(1))
        ));
    }

    #[test]
    fn test_finish_rejects_unattributed_ops() {
        let mut session = session(1, &[]);
        session
            .record(Operator::Reset {
                dst: Signal::scalar("s", 0.0),
                value: 0.0,
            })
            .unwrap();
        assert!(matches!(
            session.finish(),
            Err(ModelError::UnattributedOperators(1))
        ));
    }
}
