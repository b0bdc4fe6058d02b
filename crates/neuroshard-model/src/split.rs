// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Connection splitting at a cross-component boundary
//!
//! An edge's operator chain is cut at the single signal that crosses
//! processes. Everything that causally contributes to that signal's value
//! must run on the producer side before the send; the rest runs on the
//! consumer side after the receive.

use crate::error::{ModelError, Result};
use crate::operator::ModelOp;
use crate::signal::Signal;
use ahash::AHashSet;
use tracing::debug;

/// Partition `ops` into the producer half and the consumer half of a
/// crossing edge.
///
/// Exactly one operator in `ops` must have `cut` in its "updates" set; it
/// seeds the producer group. The closure then runs to a fixed point: any
/// remaining operator that writes (sets or incs) a signal the producer
/// group reads is pulled in, together with its own reads. Order within the
/// halves is preserved but not significant; only membership is.
pub fn split_edge_ops(ops: Vec<ModelOp>, cut: &Signal) -> Result<(Vec<ModelOp>, Vec<ModelOp>)> {
    let mut pre = Vec::new();
    let mut post = Vec::new();
    for op in ops {
        if op.op.updates().iter().any(|s| s == cut) {
            pre.push(op);
        } else {
            post.push(op);
        }
    }

    if pre.len() != 1 {
        return Err(ModelError::BadCutSignal {
            key: cut.key(),
            count: pre.len(),
        });
    }

    let mut read_set: AHashSet<Signal> = pre[0].op.reads().into_iter().collect();

    // Fixed point: a single pass is not enough, because pulling an op in
    // extends the read set with that op's own reads.
    let mut moved = true;
    while moved {
        moved = false;
        let mut keep = Vec::with_capacity(post.len());
        for op in post {
            let feeds_producer = op
                .op
                .incs()
                .iter()
                .chain(op.op.sets().iter())
                .any(|s| read_set.contains(s));

            if feeds_producer {
                read_set.extend(op.op.reads());
                pre.push(op);
                moved = true;
            } else {
                keep.push(op);
            }
        }
        post = keep;
    }

    debug!(
        cut = cut.key(),
        pre = pre.len(),
        post = post.len(),
        "split edge operators"
    );

    Ok((pre, post))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{OpId, Operator, SynapseFilter};

    fn tracked(id: u64, op: Operator) -> ModelOp {
        ModelOp { id: OpId(id), op }
    }

    fn ids(ops: &[ModelOp]) -> Vec<u64> {
        let mut out: Vec<u64> = ops.iter().map(|m| m.id.0).collect();
        out.sort_unstable();
        out
    }

    /// in -> [DotInc] -> mid -> [Synapse] -> out, plus a consumer of out.
    fn chain(cut: &Signal, mid: &Signal) -> Vec<ModelOp> {
        let a = Signal::matrix("a", ndarray::Array2::zeros((2, 2)));
        let x = Signal::vector("x", &[0.0, 0.0]);
        let probed = Signal::vector("probed", &[0.0, 0.0]);

        vec![
            tracked(
                0,
                Operator::DotInc {
                    a,
                    x,
                    y: mid.clone(),
                },
            ),
            tracked(
                1,
                Operator::SynapseUpdate {
                    filter: SynapseFilter::Direct { scale: 1.0 },
                    input: mid.clone(),
                    output: cut.clone(),
                },
            ),
            tracked(
                2,
                Operator::Copy {
                    dst: probed,
                    src: cut.clone(),
                },
            ),
        ]
    }

    #[test]
    fn test_split_is_a_partition() {
        let cut = Signal::vector("cut", &[0.0, 0.0]);
        let mid = Signal::vector("mid", &[0.0, 0.0]);
        let ops = chain(&cut, &mid);
        let total = ids(&ops);

        let (pre, post) = split_edge_ops(ops, &cut).unwrap();

        let mut combined = ids(&pre);
        combined.extend(ids(&post));
        combined.sort_unstable();
        assert_eq!(combined, total);

        for id in ids(&pre) {
            assert!(!ids(&post).contains(&id));
        }
    }

    #[test]
    fn test_transitive_producers_move_to_pre() {
        let cut = Signal::vector("cut", &[0.0, 0.0]);
        let mid = Signal::vector("mid", &[0.0, 0.0]);
        let ops = chain(&cut, &mid);

        let (pre, post) = split_edge_ops(ops, &cut).unwrap();

        // The DotInc writes `mid`, which the updater reads, so it is pulled
        // into the producer half even though it does not touch `cut`.
        assert_eq!(ids(&pre), vec![0, 1]);
        assert_eq!(ids(&post), vec![2]);
    }

    #[test]
    fn test_updater_alone_goes_pre() {
        let cut = Signal::vector("cut", &[0.0]);
        let input = Signal::vector("input", &[0.0]);
        let ops = vec![tracked(
            7,
            Operator::SynapseUpdate {
                filter: SynapseFilter::Lowpass { num: 0.1, den: 0.9 },
                input,
                output: cut.clone(),
            },
        )];

        let (pre, post) = split_edge_ops(ops, &cut).unwrap();
        assert_eq!(ids(&pre), vec![7]);
        assert!(post.is_empty());
    }

    #[test]
    fn test_missing_updater_is_rejected() {
        let cut = Signal::vector("cut", &[0.0]);
        let other = Signal::vector("other", &[0.0]);
        let ops = vec![tracked(
            0,
            Operator::Copy {
                dst: other.clone(),
                src: cut.clone(),
            },
        )];

        let err = split_edge_ops(ops, &cut).unwrap_err();
        assert!(matches!(err, ModelError::BadCutSignal { count: 0, .. }));
    }

    #[test]
    fn test_duplicate_updater_is_rejected() {
        let cut = Signal::vector("cut", &[0.0]);
        let input = Signal::vector("input", &[0.0]);
        let synapse = Operator::SynapseUpdate {
            filter: SynapseFilter::Direct { scale: 1.0 },
            input,
            output: cut.clone(),
        };
        let ops = vec![tracked(0, synapse.clone()), tracked(1, synapse)];

        let err = split_edge_ops(ops, &cut).unwrap_err();
        assert!(matches!(err, ModelError::BadCutSignal { count: 2, .. }));
    }
}
