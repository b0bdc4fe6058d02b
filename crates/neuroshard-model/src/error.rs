// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for model construction and finalization
//!
//! Four classes, all fatal and surfaced synchronously: malformed edges,
//! unsupported descriptions, artifact incompatibilities, and internal
//! consistency violations. Nothing here is retried or downgraded; the
//! build refuses to produce an inconsistent plan.

use crate::operator::OpId;
use crate::signal::SignalKey;
use crate::{Component, ObjectId};
use thiserror::Error;

/// Errors raised while recording, splitting, ordering, or describing a model
#[derive(Error, Debug)]
pub enum ModelError {
    // -- malformed-edge errors ------------------------------------------

    #[error(
        "edge {object} crosses components {pre} -> {post} but carries a learning rule; \
         cross-component learning rules are unsupported"
    )]
    LearningRuleAcrossComponents {
        object: ObjectId,
        pre: Component,
        post: Component,
    },

    #[error(
        "edge {object} crosses components {pre} -> {post} but is unfiltered; \
         a crossing edge needs a filtered output signal to cut on"
    )]
    UnfilteredCrossingEdge {
        object: ObjectId,
        pre: Component,
        post: Component,
    },

    #[error("cut signal {key} is updated by {count} operators in the edge, expected exactly one")]
    BadCutSignal { key: SignalKey, count: usize },

    // -- unsupported-operator errors ------------------------------------

    #[error("operator {0} has no remote description")]
    UnsupportedOperator(&'static str),

    // -- artifact-incompatibility errors --------------------------------

    #[error("host function operators cannot be captured in a persisted artifact")]
    HostFuncNotSerializable,

    // -- registry-consistency errors ------------------------------------

    #[error("no component assignment for object {0}")]
    MissingAssignment(ObjectId),

    #[error("object {object} assigned to component {component}, but the model has {n_components}")]
    AssignmentOutOfRange {
        object: ObjectId,
        component: Component,
        n_components: usize,
    },

    #[error("sent signal {key} has {count} declared updaters in component {component}, expected exactly one")]
    AmbiguousUpdater {
        key: SignalKey,
        component: Component,
        count: usize,
    },

    #[error("received signal {key} has no declared reader in component {component}")]
    UnreadReceive { key: SignalKey, component: Component },

    #[error("operator dependency graph contains a cycle")]
    DependencyCycle,

    #[error("operator {0:?} has no global order position")]
    UnorderedOperator(OpId),

    #[error("pop without a matching push on the build stack")]
    StackUnderflow,

    #[error("build session finished with {0} unclosed objects on the stack")]
    UnclosedObjects(usize),

    #[error("{0} operators were recorded outside any graph object and would be lost")]
    UnattributedOperators(usize),

    // -- collaborator failures ------------------------------------------

    #[error("artifact error: {0}")]
    Artifact(#[from] neuroshard_artifact::ArtifactError),

    #[error("execution engine error: {0}")]
    Engine(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
