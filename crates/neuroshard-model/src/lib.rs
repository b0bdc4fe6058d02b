// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Neuroshard Model
//!
//! Partitions the dataflow graph of a neural simulation across compute
//! processes and produces a deterministic distributed execution plan.
//!
//! The external graph builder constructs high-level objects and their
//! primitive operators; a [`BuildSession`] records which operators belong
//! to which object and routes them to components as objects complete. An
//! edge whose endpoints live on different components is cut at its
//! filtered output signal: the producer half stays with the source, the
//! consumer half moves downstream, and a tagged send/receive pair is
//! scheduled between them.
//!
//! `finalize` computes one topological order over every operator in the
//! model, splices the communication operators in with fractional order
//! tags, and renders each component's signals, operators, and probes into
//! a [`neuroshard_artifact::ModelArtifact`], persisted atomically or
//! handed to an attached [`ExecutionEngine`].
//!
//! ## Usage
//! ```ignore
//! use neuroshard_model::{Assignments, BuildSession, BuildTarget, Model};
//!
//! let model = Model::new(0.001, "two-population", 2, assignments,
//!     BuildTarget::persist("plan.nshrd"))?;
//! let mut session = BuildSession::new(model);
//! // ... builder drives push / record / pop / add_probe ...
//! let artifact = session.finish()?.finalize()?;
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod describe;
pub mod engine;
pub mod error;
pub mod model;
pub mod operator;
pub mod order;
pub mod probe;
pub mod registry;
pub mod session;
pub mod signal;
pub mod split;

/// Process index a graph object is assigned to
pub type Component = u32;

/// Builder-supplied identity of a high-level graph object
pub type ObjectId = u64;

// Re-export commonly used items
pub use engine::{ExecutionEngine, HostFuncInput, HostFuncSpec};
pub use error::{ModelError, Result};
pub use model::{Assignments, BuildTarget, Model};
pub use operator::{
    HostFn, ModelOp, NeuronModel, OpId, Operator, StochasticProcess, SynapseFilter,
};
pub use order::OrderTag;
pub use probe::Probe;
pub use registry::SignalRegistry;
pub use session::{BuildSession, GraphObject};
pub use signal::{Signal, SignalKey};
pub use split::split_edge_ops;
