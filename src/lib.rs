//! # Neuroshard - Distributed Neural Dataflow Partitioning
//!
//! Neuroshard takes the dataflow graph of a neural simulation (signals,
//! update operators, and their dependencies) and partitions it across
//! multiple compute processes, producing a deterministic distributed
//! execution plan that a remote engine can run, step, and probe.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! neuroshard = "0.1"
//! ```
//!
//! ```rust,no_run
//! use neuroshard::prelude::*;
//!
//! let mut assignments = Assignments::new();
//! assignments.assign(1, 0); // population A on process 0
//! assignments.assign(2, 1); // population B on process 1
//!
//! let model = Model::new(
//!     0.001,
//!     "example",
//!     2,
//!     assignments,
//!     BuildTarget::persist("plan.nshrd"),
//! )?;
//! let mut session = BuildSession::new(model);
//!
//! // The graph builder drives push / record / pop as it constructs each
//! // high-level object, then:
//! let artifact = session.finish()?.finalize()?;
//! assert_eq!(artifact.n_components, 2);
//! # Ok::<(), neuroshard::model::ModelError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Build recording: neuroshard-model::session             │
//! │  (context stack, operator attribution, edge splitting)  │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Global ordering: neuroshard-model::order               │
//! │  (dependency graph, deterministic toposort, order tags) │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Description: neuroshard-model::describe                │
//! │  (canonical per-operator / per-signal / per-probe text) │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Artifact: neuroshard-artifact                          │
//! │  (versioned, checksummed, atomically published)         │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Related Crates
//!
//! - **neuroshard-model**: build recording, partitioning, ordering
//! - **neuroshard-artifact**: the persisted execution-plan container
//!
//! ## License
//!
//! Apache-2.0

// Re-export the workspace members
pub use neuroshard_artifact as artifact;
pub use neuroshard_model as model;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::artifact::{ComponentGroup, ModelArtifact, ProbeEntry};
    pub use crate::model::{
        Assignments, BuildSession, BuildTarget, ExecutionEngine, GraphObject, Model, Operator,
        Probe, Signal,
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_facade_imports() {
        // Just test that re-exports work
        use crate::prelude::*;
        let _assignments = Assignments::new();
    }
}
