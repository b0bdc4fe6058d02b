// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Live execution engine seam
//!
//! The engine itself (process spawning, message passing, per-step
//! arithmetic) lives outside this crate. Finalization talks to it through
//! this trait: one artifact load, one registration call per host-function
//! operator, then a build-complete call after which the engine may step.

use crate::error::Result;
use crate::operator::HostFn;
use neuroshard_artifact::ModelArtifact;

/// Input side of a host function: the canonical descriptor of the signal
/// it reads, plus the initial contents of that signal's base buffer.
#[derive(Clone)]
pub struct HostFuncInput {
    pub descriptor: String,
    pub initial: Vec<f64>,
}

/// Everything the engine needs to host one externally-supplied function
#[derive(Clone)]
pub struct HostFuncSpec {
    pub func: HostFn,
    /// Whether the function takes the simulation time as its first argument
    pub time_input: bool,
    pub input: Option<HostFuncInput>,
    /// Canonical descriptor of the output signal, if the function writes one
    pub output: Option<String>,
}

/// A live distributed execution engine attached to the build
pub trait ExecutionEngine: Send {
    /// Load the finalized plan. Called exactly once, before any
    /// host-function registration.
    fn load(&mut self, artifact: &ModelArtifact) -> Result<()>;

    /// Register one host-function operator. Called once per such operator,
    /// in global order, after `load`.
    fn register_host_func(&mut self, spec: HostFuncSpec) -> Result<()>;

    /// The build is complete; the engine may begin stepping.
    fn build_complete(&mut self) -> Result<()>;
}
