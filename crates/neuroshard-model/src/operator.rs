// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The closed operator vocabulary
//!
//! Every unit of computation declares its full signal footprint up front
//! through [`Operator::sets`], [`incs`](Operator::incs),
//! [`reads`](Operator::reads), and [`updates`](Operator::updates); the
//! dependency graph and the connection splitter work from these sets
//! alone. Adding a variant is a compile-time obligation on the describer
//! and the orderer (exhaustive matches, no fallthrough dispatch).

use crate::signal::Signal;
use crate::Component;
use std::fmt;
use std::sync::Arc;

/// Identity of one recorded operator, stamped by the build session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub(crate) u64);

/// A recorded operator: identity plus payload
#[derive(Debug, Clone)]
pub struct ModelOp {
    pub id: OpId,
    pub op: Operator,
}

/// Neuron dynamics variants
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NeuronModel {
    Lif {
        tau_rc: f64,
        tau_ref: f64,
    },
    LifRate {
        tau_rc: f64,
        tau_ref: f64,
    },
    AdaptiveLif {
        tau_rc: f64,
        tau_ref: f64,
        tau_n: f64,
        inc_n: f64,
    },
    AdaptiveLifRate {
        tau_rc: f64,
        tau_ref: f64,
        tau_n: f64,
        inc_n: f64,
    },
    RectifiedLinear,
    Sigmoid {
        tau_ref: f64,
    },
    /// Two-state spiking model (membrane voltage + recovery variable)
    Izhikevich {
        tau_recovery: f64,
        coupling: f64,
        reset_voltage: f64,
        reset_recovery: f64,
    },
}

/// Synapse filter variants, by filter order
///
/// Coefficients arrive already discretized from the builder. The
/// degenerate orders are distinct variants because the remote engine
/// implements each specially.
#[derive(Debug, Clone, PartialEq)]
pub enum SynapseFilter {
    /// Zero-pole: direct copy-scale every step
    Direct { scale: f64 },
    /// One-pole: two-coefficient recurrence `y = num*x + den*y`
    Lowpass { num: f64, den: f64 },
    /// General IIR
    Linear { num: Vec<f64>, den: Vec<f64> },
    /// Triangular-kernel FIR
    Triangle { taps: Vec<f64> },
}

/// Stochastic process sampled into a signal each step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StochasticProcess {
    WhiteNoise { mean: f64, std: f64 },
    WhiteSignal { period: f64, high: f64, rms: f64 },
}

/// An externally-supplied function: `f(t, input) -> output`
///
/// Opaque to the describer; only a live engine can host one.
pub type HostFn = Arc<dyn Fn(f64, Option<&[f64]>) -> Option<Vec<f64>> + Send + Sync>;

/// A unit of computation with a declared signal footprint
#[derive(Clone)]
pub enum Operator {
    /// Overwrite `dst` with a constant
    Reset { dst: Signal, value: f64 },

    /// `dst = src`
    Copy { dst: Signal, src: Signal },

    /// `dst[dst_slice] (+)= src[src_slice]`
    SlicedCopy {
        dst: Signal,
        src: Signal,
        dst_slice: (usize, usize),
        src_slice: (usize, usize),
        inc: bool,
    },

    /// `y += a . x` (matrix-vector increment)
    DotInc { a: Signal, x: Signal, y: Signal },

    /// `y += a * x` elementwise
    ElementwiseInc { a: Signal, x: Signal, y: Signal },

    /// Step the neuron dynamics: input current `j`, activity `output`
    NeuronUpdate {
        model: NeuronModel,
        n_neurons: usize,
        j: Signal,
        output: Signal,
    },

    /// Step the synapse filter from `input` into `output`
    SynapseUpdate {
        filter: SynapseFilter,
        input: Signal,
        output: Signal,
    },

    /// Sample a stochastic process into `output`
    ProcessUpdate {
        process: StochasticProcess,
        output: Signal,
    },

    /// Externally-supplied function; not serializable
    HostFunc {
        func: HostFn,
        time_input: bool,
        input: Option<Signal>,
        output: Option<Signal>,
    },

    /// Keeps `dst` reachable in the dependency graph; no remote action
    PreserveValue { dst: Signal },

    /// Synthetic: hand `signal` to component `dst` under `tag`
    MpiSend {
        dst: Component,
        tag: u32,
        signal: Signal,
    },

    /// Synthetic: receive `signal` from component `src` under `tag`
    MpiRecv {
        src: Component,
        tag: u32,
        signal: Signal,
    },
}

impl Operator {
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Reset { .. } => "Reset",
            Operator::Copy { .. } => "Copy",
            Operator::SlicedCopy { .. } => "SlicedCopy",
            Operator::DotInc { .. } => "DotInc",
            Operator::ElementwiseInc { .. } => "ElementwiseInc",
            Operator::NeuronUpdate { .. } => "NeuronUpdate",
            Operator::SynapseUpdate { .. } => "SynapseUpdate",
            Operator::ProcessUpdate { .. } => "ProcessUpdate",
            Operator::HostFunc { .. } => "HostFunc",
            Operator::PreserveValue { .. } => "PreserveValue",
            Operator::MpiSend { .. } => "MpiSend",
            Operator::MpiRecv { .. } => "MpiRecv",
        }
    }

    /// Signals this operator fully overwrites each step
    pub fn sets(&self) -> Vec<Signal> {
        match self {
            Operator::Reset { dst, .. } => vec![dst.clone()],
            Operator::Copy { dst, .. } => vec![dst.clone()],
            Operator::SlicedCopy { dst, inc: false, .. } => vec![dst.clone()],
            Operator::HostFunc { output, .. } => output.iter().cloned().collect(),
            Operator::PreserveValue { dst } => vec![dst.clone()],
            _ => Vec::new(),
        }
    }

    /// Signals this operator additively updates each step
    pub fn incs(&self) -> Vec<Signal> {
        match self {
            Operator::SlicedCopy { dst, inc: true, .. } => vec![dst.clone()],
            Operator::DotInc { y, .. } => vec![y.clone()],
            Operator::ElementwiseInc { y, .. } => vec![y.clone()],
            _ => Vec::new(),
        }
    }

    /// Signals this operator only reads
    pub fn reads(&self) -> Vec<Signal> {
        match self {
            Operator::Copy { src, .. } => vec![src.clone()],
            Operator::SlicedCopy { src, .. } => vec![src.clone()],
            Operator::DotInc { a, x, .. } => vec![a.clone(), x.clone()],
            Operator::ElementwiseInc { a, x, .. } => vec![a.clone(), x.clone()],
            Operator::NeuronUpdate { j, .. } => vec![j.clone()],
            Operator::SynapseUpdate { input, .. } => vec![input.clone()],
            Operator::HostFunc { input, .. } => input.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Signals this operator is the writer-of-record for in a step
    pub fn updates(&self) -> Vec<Signal> {
        match self {
            Operator::NeuronUpdate { output, .. } => vec![output.clone()],
            Operator::SynapseUpdate { output, .. } => vec![output.clone()],
            Operator::ProcessUpdate { output, .. } => vec![output.clone()],
            _ => Vec::new(),
        }
    }

    /// Every signal in the footprint
    pub fn all_signals(&self) -> Vec<Signal> {
        let mut signals = self.sets();
        signals.extend(self.incs());
        signals.extend(self.reads());
        signals.extend(self.updates());
        signals
    }

    /// False for the synthetic communication placeholders, whose order is
    /// derived rather than computed
    pub fn performs_step(&self) -> bool {
        !matches!(self, Operator::MpiSend { .. } | Operator::MpiRecv { .. })
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        let signals = self.all_signals();
        if !signals.is_empty() {
            write!(f, "(")?;
            for (i, s) in signals.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", s)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}
