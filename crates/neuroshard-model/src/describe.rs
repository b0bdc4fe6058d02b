// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Canonical operator descriptions
//!
//! Each operator renders to one `;`-delimited line the remote engine can
//! rebuild it from, with every signal reference in the canonical
//! `key:shape:strides:offset` form. The match is exhaustive over the
//! operator vocabulary: a new variant will not compile until it renders.
//!
//! Placeholder operators render to nothing, and host functions cannot be
//! rendered at all; the finalizer routes those to the live engine or
//! rejects them, depending on the build target.

use crate::error::{ModelError, Result};
use crate::operator::{NeuronModel, Operator, StochasticProcess, SynapseFilter};
use crate::probe::Probe;
use tracing::debug;

/// Field delimiter within an operator description
pub const OP_DELIM: &str = ";";

/// Render `op` to its description body (no order prefix), `None` for
/// placeholders that carry no remote-side action.
pub(crate) fn describe_operator(op: &Operator, dt: f64) -> Result<Option<String>> {
    let args: Vec<String> = match op {
        Operator::Reset { dst, value } => {
            vec!["Reset".into(), dst.descriptor(), value.to_string()]
        }

        Operator::Copy { dst, src } => {
            vec!["Copy".into(), dst.descriptor(), src.descriptor()]
        }

        Operator::SlicedCopy {
            dst,
            src,
            dst_slice,
            src_slice,
            inc,
        } => vec![
            "SlicedCopy".into(),
            dst.descriptor(),
            src.descriptor(),
            format!("{},{}", dst_slice.0, dst_slice.1),
            format!("{},{}", src_slice.0, src_slice.1),
            u8::from(*inc).to_string(),
        ],

        Operator::DotInc { a, x, y } => vec![
            "DotInc".into(),
            a.descriptor(),
            x.descriptor(),
            y.descriptor(),
        ],

        Operator::ElementwiseInc { a, x, y } => vec![
            "ElementwiseInc".into(),
            a.descriptor(),
            x.descriptor(),
            y.descriptor(),
        ],

        Operator::NeuronUpdate {
            model,
            n_neurons,
            j,
            output,
        } => describe_neurons(model, *n_neurons, j, output, dt),

        Operator::SynapseUpdate {
            filter,
            input,
            output,
        } => describe_synapse(filter, input, output),

        Operator::ProcessUpdate { process, output } => match process {
            StochasticProcess::WhiteNoise { mean, std } => vec![
                "WhiteNoise".into(),
                output.descriptor(),
                mean.to_string(),
                std.to_string(),
            ],
            StochasticProcess::WhiteSignal { period, high, rms } => vec![
                "WhiteSignal".into(),
                output.descriptor(),
                period.to_string(),
                high.to_string(),
                rms.to_string(),
            ],
        },

        Operator::PreserveValue { dst } => {
            debug!(signal = dst.key(), "skipping PreserveValue");
            return Ok(None);
        }

        Operator::HostFunc { .. } => return Err(ModelError::HostFuncNotSerializable),

        Operator::MpiSend { dst, tag, signal } => vec![
            "MpiSend".into(),
            dst.to_string(),
            tag.to_string(),
            signal.key().to_string(),
        ],

        Operator::MpiRecv { src, tag, signal } => vec![
            "MpiRecv".into(),
            src.to_string(),
            tag.to_string(),
            signal.key().to_string(),
        ],
    };

    Ok(Some(args.join(OP_DELIM)))
}

fn describe_neurons(
    model: &NeuronModel,
    n_neurons: usize,
    j: &crate::signal::Signal,
    output: &crate::signal::Signal,
    dt: f64,
) -> Vec<String> {
    let n = n_neurons.to_string();
    let j = j.descriptor();
    let output = output.descriptor();

    match model {
        NeuronModel::Lif { tau_rc, tau_ref } => vec![
            "LIF".into(),
            n,
            tau_rc.to_string(),
            tau_ref.to_string(),
            dt.to_string(),
            j,
            output,
        ],
        NeuronModel::LifRate { tau_rc, tau_ref } => vec![
            "LIFRate".into(),
            n,
            tau_rc.to_string(),
            tau_ref.to_string(),
            j,
            output,
        ],
        NeuronModel::AdaptiveLif {
            tau_rc,
            tau_ref,
            tau_n,
            inc_n,
        } => vec![
            "AdaptiveLIF".into(),
            n,
            tau_rc.to_string(),
            tau_ref.to_string(),
            tau_n.to_string(),
            inc_n.to_string(),
            dt.to_string(),
            j,
            output,
        ],
        NeuronModel::AdaptiveLifRate {
            tau_rc,
            tau_ref,
            tau_n,
            inc_n,
        } => vec![
            "AdaptiveLIFRate".into(),
            n,
            tau_rc.to_string(),
            tau_ref.to_string(),
            tau_n.to_string(),
            inc_n.to_string(),
            dt.to_string(),
            j,
            output,
        ],
        NeuronModel::RectifiedLinear => vec!["RectifiedLinear".into(), n, j, output],
        NeuronModel::Sigmoid { tau_ref } => {
            vec!["Sigmoid".into(), n, tau_ref.to_string(), j, output]
        }
        NeuronModel::Izhikevich {
            tau_recovery,
            coupling,
            reset_voltage,
            reset_recovery,
        } => vec![
            "Izhikevich".into(),
            n,
            tau_recovery.to_string(),
            coupling.to_string(),
            reset_voltage.to_string(),
            reset_recovery.to_string(),
            dt.to_string(),
            j,
            output,
        ],
    }
}

fn describe_synapse(
    filter: &SynapseFilter,
    input: &crate::signal::Signal,
    output: &crate::signal::Signal,
) -> Vec<String> {
    let input = input.descriptor();
    let output = output.descriptor();

    // The degenerate orders get their own vocabulary: the engine implements
    // the copy-scale and the two-coefficient recurrence as dedicated loops.
    match filter {
        SynapseFilter::Direct { scale } => {
            vec!["DirectSynapse".into(), input, output, scale.to_string()]
        }
        SynapseFilter::Lowpass { num, den } => vec![
            "LowpassSynapse".into(),
            input,
            output,
            num.to_string(),
            den.to_string(),
        ],
        SynapseFilter::Linear { num, den } => vec![
            "LinearSynapse".into(),
            input,
            output,
            join_coefficients(num),
            join_coefficients(den),
        ],
        SynapseFilter::Triangle { taps } => {
            vec!["TriangleSynapse".into(), input, output, join_coefficients(taps)]
        }
    }
}

fn join_coefficients(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Render a probe to its description line: `key;signal;period;label`
pub(crate) fn describe_probe(probe: &Probe, dt: f64) -> String {
    [
        probe.key().to_string(),
        probe.target().descriptor(),
        probe.period(dt).to_string(),
        probe.label().to_string(),
    ]
    .join(OP_DELIM)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Signal;

    #[test]
    fn test_reset_and_copy_lines() {
        let dst = Signal::vector("dst", &[0.0, 0.0]);
        let src = Signal::vector("src", &[1.0, 1.0]);

        let reset = describe_operator(
            &Operator::Reset {
                dst: dst.clone(),
                value: 4.0,
            },
            0.001,
        )
        .unwrap()
        .unwrap();
        assert_eq!(reset, format!("Reset;{};4", dst.descriptor()));

        let copy = describe_operator(
            &Operator::Copy {
                dst: dst.clone(),
                src: src.clone(),
            },
            0.001,
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            copy,
            format!("Copy;{};{}", dst.descriptor(), src.descriptor())
        );
    }

    #[test]
    fn test_lif_line_carries_dt() {
        let j = Signal::vector("j", &[0.0; 3]);
        let out = Signal::vector("out", &[0.0; 3]);
        let op = Operator::NeuronUpdate {
            model: NeuronModel::Lif {
                tau_rc: 0.02,
                tau_ref: 0.002,
            },
            n_neurons: 3,
            j: j.clone(),
            output: out.clone(),
        };

        let line = describe_operator(&op, 0.001).unwrap().unwrap();
        assert_eq!(
            line,
            format!(
                "LIF;3;0.02;0.002;0.001;{};{}",
                j.descriptor(),
                out.descriptor()
            )
        );
    }

    #[test]
    fn test_degenerate_synapse_orders_are_distinct() {
        let input = Signal::vector("in", &[0.0]);
        let output = Signal::vector("out", &[0.0]);
        let line = |filter: SynapseFilter| {
            describe_operator(
                &Operator::SynapseUpdate {
                    filter,
                    input: input.clone(),
                    output: output.clone(),
                },
                0.001,
            )
            .unwrap()
            .unwrap()
        };

        assert!(line(SynapseFilter::Direct { scale: 2.0 }).starts_with("DirectSynapse;"));
        assert!(line(SynapseFilter::Lowpass { num: 0.1, den: 0.9 }).starts_with("LowpassSynapse;"));

        let general = line(SynapseFilter::Linear {
            num: vec![0.1, 0.2],
            den: vec![0.9],
        });
        assert_eq!(
            general,
            format!(
                "LinearSynapse;{};{};0.1,0.2;0.9",
                input.descriptor(),
                output.descriptor()
            )
        );

        let fir = line(SynapseFilter::Triangle {
            taps: vec![0.25, 0.5, 0.25],
        });
        assert!(fir.starts_with("TriangleSynapse;"));
        assert!(fir.ends_with("0.25,0.5,0.25"));
    }

    #[test]
    fn test_preserve_value_renders_to_skip() {
        let dst = Signal::vector("dst", &[0.0]);
        let rendered = describe_operator(&Operator::PreserveValue { dst }, 0.001).unwrap();
        assert!(rendered.is_none());
    }

    #[test]
    fn test_host_func_is_not_describable() {
        let op = Operator::HostFunc {
            func: std::sync::Arc::new(|_, _| None),
            time_input: false,
            input: None,
            output: None,
        };
        assert!(matches!(
            describe_operator(&op, 0.001),
            Err(ModelError::HostFuncNotSerializable)
        ));
    }

    #[test]
    fn test_send_recv_reference_bare_keys() {
        let s = Signal::vector("s", &[0.0]);
        let send = describe_operator(
            &Operator::MpiSend {
                dst: 1,
                tag: 7,
                signal: s.clone(),
            },
            0.001,
        )
        .unwrap()
        .unwrap();
        assert_eq!(send, format!("MpiSend;1;7;{}", s.key()));

        let recv = describe_operator(
            &Operator::MpiRecv {
                src: 0,
                tag: 7,
                signal: s.clone(),
            },
            0.001,
        )
        .unwrap()
        .unwrap();
        assert_eq!(recv, format!("MpiRecv;0;7;{}", s.key()));
    }

    #[test]
    fn test_probe_line() {
        let target = Signal::vector("decoded", &[0.0, 0.0]);
        let probe = Probe::new(40, target.clone(), Some(0.01), "probe(decoded)");

        let line = describe_probe(&probe, 0.001);
        assert_eq!(
            line,
            format!("{};{};10;probe(decoded)", probe.key(), target.descriptor())
        );
    }
}
