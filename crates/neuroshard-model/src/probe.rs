// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Probes: sampled observations of one signal on one component

use crate::signal::{fresh_key, Signal};
use crate::ObjectId;

/// A request to record one signal every `period` steps
///
/// The probe's identity key is independent of the probed signal's key;
/// the execution engine reports sampled data under the probe key.
#[derive(Debug, Clone)]
pub struct Probe {
    key: u64,
    object: ObjectId,
    target: Signal,
    sample_every: Option<f64>,
    label: String,
}

impl Probe {
    /// `object` is the probe's entry in the assignment table; `sample_every`
    /// is the requested sampling interval in seconds (every step when unset).
    pub fn new(
        object: ObjectId,
        target: Signal,
        sample_every: Option<f64>,
        label: impl Into<String>,
    ) -> Self {
        Probe {
            key: fresh_key(),
            object,
            target,
            sample_every,
            label: label.into(),
        }
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn target(&self) -> &Signal {
        &self.target
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Sampling period in steps: `sample_every / dt`, truncated.
    pub fn period(&self, dt: f64) -> u64 {
        match self.sample_every {
            Some(sample_every) => (sample_every / dt) as u64,
            None => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_defaults_to_every_step() {
        let probe = Probe::new(1, Signal::scalar("s", 0.0), None, "p");
        assert_eq!(probe.period(0.001), 1);
    }

    #[test]
    fn test_period_divides_interval_by_dt() {
        let probe = Probe::new(1, Signal::scalar("s", 0.0), Some(0.01), "p");
        assert_eq!(probe.period(0.001), 10);
    }

    #[test]
    fn test_period_truncates() {
        let probe = Probe::new(1, Signal::scalar("s", 0.0), Some(0.0015), "p");
        assert_eq!(probe.period(0.001), 1);
    }

    #[test]
    fn test_key_is_independent_of_signal() {
        let target = Signal::scalar("s", 0.0);
        let a = Probe::new(1, target.clone(), None, "a");
        let b = Probe::new(1, target.clone(), None, "b");

        assert_ne!(a.key(), target.key());
        assert_ne!(a.key(), b.key());
    }
}
