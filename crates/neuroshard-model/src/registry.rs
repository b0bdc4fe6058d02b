// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-component signal registry
//!
//! Append-only and idempotent by base key. The running element total sizes
//! the component's flat value buffer in the persisted artifact.

use crate::signal::{Signal, SignalKey};
use ahash::AHashSet;
use tracing::debug;

#[derive(Debug, Default)]
pub struct SignalRegistry {
    /// Base views in registration order
    signals: Vec<Signal>,
    keys: AHashSet<SignalKey>,
    total_len: usize,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the signal's base buffer. Returns true when the key was new.
    pub fn register(&mut self, signal: &Signal) -> bool {
        if !self.keys.insert(signal.key()) {
            return false;
        }

        debug!(key = signal.key(), label = signal.label(), "registering signal");
        self.total_len += signal.base_len();
        self.signals.push(signal.base_view());
        true
    }

    pub fn contains(&self, key: SignalKey) -> bool {
        self.keys.contains(&key)
    }

    /// Registered base views, in registration order
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// Total element count across registered base buffers
    pub fn total_len(&self) -> usize {
        self.total_len
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = SignalRegistry::new();
        let s = Signal::vector("s", &[1.0, 2.0, 3.0]);

        assert!(registry.register(&s));
        let (len, total) = (registry.len(), registry.total_len());

        assert!(!registry.register(&s));
        assert_eq!(registry.len(), len);
        assert_eq!(registry.total_len(), total);
    }

    #[test]
    fn test_views_register_once() {
        let mut registry = SignalRegistry::new();
        let s = Signal::vector("s", &[1.0, 2.0, 3.0, 4.0]);
        let v = s.view((2, 1), (1, 1), 1);

        assert!(registry.register(&v));
        assert!(!registry.register(&s));

        // The stored entry is the whole base, not the view.
        assert_eq!(registry.total_len(), 4);
        assert_eq!(registry.signals()[0].shape(), (4, 1));
    }

    #[test]
    fn test_registration_order_is_preserved() {
        let mut registry = SignalRegistry::new();
        let a = Signal::scalar("a", 0.0);
        let b = Signal::scalar("b", 0.0);
        let c = Signal::scalar("c", 0.0);

        registry.register(&b);
        registry.register(&a);
        registry.register(&c);

        let labels: Vec<_> = registry.signals().iter().map(|s| s.label()).collect();
        assert_eq!(labels, vec!["b", "a", "c"]);
        assert_eq!(registry.total_len(), 3);
    }
}
