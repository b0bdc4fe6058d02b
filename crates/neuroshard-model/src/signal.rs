// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Signals: named numeric buffers and views over them
//!
//! A [`Signal`] is a view (shape, element strides, offset) over a shared
//! base buffer. Identity is the *base* buffer's key: two views over the
//! same base share a key, which is what the registry, the dependency
//! graph, and the remote engine all key on.

use ndarray::{Array1, Array2, Axis};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identity key of a base buffer (and of every view over it)
pub type SignalKey = u64;

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh identity key. Also used for probe identities, which
/// live in the same keyspace.
pub(crate) fn fresh_key() -> u64 {
    NEXT_KEY.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug)]
struct SignalBase {
    key: SignalKey,
    label: String,
    data: Array2<f64>,
}

/// A view over a shared base buffer
///
/// Cheap to clone. View equality is (key, shape, strides, offset); base
/// identity is the key alone.
#[derive(Debug, Clone)]
pub struct Signal {
    base: Arc<SignalBase>,
    shape: (usize, usize),
    strides: (usize, usize),
    offset: usize,
}

impl Signal {
    /// A 1x1 signal holding one value
    pub fn scalar(label: impl Into<String>, value: f64) -> Self {
        Self::from_array(label, Array2::from_elem((1, 1), value))
    }

    /// A column-vector signal, shape (n, 1)
    pub fn vector(label: impl Into<String>, values: &[f64]) -> Self {
        let column = Array1::from(values.to_vec()).insert_axis(Axis(1));
        Self::from_array(label, column)
    }

    /// A 2-D signal
    pub fn matrix(label: impl Into<String>, data: Array2<f64>) -> Self {
        Self::from_array(label, data)
    }

    fn from_array(label: impl Into<String>, data: Array2<f64>) -> Self {
        let shape = (data.nrows(), data.ncols());
        let base = Arc::new(SignalBase {
            key: fresh_key(),
            label: label.into(),
            data,
        });
        Signal {
            base,
            shape,
            strides: (shape.1, 1),
            offset: 0,
        }
    }

    /// A derived view over the same base buffer
    pub fn view(&self, shape: (usize, usize), strides: (usize, usize), offset: usize) -> Self {
        Signal {
            base: Arc::clone(&self.base),
            shape,
            strides,
            offset,
        }
    }

    /// The view covering the whole base buffer (what the registry stores)
    pub fn base_view(&self) -> Self {
        let shape = self.base_shape();
        Signal {
            base: Arc::clone(&self.base),
            shape,
            strides: (shape.1, 1),
            offset: 0,
        }
    }

    pub fn key(&self) -> SignalKey {
        self.base.key
    }

    pub fn label(&self) -> &str {
        &self.base.label
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn strides(&self) -> (usize, usize) {
        self.strides
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Elements in this view
    pub fn len(&self) -> usize {
        self.shape.0 * self.shape.1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn base_shape(&self) -> (usize, usize) {
        (self.base.data.nrows(), self.base.data.ncols())
    }

    /// Elements in the base buffer
    pub fn base_len(&self) -> usize {
        self.base.data.len()
    }

    /// Initial contents of the base buffer
    pub fn base_contents(&self) -> &Array2<f64> {
        &self.base.data
    }

    /// Canonical descriptor consumed by the remote engine:
    /// `key:rows,cols:row_stride,col_stride:offset`
    pub fn descriptor(&self) -> String {
        format!(
            "{}:{},{}:{},{}:{}",
            self.base.key,
            self.shape.0,
            self.shape.1,
            self.strides.0,
            self.strides.1,
            self.offset
        )
    }

    /// True when the two views share a base buffer
    pub fn same_base(&self, other: &Signal) -> bool {
        self.base.key == other.base.key
    }
}

impl PartialEq for Signal {
    fn eq(&self, other: &Self) -> bool {
        self.base.key == other.base.key
            && self.shape == other.shape
            && self.strides == other.strides
            && self.offset == other.offset
    }
}

impl Eq for Signal {}

impl Hash for Signal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.base.key.hash(state);
        self.shape.hash(state);
        self.strides.hash(state);
        self.offset.hash(state);
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}x{}>", self.base.label, self.shape.0, self.shape.1)
    }
}
