// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Neuroshard Execution-Plan Artifact
//!
//! The persisted hand-off between the model build step and the distributed
//! execution engine: one group per component, each carrying its signal
//! tables and its order-tagged operator and probe descriptions.
//!
//! ## Design Goals
//! - **Self-contained**: a remote engine reconstructs every signal view and
//!   operator from the descriptions alone, without the builder's object graph
//! - **Atomic**: the file is published with a write-then-rename, so a
//!   partially written artifact is never observable
//! - **Version-safe**: format versioning for backward compatibility
//!
//! ## Usage
//! ```ignore
//! use neuroshard_artifact::ModelArtifact;
//!
//! let artifact = ModelArtifact::load("plan.nshrd")?;
//! for group in &artifact.components {
//!     for line in &group.operators {
//!         // "<order>;<op name>;<args...>"
//!     }
//! }
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Artifact I/O errors
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Version mismatch: file version {file_version}, expected {expected_version}")]
    VersionMismatch {
        file_version: u32,
        expected_version: u32,
    },

    #[error("Invalid magic number: expected NSHRD, got {0:?}")]
    InvalidMagic([u8; 5]),

    #[error("Checksum mismatch: file may be corrupted")]
    ChecksumMismatch,
}

pub type Result<T> = std::result::Result<T, ArtifactError>;

/// Magic number for artifact files: "NSHRD"
const MAGIC: &[u8; 5] = b"NSHRD";

/// Current format version (increment when format changes)
const FORMAT_VERSION: u32 = 1;

/// Complete distributed execution plan
///
/// Everything a remote engine needs to instantiate and step the model:
/// one [`ComponentGroup`] per process plus a model-wide probe index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Simulation step size in seconds
    pub dt: f64,

    /// Number of components (processes) the model was partitioned into
    pub n_components: u32,

    /// Human-readable model label
    pub label: String,

    /// Per-component signal tables and descriptions, indexed by component
    pub components: Vec<ComponentGroup>,

    /// Every probe across all components, for discovery without scanning groups
    pub probe_index: Vec<ProbeEntry>,
}

/// The slice of the plan owned by one component
///
/// The four signal lists are parallel: entry `i` of each describes the
/// `i`-th registered base buffer. `signal_values` is the row-major
/// concatenation of all of them, so consecutive shape products partition it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentGroup {
    /// Flat initial contents of every registered signal, float64, row-major
    pub signal_values: Vec<f64>,

    /// Identity key of each registered base buffer
    pub signal_keys: Vec<i64>,

    /// Shape of each base buffer, degenerate dimensions padded to 1
    pub signal_shapes: Vec<[u64; 2]>,

    /// Human-readable label of each base buffer
    pub signal_labels: Vec<String>,

    /// Operator descriptions in execution order, each prefixed with its
    /// global order tag
    pub operators: Vec<String>,

    /// Probe descriptions in registration order
    pub probes: Vec<String>,
}

/// One probe in the model-wide index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeEntry {
    /// Probe identity key (independent of the probed signal's key)
    pub key: i64,

    /// Component the probe samples on
    pub component: u32,
}

impl ModelArtifact {
    /// Serialize to the on-disk byte layout
    ///
    /// # Format
    /// ```text
    /// [Header]
    /// - Magic: "NSHRD" (5 bytes)
    /// - Version: u32 (4 bytes, little-endian)
    /// - Checksum: u64 (8 bytes, FNV-1a of the payload)
    /// [Payload]
    /// - Bincode-serialized ModelArtifact
    /// ```
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload =
            bincode::serialize(self).map_err(|e| ArtifactError::Serialization(e.to_string()))?;

        let mut bytes = Vec::with_capacity(payload.len() + 17);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&calculate_checksum(&payload).to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Deserialize from the on-disk byte layout, verifying magic, version,
    /// and checksum
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cursor = bytes;

        let mut magic = [0u8; 5];
        cursor.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(ArtifactError::InvalidMagic(magic));
        }

        let mut version_bytes = [0u8; 4];
        cursor.read_exact(&mut version_bytes)?;
        let version = u32::from_le_bytes(version_bytes);
        if version != FORMAT_VERSION {
            return Err(ArtifactError::VersionMismatch {
                file_version: version,
                expected_version: FORMAT_VERSION,
            });
        }

        let mut checksum_bytes = [0u8; 8];
        cursor.read_exact(&mut checksum_bytes)?;
        let expected_checksum = u64::from_le_bytes(checksum_bytes);

        if calculate_checksum(cursor) != expected_checksum {
            return Err(ArtifactError::ChecksumMismatch);
        }

        bincode::deserialize(cursor).map_err(|e| ArtifactError::Deserialization(e.to_string()))
    }

    /// Save to `path`, atomically
    ///
    /// The bytes are written to a sibling temporary file which is then
    /// renamed over `path`, so a reader never observes a partial artifact.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;

        let tmp = tmp_path(path);
        let result: Result<()> = (|| {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, path)?;
            Ok(())
        })();

        if result.is_err() {
            // Best effort: don't leave the temporary behind.
            let _ = fs::remove_file(&tmp);
        }
        result
    }

    /// Load from `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

/// Sibling temp path: `plan.nshrd` -> `plan.nshrd.tmp`
fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

/// FNV-1a over the payload
fn calculate_checksum(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;

    let mut hash = FNV_OFFSET;
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
