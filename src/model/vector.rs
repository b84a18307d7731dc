//! Precision tags, store slots, and owned vector payloads.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Precision
// ============================================================================

/// Floating-point width of embedding vectors and distance matrices.
///
/// Every graph, store, and matrix carries one of these tags; consumers
/// read through the tag rather than assuming a width. `F32` is the
/// default because embedding tables overwhelmingly ship single-precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Precision {
    #[default]
    F32,
    F64,
}

impl Precision {
    /// Bytes occupied by one scalar of this precision.
    pub fn unit_size(self) -> usize {
        match self {
            Precision::F32 => 4,
            Precision::F64 => 8,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::F32 => write!(f, "f32"),
            Precision::F64 => write!(f, "f64"),
        }
    }
}

// ============================================================================
// SlotIdx
// ============================================================================

/// Stable index of a vector inside its store.
///
/// Slots never move or get reused for the store's lifetime, which is what
/// lets graph nodes reference vectors without owning them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotIdx(pub u32);

impl SlotIdx {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SlotIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

// ============================================================================
// VectorData
// ============================================================================

/// An owned embedding vector, tagged with its precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VectorData {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl VectorData {
    pub fn precision(&self) -> Precision {
        match self {
            VectorData::F32(_) => Precision::F32,
            VectorData::F64(_) => Precision::F64,
        }
    }

    pub fn dims(&self) -> usize {
        match self {
            VectorData::F32(v) => v.len(),
            VectorData::F64(v) => v.len(),
        }
    }

    /// The vector as `&[f32]`, when stored single-precision.
    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            VectorData::F32(v) => Some(v),
            VectorData::F64(_) => None,
        }
    }

    /// The vector as `&[f64]`, when stored double-precision.
    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            VectorData::F64(v) => Some(v),
            VectorData::F32(_) => None,
        }
    }
}
