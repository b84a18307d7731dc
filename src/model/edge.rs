//! Distance edges — the atomic unit of the heap and the spanning tree.

use serde::{Deserialize, Serialize};

use super::node::NodeIdx;

/// An unordered node pair and the distance between their vectors.
///
/// Distances are carried as `f64` regardless of the matrix precision;
/// `f32` cells widen losslessly on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceEdge {
    pub a: NodeIdx,
    pub b: NodeIdx,
    pub dist: f64,
}

impl DistanceEdge {
    pub fn new(a: NodeIdx, b: NodeIdx, dist: f64) -> Self {
        Self { a, b, dist }
    }
}
