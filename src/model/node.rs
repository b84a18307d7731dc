//! Nodes and their MST adjacency.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::vector::SlotIdx;

// ============================================================================
// NodeIdx
// ============================================================================

/// Stable index of a node within its graph.
///
/// Indices are handed out in insertion order and remain valid for the
/// graph's whole lifetime: growth may move interior storage, never the
/// index. All cross-structure references (heap edges, tree edges, store
/// bindings) are expressed through `NodeIdx`, not through references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeIdx(pub u32);

impl NodeIdx {
    /// The index as a `usize`, for arena addressing.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

// ============================================================================
// Neighbour
// ============================================================================

/// One MST adjacency entry: the node at the other end of an accepted
/// tree edge, and that edge's weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbour {
    pub node: NodeIdx,
    pub dist: f64,
}

// ============================================================================
// GraphNode
// ============================================================================

/// A single entity in the graph: an occurrence counter, its derived share
/// of the total, and a borrowed embedding expressed as a vector-store slot.
///
/// The occurrence count sits behind its own mutex so concurrent increments
/// to *different* nodes never contend — the arena lock is only taken shared
/// on the increment path. `relative` is derived state: it is stale until
/// the owning graph recomputes proportions, and the graph tracks that
/// staleness for all nodes at once.
#[derive(Debug)]
pub struct GraphNode {
    /// Absolute occurrence count.
    absolute: Mutex<u64>,
    /// Share of the graph's total count. Meaningful only while the owning
    /// graph reports proportions as fresh.
    relative: f64,
    /// Slot of the backing vector in the bound store. Referenced, never
    /// owned or copied here.
    slot: SlotIdx,
    /// Dimension count of the backing vector.
    dims: u32,
    /// MST adjacency. Empty until a spanning tree completes; most corpus
    /// graphs keep tree degree small, hence the inline capacity.
    neighbours: SmallVec<[Neighbour; 4]>,
}

impl GraphNode {
    pub(crate) fn new(count: u64, slot: SlotIdx, dims: u32) -> Self {
        Self {
            absolute: Mutex::new(count),
            relative: 0.0,
            slot,
            dims,
            neighbours: SmallVec::new(),
        }
    }

    /// Current occurrence count.
    pub fn absolute(&self) -> u64 {
        *self.absolute.lock()
    }

    /// Bump the occurrence count. Takes only this node's lock.
    pub(crate) fn add_occurrences(&self, by: u64) {
        *self.absolute.lock() += by;
    }

    /// Share of the total count as of the last proportion recomputation.
    pub fn relative(&self) -> f64 {
        self.relative
    }

    pub(crate) fn set_relative(&mut self, p: f64) {
        self.relative = p;
    }

    /// Slot of the backing vector in the bound store.
    pub fn slot(&self) -> SlotIdx {
        self.slot
    }

    /// Dimension count of the backing vector.
    pub fn dims(&self) -> u32 {
        self.dims
    }

    /// MST adjacency as of the last completed spanning tree.
    pub fn neighbours(&self) -> &[Neighbour] {
        &self.neighbours
    }

    pub(crate) fn clear_neighbours(&mut self) {
        self.neighbours.clear();
    }

    pub(crate) fn push_neighbour(&mut self, n: Neighbour) {
        self.neighbours.push(n);
    }
}
