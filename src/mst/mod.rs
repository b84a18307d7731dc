//! # Distance Heap & Minimum Spanning Tree
//!
//! The two structures behind the MST-dependent disparity measures. The
//! [`DistanceHeap`] wraps a completed distance matrix as a binary min-heap
//! over all `n(n−1)/2` node-pair edges; the [`SpanningTree`] consumes the
//! heap edge by edge until every node is connected.
//!
//! Both refer to nodes exclusively through [`crate::model::NodeIdx`], so
//! they stay valid while the graph's interior storage moves. They are
//! meaningless once the node set or the matrix changes; the owning graph
//! drops them eagerly on either event and double-checks staleness via the
//! node count and matrix epoch it recorded at build time.

mod heap;
mod tree;

pub use heap::DistanceHeap;
pub use tree::SpanningTree;
