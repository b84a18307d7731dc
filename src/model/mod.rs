//! # Graph Data Model
//!
//! Plain DTOs shared by every boundary: graph store ↔ matrix engine ↔
//! MST builder ↔ measure library ↔ session registry.
//!
//! Design rule: no I/O and no locking policy here beyond the per-node
//! occurrence lock the data model itself demands. Everything else is
//! pure data.

pub mod node;
pub mod vector;
pub mod edge;

pub use node::{GraphNode, Neighbour, NodeIdx};
pub use vector::{Precision, SlotIdx, VectorData};
pub use edge::DistanceEdge;
