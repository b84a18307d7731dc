//! # Embedding Provider Boundary
//!
//! This is THE contract between the measure engine and any embedding host.
//! Vectors stay owned by the provider and are referenced by stable slot;
//! graph nodes never copy or free them.
//!
//! ## Implementations
//!
//! | Provider | Module | Description |
//! |----------|--------|-------------|
//! | `VectorStore` | `memory` | In-memory reference store for tests/embedding |

pub mod memory;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::{Precision, SlotIdx, VectorData};

pub use memory::VectorStore;

// ============================================================================
// EmbeddingProvider
// ============================================================================

/// Read side of an embedding table.
///
/// All vectors in one provider share a dimension count and a precision;
/// slots are stable for the provider's lifetime, which is what lets graph
/// nodes reference vectors without owning them.
pub trait EmbeddingProvider: Send + Sync {
    /// Dimension count every vector shares.
    fn dims(&self) -> u32;

    /// Width the table stores its vectors at.
    fn precision(&self) -> Precision;

    /// Number of entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stable slot of `key`, if present.
    fn slot_of(&self, key: &str) -> Option<SlotIdx>;

    /// The vector at `slot`. The payload is refcounted, never copied.
    fn vector(&self, slot: SlotIdx) -> Option<Arc<VectorData>>;
}

// ============================================================================
// IngestEvent
// ============================================================================

/// One corpus observation: a key and the occurrences it contributes.
/// First sighting of a key creates a graph node; later sightings increment
/// its count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestEvent {
    pub key: String,
    pub increment: u64,
}

impl IngestEvent {
    pub fn new(key: impl Into<String>, increment: u64) -> Self {
        Self { key: key.into(), increment }
    }
}
