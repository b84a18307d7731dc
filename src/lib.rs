//! # divgraph — Lexical Diversity Measures over Embedding Graphs
//!
//! Entropy, evenness and distance-based disparity indices computed over a
//! graph of occurrence-counted nodes backed by embedding vectors.
//!
//! ## Design Principles
//!
//! 1. **Stable indices**: nodes and vector slots are `u32` newtypes; arena growth never invalidates them
//! 2. **Provider-owned vectors**: `EmbeddingProvider` is the contract between the measure engine and any embedding host
//! 3. **Deterministic fills**: sequential, threaded and batched matrix builds produce bit-identical matrices
//! 4. **Session-scoped handles**: no process-global tables; a `Session` owns every graph and store it issues
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use divgraph::{
//!     DistanceKind, FillStrategy, IngestEvent, MatrixOptions, MeasureId,
//!     MeasureParams, Precision, Session,
//! };
//!
//! # fn main() -> divgraph::Result<()> {
//! // Vectors first: the store is the graph's embedding provider.
//! let mut session = Session::new();
//! let store = session.open_store(3, Precision::F32)?;
//! session.store(store)?.insert_f32("whale", vec![0.9, 0.1, 0.0])?;
//! session.store(store)?.insert_f32("dolphin", vec![0.8, 0.2, 0.1])?;
//! session.store(store)?.insert_f32("quark", vec![0.0, 0.1, 0.9])?;
//!
//! // One node per distinct key, occurrence counts from the corpus.
//! let graph = session.create_graph(16, 3, Precision::F32)?;
//! session.bind(graph, store)?;
//! session.ingest(graph, &[
//!     IngestEvent::new("whale", 4),
//!     IngestEvent::new("dolphin", 2),
//!     IngestEvent::new("quark", 1),
//! ])?;
//!
//! // Distance-dependent measures need the matrix.
//! session.build_matrix(graph, MatrixOptions::new(
//!     DistanceKind::Cosine,
//!     Precision::F32,
//!     FillStrategy::Threaded { threads: 4 },
//! ))?;
//!
//! let entropy = session.measure(graph, MeasureId::ShannonWeaver, MeasureParams::default())?;
//! let spread = session.measure(graph, MeasureId::FunctionalEvenness, MeasureParams::default())?;
//! println!("H = {:.4}, FEve = {:.4}", entropy.value, spread.value);
//! # Ok(())
//! # }
//! ```
//!
//! ## Measure Families
//!
//! | Family | Ids | Needs |
//! |--------|-----|-------|
//! | Entropy (Shannon-Weaver, Rényi, Patil-Taillie, ...) | 0..=4 | proportions |
//! | Evenness (Simpson family, Brillouin, Bulla, ...) | 5..=25 | proportions |
//! | Disparity (pairwise, Stirling, Chao, Scheiner, ...) | 26..=31 | distance matrix |
//! | Tree (functional evenness, aggregate MST) | 32..=33 | matrix + spanning tree |
//! | Centroid (dispersion, divergence) | 34..=35 | matrix + vector store |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod config;
pub mod distance;
pub mod store;
pub mod matrix;
pub mod mst;
pub mod graph;
pub mod measures;
pub mod session;
pub mod report;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    DistanceEdge, GraphNode, Neighbour, NodeIdx,
    Precision, SlotIdx, VectorData,
};

// ============================================================================
// Re-exports: Graph & store
// ============================================================================

pub use graph::{Graph, GRAPH_CAPACITY_STEP};
pub use store::{EmbeddingProvider, IngestEvent, VectorStore};

// ============================================================================
// Re-exports: Distance engine
// ============================================================================

pub use config::{FillStrategy, IngestOptions, MatrixOptions, MeasureParams};
pub use distance::DistanceKind;
pub use matrix::{DistanceMatrix, MatrixBuf, MatrixStats};
pub use mst::{DistanceHeap, SpanningTree};

// ============================================================================
// Re-exports: Measures
// ============================================================================

pub use measures::{MeasureId, MeasureOutput};

// ============================================================================
// Re-exports: Session & reports
// ============================================================================

pub use session::{GraphHandle, Session, StoreHandle};
pub use report::{
    write_graph_summary, write_measure_report,
    GraphSummary, MatrixSummary, MeasureReport,
};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("allocation failed: {0}")]
    Alloc(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown measure id {0}")]
    UnknownMeasure(u32),

    #[error("unknown key {0:?}")]
    UnknownKey(String),

    #[error("buffer holds {got} bytes, need {need}")]
    BufferSize { got: usize, need: usize },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("no distance matrix is attached")]
    MatrixMissing,

    #[error("{kind} handle {id} is closed")]
    HandleClosed { kind: &'static str, id: u32 },

    #[error("{0} produced a non-finite result")]
    NotFinite(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
