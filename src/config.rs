//! Serialisable configuration surfaces: matrix fill options, measure
//! order parameters, and ingestion threading.

use serde::{Deserialize, Serialize};

use crate::distance::DistanceKind;
use crate::model::Precision;

// ============================================================================
// Matrix engine
// ============================================================================

/// How matrix rows are computed.
///
/// Every strategy performs the identical per-cell computation, so the
/// resulting matrix is bit-identical across strategies and thread counts;
/// only wall-clock time differs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillStrategy {
    /// One pass over all rows on the calling thread.
    #[default]
    Sequential,
    /// Rows split into `threads` contiguous blocks, sizes differing by at
    /// most one, remainder rows assigned to the first blocks.
    Threaded { threads: usize },
    /// Fixed-size row batches dispatched in waves of at most `threads`
    /// workers. Amortises thread startup on very large graphs.
    Batched { threads: usize, rows_per_batch: usize },
}

/// Everything the matrix engine needs to build a distance matrix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MatrixOptions {
    pub kind: DistanceKind,
    pub precision: Precision,
    pub strategy: FillStrategy,
}

impl MatrixOptions {
    pub fn new(kind: DistanceKind, precision: Precision, strategy: FillStrategy) -> Self {
        Self { kind, precision, strategy }
    }
}

// ============================================================================
// Measures
// ============================================================================

/// Order parameters for parameterised measures. Both default to 1.0;
/// measures that take no parameter ignore them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasureParams {
    pub alpha: f64,
    pub beta: f64,
}

impl Default for MeasureParams {
    fn default() -> Self {
        Self { alpha: 1.0, beta: 1.0 }
    }
}

impl MeasureParams {
    /// Set `alpha`, keeping `beta` at its default.
    pub fn with_alpha(alpha: f64) -> Self {
        Self { alpha, ..Self::default() }
    }

    /// Set both order parameters.
    pub fn with(alpha: f64, beta: f64) -> Self {
        Self { alpha, beta }
    }
}

// ============================================================================
// Ingestion
// ============================================================================

/// Threading for multi-source corpus ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Worker count for [`crate::session::Session::ingest_threaded`]. A
    /// value of 1 degenerates to the sequential path.
    pub threads: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self { threads: 4 }
    }
}
