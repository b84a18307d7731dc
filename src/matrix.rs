//! # Distance Matrix Engine — Pairwise Distances, Any Fill Strategy
//!
//! Builds the square `n × n` distance matrix the disparity measures read.
//! One generic buffer ([`MatrixBuf`]) instantiated at the two matrix
//! precisions and wrapped in the [`DistanceMatrix`] enum, so callers carry
//! a precision tag instead of a type parameter.
//!
//! Three fill strategies, one per-cell computation:
//!
//! | Strategy     | Row partition                                            |
//! |--------------|----------------------------------------------------------|
//! | `Sequential` | all rows on the calling thread                           |
//! | `Threaded`   | `T` contiguous blocks, sizes differing by at most one    |
//! | `Batched`    | fixed-size batches dispatched in waves of at most `T`    |
//!
//! Workers write disjoint row ranges carved out with `split_at_mut`, so
//! the fill needs no locking, and because every strategy runs the identical
//! per-cell computation the resulting matrix is bit-identical across
//! strategies and thread counts.
//!
//! Matrices can also be attached from a raw byte buffer (native endianness,
//! exact-length check); attached matrices carry no [`DistanceKind`].

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{FillStrategy, MatrixOptions};
use crate::distance::{DistanceKind, Real};
use crate::model::{Precision, VectorData};
use crate::{Error, Result};

// ============================================================================
// MatrixBuf — the concrete container
// ============================================================================

/// A square distance buffer at one concrete precision, row-major, with a
/// per-cell `active` marker written only by MST completion.
#[derive(Debug, Clone)]
pub struct MatrixBuf<T: Real> {
    n: usize,
    /// `None` for matrices attached from raw bytes.
    kind: Option<DistanceKind>,
    cells: Vec<T>,
    active: Vec<bool>,
}

impl<T: Real> MatrixBuf<T> {
    fn fill(views: &[&[T]], kind: DistanceKind, strategy: FillStrategy) -> Result<Self> {
        let n = views.len();
        let mut cells = Vec::new();
        cells
            .try_reserve_exact(n * n)
            .map_err(|_| Error::Alloc("distance matrix cells"))?;
        cells.resize(n * n, T::ZERO);

        match strategy {
            FillStrategy::Sequential => {
                for (i, row) in cells.chunks_exact_mut(n).enumerate() {
                    fill_row(row, i, views, kind);
                }
            }
            FillStrategy::Threaded { threads } => fill_threaded(&mut cells, views, kind, threads),
            FillStrategy::Batched { threads, rows_per_batch } => {
                fill_batched(&mut cells, views, kind, threads, rows_per_batch);
            }
        }

        Ok(Self { n, kind: Some(kind), cells, active: inactive_markers(n)? })
    }

    fn attached(n: usize, cells: Vec<T>) -> Result<Self> {
        Ok(Self { n, kind: None, cells, active: inactive_markers(n)? })
    }

    /// Side length of the buffer.
    pub fn num_nodes(&self) -> usize {
        self.n
    }

    /// Cell `(i, j)` at the buffer's native width.
    ///
    /// Panics when `i` or `j` is out of range, like any slice index.
    pub fn get(&self, i: usize, j: usize) -> T {
        self.cells[i * self.n + j]
    }

    pub fn is_active(&self, i: usize, j: usize) -> bool {
        self.active[i * self.n + j]
    }

    fn mark_active(&mut self, i: usize, j: usize) {
        self.active[i * self.n + j] = true;
        self.active[j * self.n + i] = true;
    }

    fn stats(&self) -> MatrixStats {
        let count = self.cells.len();
        if count == 0 {
            return MatrixStats { mean: 0.0, std: 0.0, min: 0.0, max: 0.0 };
        }
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &c in &self.cells {
            let v = c.to_f64();
            sum += v;
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
        }
        let mean = sum / count as f64;
        let mut var = 0.0;
        for &c in &self.cells {
            let d = c.to_f64() - mean;
            var += d * d;
        }
        MatrixStats { mean, std: (var / count as f64).sqrt(), min, max }
    }
}

fn inactive_markers(n: usize) -> Result<Vec<bool>> {
    let mut active = Vec::new();
    active
        .try_reserve_exact(n * n)
        .map_err(|_| Error::Alloc("distance matrix markers"))?;
    active.resize(n * n, false);
    Ok(active)
}

// ============================================================================
// DistanceMatrix — the precision-tagged wrapper
// ============================================================================

/// A completed distance matrix at one of the two matrix precisions.
///
/// Owned by its graph and replaced wholesale; cells are never mutated after
/// construction, only the `active` markers flip (at MST completion).
#[derive(Debug, Clone)]
pub enum DistanceMatrix {
    F32(MatrixBuf<f32>),
    F64(MatrixBuf<f64>),
}

impl DistanceMatrix {
    /// Compute a matrix over the given vectors.
    ///
    /// Every vector must share one dimension count and match
    /// `opts.precision`; a cross-width build is rejected rather than
    /// silently converted.
    pub fn build(vectors: &[Arc<VectorData>], opts: MatrixOptions) -> Result<Self> {
        if let Some(first) = vectors.first() {
            let dims = first.dims();
            for v in vectors {
                if v.dims() != dims {
                    return Err(Error::DimensionMismatch { expected: dims, got: v.dims() });
                }
            }
        }

        let started = Instant::now();
        let matrix = match opts.precision {
            Precision::F32 => {
                let views = views_f32(vectors)?;
                DistanceMatrix::F32(MatrixBuf::fill(&views, opts.kind, opts.strategy)?)
            }
            Precision::F64 => {
                let views = views_f64(vectors)?;
                DistanceMatrix::F64(MatrixBuf::fill(&views, opts.kind, opts.strategy)?)
            }
        };
        debug!(
            nodes = vectors.len(),
            kind = %opts.kind,
            strategy = ?opts.strategy,
            elapsed_us = started.elapsed().as_micros() as u64,
            "distance matrix filled"
        );
        Ok(matrix)
    }

    /// Adopt an externally computed matrix from raw bytes in native
    /// endianness. The buffer must hold exactly `num_nodes² × unit_size`
    /// bytes; the engine copies out of it and owns the copy.
    pub fn from_bytes(bytes: &[u8], num_nodes: usize, precision: Precision) -> Result<Self> {
        let need = num_nodes * num_nodes * precision.unit_size();
        if bytes.len() != need {
            return Err(Error::BufferSize { got: bytes.len(), need });
        }
        match precision {
            Precision::F32 => {
                let mut cells = Vec::new();
                cells
                    .try_reserve_exact(num_nodes * num_nodes)
                    .map_err(|_| Error::Alloc("distance matrix cells"))?;
                for c in bytes.chunks_exact(4) {
                    cells.push(f32::from_ne_bytes([c[0], c[1], c[2], c[3]]));
                }
                Ok(DistanceMatrix::F32(MatrixBuf::attached(num_nodes, cells)?))
            }
            Precision::F64 => {
                let mut cells = Vec::new();
                cells
                    .try_reserve_exact(num_nodes * num_nodes)
                    .map_err(|_| Error::Alloc("distance matrix cells"))?;
                for c in bytes.chunks_exact(8) {
                    cells.push(f64::from_ne_bytes([
                        c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7],
                    ]));
                }
                Ok(DistanceMatrix::F64(MatrixBuf::attached(num_nodes, cells)?))
            }
        }
    }

    /// Side length of the matrix.
    pub fn num_nodes(&self) -> usize {
        match self {
            DistanceMatrix::F32(m) => m.num_nodes(),
            DistanceMatrix::F64(m) => m.num_nodes(),
        }
    }

    pub fn precision(&self) -> Precision {
        match self {
            DistanceMatrix::F32(_) => Precision::F32,
            DistanceMatrix::F64(_) => Precision::F64,
        }
    }

    /// The comparator the matrix was filled with; `None` for matrices
    /// attached from raw bytes.
    pub fn kind(&self) -> Option<DistanceKind> {
        match self {
            DistanceMatrix::F32(m) => m.kind,
            DistanceMatrix::F64(m) => m.kind,
        }
    }

    /// Cell `(i, j)` widened to `f64` (lossless for both precisions).
    ///
    /// Panics when `i` or `j` is out of range, like any slice index.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        match self {
            DistanceMatrix::F32(m) => m.get(i, j).to_f64(),
            DistanceMatrix::F64(m) => m.get(i, j),
        }
    }

    /// Whether cell `(i, j)` belongs to the completed spanning tree.
    pub fn is_active(&self, i: usize, j: usize) -> bool {
        match self {
            DistanceMatrix::F32(m) => m.is_active(i, j),
            DistanceMatrix::F64(m) => m.is_active(i, j),
        }
    }

    /// Flip the markers for `(i, j)` and `(j, i)`. Called once per accepted
    /// tree edge when a spanning tree completes.
    pub(crate) fn mark_active(&mut self, i: usize, j: usize) {
        match self {
            DistanceMatrix::F32(m) => m.mark_active(i, j),
            DistanceMatrix::F64(m) => m.mark_active(i, j),
        }
    }

    /// Aggregates over all `n × n` cells, diagonal included.
    pub fn stats(&self) -> MatrixStats {
        match self {
            DistanceMatrix::F32(m) => m.stats(),
            DistanceMatrix::F64(m) => m.stats(),
        }
    }
}

// ============================================================================
// MatrixStats
// ============================================================================

/// Cell aggregates of a distance matrix: mean, population standard
/// deviation, minimum, and maximum over all `n × n` cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatrixStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

// ============================================================================
// Fill internals
// ============================================================================

fn views_f32(vectors: &[Arc<VectorData>]) -> Result<Vec<&[f32]>> {
    let mut views = Vec::with_capacity(vectors.len());
    for v in vectors.iter() {
        views.push(v.as_f32().ok_or_else(|| {
            Error::InvalidArgument(format!(
                "vector precision {} does not match requested matrix precision f32",
                v.precision()
            ))
        })?);
    }
    Ok(views)
}

fn views_f64(vectors: &[Arc<VectorData>]) -> Result<Vec<&[f64]>> {
    let mut views = Vec::with_capacity(vectors.len());
    for v in vectors.iter() {
        views.push(v.as_f64().ok_or_else(|| {
            Error::InvalidArgument(format!(
                "vector precision {} does not match requested matrix precision f64",
                v.precision()
            ))
        })?);
    }
    Ok(views)
}

/// The one per-cell computation every strategy runs. The diagonal is
/// written as an exact zero, never computed.
#[inline]
fn fill_row<T: Real>(row: &mut [T], i: usize, views: &[&[T]], kind: DistanceKind) {
    for (j, cell) in row.iter_mut().enumerate() {
        *cell = if i == j { T::ZERO } else { kind.eval(views[i], views[j]) };
    }
}

/// Contiguous-block partition: `threads` blocks with sizes differing by at
/// most one, remainder rows assigned to the first blocks. The partition
/// covers `[0, n)` exactly once and workers never share a row.
fn fill_threaded<T: Real>(cells: &mut [T], views: &[&[T]], kind: DistanceKind, threads: usize) {
    let n = views.len();
    if n == 0 {
        return;
    }
    let workers = threads.clamp(1, n);
    let base = n / workers;
    let extra = n % workers;

    std::thread::scope(|scope| {
        let mut rest = cells;
        let mut first = 0usize;
        for b in 0..workers {
            let rows_here = base + usize::from(b < extra);
            let (block, tail) = std::mem::take(&mut rest).split_at_mut(rows_here * n);
            rest = tail;
            let start = first;
            first += rows_here;
            scope.spawn(move || {
                for (k, row) in block.chunks_exact_mut(n).enumerate() {
                    fill_row(row, start + k, views, kind);
                }
            });
        }
    });
}

/// Wave dispatch: at most `threads` workers per wave, each filling
/// `rows_per_batch` consecutive rows. Joins between waves, so thread
/// creation is amortised without ever holding more than `threads` workers.
fn fill_batched<T: Real>(
    cells: &mut [T],
    views: &[&[T]],
    kind: DistanceKind,
    threads: usize,
    rows_per_batch: usize,
) {
    let n = views.len();
    if n == 0 {
        return;
    }
    let workers = threads.max(1);
    let batch = rows_per_batch.max(1);

    let mut rest = cells;
    let mut next_row = 0usize;
    while next_row < n {
        std::thread::scope(|scope| {
            for _ in 0..workers {
                if next_row >= n {
                    break;
                }
                let rows_here = batch.min(n - next_row);
                let (block, tail) = std::mem::take(&mut rest).split_at_mut(rows_here * n);
                rest = tail;
                let start = next_row;
                next_row += rows_here;
                scope.spawn(move || {
                    for (k, row) in block.chunks_exact_mut(n).enumerate() {
                        fill_row(row, start + k, views, kind);
                    }
                });
            }
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
