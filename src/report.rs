//! JSON measure reports and graph summaries, written to any `io::Write`.
//!
//! Reports are plain serde structs so callers can embed them in their own
//! payloads; the `write_*` helpers produce pretty-printed JSON with a
//! trailing newline for log-friendly output.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::matrix::MatrixStats;
use crate::model::Precision;
use crate::Result;

// ============================================================================
// Report types
// ============================================================================

/// One measure evaluation with the inputs that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureReport {
    /// Published measure name.
    pub measure: String,
    /// Stable measure id.
    pub id: u32,
    pub alpha: f64,
    pub beta: f64,
    pub value: f64,
    /// Effective-number form, for measures that have one.
    pub effective: Option<f64>,
    pub num_nodes: usize,
    pub computed_at: DateTime<Utc>,
}

/// Attached-matrix slice of a [`GraphSummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixSummary {
    pub num_nodes: usize,
    pub precision: Precision,
    /// Distance kind the matrix was built with; `None` for adopted buffers.
    pub kind: Option<String>,
    pub stats: MatrixStats,
}

/// Point-in-time snapshot of a graph and its attached structures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub num_nodes: usize,
    pub dims: u32,
    pub precision: Precision,
    pub total_occurrences: u64,
    pub proportions_fresh: bool,
    pub matrix_epoch: u64,
    pub matrix: Option<MatrixSummary>,
    /// Edge count of the completed spanning tree, if one is cached.
    pub spanning_tree_edges: Option<usize>,
}

// ============================================================================
// Writers
// ============================================================================

/// Write a measure report as pretty JSON plus a trailing newline.
pub fn write_measure_report(report: &MeasureReport, writer: &mut dyn Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, report)?;
    writeln!(writer)?;
    Ok(())
}

/// Write a graph summary as pretty JSON plus a trailing newline.
pub fn write_graph_summary(summary: &GraphSummary, writer: &mut dyn Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, summary)?;
    writeln!(writer)?;
    Ok(())
}
