//! # Session Registry — Handles, Bindings, Dispatch
//!
//! The explicit replacement for process-wide handle tables. A [`Session`]
//! owns every graph and vector store it issues, hands out opaque `u32`
//! handles, and routes ingestion, matrix construction, and measure
//! evaluation through them.
//!
//! Lifecycle rules: handles are never reused; double close warns and
//! returns `Ok`; any other use of a closed handle reports
//! [`Error::HandleClosed`]. A graph must be bound to a store before
//! ingestion or matrix construction, and the binding is exclusive while
//! both sides are open.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{IngestOptions, MatrixOptions, MeasureParams};
use crate::graph::Graph;
use crate::measures::{self, MeasureId, MeasureOutput};
use crate::model::Precision;
use crate::report::{GraphSummary, MeasureReport};
use crate::store::{EmbeddingProvider, IngestEvent, VectorStore};
use crate::{Error, Result};

// ============================================================================
// Handles
// ============================================================================

/// Opaque handle to a session-owned graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphHandle(u32);

/// Opaque handle to a session-owned vector store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreHandle(u32);

impl GraphHandle {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl StoreHandle {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for GraphHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

impl fmt::Display for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

// ============================================================================
// Session
// ============================================================================

struct GraphSlot {
    graph: Option<Graph>,
    bound: Option<StoreHandle>,
    opened_at: DateTime<Utc>,
}

struct StoreSlot {
    store: Option<VectorStore>,
    opened_at: DateTime<Utc>,
}

/// Registry of graphs and vector stores with explicit open/close lifecycle.
pub struct Session {
    graphs: Vec<GraphSlot>,
    stores: Vec<StoreSlot>,
}

impl Session {
    pub fn new() -> Self {
        Session {
            graphs: Vec::new(),
            stores: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Open a new graph sized for `capacity` nodes of `dims`-dimensional
    /// embeddings.
    pub fn create_graph(
        &mut self,
        capacity: usize,
        dims: u32,
        precision: Precision,
    ) -> Result<GraphHandle> {
        let id = u32::try_from(self.graphs.len())
            .map_err(|_| Error::InvalidArgument("graph handle space exhausted".into()))?;
        let graph = Graph::new(capacity, dims, precision)?;
        self.graphs.push(GraphSlot {
            graph: Some(graph),
            bound: None,
            opened_at: Utc::now(),
        });
        let handle = GraphHandle(id);
        debug!(%handle, dims, %precision, "graph created");
        Ok(handle)
    }

    /// Open a new, empty vector store.
    pub fn open_store(&mut self, dims: u32, precision: Precision) -> Result<StoreHandle> {
        let id = u32::try_from(self.stores.len())
            .map_err(|_| Error::InvalidArgument("store handle space exhausted".into()))?;
        self.stores.push(StoreSlot {
            store: Some(VectorStore::new(dims, precision)),
            opened_at: Utc::now(),
        });
        let handle = StoreHandle(id);
        debug!(%handle, dims, %precision, "store opened");
        Ok(handle)
    }

    /// Bind `store` as `graph`'s embedding provider.
    ///
    /// Dimensions and precision must match, and a store serves at most one
    /// open graph at a time. Rebinding a graph replaces its previous
    /// binding.
    pub fn bind(&mut self, graph: GraphHandle, store: StoreHandle) -> Result<()> {
        let (dims, precision) = {
            let s = self.store(store)?;
            (s.dims(), s.precision())
        };
        {
            let g = self.graph(graph)?;
            if g.dims() != dims {
                return Err(Error::DimensionMismatch {
                    expected: g.dims() as usize,
                    got: dims as usize,
                });
            }
            if g.precision() != precision {
                return Err(Error::InvalidArgument(format!(
                    "graph {graph} holds {} embeddings but store {store} holds {precision}",
                    g.precision(),
                )));
            }
        }
        for (i, other) in self.graphs.iter().enumerate() {
            if i != graph.index() && other.graph.is_some() && other.bound == Some(store) {
                return Err(Error::InvalidArgument(format!(
                    "store {store} is already bound to graph g{i}"
                )));
            }
        }

        self.graph_slot_mut(graph)?.bound = Some(store);
        debug!(%graph, %store, "store bound");
        Ok(())
    }

    /// Close a graph. Closing twice warns and succeeds.
    pub fn close_graph(&mut self, handle: GraphHandle) -> Result<()> {
        let slot = self.graph_slot_mut(handle)?;
        match slot.graph.take() {
            Some(_) => {
                let open_for = Utc::now() - slot.opened_at;
                slot.bound = None;
                debug!(%handle, open_for_ms = open_for.num_milliseconds(), "graph closed");
            }
            None => warn!(%handle, "graph closed twice"),
        }
        Ok(())
    }

    /// Close a store. Closing twice warns and succeeds. Graphs still bound
    /// to it lose their provider; only store-dependent operations fail
    /// afterwards.
    pub fn close_store(&mut self, handle: StoreHandle) -> Result<()> {
        let slot = self
            .stores
            .get_mut(handle.index())
            .ok_or_else(|| Error::InvalidArgument(format!("store handle {handle} was never issued")))?;
        match slot.store.take() {
            Some(_) => {
                let open_for = Utc::now() - slot.opened_at;
                debug!(%handle, open_for_ms = open_for.num_milliseconds(), "store closed");
            }
            None => warn!(%handle, "store closed twice"),
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn graph(&self, handle: GraphHandle) -> Result<&Graph> {
        self.graphs
            .get(handle.index())
            .ok_or_else(|| Error::InvalidArgument(format!("graph handle {handle} was never issued")))?
            .graph
            .as_ref()
            .ok_or(Error::HandleClosed { kind: "graph", id: handle.0 })
    }

    pub fn graph_mut(&mut self, handle: GraphHandle) -> Result<&mut Graph> {
        self.graph_slot_mut(handle)?
            .graph
            .as_mut()
            .ok_or(Error::HandleClosed { kind: "graph", id: handle.0 })
    }

    pub fn store(&self, handle: StoreHandle) -> Result<&VectorStore> {
        self.stores
            .get(handle.index())
            .ok_or_else(|| Error::InvalidArgument(format!("store handle {handle} was never issued")))?
            .store
            .as_ref()
            .ok_or(Error::HandleClosed { kind: "store", id: handle.0 })
    }

    fn graph_slot_mut(&mut self, handle: GraphHandle) -> Result<&mut GraphSlot> {
        self.graphs
            .get_mut(handle.index())
            .ok_or_else(|| Error::InvalidArgument(format!("graph handle {handle} was never issued")))
    }

    fn bound_store_of(&self, handle: GraphHandle) -> Result<&VectorStore> {
        let slot = self
            .graphs
            .get(handle.index())
            .ok_or_else(|| Error::InvalidArgument(format!("graph handle {handle} was never issued")))?;
        if slot.graph.is_none() {
            return Err(Error::HandleClosed { kind: "graph", id: handle.0 });
        }
        let store = slot.bound.ok_or_else(|| {
            Error::Precondition(format!("graph {handle} has no bound vector store"))
        })?;
        self.store(store)
    }

    // ------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------

    /// Apply a stream of occurrence events to a graph, creating nodes on
    /// first sighting. Returns the number of nodes created.
    ///
    /// An unknown key aborts the stream with [`Error::UnknownKey`]; events
    /// already applied stay applied.
    pub fn ingest(&self, handle: GraphHandle, events: &[IngestEvent]) -> Result<usize> {
        let store = self.bound_store_of(handle)?;
        let graph = self.graph(handle)?;
        let mut created = 0;
        for event in events {
            if ingest_one(store, graph, event)? {
                created += 1;
            }
        }
        debug!(%handle, events = events.len(), created, "ingestion applied");
        Ok(created)
    }

    /// [`Session::ingest`] with the event stream split across worker
    /// threads, one contiguous chunk each. Event order within a chunk is
    /// preserved; totals are identical to the sequential path.
    pub fn ingest_threaded(
        &self,
        handle: GraphHandle,
        events: &[IngestEvent],
        opts: IngestOptions,
    ) -> Result<usize> {
        if events.is_empty() {
            return Ok(0);
        }
        let store = self.bound_store_of(handle)?;
        let graph = self.graph(handle)?;
        let workers = opts.threads.clamp(1, events.len());
        let chunk = events.len().div_ceil(workers);

        let created = std::thread::scope(|scope| {
            let mut joins = Vec::with_capacity(workers);
            for block in events.chunks(chunk) {
                joins.push(scope.spawn(move || {
                    let mut created = 0usize;
                    for event in block {
                        if ingest_one(store, graph, event)? {
                            created += 1;
                        }
                    }
                    Ok::<usize, Error>(created)
                }));
            }
            let mut total = 0usize;
            for join in joins {
                total += join
                    .join()
                    .map_err(|_| Error::Precondition("an ingestion worker panicked".into()))??;
            }
            Ok::<usize, Error>(total)
        })?;

        debug!(%handle, events = events.len(), workers, created, "threaded ingestion applied");
        Ok(created)
    }

    // ------------------------------------------------------------------
    // Matrix & measures
    // ------------------------------------------------------------------

    /// Build the distance matrix for `handle` from its bound store.
    pub fn build_matrix(&mut self, handle: GraphHandle, opts: MatrixOptions) -> Result<()> {
        let slot = self
            .graphs
            .get_mut(handle.index())
            .ok_or_else(|| Error::InvalidArgument(format!("graph handle {handle} was never issued")))?;
        let bound = slot.bound.ok_or_else(|| {
            Error::Precondition(format!("graph {handle} has no bound vector store"))
        })?;
        let graph = slot
            .graph
            .as_mut()
            .ok_or(Error::HandleClosed { kind: "graph", id: handle.0 })?;
        let store = self
            .stores
            .get(bound.index())
            .and_then(|s| s.store.as_ref())
            .ok_or(Error::HandleClosed { kind: "store", id: bound.0 })?;
        graph.build_matrix(store, opts)
    }

    /// Adopt an externally computed distance matrix for `handle`.
    pub fn attach_matrix(
        &mut self,
        handle: GraphHandle,
        bytes: &[u8],
        precision: Precision,
    ) -> Result<()> {
        self.graph_mut(handle)?.attach_matrix_bytes(bytes, precision)
    }

    /// Evaluate one measure against `handle`'s graph.
    ///
    /// The bound store, when open, serves as the vector provider for the
    /// centroid measures; a binding whose store has since closed degrades
    /// to no provider.
    pub fn measure(
        &mut self,
        handle: GraphHandle,
        id: MeasureId,
        params: MeasureParams,
    ) -> Result<MeasureOutput> {
        let slot = self
            .graphs
            .get_mut(handle.index())
            .ok_or_else(|| Error::InvalidArgument(format!("graph handle {handle} was never issued")))?;
        let bound = slot.bound;
        let graph = slot
            .graph
            .as_mut()
            .ok_or(Error::HandleClosed { kind: "graph", id: handle.0 })?;
        let provider = bound
            .and_then(|s| self.stores.get(s.index()))
            .and_then(|s| s.store.as_ref())
            .map(|s| s as &dyn EmbeddingProvider);
        measures::evaluate(graph, provider, id, params)
    }

    /// [`Session::measure`], wrapped in a timestamped report.
    pub fn measure_report(
        &mut self,
        handle: GraphHandle,
        id: MeasureId,
        params: MeasureParams,
    ) -> Result<MeasureReport> {
        let output = self.measure(handle, id, params)?;
        let num_nodes = self.graph(handle)?.len();
        Ok(MeasureReport {
            measure: id.name().to_string(),
            id: id.id(),
            alpha: params.alpha,
            beta: params.beta,
            value: output.value,
            effective: output.effective,
            num_nodes,
            computed_at: Utc::now(),
        })
    }

    /// Snapshot of `handle`'s graph state.
    pub fn summary(&self, handle: GraphHandle) -> Result<GraphSummary> {
        Ok(self.graph(handle)?.summary())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply one event: resolve the key, then create or increment. Returns
/// whether a node was created.
fn ingest_one(store: &VectorStore, graph: &Graph, event: &IngestEvent) -> Result<bool> {
    let slot = store
        .slot_of(&event.key)
        .ok_or_else(|| Error::UnknownKey(event.key.clone()))?;
    let mut created = false;
    let node = store.record_occurrences(slot, event.increment, || {
        created = true;
        graph.add_node(event.increment, slot)
    })?;
    if !created {
        graph.increment(node, event.increment)?;
    }
    Ok(created)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::FillStrategy;
    use crate::distance::DistanceKind;

    fn approx(a: f64, b: f64, eps: f64) {
        assert!((a - b).abs() < eps, "{a} !~ {b}");
    }

    /// Session with one graph bound to a store of four unit-ish vectors.
    fn bound_session() -> (Session, GraphHandle, StoreHandle) {
        let mut session = Session::new();
        let graph = session.create_graph(8, 3, Precision::F32).unwrap();
        let store = session.open_store(3, Precision::F32).unwrap();
        for (key, vector) in [
            ("ada", vec![1.0, 0.0, 0.0]),
            ("bert", vec![0.0, 1.0, 0.0]),
            ("carl", vec![0.0, 0.0, 1.0]),
            ("dora", vec![0.6, 0.6, 0.5]),
        ] {
            session.store(store).unwrap().insert_f32(key, vector).unwrap();
        }
        session.bind(graph, store).unwrap();
        (session, graph, store)
    }

    fn events(pairs: &[(&str, u64)]) -> Vec<IngestEvent> {
        pairs.iter().map(|&(k, by)| IngestEvent::new(k, by)).collect()
    }

    #[test]
    fn create_bind_ingest_flow() {
        let (session, graph, store) = bound_session();
        let stream = events(&[("ada", 2), ("bert", 1), ("ada", 3), ("carl", 1)]);
        let created = session.ingest(graph, &stream).unwrap();
        assert_eq!(created, 3);

        let g = session.graph(graph).unwrap();
        assert_eq!(g.len(), 3);
        assert_eq!(g.total_occurrences(), 7);

        let s = session.store(store).unwrap();
        let ada = s.slot_of("ada").unwrap();
        assert_eq!(s.occurrences(ada), Some(5));
        assert!(s.node_of(ada).is_some());
    }

    #[test]
    fn unknown_keys_abort_the_stream() {
        let (session, graph, _) = bound_session();
        let stream = events(&[("ada", 1), ("nobody", 1), ("bert", 1)]);
        let err = session.ingest(graph, &stream).unwrap_err();
        assert!(matches!(err, Error::UnknownKey(key) if key == "nobody"));
        // the event before the failure stays applied
        assert_eq!(session.graph(graph).unwrap().len(), 1);
    }

    #[test]
    fn ingestion_needs_a_binding() {
        let mut session = Session::new();
        let graph = session.create_graph(4, 3, Precision::F32).unwrap();
        let err = session.ingest(graph, &events(&[("ada", 1)])).unwrap_err();
        assert!(matches!(err, Error::Precondition(msg) if msg.contains("bound")));
    }

    #[test]
    fn threaded_ingestion_matches_sequential_totals() {
        let mut stream = Vec::new();
        for round in 0..50u64 {
            stream.push(IngestEvent::new("ada", 1));
            stream.push(IngestEvent::new("bert", 2));
            stream.push(IngestEvent::new("carl", round % 3));
        }

        let (sequential, g1, _) = bound_session();
        sequential.ingest(g1, &stream).unwrap();

        let (threaded, g2, _) = bound_session();
        threaded
            .ingest_threaded(g2, &stream, IngestOptions { threads: 4 })
            .unwrap();

        let a = sequential.graph(g1).unwrap();
        let b = threaded.graph(g2).unwrap();
        assert_eq!(a.len(), b.len());
        assert_eq!(a.total_occurrences(), b.total_occurrences());
        assert_eq!(a.absolutes().iter().sum::<u64>(), b.absolutes().iter().sum::<u64>());
    }

    #[test]
    fn bind_validates_shape() {
        let mut session = Session::new();
        let graph = session.create_graph(4, 3, Precision::F32).unwrap();
        let narrow = session.open_store(2, Precision::F32).unwrap();
        let double = session.open_store(3, Precision::F64).unwrap();

        assert!(matches!(
            session.bind(graph, narrow),
            Err(Error::DimensionMismatch { expected: 3, got: 2 })
        ));
        assert!(matches!(session.bind(graph, double), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn a_store_serves_one_graph_at_a_time() {
        let (mut session, _graph, store) = bound_session();
        let second = session.create_graph(4, 3, Precision::F32).unwrap();
        let err = session.bind(second, store).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(msg) if msg.contains("already bound")));
    }

    #[test]
    fn double_close_warns_and_succeeds() {
        let (mut session, graph, store) = bound_session();
        session.close_graph(graph).unwrap();
        session.close_graph(graph).unwrap();
        session.close_store(store).unwrap();
        session.close_store(store).unwrap();

        assert!(matches!(
            session.graph(graph),
            Err(Error::HandleClosed { kind: "graph", id: 0 })
        ));
        assert!(matches!(
            session.store(store),
            Err(Error::HandleClosed { kind: "store", id: 0 })
        ));
    }

    #[test]
    fn never_issued_handles_are_invalid_arguments() {
        let session = Session::new();
        assert!(matches!(session.graph(GraphHandle(7)), Err(Error::InvalidArgument(_))));
        assert!(matches!(session.store(StoreHandle(7)), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn closing_a_graph_releases_its_store() {
        let (mut session, graph, store) = bound_session();
        session.close_graph(graph).unwrap();

        let second = session.create_graph(4, 3, Precision::F32).unwrap();
        session.bind(second, store).unwrap();
    }

    #[test]
    fn measure_through_the_session() {
        let (mut session, graph, _) = bound_session();
        let stream = events(&[("ada", 1), ("bert", 1), ("carl", 1), ("dora", 1)]);
        session.ingest(graph, &stream).unwrap();

        let out = session
            .measure(graph, MeasureId::ShannonWeaver, MeasureParams::default())
            .unwrap();
        approx(out.value, 4.0_f64.ln(), 1e-12);
    }

    #[test]
    fn matrix_and_disparity_through_the_session() {
        let (mut session, graph, _) = bound_session();
        session
            .ingest(graph, &events(&[("ada", 1), ("bert", 1), ("carl", 2)]))
            .unwrap();
        let opts = MatrixOptions::new(
            DistanceKind::Cosine,
            Precision::F32,
            FillStrategy::Threaded { threads: 2 },
        );
        session.build_matrix(graph, opts).unwrap();

        let out = session
            .measure(graph, MeasureId::Pairwise, MeasureParams::default())
            .unwrap();
        // orthogonal unit vectors are all at cosine distance 1
        approx(out.value, 1.0, 1e-6);

        let summary = session.summary(graph).unwrap();
        assert_eq!(summary.num_nodes, 3);
        assert!(summary.matrix.is_some());
    }

    #[test]
    fn dangling_binding_degrades_to_no_provider() {
        let (mut session, graph, store) = bound_session();
        session
            .ingest(graph, &events(&[("ada", 1), ("bert", 1), ("carl", 1)]))
            .unwrap();
        let opts = MatrixOptions::new(
            DistanceKind::Cosine,
            Precision::F32,
            FillStrategy::Sequential,
        );
        session.build_matrix(graph, opts).unwrap();
        session.close_store(store).unwrap();

        // proportion-only measures still work
        session
            .measure(graph, MeasureId::Simpson, MeasureParams::default())
            .unwrap();
        // centroid measures report the missing provider
        let err = session
            .measure(graph, MeasureId::FunctionalDispersion, MeasureParams::default())
            .unwrap_err();
        assert!(matches!(err, Error::Precondition(msg) if msg.contains("vector store")));
    }

    #[test]
    fn measure_report_carries_metadata() {
        let (mut session, graph, _) = bound_session();
        session
            .ingest(graph, &events(&[("ada", 1), ("bert", 1)]))
            .unwrap();

        let report = session
            .measure_report(graph, MeasureId::Renyi, MeasureParams::with_alpha(2.0))
            .unwrap();
        assert_eq!(report.measure, "Rényi");
        assert_eq!(report.id, 3);
        assert_eq!(report.alpha, 2.0);
        assert_eq!(report.num_nodes, 2);
        approx(report.value, 2.0_f64.ln(), 1e-12);
        assert!(report.effective.is_some());
    }
}
