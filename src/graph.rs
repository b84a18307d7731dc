//! # Graph Store — Node Arena, Proportions, Attached Caches
//!
//! The growable node arena everything else hangs off. Nodes are addressed
//! by stable [`NodeIdx`] only; growth may move interior storage but never
//! invalidates an index. The graph owns the attached distance matrix and
//! the MST cache (heap + tree) built over it, and drops them in dependency
//! order: tree and heap before the matrix they index, matrix before the
//! nodes.
//!
//! Concurrency: appends serialize on the arena writer lock; increments take
//! the reader lock plus the per-node counter mutex, so increments to
//! different nodes never contend. Matrix builds, MST extraction, and
//! measure evaluation require `&mut Graph`, which is how ingestion and
//! measurement are kept from interleaving.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{MappedMutexGuard, MappedRwLockReadGuard, Mutex, MutexGuard, RwLock, RwLockReadGuard};
use tracing::debug;

use crate::config::MatrixOptions;
use crate::matrix::{DistanceMatrix, MatrixStats};
use crate::model::{GraphNode, Neighbour, NodeIdx, Precision, SlotIdx};
use crate::mst::{DistanceHeap, SpanningTree};
use crate::report::{GraphSummary, MatrixSummary};
use crate::store::EmbeddingProvider;
use crate::{Error, Result};

/// Nodes reserved per capacity growth.
pub const GRAPH_CAPACITY_STEP: usize = 256;

// ============================================================================
// Caches
// ============================================================================

/// Heap and tree built over one particular matrix generation. The recorded
/// node count and epoch identify that generation; a mismatch means the
/// cache is meaningless and must be discarded.
struct MstCache {
    heap: DistanceHeap,
    tree: SpanningTree,
    node_count: usize,
    epoch: u64,
    written_back: bool,
}

/// Everything invalidated together. `mst` is declared before `matrix` so
/// the tree and heap drop before the matrix they index.
#[derive(Default)]
struct Caches {
    mst: Option<MstCache>,
    matrix: Option<DistanceMatrix>,
    /// Bumped on every matrix replacement.
    epoch: u64,
}

// ============================================================================
// Graph
// ============================================================================

/// Growable node arena with derived proportions and attached distance
/// structures.
pub struct Graph {
    // Field order is the release order: caches (tree, heap, matrix) drop
    // before the node arena.
    caches: Mutex<Caches>,
    nodes: RwLock<Vec<GraphNode>>,
    dims: u32,
    precision: Precision,
    proportions_fresh: AtomicBool,
}

impl Graph {
    /// A graph with room for `capacity` nodes before the first growth.
    pub fn new(capacity: usize, dims: u32, precision: Precision) -> Result<Self> {
        let mut nodes = Vec::new();
        nodes
            .try_reserve(capacity)
            .map_err(|_| Error::Alloc("graph nodes"))?;
        Ok(Self {
            caches: Mutex::new(Caches::default()),
            nodes: RwLock::new(nodes),
            dims,
            precision,
            proportions_fresh: AtomicBool::new(false),
        })
    }

    pub fn new_empty(dims: u32, precision: Precision) -> Self {
        Self {
            caches: Mutex::new(Caches::default()),
            nodes: RwLock::new(Vec::new()),
            dims,
            precision,
            proportions_fresh: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    pub fn dims(&self) -> u32 {
        self.dims
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Whether the stored proportions reflect the current counts.
    pub fn proportions_fresh(&self) -> bool {
        self.proportions_fresh.load(Ordering::SeqCst)
    }

    /// Generation counter of the attached matrix.
    pub fn matrix_epoch(&self) -> u64 {
        self.caches.lock().epoch
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Append a node backed by `slot` with an initial occurrence count.
    ///
    /// Grows the arena by [`GRAPH_CAPACITY_STEP`] when full; on allocation
    /// failure the graph stays at its prior capacity. Any spanning tree
    /// cache is dropped: its indices are meaningless under a changed node
    /// set.
    pub fn add_node(&self, count: u64, slot: SlotIdx) -> Result<NodeIdx> {
        let mut nodes = self.nodes.write();
        if nodes.len() >= u32::MAX as usize {
            return Err(Error::InvalidArgument(
                "graph is at the node index limit".into(),
            ));
        }
        if nodes.len() == nodes.capacity() {
            nodes
                .try_reserve(GRAPH_CAPACITY_STEP)
                .map_err(|_| Error::Alloc("graph nodes"))?;
        }
        let idx = NodeIdx(nodes.len() as u32);
        nodes.push(GraphNode::new(count, slot, self.dims));
        drop(nodes);

        self.proportions_fresh.store(false, Ordering::SeqCst);
        self.drop_mst_cache("node added");
        Ok(idx)
    }

    /// Bump a node's occurrence count. Takes the arena reader lock and the
    /// node's own mutex only.
    pub fn increment(&self, idx: NodeIdx, by: u64) -> Result<()> {
        let nodes = self.nodes.read();
        let node = nodes
            .get(idx.index())
            .ok_or_else(|| Error::InvalidArgument(format!("node {idx} is out of range")))?;
        node.add_occurrences(by);
        drop(nodes);
        self.proportions_fresh.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Read access to one node.
    pub fn node(&self, idx: NodeIdx) -> Option<MappedRwLockReadGuard<'_, GraphNode>> {
        RwLockReadGuard::try_map(self.nodes.read(), |nodes| nodes.get(idx.index())).ok()
    }

    /// A node's MST adjacency as of the last completed spanning tree.
    pub fn neighbours(&self, idx: NodeIdx) -> Result<Vec<Neighbour>> {
        let nodes = self.nodes.read();
        let node = nodes
            .get(idx.index())
            .ok_or_else(|| Error::InvalidArgument(format!("node {idx} is out of range")))?;
        Ok(node.neighbours().to_vec())
    }

    /// Relative proportions in node order. Meaningful while
    /// [`proportions_fresh`](Graph::proportions_fresh) holds.
    pub fn proportions(&self) -> Vec<f64> {
        self.nodes.read().iter().map(|n| n.relative()).collect()
    }

    /// Absolute occurrence counts in node order.
    pub fn absolutes(&self) -> Vec<u64> {
        self.nodes.read().iter().map(|n| n.absolute()).collect()
    }

    pub fn total_occurrences(&self) -> u64 {
        self.nodes.read().iter().map(|n| n.absolute()).sum()
    }

    pub(crate) fn slots(&self) -> Vec<SlotIdx> {
        self.nodes.read().iter().map(|n| n.slot()).collect()
    }

    pub(crate) fn adjacency(&self) -> Vec<Vec<Neighbour>> {
        self.nodes
            .read()
            .iter()
            .map(|n| n.neighbours().to_vec())
            .collect()
    }

    /// Recompute every node's share of the total occurrence count.
    ///
    /// A zero total over a non-empty graph cannot be normalised and is
    /// rejected. Nodes that end up at proportion zero stay in the graph;
    /// consumers skip them where their formulas demand it.
    pub fn compute_relative_proportions(&self) -> Result<()> {
        let mut nodes = self.nodes.write();
        if nodes.is_empty() {
            self.proportions_fresh.store(true, Ordering::SeqCst);
            return Ok(());
        }
        let total: u64 = nodes.iter().map(|n| n.absolute()).sum();
        if total == 0 {
            return Err(Error::InvalidArgument(
                "cannot derive proportions from a zero occurrence total".into(),
            ));
        }
        let denom = total as f64;
        for node in nodes.iter_mut() {
            let p = node.absolute() as f64 / denom;
            node.set_relative(p);
        }
        drop(nodes);
        self.proportions_fresh.store(true, Ordering::SeqCst);
        debug!(total, "relative proportions recomputed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Distance matrix
    // ------------------------------------------------------------------

    /// Compute and attach a distance matrix over the nodes' backing
    /// vectors, gathered from `provider` in node order.
    pub fn build_matrix(
        &mut self,
        provider: &dyn EmbeddingProvider,
        opts: MatrixOptions,
    ) -> Result<()> {
        if provider.dims() != self.dims {
            return Err(Error::DimensionMismatch {
                expected: self.dims as usize,
                got: provider.dims() as usize,
            });
        }
        let slots = self.slots();
        let mut vectors = Vec::with_capacity(slots.len());
        for (i, slot) in slots.iter().enumerate() {
            vectors.push(provider.vector(*slot).ok_or_else(|| {
                Error::InvalidArgument(format!("node n{i} references missing store slot {slot}"))
            })?);
        }
        let matrix = DistanceMatrix::build(&vectors, opts)?;
        self.replace_matrix(matrix);
        Ok(())
    }

    /// Adopt an externally computed matrix from raw bytes in native
    /// endianness. The buffer must hold exactly `len()² × unit_size` bytes.
    pub fn attach_matrix_bytes(&mut self, bytes: &[u8], precision: Precision) -> Result<()> {
        let matrix = DistanceMatrix::from_bytes(bytes, self.len(), precision)?;
        self.replace_matrix(matrix);
        Ok(())
    }

    /// The attached matrix, if any.
    pub fn matrix(&self) -> Option<MappedMutexGuard<'_, DistanceMatrix>> {
        MutexGuard::try_map(self.caches.lock(), |c| c.matrix.as_mut()).ok()
    }

    pub fn matrix_stats(&self) -> Option<MatrixStats> {
        self.caches.lock().matrix.as_ref().map(|m| m.stats())
    }

    fn replace_matrix(&mut self, matrix: DistanceMatrix) {
        let nodes = self.nodes.get_mut();
        let caches = self.caches.get_mut();
        if caches.mst.take().is_some() {
            for node in nodes.iter_mut() {
                node.clear_neighbours();
            }
            debug!(reason = "matrix replaced", "spanning tree cache invalidated");
        }
        caches.matrix = Some(matrix);
        caches.epoch += 1;
        debug!(epoch = caches.epoch, "distance matrix replaced");
    }

    /// Drop the MST cache (and the adjacency it wrote), shared-access path.
    fn drop_mst_cache(&self, reason: &'static str) {
        let had_tree = self.caches.lock().mst.take().is_some();
        if had_tree {
            for node in self.nodes.write().iter_mut() {
                node.clear_neighbours();
            }
            debug!(reason, "spanning tree cache invalidated");
        }
    }

    // ------------------------------------------------------------------
    // Spanning tree
    // ------------------------------------------------------------------

    /// Build or resume the spanning tree over the attached matrix.
    ///
    /// Lazily creates the distance heap and tree on first call, resumes an
    /// interrupted extraction on later calls, and no-ops once complete. On
    /// completion the accepted edges are written back as per-cell `active`
    /// markers in the matrix (both orientations) and per-node adjacency
    /// lists.
    pub fn ensure_spanning_tree(&mut self) -> Result<()> {
        let n = self.len();
        if n < 2 {
            return Err(Error::Precondition(format!(
                "a spanning tree needs at least two nodes, the graph holds {n}"
            )));
        }
        let caches = self.caches.get_mut();
        let matrix = caches.matrix.as_mut().ok_or(Error::MatrixMissing)?;
        if matrix.num_nodes() != n {
            return Err(Error::Precondition(format!(
                "distance matrix covers {} nodes but the graph holds {n}; rebuild or re-attach it",
                matrix.num_nodes()
            )));
        }

        let epoch = caches.epoch;
        let stale = caches
            .mst
            .as_ref()
            .is_some_and(|c| c.node_count != n || c.epoch != epoch);
        if stale {
            caches.mst = None;
            debug!("discarded stale spanning tree cache");
        }
        if caches.mst.is_none() {
            let heap = DistanceHeap::from_matrix(matrix)?;
            caches.mst = Some(MstCache {
                heap,
                tree: SpanningTree::new(n),
                node_count: n,
                epoch,
                written_back: false,
            });
        }

        if let Some(cache) = caches.mst.as_mut() {
            cache.tree.extend(&mut cache.heap)?;
            if cache.tree.is_complete() && !cache.written_back {
                for edge in cache.tree.edges() {
                    matrix.mark_active(edge.a.index(), edge.b.index());
                }
                let mut nodes = self.nodes.write();
                for node in nodes.iter_mut() {
                    node.clear_neighbours();
                }
                for edge in cache.tree.edges() {
                    nodes[edge.a.index()]
                        .push_neighbour(Neighbour { node: edge.b, dist: edge.dist });
                    nodes[edge.b.index()]
                        .push_neighbour(Neighbour { node: edge.a, dist: edge.dist });
                }
                drop(nodes);
                cache.written_back = true;
                debug!(
                    edges = cache.tree.edges().len(),
                    weight = cache.tree.total_weight(),
                    "spanning tree completed"
                );
            }
        }
        Ok(())
    }

    /// The spanning tree, if one has been built for the current matrix.
    pub fn spanning_tree(&self) -> Option<MappedMutexGuard<'_, SpanningTree>> {
        MutexGuard::try_map(self.caches.lock(), |c| {
            c.mst.as_mut().map(|cache| &mut cache.tree)
        })
        .ok()
    }

    // ------------------------------------------------------------------
    // Reporting
    // ------------------------------------------------------------------

    pub fn summary(&self) -> GraphSummary {
        let nodes = self.nodes.read();
        let num_nodes = nodes.len();
        let total_occurrences: u64 = nodes.iter().map(|n| n.absolute()).sum();
        drop(nodes);

        let caches = self.caches.lock();
        let matrix = caches.matrix.as_ref().map(|m| MatrixSummary {
            num_nodes: m.num_nodes(),
            precision: m.precision(),
            kind: m.kind().map(|k| k.to_string()),
            stats: m.stats(),
        });
        let spanning_tree_edges = caches
            .mst
            .as_ref()
            .filter(|c| c.tree.is_complete())
            .map(|c| c.tree.edges().len());

        GraphSummary {
            num_nodes,
            dims: self.dims,
            precision: self.precision,
            total_occurrences,
            proportions_fresh: self.proportions_fresh(),
            matrix_epoch: caches.epoch,
            matrix,
            spanning_tree_edges,
        }
    }
}
