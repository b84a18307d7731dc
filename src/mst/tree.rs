//! Edge-driven Prim extraction with a deferred-edge stash.

use crate::model::{DistanceEdge, NodeIdx};
use crate::mst::DistanceHeap;
use crate::{Error, Result};

/// A minimum spanning tree under construction (or completed).
///
/// Extraction is Prim's algorithm driven by heap pops. The first popped
/// edge seeds the tree with both endpoints; afterwards an edge is accepted
/// iff exactly one endpoint is in the tree. Both-in-tree edges close a
/// cycle and are discarded. Both-outside edges go to a deferred stash and
/// are retried, cheapest first, after every acceptance: a stashed edge was
/// popped before everything still in the heap, so the cheapest acceptable
/// stashed edge is the cheapest acceptable edge overall and the greedy
/// order is preserved exactly.
///
/// The counters make extraction resumable: calling [`extend`] again with
/// the same heap continues where the last call stopped, or no-ops once
/// `num_active_distances == num_nodes − 1`.
///
/// [`extend`]: SpanningTree::extend
#[derive(Debug, Clone)]
pub struct SpanningTree {
    num_nodes: usize,
    /// Accepted edges, at most `num_nodes − 1`.
    edges: Vec<DistanceEdge>,
    in_tree: Vec<bool>,
    /// Popped with both endpoints outside the tree; retried after each
    /// acceptance, dropped once both endpoints are inside.
    deferred: Vec<DistanceEdge>,
    num_active_nodes: usize,
    num_active_distances: usize,
}

impl SpanningTree {
    pub fn new(num_nodes: usize) -> Self {
        Self {
            num_nodes,
            edges: Vec::new(),
            in_tree: vec![false; num_nodes],
            deferred: Vec::new(),
            num_active_nodes: 0,
            num_active_distances: 0,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Nodes connected so far.
    pub fn num_active_nodes(&self) -> usize {
        self.num_active_nodes
    }

    /// Edges accepted so far.
    pub fn num_active_distances(&self) -> usize {
        self.num_active_distances
    }

    pub fn is_complete(&self) -> bool {
        self.num_active_distances == self.num_nodes.saturating_sub(1)
    }

    /// Accepted edges in acceptance order.
    pub fn edges(&self) -> &[DistanceEdge] {
        &self.edges
    }

    /// Sum of accepted edge weights.
    pub fn total_weight(&self) -> f64 {
        self.edges.iter().map(|e| e.dist).sum()
    }

    pub fn contains(&self, node: NodeIdx) -> bool {
        self.in_tree.get(node.index()).copied().unwrap_or(false)
    }

    /// Drive extraction until the tree is complete. No-ops when already
    /// complete; resumes from the recorded counters otherwise.
    pub fn extend(&mut self, heap: &mut DistanceHeap) -> Result<()> {
        if self.num_nodes != heap.num_nodes() {
            return Err(Error::Precondition(format!(
                "spanning tree spans {} nodes but the heap covers {}",
                self.num_nodes,
                heap.num_nodes()
            )));
        }
        while !self.is_complete() {
            if let Some(k) = self.cheapest_acceptable_deferred() {
                let edge = self.deferred.swap_remove(k);
                self.accept(edge)?;
                continue;
            }
            let Some(edge) = heap.pop() else {
                return Err(Error::Precondition(format!(
                    "spanning tree stalled at {} of {} edges with the distance heap exhausted",
                    self.num_active_distances,
                    self.num_nodes - 1
                )));
            };
            let a_in = self.in_tree[edge.a.index()];
            let b_in = self.in_tree[edge.b.index()];
            if a_in && b_in {
                // Cycle edge.
                continue;
            }
            if !a_in && !b_in && self.num_active_nodes > 0 {
                self.deferred.push(edge);
                continue;
            }
            self.accept(edge)?;
        }
        Ok(())
    }

    fn accept(&mut self, edge: DistanceEdge) -> Result<()> {
        if !edge.dist.is_finite() {
            return Err(Error::Precondition(format!(
                "spanning tree blocked by a non-finite distance between {} and {}",
                edge.a, edge.b
            )));
        }
        for idx in [edge.a, edge.b] {
            if !self.in_tree[idx.index()] {
                self.in_tree[idx.index()] = true;
                self.num_active_nodes += 1;
            }
        }
        self.edges.push(edge);
        self.num_active_distances += 1;
        Ok(())
    }

    /// Index of the cheapest deferred edge with exactly one endpoint in
    /// the tree. Edges whose endpoints both joined in the meantime close
    /// cycles and are dropped here.
    fn cheapest_acceptable_deferred(&mut self) -> Option<usize> {
        let in_tree = &self.in_tree;
        self.deferred
            .retain(|e| !(in_tree[e.a.index()] && in_tree[e.b.index()]));

        let mut best: Option<usize> = None;
        for (k, e) in self.deferred.iter().enumerate() {
            if self.in_tree[e.a.index()] == self.in_tree[e.b.index()] {
                continue;
            }
            match best {
                Some(b) if self.deferred[b].dist.total_cmp(&e.dist).is_le() => {}
                _ => best = Some(k),
            }
        }
        best
    }
}
