//! Binary min-heap over all node-pair distances.

use crate::matrix::DistanceMatrix;
use crate::model::{DistanceEdge, NodeIdx};
use crate::{Error, Result};

/// All `n(n−1)/2` edges of a completed distance matrix, min-heap ordered
/// over the active prefix.
///
/// Popping never shrinks the backing array: the minimum is exchanged with
/// the last active edge and the prefix shrinks by one, so consumed edges
/// survive beyond the prefix. Ordering uses `f64::total_cmp`, which gives
/// non-finite distances a defined place (after every finite one) instead
/// of poisoning the sift comparisons.
#[derive(Debug, Clone)]
pub struct DistanceHeap {
    edges: Vec<DistanceEdge>,
    /// Edges at indices `< active` are still in the heap.
    active: usize,
    num_nodes: usize,
}

impl DistanceHeap {
    /// Enumerate every `i < j` pair of the matrix into an edge and heapify
    /// bottom-up in one pass.
    pub fn from_matrix(matrix: &DistanceMatrix) -> Result<Self> {
        let n = matrix.num_nodes();
        if n < 2 {
            return Err(Error::Precondition(format!(
                "a distance heap needs at least two nodes, the matrix covers {n}"
            )));
        }
        let pairs = n * (n - 1) / 2;
        let mut edges = Vec::new();
        edges
            .try_reserve_exact(pairs)
            .map_err(|_| Error::Alloc("distance heap edges"))?;
        for i in 0..n {
            for j in (i + 1)..n {
                edges.push(DistanceEdge::new(
                    NodeIdx(i as u32),
                    NodeIdx(j as u32),
                    matrix.get(i, j),
                ));
            }
        }

        let mut heap = Self { edges, active: pairs, num_nodes: n };
        heap.heapify();
        Ok(heap)
    }

    /// Node count of the matrix the heap was built from.
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Edges not yet popped.
    pub fn len_active(&self) -> usize {
        self.active
    }

    pub fn is_exhausted(&self) -> bool {
        self.active == 0
    }

    /// The current minimum without consuming it.
    pub fn peek(&self) -> Option<&DistanceEdge> {
        if self.active == 0 { None } else { Some(&self.edges[0]) }
    }

    /// The canonical pop: exchange the minimum with the last active edge,
    /// shrink the active prefix by one, sift the new root down over the
    /// remaining prefix.
    pub fn pop(&mut self) -> Option<DistanceEdge> {
        if self.active == 0 {
            return None;
        }
        self.edges.swap(0, self.active - 1);
        self.active -= 1;
        self.sift_down(0);
        Some(self.edges[self.active])
    }

    /// One bottom-up pass: sift every parent down, last parent first.
    fn heapify(&mut self) {
        if self.active < 2 {
            return;
        }
        let last_parent = (self.active - 2) / 2;
        for i in (0..=last_parent).rev() {
            self.sift_down(i);
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        loop {
            let left = 2 * i + 1;
            if left >= self.active {
                return;
            }
            let right = left + 1;
            let mut smallest = i;
            if self.edges[left]
                .dist
                .total_cmp(&self.edges[smallest].dist)
                .is_lt()
            {
                smallest = left;
            }
            if right < self.active
                && self.edges[right]
                    .dist
                    .total_cmp(&self.edges[smallest].dist)
                    .is_lt()
            {
                smallest = right;
            }
            if smallest == i {
                return;
            }
            self.edges.swap(i, smallest);
            i = smallest;
        }
    }
}
