//! Tree reductions: measures over the completed minimum spanning tree,
//! read back through node adjacency and matrix activity markers.

use crate::matrix::DistanceMatrix;
use crate::model::Neighbour;

/// Villéger's functional evenness over MST edge shares.
///
/// Each tree edge's weight is divided by the proportions at its endpoints,
/// normalised, and compared against the share a perfectly regular tree
/// would give every edge.
pub(crate) fn functional_evenness(adjacency: &[Vec<Neighbour>], p: &[f64]) -> f64 {
    let n = adjacency.len();
    let regular = 1.0 / (n as f64 - 1.0);

    let mut shares = Vec::with_capacity(n.saturating_sub(1));
    let mut share_sum = 0.0;
    for (i, neighbours) in adjacency.iter().enumerate() {
        for nb in neighbours {
            // adjacency lists both directions; count each edge once
            if nb.node.index() <= i {
                continue;
            }
            let share = nb.dist / (p[i] + p[nb.node.index()]);
            share_sum += share;
            shares.push(share);
        }
    }

    let mut upper = 0.0;
    for share in &shares {
        upper += (share / share_sum).min(regular);
    }
    (upper - regular) / (1.0 - regular)
}

/// Edge-share evenness of the tree against a perfectly regular one.
///
/// Reads the matrix cells the tree write-back marked active. The raw value
/// is `Σ min(w/W, 1/m)` over the `m` tree edges; the effective form
/// rescales it to `[0, 1]` and is undefined for a single-edge tree.
pub(crate) fn aggregate_mst(m: &DistanceMatrix) -> (f64, Option<f64>) {
    let n = m.num_nodes();
    let mut weights = Vec::with_capacity(n.saturating_sub(1));
    let mut total = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            if !m.is_active(i, j) {
                continue;
            }
            let w = m.get(i, j);
            total += w;
            weights.push(w);
        }
    }

    let edges = weights.len() as f64;
    let regular = edges.recip();
    let value: f64 = weights.iter().map(|&w| (w / total).min(regular)).sum();
    if weights.len() < 2 {
        return (value, None);
    }
    (value, Some((value - regular) / (1.0 - regular)))
}
