//! Disparity measures: reductions that weight the proportion vector by
//! pairwise distances, plus the two centroid forms over raw vectors.
//!
//! Matrix-backed measures read widened `f64` cells regardless of the
//! matrix's storage precision. The centroid forms always compare with
//! cosine distance, whatever comparator built the matrix.

use std::sync::Arc;

use crate::distance::DistanceKind;
use crate::matrix::DistanceMatrix;
use crate::model::VectorData;

/// Mean distance over all unordered pairs.
pub(crate) fn pairwise(m: &DistanceMatrix) -> f64 {
    let n = m.num_nodes();
    let pairs = n * n.saturating_sub(1) / 2;
    let mut sum = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            sum += m.get(i, j);
        }
    }
    sum / pairs as f64
}

/// Stirling's `Σ dᵅ (pᵢ pⱼ)ᵝ` over ordered pairs `i ≠ j`.
pub(crate) fn stirling(m: &DistanceMatrix, p: &[f64], alpha: f64, beta: f64) -> f64 {
    let n = m.num_nodes();
    let mut sum = 0.0;
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            sum += m.get(i, j).powf(alpha) * (p[i] * p[j]).powf(beta);
        }
    }
    sum
}

/// Ricotta-Szeidl `(1 − Σ pᵢ Qᵢ^(α−1)) / (α − 1)` with
/// `Qᵢ = 1 − Σ_{j≠i} dᵢⱼ pⱼ`.
pub(crate) fn ricotta_szeidl(m: &DistanceMatrix, p: &[f64], alpha: f64) -> f64 {
    let n = m.num_nodes();
    let mut sum = 0.0;
    for i in 0..n {
        let mut q_i = 1.0;
        for j in 0..n {
            if i == j {
                continue;
            }
            q_i -= m.get(i, j) * p[j];
        }
        let term = p[i] * q_i.powf(alpha - 1.0);
        // negative Q at a fractional order falls outside the power's
        // domain; skip the node rather than poison the sum
        if term.is_nan() {
            continue;
        }
        sum += term;
    }
    (1.0 - sum) / (alpha - 1.0)
}

/// Chao et al. functional diversity of order `alpha`, normalised by Rao's
/// quadratic entropy `Q`. Returns `(diversity, hill)` with
/// `hill = sqrt(diversity / Q)`.
pub(crate) fn chao_et_al(m: &DistanceMatrix, p: &[f64], alpha: f64) -> (f64, f64) {
    let n = m.num_nodes();
    let mut rao_q = 0.0;
    for i in 0..n {
        for j in 0..n {
            rao_q += m.get(i, j) * p[i] * p[j];
        }
    }

    let mut diversity = 0.0;
    for i in 0..n {
        for j in 0..n {
            let ratio = p[i] * p[j] / rao_q;
            if alpha == 1.0 {
                diversity += m.get(i, j) * ratio * ratio.ln();
            } else {
                diversity += m.get(i, j) * ratio.powf(alpha);
            }
        }
    }
    let diversity = if alpha == 1.0 {
        (-diversity).exp()
    } else {
        diversity.powf(1.0 / (1.0 - alpha))
    };
    (diversity, (diversity / rao_q).sqrt())
}

/// Leinster-Cobbold similarity-sensitive diversity of order `alpha`.
/// Returns `(ln hill, hill)`.
pub(crate) fn leinster_cobbold(m: &DistanceMatrix, p: &[f64], alpha: f64) -> (f64, f64) {
    let n = m.num_nodes();
    // similarity kernel exp(-u * (1 - d)) with u pinned at 1
    let u = 1.0;
    let mut hill = if alpha == 1.0 { 1.0 } else { 0.0 };
    for i in 0..n {
        let mut z_i = 0.0;
        for j in 0..n {
            let similarity = 1.0 - m.get(i, j);
            z_i += p[j] * (-u * similarity).exp();
        }
        if alpha == 1.0 {
            hill *= z_i.powf(p[i]);
        } else {
            hill += z_i.powf(alpha - 1.0);
        }
    }
    let hill = if alpha == 1.0 {
        hill.recip()
    } else {
        hill.powf(1.0 / (1.0 - alpha))
    };
    (hill.ln(), hill)
}

/// Scheiner's species-phylogenetic-functional diversity of order `alpha`.
///
/// Each node's nearest-neighbour distance spans a ball of volume
/// `c_m · dᵐ` in the `m`-dimensional embedding space; raw occurrence
/// counts weight those volumes. Returns `(diversity, hill)`.
pub(crate) fn scheiner(m: &DistanceMatrix, counts: &[u64], dims: u32, alpha: f64) -> (f64, f64) {
    let n = m.num_nodes();
    let c_m = unit_ball_volume(dims);
    let exponent = f64::from(dims);

    let mut locals = Vec::with_capacity(n);
    let mut norm = 0.0;
    for i in 0..n {
        let mut min_dist = f64::INFINITY;
        for j in 0..n {
            if i == j {
                continue;
            }
            let d = m.get(i, j);
            if d < min_dist {
                min_dist = d;
            }
        }
        let volume = c_m * min_dist.powf(exponent);
        let local = counts[i] as f64 * volume;
        norm += local;
        locals.push(local);
    }

    let mut diversity = 0.0;
    let mut hill = 0.0;
    for local in &locals {
        let ratio = local / norm;
        if alpha == 1.0 {
            diversity += ratio * ratio.ln();
        } else {
            hill += ratio.powf(alpha);
        }
    }
    if alpha == 1.0 {
        diversity = -diversity;
        hill = diversity.exp();
    } else {
        hill = hill.powf(1.0 / (1.0 - alpha));
        diversity = hill.powf(1.0 / alpha);
    }
    (diversity, hill)
}

/// Volume of the unit `m`-ball, `π^(m/2) / Γ(m/2 + 1)`, from the
/// closed-form half-integer log-gamma.
fn unit_ball_volume(dims: u32) -> f64 {
    let m = f64::from(dims);
    let ln_gamma = if dims % 2 == 0 {
        // Γ(k + 1) = k!
        (2..=u64::from(dims / 2)).map(|j| (j as f64).ln()).sum::<f64>()
    } else {
        // Γ(k + 3/2) = √π · Π_{j=1..=k+1} (j − 1/2)
        let k = u64::from(dims / 2);
        0.5 * std::f64::consts::PI.ln()
            + (1..=k + 1).map(|j| (j as f64 - 0.5).ln()).sum::<f64>()
    };
    (m / 2.0 * std::f64::consts::PI.ln() - ln_gamma).exp()
}

/// Laliberté & Legendre's functional dispersion: mean cosine distance to
/// the proportion-weighted centroid.
pub(crate) fn dispersion(vectors: &[Arc<VectorData>], p: &[f64]) -> f64 {
    let views = widen(vectors);
    let centre = centroid(&views, p);
    let mut weighted = 0.0;
    let mut total = 0.0;
    for (view, &weight) in views.iter().zip(p) {
        weighted += DistanceKind::Cosine.eval(view.as_slice(), centre.as_slice()) * weight;
        total += weight;
    }
    weighted / total
}

/// Villéger's functional divergence over weighted centroid distances.
pub(crate) fn divergence(vectors: &[Arc<VectorData>], p: &[f64]) -> f64 {
    let views = widen(vectors);
    let centre = centroid(&views, p);
    let distances: Vec<f64> = views
        .iter()
        .zip(p)
        .map(|(view, &weight)| {
            DistanceKind::Cosine.eval(view.as_slice(), centre.as_slice()) * weight
        })
        .collect();

    let mean = distances.iter().sum::<f64>() / distances.len() as f64;
    let mut deviance = 0.0;
    let mut deviance_abs = 0.0;
    for (&d, &weight) in distances.iter().zip(p) {
        deviance += weight * (d - mean);
        deviance_abs += weight * (d - mean).abs();
    }
    (deviance + mean) / (deviance_abs + mean)
}

fn widen(vectors: &[Arc<VectorData>]) -> Vec<Vec<f64>> {
    vectors
        .iter()
        .map(|v| match v.as_ref() {
            VectorData::F32(xs) => xs.iter().map(|&x| f64::from(x)).collect(),
            VectorData::F64(xs) => xs.clone(),
        })
        .collect()
}

fn centroid(views: &[Vec<f64>], p: &[f64]) -> Vec<f64> {
    let dims = views.first().map_or(0, Vec::len);
    let mut centre = vec![0.0; dims];
    for (view, &weight) in views.iter().zip(p) {
        for (slot, &x) in centre.iter_mut().zip(view) {
            *slot += x * weight;
        }
    }
    centre
}
