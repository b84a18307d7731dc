//! Entropy-family measures: pure reductions over relative proportions.
//!
//! Each returns `(entropy, hill_number)`. Singular order parameters take an
//! explicit branch (Rényi at 1, Patil-Taillie at 0, the q-logarithm at 1)
//! so no arm ever evaluates `0/0`. Zero proportions sit outside `ln`'s
//! domain and are skipped.

pub(crate) fn shannon_weaver(p: &[f64]) -> (f64, f64) {
    let mut h = 0.0;
    for &x in p {
        if x <= 0.0 {
            continue;
        }
        h -= x * x.ln();
    }
    (h, h.exp())
}

fn q_logarithm(x: f64, q: f64) -> f64 {
    if q == 1.0 {
        x.ln()
    } else {
        (x.powf(1.0 - q) - 1.0) / (1.0 - q)
    }
}

pub(crate) fn q_logarithmic(p: &[f64], q: f64) -> (f64, f64) {
    let mut h = 0.0;
    for &x in p {
        if x <= 0.0 {
            continue;
        }
        h += x * q_logarithm(1.0 / x, q);
    }
    let hill = if q == 1.0 {
        h.exp()
    } else {
        (1.0 - (q - 1.0) * h).powf(1.0 / (1.0 - q))
    };
    (h, hill)
}

pub(crate) fn patil_taillie(p: &[f64], alpha: f64) -> (f64, f64) {
    if alpha == 0.0 {
        return shannon_weaver(p);
    }
    let mut h = 1.0;
    for &x in p {
        if x <= 0.0 {
            continue;
        }
        h -= x.powf(alpha + 1.0);
    }
    h /= alpha;
    let hill = (1.0 - alpha * h).powf(1.0 / alpha).recip();
    (h, hill)
}

pub(crate) fn renyi(p: &[f64], alpha: f64) -> (f64, f64) {
    if alpha == 1.0 {
        return shannon_weaver(p);
    }
    let mut sum = 0.0;
    for &x in p {
        if x <= 0.0 {
            continue;
        }
        sum += x.powf(alpha);
    }
    let h = sum.ln() / (1.0 - alpha);
    (h, h.exp())
}

/// Good's generalisation `Σ pᵅ (−ln p)ᵝ`. Single-valued; `(1, 1)` recovers
/// Shannon-Weaver.
pub(crate) fn good(p: &[f64], alpha: f64, beta: f64) -> f64 {
    let mut sum = 0.0;
    for &x in p {
        if x <= 0.0 {
            continue;
        }
        sum += x.powf(alpha) * (-x.ln()).powf(beta);
    }
    sum
}
