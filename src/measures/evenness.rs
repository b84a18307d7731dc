//! Evenness and dominance indices. Independent closed forms over the
//! proportion vector; Brillouin alone reduces raw occurrence counts.

use super::entropy;

pub(crate) fn simpson_dominance(p: &[f64]) -> f64 {
    p.iter().map(|&x| x * x).sum()
}

pub(crate) fn simpson(p: &[f64]) -> f64 {
    1.0 - simpson_dominance(p)
}

pub(crate) fn richness(p: &[f64]) -> f64 {
    p.len() as f64
}

pub(crate) fn species_count(p: &[f64]) -> f64 {
    p.len().saturating_sub(1) as f64
}

/// Ratio of the order-`alpha` and order-`beta` Hill numbers.
pub(crate) fn hill_evenness(p: &[f64], alpha: f64, beta: f64) -> f64 {
    let (_, hill_a) = entropy::renyi(p, alpha);
    let (_, hill_b) = entropy::renyi(p, beta);
    hill_a / hill_b
}

pub(crate) fn shannon_evenness(p: &[f64]) -> f64 {
    let (h, _) = entropy::shannon_weaver(p);
    h / (p.len() as f64).ln()
}

pub(crate) fn berger_parker(p: &[f64]) -> f64 {
    p.iter().fold(0.0, |acc: f64, &x| acc.max(x))
}

pub(crate) fn junge_1994(p: &[f64]) -> f64 {
    1.0 - simpson_dominance(p).sqrt()
}

/// Brillouin's index `(ln N! − Σ ln nᵢ!) / N` over raw occurrence counts,
/// with the factorials expanded as iterated log sums.
pub(crate) fn brillouin(counts: &[u64]) -> f64 {
    let total: u64 = counts.iter().sum();
    let mut h = ln_factorial(total);
    for &count in counts {
        h -= ln_factorial(count);
    }
    h / total as f64
}

fn ln_factorial(k: u64) -> f64 {
    (2..=k).map(|j| (j as f64).ln()).sum()
}

/// Coincides with [`junge_1994`] on proportions; both are `1 − sqrt(D)`.
pub(crate) fn mcintosh(p: &[f64]) -> f64 {
    1.0 - simpson_dominance(p).sqrt()
}

pub(crate) fn heip(p: &[f64]) -> f64 {
    let (h, _) = entropy::shannon_weaver(p);
    (h.exp() - 1.0) / (p.len() as f64 - 1.0)
}

pub(crate) fn one_minus_d(p: &[f64]) -> f64 {
    let n = p.len() as f64;
    (1.0 - simpson_dominance(p)) / (1.0 - 1.0 / n)
}

pub(crate) fn williams_1964(p: &[f64]) -> f64 {
    simpson_dominance(p).recip() / p.len() as f64
}

pub(crate) fn pielou_1977(p: &[f64]) -> f64 {
    -simpson_dominance(p).ln() / (p.len() as f64).ln()
}

pub(crate) fn alatalo_1981(p: &[f64]) -> f64 {
    let (h, _) = entropy::shannon_weaver(p);
    (simpson_dominance(p).recip() - 1.0) / (h.exp() - 1.0)
}

pub(crate) fn molinari_1989(p: &[f64]) -> f64 {
    let f = alatalo_1981(p);
    // 0.636611 is Molinari's published rounding of 2/pi
    if f > std::f64::consts::FRAC_1_SQRT_2 {
        f * 0.636611 * f.asin()
    } else {
        f.powi(3)
    }
}

pub(crate) fn bulla_o_1994(p: &[f64]) -> f64 {
    let regular = (p.len() as f64).recip();
    p.iter().map(|&x| x.min(regular)).sum()
}

pub(crate) fn bulla_e_1994(p: &[f64]) -> f64 {
    let regular = (p.len() as f64).recip();
    (bulla_o_1994(p) - regular) / (1.0 - regular)
}

/// Pielou's (1969) minimum-concentration evenness.
pub(crate) fn pielou_1969(p: &[f64]) -> f64 {
    let n = p.len() as f64;
    let sum: f64 = p.iter().sum();
    (sum - simpson_dominance(p).sqrt()) / (sum - sum / n.sqrt())
}

pub(crate) fn camargo_1993(p: &[f64]) -> f64 {
    let n = p.len() as f64;
    let mut sum = 0.0;
    for i in 0..p.len() {
        for j in (i + 1)..p.len() {
            sum += (p[i] - p[j]).abs() / n;
        }
    }
    1.0 - sum
}

/// Smith & Wilson's `E_VAR`: `1 − (2/π)·atan(Var(ln p))`. Zero proportions
/// sit outside `ln`'s domain, so the variance runs over the populated
/// nodes only.
pub(crate) fn smith_wilson_1996(p: &[f64]) -> f64 {
    let logs: Vec<f64> = p.iter().filter(|&&x| x > 0.0).map(|&x| x.ln()).collect();
    let k = logs.len() as f64;
    let mean = logs.iter().sum::<f64>() / k;
    let variance = logs.iter().map(|&l| (l - mean).powi(2)).sum::<f64>() / k;
    1.0 - std::f64::consts::FRAC_2_PI * variance.atan()
}
