//! # Distance Functions — Pairwise Vector Comparators
//!
//! Every comparator the matrix engine can fill with, generic over the two
//! matrix precisions through the sealed [`Real`] trait. Distances accumulate
//! in the native width, so an `f32` matrix carries genuine single-precision
//! arithmetic rather than a truncated double-precision result.
//!
//! | Function            | Definition                                      |
//! |---------------------|-------------------------------------------------|
//! | Cosine (default)    | `1 − (a·b) / (‖a‖₂ ‖b‖₂)`                        |
//! | Minkowski(p)        | `(Σ |aᵢ − bᵢ|^p)^(1/p)`                          |
//! | Chebyshev           | `max |aᵢ − bᵢ|`                                  |
//! | Canberra            | `Σ |aᵢ − bᵢ| / (|aᵢ| + |bᵢ|)`, zero terms skipped |
//! | Bray-Curtis         | `1 − 2 Σ min(aᵢ, bᵢ) / Σ (aᵢ + bᵢ)`              |
//! | Angular Minkowski(p)| Minkowski(p) between the p-normalised vectors    |
//!
//! Angular Minkowski follows Lenz & Cornelis (2023): each vector is scaled
//! by its own p-norm before the ordinary Minkowski reduction, making the
//! result insensitive to vector magnitude.
//!
//! The `f32` cosine path has an 8-lane unrolled fast variant
//! ([`cosine_f32`]) whose independent accumulator lanes mirror a 256-bit
//! SIMD reduction; the optimiser reliably vectorises it. It is the cosine
//! used for `f32` matrix fills, and — crucially for reproducibility — its
//! summation order is fixed, so refills and threaded fills agree bitwise.

use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::model::Precision;

// ============================================================================
// Real — the sealed scalar abstraction
// ============================================================================

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// Scalar types a distance matrix can be built from. Sealed: exactly
/// `f32` and `f64`.
pub trait Real:
    sealed::Sealed
    + Copy
    + PartialOrd
    + Send
    + Sync
    + fmt::Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + AddAssign
    + 'static
{
    const ZERO: Self;
    const ONE: Self;
    /// The precision tag matching `Self`.
    const PRECISION: Precision;

    fn from_f64(v: f64) -> Self;
    fn to_f64(self) -> f64;
    fn abs(self) -> Self;
    fn sqrt(self) -> Self;
    fn powf(self, exp: Self) -> Self;

    /// Cosine distance with the fastest implementation for this width.
    /// `f32` routes to the unrolled lane variant, `f64` to the scalar loop.
    fn fast_cosine(a: &[Self], b: &[Self]) -> Self {
        cosine(a, b)
    }
}

impl Real for f32 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;
    const PRECISION: Precision = Precision::F32;

    #[inline(always)]
    fn from_f64(v: f64) -> Self {
        v as f32
    }
    #[inline(always)]
    fn to_f64(self) -> f64 {
        self as f64
    }
    #[inline(always)]
    fn abs(self) -> Self {
        f32::abs(self)
    }
    #[inline(always)]
    fn sqrt(self) -> Self {
        f32::sqrt(self)
    }
    #[inline(always)]
    fn powf(self, exp: Self) -> Self {
        f32::powf(self, exp)
    }
    #[inline]
    fn fast_cosine(a: &[Self], b: &[Self]) -> Self {
        cosine_f32(a, b)
    }
}

impl Real for f64 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;
    const PRECISION: Precision = Precision::F64;

    #[inline(always)]
    fn from_f64(v: f64) -> Self {
        v
    }
    #[inline(always)]
    fn to_f64(self) -> f64 {
        self
    }
    #[inline(always)]
    fn abs(self) -> Self {
        f64::abs(self)
    }
    #[inline(always)]
    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }
    #[inline(always)]
    fn powf(self, exp: Self) -> Self {
        f64::powf(self, exp)
    }
}

// ============================================================================
// DistanceKind — the serde-facing selector
// ============================================================================

/// Which comparator fills the matrix. Minkowski variants carry their order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum DistanceKind {
    #[default]
    Cosine,
    Minkowski {
        order: f64,
    },
    Chebyshev,
    Canberra,
    BrayCurtis,
    AngularMinkowski {
        order: f64,
    },
}

impl DistanceKind {
    /// Evaluate at either matrix precision. Cosine routes through
    /// [`Real::fast_cosine`], so `f32` callers get the unrolled path.
    pub fn eval<T: Real>(self, a: &[T], b: &[T]) -> T {
        match self {
            DistanceKind::Cosine => T::fast_cosine(a, b),
            DistanceKind::Minkowski { order } => minkowski(a, b, order),
            DistanceKind::Chebyshev => chebyshev(a, b),
            DistanceKind::Canberra => canberra(a, b),
            DistanceKind::BrayCurtis => bray_curtis(a, b),
            DistanceKind::AngularMinkowski { order } => angular_minkowski(a, b, order),
        }
    }

    /// Evaluate in single precision.
    pub fn eval_f32(self, a: &[f32], b: &[f32]) -> f32 {
        self.eval(a, b)
    }

    /// Evaluate in double precision.
    pub fn eval_f64(self, a: &[f64], b: &[f64]) -> f64 {
        self.eval(a, b)
    }
}

impl fmt::Display for DistanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceKind::Cosine => write!(f, "cosine"),
            DistanceKind::Minkowski { order } => write!(f, "minkowski({order})"),
            DistanceKind::Chebyshev => write!(f, "chebyshev"),
            DistanceKind::Canberra => write!(f, "canberra"),
            DistanceKind::BrayCurtis => write!(f, "bray-curtis"),
            DistanceKind::AngularMinkowski { order } => write!(f, "angular-minkowski({order})"),
        }
    }
}

// ============================================================================
// The comparators
// ============================================================================

/// Cosine distance: `1 − cos(a, b)`. Zero for parallel vectors, 1 for
/// orthogonal, up to 2 for opposed.
pub fn cosine<T: Real>(a: &[T], b: &[T]) -> T {
    let mut upper = T::ZERO;
    let mut lower_a = T::ZERO;
    let mut lower_b = T::ZERO;
    for (&x, &y) in a.iter().zip(b) {
        upper += x * y;
        lower_a += x * x;
        lower_b += y * y;
    }
    T::ONE - upper / (lower_a.sqrt() * lower_b.sqrt())
}

/// Unrolled single-precision cosine distance.
///
/// Eight independent accumulator lanes per reduction, folded horizontally
/// once, then a scalar tail for the remaining `len % 8` dimensions. The
/// summation order is fixed regardless of how callers partition work.
pub fn cosine_f32(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = [0.0f32; 8];
    let mut norm_a = [0.0f32; 8];
    let mut norm_b = [0.0f32; 8];

    let head = a.len() - a.len() % 8;
    for (ca, cb) in a[..head].chunks_exact(8).zip(b[..head].chunks_exact(8)) {
        for lane in 0..8 {
            dot[lane] += ca[lane] * cb[lane];
            norm_a[lane] += ca[lane] * ca[lane];
            norm_b[lane] += cb[lane] * cb[lane];
        }
    }

    let mut upper = 0.0f32;
    let mut lower_a = 0.0f32;
    let mut lower_b = 0.0f32;
    for lane in 0..8 {
        upper += dot[lane];
        lower_a += norm_a[lane];
        lower_b += norm_b[lane];
    }
    for (&x, &y) in a[head..].iter().zip(&b[head..]) {
        upper += x * y;
        lower_a += x * x;
        lower_b += y * y;
    }

    1.0 - upper / (lower_a.sqrt() * lower_b.sqrt())
}

/// Minkowski distance of the given order (order 2 is Euclidean,
/// order 1 is Manhattan).
pub fn minkowski<T: Real>(a: &[T], b: &[T], order: f64) -> T {
    let ord = T::from_f64(order);
    let mut sum = T::ZERO;
    for (&x, &y) in a.iter().zip(b) {
        sum += (x - y).abs().powf(ord);
    }
    sum.powf(T::ONE / ord)
}

/// Chebyshev distance: the largest absolute per-dimension difference.
pub fn chebyshev<T: Real>(a: &[T], b: &[T]) -> T {
    let mut max = T::ZERO;
    for (&x, &y) in a.iter().zip(b) {
        let diff = (x - y).abs();
        if diff > max {
            max = diff;
        }
    }
    max
}

/// Canberra distance. Dimensions where `|aᵢ| + |bᵢ| = 0` contribute
/// nothing instead of poisoning the sum with a division by zero.
pub fn canberra<T: Real>(a: &[T], b: &[T]) -> T {
    let mut sum = T::ZERO;
    for (&x, &y) in a.iter().zip(b) {
        let denom = x.abs() + y.abs();
        if denom != T::ZERO {
            sum += (x - y).abs() / denom;
        }
    }
    sum
}

/// Bray-Curtis dissimilarity: `1 − 2 Σ min(aᵢ, bᵢ) / Σ (aᵢ + bᵢ)`.
/// Meaningful for non-negative vectors.
pub fn bray_curtis<T: Real>(a: &[T], b: &[T]) -> T {
    let mut upper = T::ZERO;
    let mut lower = T::ZERO;
    for (&x, &y) in a.iter().zip(b) {
        upper += if x < y { x } else { y };
        lower += x + y;
    }
    let two = T::from_f64(2.0);
    T::ONE - (two * upper) / lower
}

/// Angular Minkowski distance: Minkowski of the given order between the
/// two vectors after each is scaled by its own p-norm. A zero norm leaves
/// the corresponding vector out of the difference rather than dividing
/// by zero.
pub fn angular_minkowski<T: Real>(a: &[T], b: &[T], order: f64) -> T {
    let ord = T::from_f64(order);
    let mut a_norm = T::ZERO;
    let mut b_norm = T::ZERO;
    for (&x, &y) in a.iter().zip(b) {
        a_norm += x.powf(ord).abs();
        b_norm += y.powf(ord).abs();
    }
    a_norm = a_norm.powf(T::ONE / ord);
    b_norm = b_norm.powf(T::ONE / ord);

    let mut sum = T::ZERO;
    for (&x, &y) in a.iter().zip(b) {
        let mut value = T::ZERO;
        if b_norm != T::ZERO {
            value = y / b_norm;
        }
        if a_norm != T::ZERO {
            value = value - x / a_norm;
        }
        sum += value.abs().powf(ord);
    }
    sum.powf(T::ONE / ord)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn cosine_of_parallel_vectors_is_zero() {
        let a = [1.0f64, 2.0, 3.0];
        let b = [2.0f64, 4.0, 6.0];
        assert!(close(cosine(&a, &b), 0.0));
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_one() {
        let a = [1.0f64, 0.0];
        let b = [0.0f64, 1.0];
        assert!(close(cosine(&a, &b), 1.0));
    }

    #[test]
    fn cosine_of_opposed_vectors_is_two() {
        let a = [1.0f64, 1.0];
        let b = [-1.0f64, -1.0];
        assert!(close(cosine(&a, &b), 2.0));
    }

    #[test]
    fn unrolled_cosine_matches_scalar_across_lengths() {
        // Cover multiple-of-8 lengths, the scalar tail, and sub-lane inputs.
        for len in [1usize, 3, 7, 8, 9, 16, 17, 31, 64, 100] {
            let a: Vec<f32> = (0..len).map(|i| (i as f32 * 0.37).sin() + 1.5).collect();
            let b: Vec<f32> = (0..len).map(|i| (i as f32 * 0.11).cos() + 1.5).collect();
            let fast = cosine_f32(&a, &b) as f64;
            let scalar = cosine::<f32>(&a, &b) as f64;
            assert!(
                (fast - scalar).abs() < 1e-5,
                "len {len}: fast {fast} vs scalar {scalar}"
            );
        }
    }

    #[test]
    fn unrolled_cosine_is_deterministic() {
        let a: Vec<f32> = (0..77).map(|i| (i as f32 * 0.13).sin()).collect();
        let b: Vec<f32> = (0..77).map(|i| (i as f32 * 0.29).cos()).collect();
        let first = cosine_f32(&a, &b);
        for _ in 0..10 {
            assert_eq!(first.to_bits(), cosine_f32(&a, &b).to_bits());
        }
    }

    #[test]
    fn minkowski_order_two_is_euclidean() {
        let a = [0.0f64, 0.0];
        let b = [3.0f64, 4.0];
        assert!(close(minkowski(&a, &b, 2.0), 5.0));
    }

    #[test]
    fn minkowski_order_one_is_manhattan() {
        let a = [1.0f64, 2.0, 3.0];
        let b = [4.0f64, 0.0, 3.0];
        assert!(close(minkowski(&a, &b, 1.0), 5.0));
    }

    #[test]
    fn chebyshev_takes_largest_component() {
        let a = [1.0f64, 5.0, -2.0];
        let b = [2.0f64, 1.0, -2.5];
        assert!(close(chebyshev(&a, &b), 4.0));
    }

    #[test]
    fn canberra_skips_zero_denominators() {
        let a = [0.0f64, 1.0];
        let b = [0.0f64, 3.0];
        // First dimension: |0|+|0| = 0, skipped. Second: 2/4 = 0.5.
        assert!(close(canberra(&a, &b), 0.5));
    }

    #[test]
    fn bray_curtis_identical_vectors_is_zero() {
        let a = [1.0f64, 2.0, 3.0];
        assert!(close(bray_curtis(&a, &a), 0.0));
    }

    #[test]
    fn bray_curtis_disjoint_support_is_one() {
        let a = [1.0f64, 0.0];
        let b = [0.0f64, 2.0];
        assert!(close(bray_curtis(&a, &b), 1.0));
    }

    #[test]
    fn angular_minkowski_equals_minkowski_of_normalised() {
        let a = [3.0f64, 4.0];
        let b = [5.0f64, 12.0];
        let na: Vec<f64> = a.iter().map(|x| x / 5.0).collect();
        let nb: Vec<f64> = b.iter().map(|x| x / 13.0).collect();
        assert!(close(
            angular_minkowski(&a, &b, 2.0),
            minkowski(&na, &nb, 2.0)
        ));
    }

    #[test]
    fn angular_minkowski_ignores_magnitude() {
        let a = [1.0f64, 2.0, 0.5];
        let b = [0.4f64, 0.8, 0.2]; // 0.4 × a
        assert!(close(angular_minkowski(&a, &b, 2.0), 0.0));
    }

    #[test]
    fn kind_dispatch_agrees_with_direct_calls() {
        let a = [1.0f64, 2.0, 3.0];
        let b = [3.0f64, 2.0, 1.0];
        assert_eq!(DistanceKind::Cosine.eval_f64(&a, &b), cosine(&a, &b));
        assert_eq!(
            DistanceKind::Minkowski { order: 2.0 }.eval_f64(&a, &b),
            minkowski(&a, &b, 2.0)
        );
        assert_eq!(DistanceKind::Chebyshev.eval_f64(&a, &b), chebyshev(&a, &b));
        assert_eq!(DistanceKind::Canberra.eval_f64(&a, &b), canberra(&a, &b));
        assert_eq!(
            DistanceKind::BrayCurtis.eval_f64(&a, &b),
            bray_curtis(&a, &b)
        );
        assert_eq!(
            DistanceKind::AngularMinkowski { order: 2.0 }.eval_f64(&a, &b),
            angular_minkowski(&a, &b, 2.0)
        );
    }

    #[test]
    fn f32_dispatch_uses_unrolled_cosine() {
        let a: Vec<f32> = (0..24).map(|i| i as f32 + 1.0).collect();
        let b: Vec<f32> = (0..24).map(|i| (i as f32 + 1.0) * 0.5 + 1.0).collect();
        assert_eq!(
            DistanceKind::Cosine.eval_f32(&a, &b).to_bits(),
            cosine_f32(&a, &b).to_bits()
        );
        assert_eq!(
            <f32 as Real>::fast_cosine(&a, &b).to_bits(),
            cosine_f32(&a, &b).to_bits()
        );
    }

    #[test]
    fn kind_serialises_with_order() {
        let kind = DistanceKind::Minkowski { order: 3.0 };
        let json = serde_json::to_string(&kind).unwrap();
        let back: DistanceKind = serde_json::from_str(&json).unwrap();
        assert_eq!(kind, back);
    }
}
