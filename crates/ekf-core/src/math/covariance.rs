//! Covariance matrix operations
//!
//! A covariance P must stay symmetric positive-semi-definite. These helpers
//! measure how far a numerically computed P drifts from that and provide the
//! Joseph-form correction as an alternative to P - KHP.

use nalgebra::{DMatrix, DVector};

/// Largest absolute entry of P - Pᵀ
///
/// Zero for an exactly symmetric matrix. Non-square input returns infinity.
pub fn symmetry_error(p: &DMatrix<f64>) -> f64 {
    if !p.is_square() {
        return f64::INFINITY;
    }
    (p - p.transpose()).amax()
}

/// Force symmetry by averaging with the transpose: (P + Pᵀ) / 2
pub fn symmetrize(p: &DMatrix<f64>) -> DMatrix<f64> {
    (p + p.transpose()) * 0.5
}

/// True if every entry is finite (no NaN or ±∞)
pub fn is_finite_matrix(m: &DMatrix<f64>) -> bool {
    m.iter().all(|v| v.is_finite())
}

/// True if every entry is finite (no NaN or ±∞)
pub fn is_finite_vector(v: &DVector<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}

/// Reciprocal condition number σ_min / σ_max in the 2-norm
///
/// Returns 0 for a zero matrix and for input containing non-finite values.
/// Values close to machine epsilon indicate a numerically singular matrix.
pub fn reciprocal_condition(m: &DMatrix<f64>) -> f64 {
    if m.is_empty() || !is_finite_matrix(m) {
        return 0.0;
    }

    let sv = m.clone().svd(false, false).singular_values;
    let s_max = sv.max();
    if s_max <= 0.0 {
        return 0.0;
    }
    sv.min() / s_max
}

/// Joseph-form covariance correction
///
/// P' = (I - KH) P (I - KH)ᵀ + K R Kᵀ
///
/// Keeps P' symmetric positive-semi-definite under round-off, at the cost of
/// a few extra products compared to P - KHP.
pub fn joseph_update(
    p: &DMatrix<f64>,
    k: &DMatrix<f64>,
    h: &DMatrix<f64>,
    r: &DMatrix<f64>,
) -> DMatrix<f64> {
    let n = p.nrows();
    let i_kh = DMatrix::identity(n, n) - k * h;
    &i_kh * p * i_kh.transpose() + k * r * k.transpose()
}
