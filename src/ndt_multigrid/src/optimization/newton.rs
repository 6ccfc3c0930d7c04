//! Damped Newton step for NDT optimization.
//!
//! The step solves `H · Δ = g` where `g` is the score gradient and `H` the
//! negated score Hessian after diagonal loading. The solve goes through an
//! SVD pseudo-inverse so rank-deficient systems still give a least-squares
//! step instead of failing.

use nalgebra::{DMatrix, DVector, SMatrix, SVector};

/// Maximum SVD sweeps before giving up.
const SVD_MAX_ITERATIONS: usize = 1000;

/// Add `damping · (max_coeff - min_coeff)` to every diagonal entry.
///
/// This is a heuristic loading; it does not guarantee a positive definite
/// result.
pub fn damp_hessian<const P: usize>(
    hessian: &SMatrix<f64, P, P>,
    damping: f64,
) -> SMatrix<f64, P, P> {
    let offset = damping * (hessian.max() - hessian.min());
    let mut damped = *hessian;
    for i in 0..P {
        damped[(i, i)] += offset;
    }
    damped
}

/// Solve `hessian · Δ = gradient` using the SVD pseudo-inverse.
///
/// Singular values below `tolerance · max_singular_value` are dropped.
/// Returns a zero step if the input is non-finite, the Hessian vanishes or
/// the decomposition does not converge.
pub fn newton_step<const P: usize>(
    gradient: &SVector<f64, P>,
    hessian: &SMatrix<f64, P, P>,
    tolerance: f64,
) -> SVector<f64, P> {
    if !gradient.iter().chain(hessian.iter()).all(|v| v.is_finite()) {
        return SVector::zeros();
    }

    let h = DMatrix::from_column_slice(P, P, hessian.as_slice());
    let Some(svd) = h.try_svd(true, true, f64::EPSILON, SVD_MAX_ITERATIONS) else {
        return SVector::zeros();
    };

    let max_sv = svd.singular_values.max();
    if !(max_sv > 0.0) {
        return SVector::zeros();
    }

    let g = DVector::from_column_slice(gradient.as_slice());
    match svd.solve(&g, tolerance * max_sv) {
        Ok(delta) if delta.iter().all(|v| v.is_finite()) => {
            SVector::from_column_slice(delta.as_slice())
        }
        _ => SVector::zeros(),
    }
}

/// Ratio of largest to smallest singular value.
///
/// Returns `f64::INFINITY` if the smallest singular value is zero.
pub fn condition_number<const P: usize>(hessian: &SMatrix<f64, P, P>) -> f64 {
    let singular_values = DMatrix::from_column_slice(P, P, hessian.as_slice()).singular_values();

    let max_sv = singular_values.max();
    let min_sv = singular_values.min();

    if min_sv < 1e-15 {
        f64::INFINITY
    } else {
        max_sv / min_sv
    }
}
