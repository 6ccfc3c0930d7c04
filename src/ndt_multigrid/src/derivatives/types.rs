//! Derivative accumulators for the NDT score.
//!
//! Gradient and Hessian are stored with the sign the Newton step expects:
//! `gradient` is the score gradient and `hessian` is the negated score
//! Hessian, so the update solves `hessian · Δ = gradient`.

use nalgebra::{SMatrix, SVector};

/// Score, gradient and Hessian of a single point-cell pair.
#[derive(Debug, Clone)]
pub struct DerivativeResult<const P: usize> {
    /// Unnormalized density of the point in the cell.
    pub score: f64,

    /// Score gradient w.r.t. pose parameters.
    pub gradient: SVector<f64, P>,

    /// Negated score Hessian w.r.t. pose parameters.
    pub hessian: SMatrix<f64, P, P>,
}

impl<const P: usize> DerivativeResult<P> {
    /// Create zero-initialized derivative result.
    pub fn zeros() -> Self {
        Self {
            score: 0.0,
            gradient: SVector::zeros(),
            hessian: SMatrix::zeros(),
        }
    }

    /// Add another derivative result to this one.
    pub fn accumulate(&mut self, other: &DerivativeResult<P>) {
        self.score += other.score;
        self.gradient += other.gradient;
        self.hessian += other.hessian;
    }
}

/// Derivatives summed over a whole source cloud against one sub-grid.
#[derive(Debug, Clone)]
pub struct AggregatedDerivatives<const P: usize> {
    /// Total score (sum over all point-cell pairs).
    pub score: f64,

    /// Total gradient.
    pub gradient: SVector<f64, P>,

    /// Total Hessian.
    pub hessian: SMatrix<f64, P, P>,

    /// Number of point-cell pairs that contributed.
    pub num_correspondences: usize,
}

impl<const P: usize> AggregatedDerivatives<P> {
    /// Create zero-initialized aggregated derivatives.
    pub fn zeros() -> Self {
        Self {
            score: 0.0,
            gradient: SVector::zeros(),
            hessian: SMatrix::zeros(),
            num_correspondences: 0,
        }
    }

    /// Add a single point-cell derivative result.
    pub fn add(&mut self, result: &DerivativeResult<P>) {
        self.score += result.score;
        self.gradient += result.gradient;
        self.hessian += result.hessian;
        self.num_correspondences += 1;
    }
}

impl<const P: usize> Default for AggregatedDerivatives<P> {
    fn default() -> Self {
        Self::zeros()
    }
}
