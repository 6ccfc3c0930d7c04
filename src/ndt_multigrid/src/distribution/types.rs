//! Derived Gaussian statistics of a single grid cell.

use std::f64::consts::TAU;

use nalgebra::{DMatrix, Point, SMatrix, SVector};
use serde::{Deserialize, Serialize};

/// Minimum number of samples before a cell yields a density.
pub const MIN_SAMPLES: usize = 3;

/// Policy applied to the covariance before it is inverted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum CovarianceLimit {
    /// Use the sample covariance as is. Singular covariances yield no density.
    #[default]
    Unlimited,
    /// Raise eigenvalues below `ratio * max_eigenvalue` to that floor.
    ///
    /// Keeps densities finite for collinear or coplanar cells.
    EigenvalueFloor { ratio: f64 },
}

/// Gaussian statistics of one cell, detached from the grid.
///
/// Values are copies; holding one never pins the grid or its cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution<const D: usize> {
    /// Number of points accumulated into the cell.
    pub point_count: usize,
    /// Sample mean.
    pub mean: SVector<f64, D>,
    /// Covariance after the cell's [`CovarianceLimit`] was applied.
    pub covariance: SMatrix<f64, D, D>,
    /// Inverse covariance, `None` when the covariance is singular or the
    /// cell has fewer than [`MIN_SAMPLES`] points.
    pub inv_covariance: Option<SMatrix<f64, D, D>>,
    /// Determinant of `covariance` (0 when degenerate).
    pub determinant: f64,
}

impl<const D: usize> Distribution<D> {
    /// Build statistics from a count, a mean and a scatter matrix
    /// (sum of outer products of deviations from the mean).
    pub fn from_moments(
        point_count: usize,
        mean: SVector<f64, D>,
        scatter: &SMatrix<f64, D, D>,
        limit: CovarianceLimit,
    ) -> Self {
        if point_count < MIN_SAMPLES {
            return Self {
                point_count,
                mean,
                covariance: SMatrix::zeros(),
                inv_covariance: None,
                determinant: 0.0,
            };
        }

        let covariance = scatter / (point_count as f64 - 1.0);

        match regularize_covariance(&covariance, limit) {
            Some((regularized, inverse, determinant)) => Self {
                point_count,
                mean,
                covariance: regularized,
                inv_covariance: Some(inverse),
                determinant,
            },
            None => Self {
                point_count,
                mean,
                covariance,
                inv_covariance: None,
                determinant: 0.0,
            },
        }
    }

    /// Whether the distribution can be evaluated.
    pub fn is_valid(&self) -> bool {
        self.point_count >= MIN_SAMPLES && self.inv_covariance.is_some()
    }

    /// Normalized Gaussian density at `point`, 0 when degenerate.
    pub fn sample(&self, point: &Point<f64, D>) -> f64 {
        if !self.is_valid() || self.determinant <= 0.0 {
            return 0.0;
        }
        let (value, _) = self.sample_non_normalized(point);
        let normalizer = (TAU.powi(D as i32) * self.determinant).sqrt();
        value / normalizer
    }

    /// Unnormalized Gaussian value `exp(-0.5 qᵀΣ⁻¹q)` and the offset
    /// `q = point - mean`.
    ///
    /// The value is 0 when the distribution is degenerate; the offset is
    /// always returned.
    pub fn sample_non_normalized(&self, point: &Point<f64, D>) -> (f64, SVector<f64, D>) {
        let q = point.coords - self.mean;
        let value = match (&self.inv_covariance, self.point_count >= MIN_SAMPLES) {
            (Some(inv), true) => {
                let exponent = -0.5 * q.dot(&(inv * q));
                exponent.exp()
            }
            _ => 0.0,
        };
        (value, q)
    }
}

/// Apply the covariance policy and invert via symmetric eigen decomposition.
///
/// Returns `(regularized_covariance, inverse, determinant)` or `None` if the
/// covariance is (numerically) singular after regularization.
fn regularize_covariance<const D: usize>(
    cov: &SMatrix<f64, D, D>,
    limit: CovarianceLimit,
) -> Option<(SMatrix<f64, D, D>, SMatrix<f64, D, D>, f64)> {
    if !cov.iter().all(|v| v.is_finite()) {
        return None;
    }

    let eigen = DMatrix::from_column_slice(D, D, cov.as_slice()).symmetric_eigen();
    let mut eigenvalues = eigen.eigenvalues;

    let max_eigenvalue = eigenvalues.iter().copied().fold(0.0_f64, f64::max);
    if max_eigenvalue <= 0.0 {
        return None;
    }

    if let CovarianceLimit::EigenvalueFloor { ratio } = limit {
        let floor = max_eigenvalue * ratio;
        for ev in eigenvalues.iter_mut() {
            if *ev < floor {
                *ev = floor;
            }
        }
    }

    let min_eigenvalue = eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
    if min_eigenvalue <= max_eigenvalue * f64::EPSILON {
        return None;
    }

    let eigenvectors = &eigen.eigenvectors;
    let regularized =
        eigenvectors * DMatrix::from_diagonal(&eigenvalues) * eigenvectors.transpose();
    let inverse = eigenvectors
        * DMatrix::from_diagonal(&eigenvalues.map(|ev| 1.0 / ev))
        * eigenvectors.transpose();
    let determinant = eigenvalues.iter().product();

    Some((
        SMatrix::from_column_slice(regularized.as_slice()),
        SMatrix::from_column_slice(inverse.as_slice()),
        determinant,
    ))
}
