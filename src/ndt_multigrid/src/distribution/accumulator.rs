//! Running Gaussian statistics for one grid cell.

use nalgebra::{Point, SMatrix, SVector};

use super::types::{CovarianceLimit, Distribution};

/// Accumulated point statistics of a single cell.
///
/// Mean and scatter are updated incrementally (Welford) so no raw points are
/// stored. The derived [`Distribution`] is recomputed lazily on the first
/// read after a change.
#[derive(Debug, Clone)]
pub struct DistributionAccumulator<const D: usize> {
    /// Number of points accumulated.
    count: usize,
    /// Running mean.
    mean: SVector<f64, D>,
    /// Sum of outer products of deviations from the running mean.
    scatter: SMatrix<f64, D, D>,
    limit: CovarianceLimit,
    touched: bool,
    cached: Option<Distribution<D>>,
}

impl<const D: usize> DistributionAccumulator<D> {
    /// Create an empty accumulator using the given covariance policy.
    pub fn new(limit: CovarianceLimit) -> Self {
        Self {
            count: 0,
            mean: SVector::zeros(),
            scatter: SMatrix::zeros(),
            limit,
            touched: false,
            cached: None,
        }
    }

    /// Add a point to this accumulator.
    pub fn add(&mut self, point: &Point<f64, D>) {
        self.count += 1;
        let delta = point.coords - self.mean;
        self.mean += delta / self.count as f64;
        let delta_after = point.coords - self.mean;
        self.scatter += delta * delta_after.transpose();

        self.touched = true;
        self.cached = None;
    }

    /// Number of points accumulated.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Running mean (zero for an empty accumulator).
    pub fn mean(&self) -> SVector<f64, D> {
        self.mean
    }

    /// Covariance policy of this accumulator.
    pub fn covariance_limit(&self) -> CovarianceLimit {
        self.limit
    }

    /// Whether a point was added since the flag was last cleared.
    pub fn is_touched(&self) -> bool {
        self.touched
    }

    /// Reset the touched flag.
    pub fn clear_touched(&mut self) {
        self.touched = false;
    }

    /// Derived statistics, recomputed if points were added since last call.
    pub fn distribution(&mut self) -> &Distribution<D> {
        let (count, mean, scatter, limit) = (self.count, self.mean, self.scatter, self.limit);
        self.cached
            .get_or_insert_with(|| Distribution::from_moments(count, mean, &scatter, limit))
    }

    /// Covariance after the covariance policy was applied.
    pub fn covariance(&mut self) -> SMatrix<f64, D, D> {
        self.distribution().covariance
    }

    /// Inverse covariance, `None` when degenerate.
    pub fn inverse_covariance(&mut self) -> Option<SMatrix<f64, D, D>> {
        self.distribution().inv_covariance
    }

    /// Normalized density at `point`; 0 for empty or degenerate cells.
    pub fn sample(&mut self, point: &Point<f64, D>) -> f64 {
        self.distribution().sample(point)
    }

    /// Unnormalized density and mean offset at `point`.
    pub fn sample_non_normalized(&mut self, point: &Point<f64, D>) -> (f64, SVector<f64, D>) {
        self.distribution().sample_non_normalized(point)
    }
}

impl<const D: usize> Default for DistributionAccumulator<D> {
    fn default() -> Self {
        Self::new(CovarianceLimit::default())
    }
}
