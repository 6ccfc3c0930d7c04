//! High-level multi-grid NDT matching API.
//!
//! # Example
//!
//! ```
//! use nalgebra::{Isometry2, Point2};
//! use ndt_multigrid::{MultiGridMatcher2d, PointCloud2};
//!
//! let reference: PointCloud2 = (0..400)
//!     .map(|i| {
//!         let (x, y) = ((i % 20) as f64 * 0.25, (i / 20) as f64 * 0.25);
//!         Point2::new(x, y + 0.3 * (x * 1.7).sin())
//!     })
//!     .collect();
//!
//! let matcher = MultiGridMatcher2d::builder()
//!     .resolution(1.0)
//!     .max_iterations(50)
//!     .build()?;
//!
//! let result = matcher.match_clouds(&reference, &reference, Isometry2::identity())?;
//! println!("status: {:?}, score: {}", result.status, result.score);
//! # Ok::<(), ndt_multigrid::NdtError>(())
//! ```

use std::marker::PhantomData;

use nalgebra::{Isometry, SVector};
use rayon::prelude::*;

use crate::derivatives::{PlanarDerivatives, PoseModel, SpatialDerivatives};
use crate::distribution::CovarianceLimit;
use crate::error::{NdtError, Result};
use crate::multi_grid::MultiGrid;
use crate::optimization::{MatchResult, MatcherConfig, NdtOptimizer};
use crate::pointcloud::PointCloud;

/// Builder for [`MultiGridMatcher`].
#[derive(Debug, Clone)]
pub struct MatcherBuilder<M, const D: usize, const P: usize> {
    config: MatcherConfig,
    _model: PhantomData<M>,
}

impl<M, const D: usize, const P: usize> MatcherBuilder<M, D, P>
where
    M: PoseModel<D, P>,
{
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: MatcherConfig::default(),
            _model: PhantomData,
        }
    }

    /// Set the cell size of every axis.
    pub fn resolution(mut self, resolution: f64) -> Self {
        self.config.resolution = vec![resolution];
        self
    }

    /// Set one cell size per axis.
    pub fn resolutions(mut self, resolution: SVector<f64, D>) -> Self {
        self.config.resolution = resolution.iter().copied().collect();
        self
    }

    /// Set maximum iterations.
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set the translation convergence threshold.
    pub fn trans_epsilon(mut self, epsilon: f64) -> Self {
        self.config.trans_epsilon = epsilon;
        self
    }

    /// Set the rotation convergence threshold.
    pub fn rot_epsilon(mut self, epsilon: f64) -> Self {
        self.config.rot_epsilon = epsilon;
        self
    }

    /// Set the initial damping factor.
    pub fn damping(mut self, damping: f64) -> Self {
        self.config.damping = damping;
        self
    }

    pub fn covariance_limit(mut self, limit: CovarianceLimit) -> Self {
        self.config.covariance_limit = limit;
        self
    }

    /// Set tolerance for the Newton step SVD.
    pub fn svd_tolerance(mut self, tolerance: f64) -> Self {
        self.config.svd_tolerance = tolerance;
        self
    }

    /// Build the matcher.
    pub fn build(self) -> Result<MultiGridMatcher<M, D, P>> {
        MultiGridMatcher::new(self.config)
    }
}

impl<M, const D: usize, const P: usize> Default for MatcherBuilder<M, D, P>
where
    M: PoseModel<D, P>,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Multi-grid NDT matcher.
///
/// Holds only configuration; each reference cloud gets its own
/// [`MultiGrid`], built by [`build_grid`](Self::build_grid) or transiently
/// by [`match_clouds`](Self::match_clouds).
#[derive(Debug, Clone)]
pub struct MultiGridMatcher<M, const D: usize, const P: usize> {
    resolution: SVector<f64, D>,
    optimizer: NdtOptimizer<M, D, P>,
}

/// Planar matcher over `(tx, ty, phi)`.
pub type MultiGridMatcher2d = MultiGridMatcher<PlanarDerivatives, 2, 3>;
/// Spatial matcher over `(tx, ty, tz, roll, pitch, yaw)`.
pub type MultiGridMatcher3d = MultiGridMatcher<SpatialDerivatives, 3, 6>;

impl<M, const D: usize, const P: usize> MultiGridMatcher<M, D, P>
where
    M: PoseModel<D, P>,
{
    /// Create a matcher, validating `config`.
    pub fn new(config: MatcherConfig) -> Result<Self> {
        config.validate::<D>()?;
        let resolution = config.resolution_vector::<D>()?;
        Ok(Self {
            resolution,
            optimizer: NdtOptimizer::new(config),
        })
    }

    /// Create a builder.
    pub fn builder() -> MatcherBuilder<M, D, P> {
        MatcherBuilder::new()
    }

    /// Get the current configuration.
    pub fn config(&self) -> &MatcherConfig {
        self.optimizer.config()
    }

    /// Build the four overlapping sub-grids for `reference`.
    pub fn build_grid(&self, reference: &PointCloud<D>) -> Result<MultiGrid<M::Rotation, D>> {
        MultiGrid::from_cloud(reference, self.resolution, self.config().covariance_limit)
    }

    /// Align `source` against a prebuilt reference grid.
    ///
    /// Returns the transform that maps `source` onto the reference.
    pub fn align(
        &self,
        grid: &MultiGrid<M::Rotation, D>,
        source: &PointCloud<D>,
        prior: Isometry<f64, M::Rotation, D>,
    ) -> Result<MatchResult<M::Rotation, D, P>> {
        check_range(source)?;
        Ok(self.optimizer.align(source, grid, prior))
    }

    /// Build a grid for `reference`, align `source` against it and drop it.
    pub fn match_clouds(
        &self,
        reference: &PointCloud<D>,
        source: &PointCloud<D>,
        prior: Isometry<f64, M::Rotation, D>,
    ) -> Result<MatchResult<M::Rotation, D, P>> {
        check_range(source)?;
        let grid = self.build_grid(reference)?;
        Ok(self.optimizer.align(source, &grid, prior))
    }

    /// Align `source` from several priors in parallel.
    ///
    /// Results are returned in the order of `priors`.
    pub fn align_batch(
        &self,
        grid: &MultiGrid<M::Rotation, D>,
        source: &PointCloud<D>,
        priors: &[Isometry<f64, M::Rotation, D>],
    ) -> Result<Vec<MatchResult<M::Rotation, D, P>>>
    where
        M: Sync,
    {
        check_range(source)?;
        Ok(priors
            .par_iter()
            .map(|prior| self.optimizer.align(source, grid, *prior))
            .collect())
    }
}

/// Reject clouds whose valid points do not span every axis.
fn check_range<const D: usize>(cloud: &PointCloud<D>) -> Result<()> {
    let range = cloud.range();
    for axis in 0..D {
        if !(range[axis] > 0.0) {
            return Err(NdtError::InvalidRange {
                axis,
                range: range[axis],
            });
        }
    }
    Ok(())
}
