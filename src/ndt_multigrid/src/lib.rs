//! Multi-grid Normal Distributions Transform (NDT) registration.
//!
//! A reference point cloud is summarised as per-cell Gaussian statistics in
//! four grids offset from each other by half a cell. A source cloud is then
//! aligned to it by a damped Newton-Raphson search over the rigid pose that
//! maximises the summed cell densities of the best-scoring sub-grid.
//!
//! # Architecture
//!
//! - [`distribution`]: running mean/covariance accumulator per cell
//! - [`grid`]: sparse, lock-guarded grid of accumulators with world/index
//!   transforms
//! - [`multi_grid`]: the four half-cell shifted grids
//! - [`derivatives`]: pose models and per-point score derivatives
//! - [`optimization`]: damped Newton step and the matcher loop
//! - [`ndt`]: high-level matcher and builder
//!
//! Planar (`tx, ty, phi`) and spatial (`tx, ty, tz, roll, pitch, yaw`) poses
//! share the same code through nalgebra const generics.
//!
//! # Usage
//!
//! ```
//! use nalgebra::{Isometry2, Point2, Vector2};
//! use ndt_multigrid::{ConvergenceStatus, MultiGridMatcher2d, PointCloud2};
//!
//! let reference: PointCloud2 = (0..600)
//!     .map(|i| {
//!         let t = i as f64 * 0.01;
//!         let x = 6.0 * t.cos() + 0.05 * (37.0 * t).sin();
//!         let y = 4.0 * t.sin() + 0.05 * (53.0 * t).cos();
//!         Point2::new(x, y)
//!     })
//!     .collect();
//!
//! let matcher = MultiGridMatcher2d::builder().resolution(1.0).build()?;
//! let grid = matcher.build_grid(&reference)?;
//!
//! let result = matcher.align(&grid, &reference, Isometry2::new(Vector2::new(0.05, 0.0), 0.0))?;
//! if result.status != ConvergenceStatus::NoCorrespondences {
//!     println!("pose: {:?}, score: {}", result.transform, result.score);
//! }
//! # Ok::<(), ndt_multigrid::NdtError>(())
//! ```

pub mod derivatives;
pub mod distribution;
pub mod error;
pub mod grid;
pub mod multi_grid;
pub mod ndt;
pub mod optimization;
pub mod pointcloud;

#[cfg(test)]
pub mod test_utils;

pub use derivatives::{
    AggregatedDerivatives, DerivativeResult, PlanarDerivatives, PoseModel, SpatialDerivatives,
};
pub use distribution::{CovarianceLimit, Distribution, DistributionAccumulator, MIN_SAMPLES};
pub use error::{NdtError, Result};
pub use grid::{CellIndex, DistributionGrid, DistributionGrid2, DistributionGrid3};
pub use multi_grid::{MultiGrid, MultiGrid2, MultiGrid3, OVERLAP_COUNT};
pub use optimization::{
    ConvergenceStatus, IterationRecord, MatchResult, MatcherConfig, NdtOptimizer,
};
pub use pointcloud::{PointCloud, PointCloud2, PointCloud3};

// High-level API (recommended for most users)
pub use ndt::{MatcherBuilder, MultiGridMatcher, MultiGridMatcher2d, MultiGridMatcher3d};
