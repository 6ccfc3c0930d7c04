//! Four overlapping distribution grids.
//!
//! The sub-grids share resolution and extent but their origins are shifted
//! by half a cell: none, along x, along y, along x and y. A query point
//! therefore falls into exactly one cell of every sub-grid, and at least one
//! of those cells has the point well inside it rather than near a border.
//! Spatial grids are shifted along x and y only.
//!
//! # Example
//!
//! ```
//! use nalgebra::{Point2, Vector2};
//! use ndt_multigrid::{CovarianceLimit, MultiGrid2, PointCloud2};
//!
//! let cloud = PointCloud2::from_arrays(&[[0.1, 0.2], [0.4, 0.3], [0.2, 0.6], [1.5, 1.5]]);
//! let grid = MultiGrid2::from_cloud(&cloud, Vector2::new(1.0, 1.0), CovarianceLimit::Unlimited)?;
//!
//! let cells = grid.get(&Point2::new(0.3, 0.4));
//! assert!(cells.iter().any(|cell| cell.is_some()));
//! # Ok::<(), ndt_multigrid::NdtError>(())
//! ```

use nalgebra::{
    AbstractRotation, Isometry, Point, SVector, Translation, UnitComplex, UnitQuaternion,
};
use rayon::prelude::*;
use tracing::debug;

use crate::distribution::{CovarianceLimit, Distribution};
use crate::error::{NdtError, Result};
use crate::grid::DistributionGrid;
use crate::pointcloud::PointCloud;

/// Number of overlapping sub-grids.
pub const OVERLAP_COUNT: usize = 4;

/// Four half-cell shifted [`DistributionGrid`]s.
#[derive(Debug)]
pub struct MultiGrid<R, const D: usize> {
    grids: [DistributionGrid<R, D>; OVERLAP_COUNT],
}

/// Planar multi-grid.
pub type MultiGrid2 = MultiGrid<UnitComplex<f64>, 2>;
/// Spatial multi-grid.
pub type MultiGrid3 = MultiGrid<UnitQuaternion<f64>, 3>;

/// Origin shift of sub-grid `k` (bit 0 shifts x, bit 1 shifts y).
pub fn overlap_offset<const D: usize>(k: usize, resolution: &SVector<f64, D>) -> SVector<f64, D> {
    let mut offset = SVector::zeros();
    if k & 1 != 0 && D > 0 {
        offset[0] = 0.5 * resolution[0];
    }
    if k & 2 != 0 && D > 1 {
        offset[1] = 0.5 * resolution[1];
    }
    offset
}

impl<R, const D: usize> MultiGrid<R, D>
where
    R: AbstractRotation<f64, D> + Send + Sync,
{
    /// Create four empty sub-grids covering `min .. min + extent`.
    ///
    /// Sub-grid `k` starts at `min - overlap_offset(k)`.
    pub fn new(
        min: &Point<f64, D>,
        resolution: SVector<f64, D>,
        extent: SVector<f64, D>,
        limit: CovarianceLimit,
    ) -> Result<Self> {
        let sub_grid = |k: usize| -> Result<DistributionGrid<R, D>> {
            let corner = min.coords - overlap_offset(k, &resolution);
            let origin = Isometry::from_parts(Translation::from(corner), R::identity());
            Ok(DistributionGrid::with_resolutions(origin, resolution, extent)?
                .with_covariance_limit(limit))
        };

        Ok(Self {
            grids: [sub_grid(0)?, sub_grid(1)?, sub_grid(2)?, sub_grid(3)?],
        })
    }

    /// Build a multi-grid sized to `cloud` and fill it with its valid points.
    ///
    /// Each axis gets `floor(range / resolution + 0.5)` cells plus one
    /// padding cell, so shifted sub-grids still reach the far boundary.
    pub fn from_cloud(
        cloud: &PointCloud<D>,
        resolution: SVector<f64, D>,
        limit: CovarianceLimit,
    ) -> Result<Self> {
        let range = cloud.range();
        for axis in 0..D {
            if !(range[axis] > 0.0) {
                return Err(NdtError::InvalidRange {
                    axis,
                    range: range[axis],
                });
            }
        }

        let extent = SVector::<f64, D>::from_fn(|axis, _| {
            let cells = (range[axis] / resolution[axis] + 0.5).floor() + 1.0;
            cells * resolution[axis]
        });

        let grid = Self::new(cloud.min(), resolution, extent, limit)?;
        grid.add_cloud(cloud)?;

        debug!(
            points = cloud.valid_count(),
            cells = ?grid.cell_counts(),
            "built multi-grid"
        );
        Ok(grid)
    }

    /// Add every valid point of `cloud` to all four sub-grids.
    ///
    /// Sub-grids are filled in parallel; within a sub-grid points are added
    /// in cloud order.
    pub fn add_cloud(&self, cloud: &PointCloud<D>) -> Result<()> {
        self.grids.as_slice().par_iter().try_for_each(|grid| {
            cloud
                .valid_points()
                .try_for_each(|point| grid.add(point).map(|_| ()))
        })
    }

    /// Add a single point to all four sub-grids.
    pub fn add(&self, point: &Point<f64, D>) -> Result<()> {
        for grid in &self.grids {
            grid.add(point)?;
        }
        Ok(())
    }
}

impl<R, const D: usize> MultiGrid<R, D>
where
    R: AbstractRotation<f64, D>,
{
    /// Cell statistics at `point`, one slot per sub-grid in offset order.
    ///
    /// Empty cells (and points outside a sub-grid) are `None`.
    pub fn get(&self, point: &Point<f64, D>) -> [Option<Distribution<D>>; OVERLAP_COUNT] {
        std::array::from_fn(|k| self.grids[k].distribution_at(point))
    }

    /// The sub-grids in offset order.
    pub fn grids(&self) -> &[DistributionGrid<R, D>; OVERLAP_COUNT] {
        &self.grids
    }

    pub fn resolution(&self) -> SVector<f64, D> {
        self.grids[0].resolution()
    }

    /// Number of populated cells per sub-grid.
    pub fn cell_counts(&self) -> [usize; OVERLAP_COUNT] {
        std::array::from_fn(|k| self.grids[k].len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointcloud::{PointCloud2, PointCloud3};
    use crate::test_utils::{
        make_blob_cloud, make_planar_blobs, make_planar_lattice, make_spatial_blobs,
    };
    use approx::assert_relative_eq;
    use nalgebra::{Point2, Vector2, Vector3};
    use rand::prelude::*;

    #[test]
    fn test_sub_grid_origins() {
        let grid = MultiGrid2::new(
            &Point2::new(1.0, -1.0),
            Vector2::new(1.0, 2.0),
            Vector2::new(4.0, 4.0),
            CovarianceLimit::Unlimited,
        )
        .unwrap();

        let origins: Vec<_> = grid
            .grids()
            .iter()
            .map(|g| g.origin().translation.vector)
            .collect();
        assert_relative_eq!(origins[0], Vector2::new(1.0, -1.0));
        assert_relative_eq!(origins[1], Vector2::new(0.5, -1.0));
        assert_relative_eq!(origins[2], Vector2::new(1.0, -2.0));
        assert_relative_eq!(origins[3], Vector2::new(0.5, -2.0));
    }

    #[test]
    fn test_spatial_offsets_skip_z() {
        let res = Vector3::new(1.0, 1.0, 1.0);
        assert_relative_eq!(overlap_offset(3, &res), Vector3::new(0.5, 0.5, 0.0));

        let cloud = make_spatial_blobs(3);
        let grid = MultiGrid3::from_cloud(&cloud, res, CovarianceLimit::Unlimited).unwrap();
        for g in grid.grids() {
            assert_relative_eq!(g.origin().translation.vector.z, cloud.min().z);
        }
    }

    #[test]
    fn test_every_point_lands_in_all_sub_grids() {
        let cloud = make_planar_blobs(11);
        let grid =
            MultiGrid2::from_cloud(&cloud, Vector2::new(1.0, 1.0), CovarianceLimit::Unlimited)
                .unwrap();

        for point in cloud.valid_points() {
            let cells = grid.get(point);
            assert!(cells.iter().all(|cell| cell.is_some()));
        }

        // Every sub-grid holds every point once
        for g in grid.grids() {
            let total: usize = g
                .indices()
                .iter()
                .filter_map(|index| g.distribution(index))
                .map(|d| d.point_count)
                .sum();
            assert_eq!(total, cloud.valid_count());
        }
    }

    #[test]
    fn test_coverage_inside_bounds() {
        let cloud = make_planar_lattice(3.0, 0.1);
        let grid =
            MultiGrid2::from_cloud(&cloud, Vector2::new(1.0, 1.0), CovarianceLimit::Unlimited)
                .unwrap();

        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let p = Point2::new(rng.gen_range(0.0..3.0), rng.gen_range(0.0..3.0));
            let cells = grid.get(&p);
            assert!(
                cells.iter().flatten().any(|d| d.is_valid()),
                "no usable cell at {p:?}"
            );
        }
    }

    #[test]
    fn test_outside_query_is_empty() {
        let cloud = make_planar_lattice(3.0, 0.1);
        let grid =
            MultiGrid2::from_cloud(&cloud, Vector2::new(1.0, 1.0), CovarianceLimit::Unlimited)
                .unwrap();

        let cells = grid.get(&Point2::new(50.0, -20.0));
        assert!(cells.iter().all(|cell| cell.is_none()));
    }

    #[test]
    fn test_distant_clusters_allocate_only_used_cells() {
        let cloud = make_blob_cloud(&[[0.0, 0.0], [2000.0, 2000.0]], 30, 0.05, 9);
        let grid =
            MultiGrid2::from_cloud(&cloud, Vector2::new(0.1, 0.1), CovarianceLimit::Unlimited)
                .unwrap();

        for count in grid.cell_counts() {
            assert!(count > 0 && count <= cloud.len(), "cells: {count}");
        }
        assert!(grid.get(&Point2::new(1000.0, 1000.0)).iter().all(|c| c.is_none()));
    }

    #[test]
    fn test_flat_cloud_is_rejected() {
        let cloud = PointCloud2::from_arrays(&[[0.0, 1.0], [1.0, 1.0], [2.0, 1.0]]);
        let err = MultiGrid2::from_cloud(&cloud, Vector2::new(1.0, 1.0), CovarianceLimit::Unlimited)
            .unwrap_err();
        assert_eq!(err, NdtError::InvalidRange { axis: 1, range: 0.0 });

        let empty = PointCloud3::new(Vec::new());
        assert!(matches!(
            MultiGrid3::from_cloud(&empty, Vector3::repeat(1.0), CovarianceLimit::Unlimited),
            Err(NdtError::InvalidRange { axis: 0, .. })
        ));
    }
}
