//! Sparse distribution grid.
//!
//! A [`DistributionGrid`] maps integer cell indices to per-cell Gaussian
//! accumulators over a fixed index range derived from an origin pose, a
//! resolution and an extent.
//!
//! # Indexing
//!
//! A world point `p` is first moved into the grid frame (`origin⁻¹ · p`),
//! then each component is divided by the resolution and floored. The result
//! is shifted by `min_index`, so with an identity origin the index is simply
//! `floor(p / resolution)`.
//!
//! # Concurrency
//!
//! The cell table is guarded by one lock per grid, held only while a cell
//! is looked up or created. Each cell has its own lock for the numeric
//! update, so concurrent [`add`](DistributionGrid::add) calls are safe even
//! when they hit the same cell. Readers receive [`Distribution`] snapshots,
//! never references into the table.

pub mod storage;

pub use storage::{CellIndex, CellStorage};

use std::sync::Arc;

use nalgebra::{
    AbstractRotation, Isometry, Isometry2, Point, SVector, UnitComplex, UnitQuaternion, Vector2,
};
use parking_lot::Mutex;
use tracing::debug;

use crate::distribution::{CovarianceLimit, Distribution, DistributionAccumulator};
use crate::error::{NdtError, Result};

type Cell<const D: usize> = Arc<Mutex<DistributionAccumulator<D>>>;

/// Sparse grid of Gaussian cells with a fixed index range.
#[derive(Debug)]
pub struct DistributionGrid<R, const D: usize> {
    /// Grid frame expressed in world coordinates.
    origin: Isometry<f64, R, D>,
    /// Cell side length per axis.
    resolution: SVector<f64, D>,
    /// Covered size per axis, in world units.
    extent: SVector<f64, D>,
    min_index: CellIndex<D>,
    max_index: CellIndex<D>,
    covariance_limit: CovarianceLimit,
    cells: Mutex<CellStorage<Cell<D>, D>>,
}

/// Planar grid with a `UnitComplex` origin rotation.
pub type DistributionGrid2 = DistributionGrid<UnitComplex<f64>, 2>;
/// Spatial grid with a `UnitQuaternion` origin rotation.
pub type DistributionGrid3 = DistributionGrid<UnitQuaternion<f64>, 3>;

impl<R, const D: usize> DistributionGrid<R, D>
where
    R: AbstractRotation<f64, D>,
{
    /// Create an empty grid with the same resolution along every axis.
    pub fn new(
        origin: Isometry<f64, R, D>,
        resolution: f64,
        extent: SVector<f64, D>,
    ) -> Result<Self> {
        Self::with_resolutions(origin, SVector::repeat(resolution), extent)
    }

    /// Create an empty grid with a resolution per axis.
    pub fn with_resolutions(
        origin: Isometry<f64, R, D>,
        resolution: SVector<f64, D>,
        extent: SVector<f64, D>,
    ) -> Result<Self> {
        for axis in 0..D {
            let res = resolution[axis];
            if !(res.is_finite() && res > 0.0) {
                return Err(NdtError::InvalidResolution {
                    axis,
                    resolution: res,
                });
            }
            let ext = extent[axis];
            if !(ext.is_finite() && ext > 0.0) {
                return Err(NdtError::InvalidExtent { axis, extent: ext });
            }
        }

        let translation = origin.translation.vector;
        let mut min_index = [0; D];
        let mut max_index = [0; D];
        let mut size = [0usize; D];
        for axis in 0..D {
            min_index[axis] = (translation[axis] / resolution[axis]).floor() as i32;
            max_index[axis] =
                ((translation[axis] + extent[axis]) / resolution[axis]).floor() as i32;
            size[axis] = (i64::from(max_index[axis]) - i64::from(min_index[axis]) + 1) as usize;
        }

        debug!(?min_index, ?max_index, "created distribution grid");

        Ok(Self {
            origin,
            resolution,
            extent,
            min_index,
            max_index,
            covariance_limit: CovarianceLimit::default(),
            cells: Mutex::new(CellStorage::new(min_index, size)),
        })
    }

    /// Set the covariance policy for cells created from now on.
    pub fn with_covariance_limit(mut self, limit: CovarianceLimit) -> Self {
        self.covariance_limit = limit;
        self
    }

    /// Cell index of a world point.
    ///
    /// Returns `None` for points with non-finite coordinates. The index may
    /// lie outside `min_index..=max_index`.
    pub fn to_index(&self, point: &Point<f64, D>) -> Option<CellIndex<D>> {
        if !point.coords.iter().all(|c| c.is_finite()) {
            return None;
        }

        let local = self.origin.inverse_transform_point(point);
        let mut index = [0; D];
        for axis in 0..D {
            let cell = (local[axis] / self.resolution[axis]).floor() as i32;
            index[axis] = cell.saturating_add(self.min_index[axis]);
        }
        Some(index)
    }

    /// World position of the lower corner of cell `index`.
    pub fn to_world(&self, index: &CellIndex<D>) -> Point<f64, D> {
        let local = SVector::<f64, D>::from_fn(|axis, _| {
            (i64::from(index[axis]) - i64::from(self.min_index[axis])) as f64
                * self.resolution[axis]
        });
        self.origin.transform_point(&Point::from(local))
    }

    /// Accumulate a world point into its cell, creating the cell if needed.
    ///
    /// Returns the index of the updated cell.
    pub fn add(&self, point: &Point<f64, D>) -> Result<CellIndex<D>> {
        let index = self.to_index(point).ok_or(NdtError::NonFinitePoint)?;

        let cell = {
            let mut cells = self.cells.lock();
            let limit = self.covariance_limit;
            match cells.get_or_insert_with(&index, || {
                Arc::new(Mutex::new(DistributionAccumulator::new(limit)))
            }) {
                Some(cell) => Arc::clone(cell),
                None => return Err(self.out_of_bounds(index)),
            }
        };

        cell.lock().add(point);
        Ok(index)
    }

    /// Normalized density of the cell containing `point`, 0 on a miss.
    pub fn sample(&self, point: &Point<f64, D>) -> f64 {
        self.cell_at(point).map_or(0.0, |cell| cell.lock().sample(point))
    }

    /// Unnormalized density and mean offset of the cell containing `point`.
    ///
    /// Misses yield `(0.0, zero offset)`.
    pub fn sample_non_normalized(&self, point: &Point<f64, D>) -> (f64, SVector<f64, D>) {
        self.cell_at(point).map_or((0.0, SVector::zeros()), |cell| {
            cell.lock().sample_non_normalized(point)
        })
    }

    /// Snapshot of the cell at `index`. Never creates the cell.
    pub fn distribution(&self, index: &CellIndex<D>) -> Option<Distribution<D>> {
        self.cell(index).map(|cell| cell.lock().distribution().clone())
    }

    /// Snapshot of the cell containing `point`. Never creates the cell.
    pub fn distribution_at(&self, point: &Point<f64, D>) -> Option<Distribution<D>> {
        self.cell_at(point).map(|cell| cell.lock().distribution().clone())
    }

    /// Indices of all populated cells, sorted.
    pub fn indices(&self) -> Vec<CellIndex<D>> {
        let mut indices: Vec<_> = self.cells.lock().iter().map(|(index, _)| index).collect();
        indices.sort_unstable();
        indices
    }

    /// Indices of cells that received points since the last
    /// [`clear_touched`](Self::clear_touched).
    pub fn touched_indices(&self) -> Vec<CellIndex<D>> {
        let mut indices: Vec<_> = self
            .cells
            .lock()
            .iter()
            .filter(|(_, cell)| cell.lock().is_touched())
            .map(|(index, _)| index)
            .collect();
        indices.sort_unstable();
        indices
    }

    /// Reset the touched flag of every cell.
    pub fn clear_touched(&self) {
        for (_, cell) in self.cells.lock().iter() {
            cell.lock().clear_touched();
        }
    }

    /// Number of populated cells.
    pub fn len(&self) -> usize {
        self.cells.lock().len()
    }

    /// Check if no point was added yet.
    pub fn is_empty(&self) -> bool {
        self.cells.lock().is_empty()
    }

    /// World position of the grid origin.
    pub fn min(&self) -> Point<f64, D> {
        Point::from(self.origin.translation.vector)
    }

    /// Origin translation plus extent.
    pub fn max(&self) -> Point<f64, D> {
        Point::from(self.origin.translation.vector + self.extent)
    }

    pub fn min_index(&self) -> CellIndex<D> {
        self.min_index
    }

    pub fn max_index(&self) -> CellIndex<D> {
        self.max_index
    }

    pub fn origin(&self) -> &Isometry<f64, R, D> {
        &self.origin
    }

    pub fn resolution(&self) -> SVector<f64, D> {
        self.resolution
    }

    pub fn extent(&self) -> SVector<f64, D> {
        self.extent
    }

    pub fn covariance_limit(&self) -> CovarianceLimit {
        self.covariance_limit
    }

    fn cell(&self, index: &CellIndex<D>) -> Option<Cell<D>> {
        self.cells.lock().get(index).cloned()
    }

    fn cell_at(&self, point: &Point<f64, D>) -> Option<Cell<D>> {
        self.to_index(point).and_then(|index| self.cell(&index))
    }

    fn out_of_bounds(&self, index: CellIndex<D>) -> NdtError {
        NdtError::OutOfBounds {
            index: index.to_vec(),
            min: self.min_index.to_vec(),
            max: self.max_index.to_vec(),
        }
    }
}

impl DistributionGrid2 {
    /// Create a planar grid from an origin `(x, y, angle)`.
    ///
    /// `width` spans the grid's x axis and `height` its y axis.
    pub fn from_origin(
        origin_x: f64,
        origin_y: f64,
        origin_angle: f64,
        resolution: f64,
        height: f64,
        width: f64,
    ) -> Result<Self> {
        let origin = Isometry2::new(Vector2::new(origin_x, origin_y), origin_angle);
        Self::new(origin, resolution, Vector2::new(width, height))
    }
}
