//! Point cloud container consumed by the grids and the matcher.
//!
//! A cloud is an ordered list of points with a parallel validity mask and
//! the axis-aligned bounds of its valid points. It is read-only once built.

use nalgebra::{Point, SVector};

use crate::error::{NdtError, Result};

/// Ordered point sequence with per-point validity flags.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud<const D: usize> {
    points: Vec<Point<f64, D>>,
    mask: Vec<bool>,
    min: Point<f64, D>,
    max: Point<f64, D>,
}

/// Planar point cloud.
pub type PointCloud2 = PointCloud<2>;
/// Spatial point cloud.
pub type PointCloud3 = PointCloud<3>;

impl<const D: usize> PointCloud<D> {
    /// Create a cloud where every finite point is valid.
    pub fn new(points: Vec<Point<f64, D>>) -> Self {
        let mask = vec![true; points.len()];
        Self::build(points, mask)
    }

    /// Create a cloud with an explicit validity mask.
    ///
    /// Points with non-finite coordinates are marked invalid regardless of
    /// the mask.
    pub fn with_mask(points: Vec<Point<f64, D>>, mask: Vec<bool>) -> Result<Self> {
        if points.len() != mask.len() {
            return Err(NdtError::MaskLengthMismatch {
                points: points.len(),
                mask: mask.len(),
            });
        }
        Ok(Self::build(points, mask))
    }

    /// Create a cloud from raw coordinate arrays.
    pub fn from_arrays(points: &[[f64; D]]) -> Self {
        Self::new(points.iter().map(|p| Point::from(*p)).collect())
    }

    fn build(points: Vec<Point<f64, D>>, mut mask: Vec<bool>) -> Self {
        let mut min = SVector::<f64, D>::repeat(f64::INFINITY);
        let mut max = SVector::<f64, D>::repeat(f64::NEG_INFINITY);
        let mut any_valid = false;

        for (point, valid) in points.iter().zip(mask.iter_mut()) {
            if !point.coords.iter().all(|c| c.is_finite()) {
                *valid = false;
            }
            if *valid {
                min = min.inf(&point.coords);
                max = max.sup(&point.coords);
                any_valid = true;
            }
        }

        if !any_valid {
            min = SVector::zeros();
            max = SVector::zeros();
        }

        Self {
            points,
            mask,
            min: Point::from(min),
            max: Point::from(max),
        }
    }

    /// Number of points, valid or not.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the cloud holds no points at all.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All points in insertion order.
    pub fn points(&self) -> &[Point<f64, D>] {
        &self.points
    }

    /// Validity flags, parallel to [`points`](Self::points).
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Whether the point at `index` is valid.
    pub fn is_valid(&self, index: usize) -> bool {
        self.mask.get(index).copied().unwrap_or(false)
    }

    /// Iterate over valid points only.
    pub fn valid_points(&self) -> impl Iterator<Item = &Point<f64, D>> + '_ {
        self.points
            .iter()
            .zip(&self.mask)
            .filter_map(|(point, &valid)| valid.then_some(point))
    }

    /// Number of valid points.
    pub fn valid_count(&self) -> usize {
        self.mask.iter().filter(|&&valid| valid).count()
    }

    /// Component-wise minimum over valid points.
    pub fn min(&self) -> &Point<f64, D> {
        &self.min
    }

    /// Component-wise maximum over valid points.
    pub fn max(&self) -> &Point<f64, D> {
        &self.max
    }

    /// Extent of the bounding box (`max - min`).
    pub fn range(&self) -> SVector<f64, D> {
        self.max - self.min
    }
}

impl<const D: usize> FromIterator<Point<f64, D>> for PointCloud<D> {
    fn from_iter<I: IntoIterator<Item = Point<f64, D>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
