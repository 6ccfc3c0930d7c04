//! Synthetic point clouds for tests.
//!
//! Clouds are built from seeded Gaussian blobs so every run sees the same
//! points. Blob spreads stay well below half a cell at resolution 1.0, so a
//! blob lands whole in at least one of the overlapping sub-grids.

use nalgebra::{AbstractRotation, Isometry, Point, Point2};
use rand::prelude::*;
use rand_distr::Normal;

use crate::pointcloud::{PointCloud, PointCloud2, PointCloud3};

/// Default per-axis standard deviation of a blob.
pub const BLOB_SPREAD: f64 = 0.12;

/// Default number of points per blob.
pub const POINTS_PER_BLOB: usize = 40;

/// Irregular planar layout; no two blobs share a row or a column spacing.
pub const PLANAR_CENTERS: [[f64; 2]; 7] = [
    [0.5, 0.5],
    [2.4, 0.6],
    [4.6, 1.4],
    [1.5, 2.5],
    [3.6, 3.5],
    [0.6, 4.4],
    [2.5, 5.5],
];

/// Spatial layout; all blobs share z so the cloud has a thin z range.
pub const SPATIAL_CENTERS: [[f64; 3]; 6] = [
    [0.5, 0.5, 0.5],
    [2.4, 0.6, 0.5],
    [4.6, 1.4, 0.5],
    [1.5, 2.5, 0.5],
    [3.6, 3.5, 0.5],
    [0.6, 4.4, 0.5],
];

/// Gaussian blobs around `centers` with per-axis `spread`.
pub fn make_blob_cloud<const D: usize>(
    centers: &[[f64; D]],
    points_per_blob: usize,
    spread: f64,
    seed: u64,
) -> PointCloud<D> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, spread).unwrap();

    let mut points = Vec::with_capacity(centers.len() * points_per_blob);
    for center in centers {
        for _ in 0..points_per_blob {
            let mut p = *center;
            for c in p.iter_mut() {
                *c += noise.sample(&mut rng);
            }
            points.push(Point::from(p));
        }
    }
    PointCloud::new(points)
}

/// Planar blob cloud with default layout.
pub fn make_planar_blobs(seed: u64) -> PointCloud2 {
    make_blob_cloud(&PLANAR_CENTERS, POINTS_PER_BLOB, BLOB_SPREAD, seed)
}

/// Spatial blob cloud with default layout.
pub fn make_spatial_blobs(seed: u64) -> PointCloud3 {
    make_blob_cloud(&SPATIAL_CENTERS, POINTS_PER_BLOB, BLOB_SPREAD, seed)
}

/// Regular lattice covering `[0, length]²` with spacing `interval`.
pub fn make_planar_lattice(length: f64, interval: f64) -> PointCloud2 {
    let n = (length / interval) as usize + 1;
    let mut points = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            points.push(Point2::new(interval * j as f64, interval * i as f64));
        }
    }
    PointCloud::new(points)
}

/// Apply `transform` to every point, keeping the validity mask.
pub fn transform_cloud<R, const D: usize>(
    cloud: &PointCloud<D>,
    transform: &Isometry<f64, R, D>,
) -> PointCloud<D>
where
    R: AbstractRotation<f64, D>,
{
    let points = cloud
        .points()
        .iter()
        .map(|p| transform.transform_point(p))
        .collect();
    PointCloud::with_mask(points, cloud.mask().to_vec()).unwrap()
}
