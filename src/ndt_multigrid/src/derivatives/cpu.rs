//! Per-point NDT derivatives and their aggregation over a source cloud.

use nalgebra::{Point, SMatrix, SVector};

use super::angular::PoseModel;
use super::types::{AggregatedDerivatives, DerivativeResult};
use crate::distribution::{Distribution, MIN_SAMPLES};
use crate::multi_grid::{MultiGrid, OVERLAP_COUNT};
use crate::pointcloud::PointCloud;

/// Contribution of one transformed point to one cell.
///
/// With `s, q` the unnormalized density and mean offset of `point`,
/// `J = [I | ∂R/∂θ_k · q]` and `a = Jᵀ Σ⁻¹ q`:
///
/// - score `s`
/// - gradient `-s · a`
/// - Hessian `s · (Jᵀ Σ⁻¹ J - a aᵀ)`, plus
///   `s · qᵀ Σ⁻¹ (∂²R/∂θ_k∂θ_l · q)` on the angular block
///
/// Returns `None` if the cell has fewer than [`MIN_SAMPLES`] points or a
/// singular covariance.
pub fn compute_point_derivatives<M, const D: usize, const P: usize>(
    model: &M,
    distribution: &Distribution<D>,
    point: &Point<f64, D>,
) -> Option<DerivativeResult<P>>
where
    M: PoseModel<D, P>,
{
    if distribution.point_count < MIN_SAMPLES {
        return None;
    }
    let inv_covariance = distribution.inv_covariance?;

    let (s, q) = distribution.sample_non_normalized(point);
    let q_inv = inv_covariance * q;

    let mut jacobian = SMatrix::<f64, D, P>::zeros();
    for i in 0..D {
        jacobian[(i, i)] = 1.0;
    }
    for k in 0..P - D {
        jacobian.set_column(D + k, &(model.rotation_jacobian(k) * q));
    }

    let a: SVector<f64, P> = jacobian.transpose() * q_inv;
    let mut hessian = jacobian.transpose() * inv_covariance * jacobian - a * a.transpose();
    for k in 0..P - D {
        for l in 0..P - D {
            hessian[(D + k, D + l)] += q_inv.dot(&(model.rotation_hessian(k, l) * q));
        }
    }

    Some(DerivativeResult {
        score: s,
        gradient: -a * s,
        hessian: hessian * s,
    })
}

/// Score, gradient and Hessian of `source` at pose `params`, one set per
/// sub-grid of `grid`.
pub fn compute_derivatives<M, const D: usize, const P: usize>(
    source: &PointCloud<D>,
    grid: &MultiGrid<M::Rotation, D>,
    params: &SVector<f64, P>,
) -> [AggregatedDerivatives<P>; OVERLAP_COUNT]
where
    M: PoseModel<D, P>,
{
    let model = M::at(params);
    let transform = M::to_isometry(params);
    let mut result: [AggregatedDerivatives<P>; OVERLAP_COUNT] =
        std::array::from_fn(|_| AggregatedDerivatives::zeros());

    for source_point in source.valid_points() {
        let transformed = transform.transform_point(source_point);

        for (aggregate, cell) in result.iter_mut().zip(grid.get(&transformed)) {
            let Some(distribution) = cell else {
                continue;
            };
            if let Some(contribution) =
                compute_point_derivatives(&model, &distribution, &transformed)
            {
                aggregate.add(&contribution);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivatives::{PlanarDerivatives, SpatialDerivatives};
    use crate::distribution::CovarianceLimit;
    use crate::multi_grid::MultiGrid2;
    use crate::test_utils::make_planar_blobs;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix2, Matrix3, Point2, Point3, Vector2, Vector3};

    fn planar_distribution() -> Distribution<2> {
        let covariance = Matrix2::new(0.3, 0.05, 0.05, 0.2);
        Distribution::from_moments(
            10,
            Vector2::new(1.0, 2.0),
            &(covariance * 9.0),
            CovarianceLimit::Unlimited,
        )
    }

    #[test]
    fn test_planar_closed_form() {
        let dist = planar_distribution();
        let phi: f64 = 0.35;
        let point = Point2::new(1.2, 1.85);
        let model = PlanarDerivatives::new(phi);

        let result = compute_point_derivatives::<_, 2, 3>(&model, &dist, &point).unwrap();

        // Reference: expanded 2-D formulas
        let inv = dist.inv_covariance.unwrap();
        let (s, q) = dist.sample_non_normalized(&point);
        let (sin, cos) = phi.sin_cos();
        let qi = inv * q;
        let jac = Vector2::new(-q.x * sin - q.y * cos, q.x * cos - q.y * sin);
        let hes = Vector2::new(-q.x * cos + q.y * sin, -q.x * sin - q.y * cos);
        let g_dot = qi.dot(&jac);

        assert_relative_eq!(result.score, s);
        assert_relative_eq!(result.gradient[0], -s * qi.x, epsilon = 1e-12);
        assert_relative_eq!(result.gradient[1], -s * qi.y, epsilon = 1e-12);
        assert_relative_eq!(result.gradient[2], -s * g_dot, epsilon = 1e-12);

        let h = &result.hessian;
        assert_relative_eq!(h[(0, 0)], s * (-qi.x * qi.x + inv[(0, 0)]), epsilon = 1e-12);
        assert_relative_eq!(h[(1, 0)], s * (-qi.y * qi.x + inv[(1, 0)]), epsilon = 1e-12);
        assert_relative_eq!(h[(1, 1)], s * (-qi.y * qi.y + inv[(1, 1)]), epsilon = 1e-12);
        assert_relative_eq!(
            h[(2, 0)],
            s * (-g_dot * qi.x + inv.row(0).dot(&jac.transpose())),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            h[(2, 1)],
            s * (-g_dot * qi.y + inv.row(1).dot(&jac.transpose())),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            h[(2, 2)],
            s * (-g_dot * g_dot + qi.dot(&hes) + jac.dot(&(inv * jac))),
            epsilon = 1e-12
        );
        assert_relative_eq!(*h, h.transpose(), epsilon = 1e-12);
    }

    #[test]
    fn test_translation_block_matches_finite_difference() {
        let dist = planar_distribution();
        let point = Point2::new(1.3, 1.7);
        let model = PlanarDerivatives::new(0.0);
        let step = 1e-6;

        let eval = |offset: Vector2<f64>| {
            compute_point_derivatives::<_, 2, 3>(&model, &dist, &(point + offset)).unwrap()
        };
        let center = eval(Vector2::zeros());

        for i in 0..2 {
            let mut e = Vector2::zeros();
            e[i] = step;
            let plus = eval(e);
            let minus = eval(-e);

            let score_slope = (plus.score - minus.score) / (2.0 * step);
            assert_relative_eq!(center.gradient[i], score_slope, epsilon = 1e-7);

            for j in 0..2 {
                let gradient_slope = (plus.gradient[j] - minus.gradient[j]) / (2.0 * step);
                assert_relative_eq!(center.hessian[(i, j)], -gradient_slope, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_degenerate_cells_are_skipped() {
        let model = PlanarDerivatives::new(0.0);
        let sparse = Distribution::from_moments(
            2,
            Vector2::zeros(),
            &Matrix2::identity(),
            CovarianceLimit::Unlimited,
        );
        let flat = Distribution::from_moments(
            5,
            Vector2::zeros(),
            &Matrix2::new(1.0, 0.0, 0.0, 0.0),
            CovarianceLimit::Unlimited,
        );
        let point = Point2::new(0.1, 0.0);

        assert!(compute_point_derivatives::<_, 2, 3>(&model, &sparse, &point).is_none());
        assert!(compute_point_derivatives::<_, 2, 3>(&model, &flat, &point).is_none());
    }

    #[test]
    fn test_spatial_hessian_is_symmetric() {
        let dist = Distribution::from_moments(
            8,
            Vector3::new(0.5, 0.5, 0.5),
            &(Matrix3::new(0.04, 0.01, 0.0, 0.01, 0.03, 0.005, 0.0, 0.005, 0.02) * 7.0),
            CovarianceLimit::Unlimited,
        );
        let model = SpatialDerivatives::new(0.1, -0.2, 0.3);

        let result =
            compute_point_derivatives::<_, 3, 6>(&model, &dist, &Point3::new(0.55, 0.45, 0.52))
                .unwrap();

        assert!(result.score > 0.0 && result.score <= 1.0);
        assert_relative_eq!(result.hessian, result.hessian.transpose(), epsilon = 1e-10);
    }

    #[test]
    fn test_aggregate_over_cloud() {
        let cloud = make_planar_blobs(21);
        let grid =
            MultiGrid2::from_cloud(&cloud, Vector2::new(1.0, 1.0), CovarianceLimit::Unlimited)
                .unwrap();

        let derivatives =
            compute_derivatives::<PlanarDerivatives, 2, 3>(&cloud, &grid, &Vector3::zeros());

        for aggregate in &derivatives {
            assert!(aggregate.num_correspondences > 0);
            assert!(aggregate.score > 0.0);
            assert!(aggregate.score <= aggregate.num_correspondences as f64);
        }

        // Far away pose: nothing matches
        let far = compute_derivatives::<PlanarDerivatives, 2, 3>(
            &cloud,
            &grid,
            &Vector3::new(100.0, 100.0, 0.0),
        );
        assert!(far.iter().all(|a| a.num_correspondences == 0 && a.score == 0.0));
    }
}
