//! Pose parameterizations and rotation derivatives.
//!
//! A pose is a parameter vector of `P` values: `D` translation components
//! followed by `P - D` rotation angles. Each [`PoseModel`] precomputes, for a
//! given parameter vector, the first and second derivatives of its rotation
//! matrix with respect to the angles. The NDT derivative code applies these
//! matrices to a point's offset from the cell mean.

use nalgebra::{
    AbstractRotation, Isometry, Isometry2, Isometry3, Matrix2, Matrix3, SMatrix, SVector,
    Translation3, UnitComplex, UnitQuaternion, Vector2, Vector3, Vector6,
};

/// Threshold for treating angles as zero (avoids numerical issues).
const ANGLE_EPSILON: f64 = 1e-5;

/// Sine and cosine with small angle approximation.
fn sin_cos(angle: f64) -> (f64, f64) {
    if angle.abs() < ANGLE_EPSILON {
        (0.0, 1.0)
    } else {
        angle.sin_cos()
    }
}

/// Mapping between rigid transforms and optimization parameters.
pub trait PoseModel<const D: usize, const P: usize>: Sized {
    /// Rotation type of the transforms this model produces.
    type Rotation: AbstractRotation<f64, D> + Copy + Send + Sync + std::fmt::Debug;

    /// Parameter vector of `transform`.
    fn to_params(transform: &Isometry<f64, Self::Rotation, D>) -> SVector<f64, P>;

    /// Transform described by `params`.
    fn to_isometry(params: &SVector<f64, P>) -> Isometry<f64, Self::Rotation, D>;

    /// Precompute rotation derivatives at `params`.
    fn at(params: &SVector<f64, P>) -> Self;

    /// `∂R/∂θ_k` for angle `k` in `0..P - D`.
    fn rotation_jacobian(&self, k: usize) -> &SMatrix<f64, D, D>;

    /// `∂²R/∂θ_k∂θ_l` for angles `k, l` in `0..P - D`.
    fn rotation_hessian(&self, k: usize, l: usize) -> &SMatrix<f64, D, D>;
}

/// Planar pose `(tx, ty, phi)`.
#[derive(Debug, Clone)]
pub struct PlanarDerivatives {
    jacobian: Matrix2<f64>,
    hessian: Matrix2<f64>,
}

impl PlanarDerivatives {
    /// Derivatives of the rotation by `phi`.
    pub fn new(phi: f64) -> Self {
        let (s, c) = sin_cos(phi);
        Self {
            jacobian: Matrix2::new(-s, -c, c, -s),
            hessian: Matrix2::new(-c, s, -s, -c),
        }
    }
}

impl PoseModel<2, 3> for PlanarDerivatives {
    type Rotation = UnitComplex<f64>;

    fn to_params(transform: &Isometry2<f64>) -> SVector<f64, 3> {
        let t = transform.translation.vector;
        SVector::<f64, 3>::new(t.x, t.y, transform.rotation.angle())
    }

    fn to_isometry(params: &SVector<f64, 3>) -> Isometry2<f64> {
        Isometry2::new(Vector2::new(params[0], params[1]), params[2])
    }

    fn at(params: &SVector<f64, 3>) -> Self {
        Self::new(params[2])
    }

    fn rotation_jacobian(&self, _k: usize) -> &Matrix2<f64> {
        &self.jacobian
    }

    fn rotation_hessian(&self, _k: usize, _l: usize) -> &Matrix2<f64> {
        &self.hessian
    }
}

/// Spatial pose `(tx, ty, tz, roll, pitch, yaw)` with `R = Rz(yaw)·Ry(pitch)·Rx(roll)`.
#[derive(Debug, Clone)]
pub struct SpatialDerivatives {
    /// `∂R/∂roll`, `∂R/∂pitch`, `∂R/∂yaw`.
    jacobian: [Matrix3<f64>; 3],
    /// Second derivatives, symmetric in the two angle indices.
    hessian: [[Matrix3<f64>; 3]; 3],
}

impl SpatialDerivatives {
    /// Derivatives of the rotation by Euler angles (roll, pitch, yaw).
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        let (sx, cx) = sin_cos(roll);
        let (sy, cy) = sin_cos(pitch);
        let (sz, cz) = sin_cos(yaw);

        // Elementary rotations and their first two derivatives
        let rx = [
            Matrix3::new(1.0, 0.0, 0.0, 0.0, cx, -sx, 0.0, sx, cx),
            Matrix3::new(0.0, 0.0, 0.0, 0.0, -sx, -cx, 0.0, cx, -sx),
            Matrix3::new(0.0, 0.0, 0.0, 0.0, -cx, sx, 0.0, -sx, -cx),
        ];
        let ry = [
            Matrix3::new(cy, 0.0, sy, 0.0, 1.0, 0.0, -sy, 0.0, cy),
            Matrix3::new(-sy, 0.0, cy, 0.0, 0.0, 0.0, -cy, 0.0, -sy),
            Matrix3::new(-cy, 0.0, -sy, 0.0, 0.0, 0.0, sy, 0.0, -cy),
        ];
        let rz = [
            Matrix3::new(cz, -sz, 0.0, sz, cz, 0.0, 0.0, 0.0, 1.0),
            Matrix3::new(-sz, -cz, 0.0, cz, -sz, 0.0, 0.0, 0.0, 0.0),
            Matrix3::new(-cz, sz, 0.0, -sz, -cz, 0.0, 0.0, 0.0, 0.0),
        ];

        // Derivative order per elementary rotation for d/dθ_k d/dθ_l
        let product = |orders: [usize; 3]| rz[orders[2]] * ry[orders[1]] * rx[orders[0]];
        let order = |angles: &[usize]| {
            let mut orders = [0; 3];
            for &a in angles {
                orders[a] += 1;
            }
            orders
        };

        let jacobian = [
            product(order(&[0])),
            product(order(&[1])),
            product(order(&[2])),
        ];

        let mut hessian = [[Matrix3::zeros(); 3]; 3];
        for k in 0..3 {
            for l in k..3 {
                let h = product(order(&[k, l]));
                hessian[k][l] = h;
                hessian[l][k] = h;
            }
        }

        Self { jacobian, hessian }
    }
}

impl PoseModel<3, 6> for SpatialDerivatives {
    type Rotation = UnitQuaternion<f64>;

    fn to_params(transform: &Isometry3<f64>) -> SVector<f64, 6> {
        let t = transform.translation.vector;
        let (roll, pitch, yaw) = transform.rotation.euler_angles();
        Vector6::new(t.x, t.y, t.z, roll, pitch, yaw)
    }

    fn to_isometry(params: &SVector<f64, 6>) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::from(Vector3::new(params[0], params[1], params[2])),
            UnitQuaternion::from_euler_angles(params[3], params[4], params[5]),
        )
    }

    fn at(params: &SVector<f64, 6>) -> Self {
        Self::new(params[3], params[4], params[5])
    }

    fn rotation_jacobian(&self, k: usize) -> &Matrix3<f64> {
        &self.jacobian[k]
    }

    fn rotation_hessian(&self, k: usize, l: usize) -> &Matrix3<f64> {
        &self.hessian[k][l]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Rotation2;

    const STEP: f64 = 1e-6;

    fn spatial_rotation(angles: [f64; 3]) -> Matrix3<f64> {
        UnitQuaternion::from_euler_angles(angles[0], angles[1], angles[2])
            .to_rotation_matrix()
            .into_inner()
    }

    #[test]
    fn test_planar_derivatives_match_rotation() {
        let phi = 0.4;
        let d = PlanarDerivatives::new(phi);

        let rot = |a: f64| Rotation2::new(a).into_inner();
        let numeric = (rot(phi + STEP) - rot(phi - STEP)) / (2.0 * STEP);
        assert_relative_eq!(*d.rotation_jacobian(0), numeric, epsilon = 1e-8);

        // Second derivative of a rotation is its negation
        assert_relative_eq!(*d.rotation_hessian(0, 0), -rot(phi), epsilon = 1e-12);
    }

    #[test]
    fn test_spatial_jacobian_matches_finite_difference() {
        let angles = [0.3, -0.2, 0.7];
        let d = SpatialDerivatives::new(angles[0], angles[1], angles[2]);

        for k in 0..3 {
            let mut plus = angles;
            let mut minus = angles;
            plus[k] += STEP;
            minus[k] -= STEP;
            let numeric = (spatial_rotation(plus) - spatial_rotation(minus)) / (2.0 * STEP);
            assert_relative_eq!(*d.rotation_jacobian(k), numeric, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_spatial_hessian_matches_finite_difference() {
        let angles = [-0.5, 0.25, 1.1];
        let d = SpatialDerivatives::new(angles[0], angles[1], angles[2]);

        for k in 0..3 {
            for l in 0..3 {
                let mut plus = angles;
                let mut minus = angles;
                plus[l] += STEP;
                minus[l] -= STEP;
                let d_plus = SpatialDerivatives::new(plus[0], plus[1], plus[2]);
                let d_minus = SpatialDerivatives::new(minus[0], minus[1], minus[2]);
                let numeric =
                    (d_plus.rotation_jacobian(k) - d_minus.rotation_jacobian(k)) / (2.0 * STEP);
                assert_relative_eq!(*d.rotation_hessian(k, l), numeric, epsilon = 1e-7);
            }
        }
    }

    #[test]
    fn test_small_angles_use_identity() {
        let d = SpatialDerivatives::new(1e-7, 0.0, -1e-8);
        assert_relative_eq!(
            *d.rotation_jacobian(2),
            Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0)
        );
    }

    #[test]
    fn test_params_describe_transform() {
        let params = Vector6::new(1.0, -2.0, 0.5, 0.1, -0.3, 2.0);
        let iso = SpatialDerivatives::to_isometry(&params);
        assert_relative_eq!(SpatialDerivatives::to_params(&iso), params, epsilon = 1e-12);

        let planar = PlanarDerivatives::to_isometry(&SVector::<f64, 3>::new(0.5, 0.25, -1.0));
        assert_relative_eq!(planar.rotation.angle(), -1.0, epsilon = 1e-12);
        assert_relative_eq!(planar.translation.vector, Vector2::new(0.5, 0.25));
    }
}
