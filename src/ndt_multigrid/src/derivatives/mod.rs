//! NDT score derivatives.
//!
//! For a transformed source point `p` falling into a cell with mean `μ` and
//! inverse covariance `Σ⁻¹`, the unnormalized score is
//! `s = exp(-½ qᵀΣ⁻¹q)` with `q = p - μ`. Rotation derivatives are applied
//! to `q`, so each cell behaves as if rotating about its own mean.
//!
//! The pose is `(tx, ty, phi)` in 2-D and `(tx, ty, tz, roll, pitch, yaw)`
//! in 3-D; see [`PoseModel`].

pub mod angular;
pub mod cpu;
pub mod types;

pub use angular::{PlanarDerivatives, PoseModel, SpatialDerivatives};
pub use cpu::{compute_derivatives, compute_point_derivatives};
pub use types::{AggregatedDerivatives, DerivativeResult};
