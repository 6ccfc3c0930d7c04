//! Type definitions for NDT optimization.

use nalgebra::{AbstractRotation, Isometry, SMatrix, SVector};
use serde::{Deserialize, Serialize};

use super::debug::IterationRecord;
use crate::distribution::CovarianceLimit;
use crate::error::{NdtError, Result};

/// Configuration for multi-grid NDT matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Cell size, either one value for every axis or one value per axis.
    pub resolution: Vec<f64>,

    /// Maximum number of evaluations, rejected steps included.
    pub max_iterations: usize,

    /// Convergence threshold for each translation component of the step.
    pub trans_epsilon: f64,

    /// Convergence threshold for each angle component of the step.
    pub rot_epsilon: f64,

    /// Initial diagonal loading factor λ. Doubled on every rejected step.
    pub damping: f64,

    /// Covariance policy of the reference grid cells.
    pub covariance_limit: CovarianceLimit,

    /// Relative singular value cutoff of the Newton solve.
    pub svd_tolerance: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            resolution: vec![1.0],
            max_iterations: 100,
            trans_epsilon: 1e-3,
            rot_epsilon: 1e-3,
            damping: 2.0,
            covariance_limit: CovarianceLimit::Unlimited,
            svd_tolerance: 1e-12,
        }
    }
}

impl MatcherConfig {
    /// Create a new configuration with custom resolution.
    pub fn with_resolution(resolution: f64) -> Self {
        Self {
            resolution: vec![resolution],
            ..Default::default()
        }
    }

    /// Per-axis resolution for a `D`-dimensional grid.
    pub fn resolution_vector<const D: usize>(&self) -> Result<SVector<f64, D>> {
        let resolution: SVector<f64, D> = match self.resolution.as_slice() {
            [r] => SVector::repeat(*r),
            values if values.len() == D => SVector::from_column_slice(values),
            values => {
                return Err(NdtError::InvalidConfig(format!(
                    "expected 1 or {D} resolution values, got {}",
                    values.len()
                )))
            }
        };

        for (axis, &r) in resolution.iter().enumerate() {
            if !(r.is_finite() && r > 0.0) {
                return Err(NdtError::InvalidResolution {
                    axis,
                    resolution: r,
                });
            }
        }
        Ok(resolution)
    }

    /// Check every option for a `D`-dimensional matcher.
    pub fn validate<const D: usize>(&self) -> Result<()> {
        self.resolution_vector::<D>()?;

        if self.max_iterations == 0 {
            return Err(NdtError::InvalidConfig(
                "max_iterations must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("trans_epsilon", self.trans_epsilon),
            ("rot_epsilon", self.rot_epsilon),
            ("svd_tolerance", self.svd_tolerance),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(NdtError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if !(self.damping.is_finite() && self.damping >= 0.0) {
            return Err(NdtError::InvalidConfig(format!(
                "damping must be finite and non-negative, got {}",
                self.damping
            )));
        }
        if let CovarianceLimit::EigenvalueFloor { ratio } = self.covariance_limit {
            if !(ratio > 0.0 && ratio < 1.0) {
                return Err(NdtError::InvalidConfig(format!(
                    "eigenvalue floor ratio must be in (0, 1), got {ratio}"
                )));
            }
        }
        Ok(())
    }
}

/// Status of NDT optimization convergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceStatus {
    /// Converged: every step component below its threshold.
    Converged,

    /// Reached maximum iterations without convergence.
    MaxIterations,

    /// The source cloud does not overlap any usable cell at the prior.
    NoCorrespondences,
}

impl ConvergenceStatus {
    /// Check if the optimization converged successfully.
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceStatus::Converged)
    }

    /// Check if the result is usable (converged or max iterations).
    pub fn is_usable(&self) -> bool {
        matches!(
            self,
            ConvergenceStatus::Converged | ConvergenceStatus::MaxIterations
        )
    }
}

/// Result of a multi-grid NDT match.
#[derive(Debug, Clone)]
pub struct MatchResult<R, const D: usize, const P: usize> {
    /// Transform mapping the source cloud onto the reference cloud.
    /// This is the last pose whose evaluation was accepted.
    pub transform: Isometry<f64, R, D>,

    /// Convergence status.
    pub status: ConvergenceStatus,

    /// Summed unnormalized density of the best sub-grid at `transform`.
    pub score: f64,

    /// Number of evaluations performed, rejected ones included.
    pub iterations: usize,

    /// Number of rejected steps.
    pub rejected_steps: usize,

    /// Damping factor when the loop ended.
    pub damping: f64,

    /// Index of the sub-grid that scored best at `transform`.
    pub best_grid: usize,

    /// Number of point-cell pairs in the best sub-grid at `transform`.
    pub num_correspondences: usize,

    /// Score gradient at `transform`.
    pub gradient: SVector<f64, P>,

    /// Negated score Hessian at `transform`, before damping.
    pub hessian: SMatrix<f64, P, P>,

    /// One record per evaluation.
    pub history: Vec<IterationRecord>,
}

impl<R, const D: usize, const P: usize> MatchResult<R, D, P>
where
    R: AbstractRotation<f64, D>,
{
    /// Create a result indicating no correspondences were found.
    pub fn no_correspondences(
        prior: Isometry<f64, R, D>,
        damping: f64,
        history: Vec<IterationRecord>,
    ) -> Self {
        Self {
            transform: prior,
            status: ConvergenceStatus::NoCorrespondences,
            score: 0.0,
            iterations: history.len(),
            rejected_steps: 0,
            damping,
            best_grid: 0,
            num_correspondences: 0,
            gradient: SVector::zeros(),
            hessian: SMatrix::zeros(),
            history,
        }
    }

    /// Scores of accepted evaluations, in order.
    pub fn accepted_scores(&self) -> Vec<f64> {
        self.history
            .iter()
            .filter(|record| record.accepted)
            .map(|record| record.score)
            .collect()
    }
}
