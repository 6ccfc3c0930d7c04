//! NDT optimization solver.
//!
//! Each evaluation runs these steps:
//! 1. Compute score, gradient and Hessian against all four sub-grids
//! 2. Keep the sub-grid with the highest score
//! 3. Reject the pose if that score dropped: roll back and double the damping
//! 4. Otherwise solve the damped Newton system and move the pose
//! 5. Stop once every step component is below its epsilon

use std::marker::PhantomData;

use nalgebra::{Isometry, SVector};
use tracing::{debug, trace, warn};

use super::debug::IterationRecord;
use super::newton::{damp_hessian, newton_step};
use super::types::{ConvergenceStatus, MatchResult, MatcherConfig};
use crate::derivatives::{compute_derivatives, AggregatedDerivatives, PoseModel};
use crate::multi_grid::{MultiGrid, OVERLAP_COUNT};
use crate::pointcloud::PointCloud;

/// Damped Newton optimizer over a [`MultiGrid`].
///
/// `M` maps poses to parameter vectors of length `P`.
#[derive(Debug, Clone)]
pub struct NdtOptimizer<M, const D: usize, const P: usize> {
    config: MatcherConfig,
    _model: PhantomData<M>,
}

impl<M, const D: usize, const P: usize> NdtOptimizer<M, D, P>
where
    M: PoseModel<D, P>,
{
    /// Create a new optimizer. The configuration is assumed valid.
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            config,
            _model: PhantomData,
        }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Align `source` to the reference stored in `grid`, starting at `prior`.
    pub fn align(
        &self,
        source: &PointCloud<D>,
        grid: &MultiGrid<M::Rotation, D>,
        prior: Isometry<f64, M::Rotation, D>,
    ) -> MatchResult<M::Rotation, D, P> {
        let mut params = M::to_params(&prior);
        let mut previous = params;
        let mut best_score = f64::NEG_INFINITY;
        let mut damping = self.config.damping;
        let mut rejected_steps = 0;
        let mut history = Vec::with_capacity(self.config.max_iterations);
        let mut status = ConvergenceStatus::MaxIterations;

        // Parameters, derivatives and sub-grid of the last accepted evaluation
        let mut accepted: Option<(SVector<f64, P>, AggregatedDerivatives<P>, usize)> = None;

        for iteration in 0..self.config.max_iterations {
            let derivatives = compute_derivatives::<M, D, P>(source, grid, &params);
            let (best_grid, best) = select_best(derivatives);

            let mut record = IterationRecord::new(iteration, &params);
            record.score = best.score;
            record.best_grid = best_grid;
            record.num_correspondences = best.num_correspondences;
            record.damping = damping;

            if iteration == 0 && best.num_correspondences == 0 {
                warn!(
                    points = source.valid_count(),
                    "no correspondences at the initial pose"
                );
                history.push(record);
                return MatchResult::no_correspondences(prior, damping, history);
            }

            if best.score < best_score {
                trace!(
                    iteration,
                    score = best.score,
                    best_score,
                    damping,
                    "rejected step"
                );
                params = previous;
                damping *= 2.0;
                rejected_steps += 1;
                history.push(record);
                continue;
            }

            best_score = best.score;
            let hessian = damp_hessian(&best.hessian, damping);
            let delta = newton_step(&best.gradient, &hessian, self.config.svd_tolerance);

            record.accepted = true;
            record.set_step(&delta);
            history.push(record);

            debug!(
                iteration,
                score = best.score,
                grid = best_grid,
                correspondences = best.num_correspondences,
                damping,
                step = delta.norm(),
                "accepted step"
            );

            accepted = Some((params, best, best_grid));
            previous = params;
            params += delta;

            if self.is_converged(&delta) {
                status = ConvergenceStatus::Converged;
                break;
            }
        }

        let iterations = history.len();
        let Some((params, derivatives, best_grid)) = accepted else {
            // Only reachable with a zero iteration cap.
            return MatchResult::no_correspondences(prior, damping, history);
        };

        if status.is_converged() {
            debug!(iterations, rejected_steps, score = derivatives.score, "converged");
        } else {
            debug!(
                iterations,
                rejected_steps,
                score = derivatives.score,
                "reached max iterations"
            );
        }

        MatchResult {
            transform: M::to_isometry(&params),
            status,
            score: derivatives.score,
            iterations,
            rejected_steps,
            damping,
            best_grid,
            num_correspondences: derivatives.num_correspondences,
            gradient: derivatives.gradient,
            hessian: derivatives.hessian,
            history,
        }
    }

    /// Every translation component below `trans_epsilon` and every angle
    /// component below `rot_epsilon`.
    fn is_converged(&self, delta: &SVector<f64, P>) -> bool {
        delta.iter().enumerate().all(|(i, d)| {
            let epsilon = if i < D {
                self.config.trans_epsilon
            } else {
                self.config.rot_epsilon
            };
            d.abs() < epsilon
        })
    }
}

/// Sub-grid with the highest score. Ties keep the lower index.
fn select_best<const P: usize>(
    derivatives: [AggregatedDerivatives<P>; OVERLAP_COUNT],
) -> (usize, AggregatedDerivatives<P>) {
    let mut best_index = 0;
    let mut best_score = f64::NEG_INFINITY;
    for (k, d) in derivatives.iter().enumerate() {
        if d.score > best_score {
            best_score = d.score;
            best_index = k;
        }
    }
    let best = derivatives
        .into_iter()
        .nth(best_index)
        .unwrap_or_default();
    (best_index, best)
}
