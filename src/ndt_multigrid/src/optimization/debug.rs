//! Per-iteration records of the matcher loop.

use nalgebra::SVector;
use serde::{Deserialize, Serialize};

/// State captured at one evaluation of the matcher loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// Evaluation number (0-indexed).
    pub iteration: usize,

    /// Pose parameters that were evaluated.
    pub params: Vec<f64>,

    /// Best sub-grid score at `params`.
    pub score: f64,

    /// Index of the best sub-grid.
    pub best_grid: usize,

    /// Number of point-cell pairs in the best sub-grid.
    pub num_correspondences: usize,

    /// Damping factor used for this evaluation.
    pub damping: f64,

    /// Whether the score was at least the previous best.
    pub accepted: bool,

    /// Newton step taken after this evaluation (empty when rejected).
    pub step: Vec<f64>,
}

impl IterationRecord {
    /// Create a record for an evaluation at `params`.
    pub fn new<const P: usize>(iteration: usize, params: &SVector<f64, P>) -> Self {
        Self {
            iteration,
            params: params.iter().copied().collect(),
            score: 0.0,
            best_grid: 0,
            num_correspondences: 0,
            damping: 0.0,
            accepted: false,
            step: Vec::new(),
        }
    }

    /// Set the Newton step from a parameter vector.
    pub fn set_step<const P: usize>(&mut self, step: &SVector<f64, P>) {
        self.step = step.iter().copied().collect();
    }

    /// Format as a compact log line.
    pub fn to_log_line(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|v| format!("{v:.6}")).collect();
        format!(
            "iter={} params=[{}] score={:.6} grid={} corr={} lambda={} accepted={}",
            self.iteration,
            params.join(","),
            self.score,
            self.best_grid,
            self.num_correspondences,
            self.damping,
            self.accepted,
        )
    }
}
