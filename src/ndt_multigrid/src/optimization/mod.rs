//! Damped Newton-Raphson optimization for multi-grid NDT matching.
//!
//! Each evaluation scores the source cloud against the four overlapping
//! sub-grids, keeps the best one and either takes a damped Newton step or
//! rolls the pose back when the score dropped.

pub mod debug;
pub mod newton;
pub mod solver;
pub mod types;

pub use debug::IterationRecord;
pub use newton::{condition_number, damp_hessian, newton_step};
pub use solver::NdtOptimizer;
pub use types::{ConvergenceStatus, MatchResult, MatcherConfig};
