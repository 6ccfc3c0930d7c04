//! Per-cell Gaussian statistics.
//!
//! A [`DistributionAccumulator`] is the mutable, incrementally updated state
//! of one grid cell. A [`Distribution`] is the detached snapshot handed out
//! to readers: mean, covariance, inverse covariance and determinant.

pub mod accumulator;
pub mod types;

pub use accumulator::DistributionAccumulator;
pub use types::{CovarianceLimit, Distribution, MIN_SAMPLES};
