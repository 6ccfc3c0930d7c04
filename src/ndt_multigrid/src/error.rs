//! Error types for grid construction and scan matching.

use thiserror::Error;

/// Errors reported synchronously by grid construction and matching.
///
/// Degenerate numerics (near-singular Hessians, sparse cells) are handled
/// locally and never surface here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NdtError {
    /// A point cloud's bounding range is zero or negative along an axis.
    #[error("point cloud boundaries are not set properly: range {range} along axis {axis}")]
    InvalidRange { axis: usize, range: f64 },

    /// Grid resolution is zero, negative or non-finite.
    #[error("resolution along axis {axis} must be positive and finite, got {resolution}")]
    InvalidResolution { axis: usize, resolution: f64 },

    /// Grid extent (width, height, ...) is zero, negative or non-finite.
    #[error("grid extent along axis {axis} must be positive and finite, got {extent}")]
    InvalidExtent { axis: usize, extent: f64 },

    /// A point maps to a cell outside the grid's fixed index range.
    #[error("cell index {index:?} lies outside the grid range {min:?}..={max:?}")]
    OutOfBounds {
        index: Vec<i32>,
        min: Vec<i32>,
        max: Vec<i32>,
    },

    /// A point with NaN or infinite coordinates was inserted.
    #[error("cannot insert a point with non-finite coordinates")]
    NonFinitePoint,

    /// Validity mask does not match the number of points.
    #[error("point cloud has {points} points but {mask} validity flags")]
    MaskLengthMismatch { points: usize, mask: usize },

    /// Matcher configuration rejected at construction.
    #[error("invalid matcher configuration: {0}")]
    InvalidConfig(String),
}

/// Result alias used throughout the crate.
pub type Result<T, E = NdtError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = NdtError::InvalidRange {
            axis: 1,
            range: 0.0,
        };
        assert!(err.to_string().contains("axis 1"));

        let err = NdtError::OutOfBounds {
            index: vec![11, 2],
            min: vec![0, 0],
            max: vec![10, 10],
        };
        assert_eq!(
            err.to_string(),
            "cell index [11, 2] lies outside the grid range [0, 0]..=[10, 10]"
        );
    }
}
