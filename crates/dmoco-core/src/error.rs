//! Error types for volume and transform-table operations.

use thiserror::Error;

/// Errors raised by the data model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A selection of volumes was empty where at least one is required.
    #[error("empty volume selection: {0}")]
    EmptySelection(String),

    /// An acquisition index outside the series.
    #[error("acquisition index {index} out of range for series of {len} volumes")]
    IndexOutOfRange { index: usize, len: usize },

    /// Shapes that must agree do not.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A transform-table key was written twice.
    #[error("transform table already holds an entry for acquisition {0}")]
    DuplicateEntry(usize),

    /// Geometry cannot be inverted (zero spacing or singular direction).
    #[error("degenerate voxel geometry: {0}")]
    DegenerateGeometry(String),

    /// A filter parameter outside its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Tensor data could not be read back from the backend.
    #[error("tensor data error: {0}")]
    TensorData(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn empty_selection(msg: impl Into<String>) -> Self {
        Self::EmptySelection(msg.into())
    }

    pub fn degenerate_geometry(msg: impl Into<String>) -> Self {
        Self::DegenerateGeometry(msg.into())
    }

    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub fn tensor_data(msg: impl Into<String>) -> Self {
        Self::TensorData(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::IndexOutOfRange { index: 7, len: 5 };
        assert_eq!(
            err.to_string(),
            "acquisition index 7 out of range for series of 5 volumes"
        );
    }

    #[test]
    fn test_shape_mismatch() {
        let err = CoreError::ShapeMismatch {
            expected: vec![4, 8, 8],
            actual: vec![4, 8, 6],
        };
        let msg = err.to_string();
        assert!(msg.contains("expected"));
        assert!(msg.contains("got"));
    }
}
