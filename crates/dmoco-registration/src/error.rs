//! Error types for registration operations.

use dmoco_core::CoreError;
use thiserror::Error;

/// Main error type for registration operations.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// Transform estimation could not produce a result.
    #[error("Estimation failed: {0}")]
    EstimationFailed(String),

    /// Resampling a series through a transform table failed.
    #[error("Apply failed: {0}")]
    ApplyFailed(String),

    /// Two transform tables cannot be composed.
    #[error("Composition mismatch: {0}")]
    CompositionMismatch(String),

    /// Numerical instability detected.
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Shape mismatch.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for registration operations.
pub type Result<T> = std::result::Result<T, RegistrationError>;

impl RegistrationError {
    pub fn estimation_failed(msg: impl Into<String>) -> Self {
        Self::EstimationFailed(msg.into())
    }

    pub fn apply_failed(msg: impl Into<String>) -> Self {
        Self::ApplyFailed(msg.into())
    }

    pub fn composition_mismatch(msg: impl Into<String>) -> Self {
        Self::CompositionMismatch(msg.into())
    }

    pub fn numerical_instability(msg: impl Into<String>) -> Self {
        Self::NumericalInstability(msg.into())
    }

    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}
