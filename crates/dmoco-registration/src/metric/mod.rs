//! Similarity metrics.

pub mod mse;
pub mod trait_;

pub use mse::{MeanSquaredError, WeightedMeanSquaredError};
pub use trait_::Metric;
