//! Regularization of displacement fields.

pub mod diffusion;
pub mod trait_;

pub use diffusion::DiffusionRegularizer;
pub use trait_::Regularizer;
