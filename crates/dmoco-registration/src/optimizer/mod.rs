//! Optimizers for trainable transforms.

pub mod adam;
pub mod trait_;

pub use adam::AdamOptimizer;
pub use trait_::Optimizer;
