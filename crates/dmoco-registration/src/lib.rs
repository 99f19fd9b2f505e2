//! Registration for motion correction.
//!
//! [`RegistrationEngine`] is the contract the pipeline drives;
//! [`GradientEngine`] implements it with a differentiable MSE metric and Adam.

pub mod deformable;
pub mod engine;
pub mod error;
pub mod gradient_engine;
pub mod metric;
pub mod optimizer;
pub mod registration;
pub mod regularization;
pub mod validation;

pub use engine::{RegistrationEngine, RegistrationMode};
pub use error::{RegistrationError, Result};
pub use gradient_engine::{GradientEngine, GradientEngineConfig};
