//! Group-wise motion correction of diffusion MRI series.
//!
//! b=0 volumes are registered one by one to a b=0 target. DWI volumes are
//! averaged in small temporal groups and each group average is registered to
//! the first one; the group transform is then used for every member. The
//! full table is optionally smoothed over time and applied in one pass.

pub mod classify;
pub mod config;
pub mod driver;
pub mod error;
pub mod expand;
pub mod grouping;
pub mod smoothing;
pub mod target;

pub use classify::{Classification, GradientTable, VolumeClass, VolumeClassifier};
pub use config::{MocoConfig, SmoothingB0Policy};
pub use driver::{MocoOutput, MotionCorrection};
pub use error::{ClassificationError, MocoError, Result, Stage, Subject};
pub use expand::TransformExpander;
pub use grouping::{GroupAverages, GroupPlan, GroupPlanner};
pub use smoothing::{SmoothingDegradation, SmoothingReport, TemporalSmoother};
pub use target::{TargetSelection, TargetSelector};
