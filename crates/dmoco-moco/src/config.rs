//! Run configuration.

use burn::config::Config;
use dmoco_registration::RegistrationMode;
use serde::{Deserialize, Serialize};

use crate::error::{self, MocoError};

/// How b=0 acquisitions take part in temporal smoothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SmoothingB0Policy {
    /// One curve through every acquisition.
    #[default]
    Joint,
    /// One curve through the b=0 volumes, another through the DWI volumes.
    Separate,
    /// Fit the DWI volumes only; b=0 translations are left as estimated.
    ExcludeB0,
}

/// Motion correction settings. Immutable for the duration of a run.
#[derive(Config, Debug, PartialEq)]
pub struct MocoConfig {
    /// DWI volumes averaged per registration group
    #[config(default = "3")]
    pub group_size: usize,
    /// b-values below this are b=0 (s/mm²)
    #[config(default = "100.0")]
    pub bval_threshold: f64,
    #[config(default = "RegistrationMode::SliceRigid")]
    pub registration_mode: RegistrationMode,
    /// Fit a smooth curve through the estimated translations
    #[config(default = "false")]
    pub smoothing: bool,
    /// Distance between spline knots, in acquisitions
    #[config(default = "10.0")]
    pub smoothing_knot_spacing: f64,
    #[config(default = "SmoothingB0Policy::Joint")]
    pub smoothing_b0_policy: SmoothingB0Policy,
    /// Compose the motion table with a caller-supplied secondary table
    #[config(default = "false")]
    pub secondary_correction: bool,
}

impl MocoConfig {
    pub fn validate(&self) -> error::Result<()> {
        if self.group_size == 0 {
            return Err(MocoError::config("group size must be at least 1"));
        }
        if !(self.bval_threshold.is_finite() && self.bval_threshold > 0.0) {
            return Err(MocoError::config(format!(
                "b-value threshold must be positive, got {}",
                self.bval_threshold
            )));
        }
        if !(self.smoothing_knot_spacing.is_finite() && self.smoothing_knot_spacing >= 1.0) {
            return Err(MocoError::config(format!(
                "knot spacing must be at least one acquisition, got {}",
                self.smoothing_knot_spacing
            )));
        }
        Ok(())
    }

    pub fn slice_wise(&self) -> bool {
        self.registration_mode.is_slice_wise()
    }
}
