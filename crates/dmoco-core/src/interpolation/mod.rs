//! Interpolation used by resampling and by the similarity metric.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod cubic;
pub mod linear;
pub mod nearest;
pub mod trait_;

pub use cubic::CubicInterpolator;
pub use linear::LinearInterpolator;
pub use nearest::NearestInterpolator;
pub use trait_::Interpolator;

/// Interpolator choice for the final resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InterpolationKind {
    Nearest,
    #[default]
    Linear,
    /// Tricubic ([`CubicInterpolator`])
    Spline,
}

impl fmt::Display for InterpolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InterpolationKind::Nearest => "nearest",
            InterpolationKind::Linear => "linear",
            InterpolationKind::Spline => "spline",
        };
        f.write_str(name)
    }
}
