//! Data model for diffusion MRI motion correction.
//!
//! Volumes and series on a physical voxel grid, the transforms that relate
//! them, resampling, and the per-acquisition transform table.

pub mod error;
pub mod filter;
pub mod geometry;
pub mod image;
pub mod interpolation;
pub mod table;
pub mod transform;

pub use error::{CoreError, Result};
pub use geometry::VoxelGeometry;
pub use image::{DiffusionSeries, Volume};
pub use table::TransformTable;
pub use transform::{MotionTransform, VolumeMotion};
