//! Volume and series types.
//!
//! A [`Volume`] is one 3D acquisition with physical metadata; a
//! [`DiffusionSeries`] stacks the acquisitions of a scan in temporal order.

pub mod grid;
pub mod series;
pub mod volume;

pub use grid::generate_grid;
pub use series::DiffusionSeries;
pub use volume::Volume;
