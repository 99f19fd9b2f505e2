pub mod gaussian_mask;
pub mod resample;

pub use gaussian_mask::{slice_centroids, GaussianMask};
pub use resample::ResampleImageFilter;
