//! File formats for dmoco: NIfTI series and volumes, bvec/bval text files.

pub mod gradients;
pub mod nifti_io;

pub use gradients::{read_bvals, read_bvecs};
pub use nifti_io::{read_series, write_series, write_volume};
