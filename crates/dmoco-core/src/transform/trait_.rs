//! Transform trait for spatial coordinate transformations.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::error::{CoreError, Result};

/// Maps physical points from one space to another.
///
/// In registration and resampling the transform maps points of the fixed
/// (target) grid into the moving volume's physical space.
pub trait Transform<B: Backend> {
    /// # Arguments
    /// * `points` - Physical points `[N, 3]`, columns `(x, y, z)`
    ///
    /// # Returns
    /// Transformed points `[N, 3]`
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2>;
}

/// Read a tensor back as `f64` values in row-major order.
pub fn tensor_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f64>> {
    tensor
        .into_data()
        .convert::<f64>()
        .to_vec::<f64>()
        .map_err(|e| CoreError::tensor_data(format!("{:?}", e)))
}
