//! Interpolator trait for sampling volumes at continuous coordinates.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Samples a `[Z, Y, X]` tensor at continuous `(x, y, z)` indices.
pub trait Interpolator<B: Backend> {
    /// # Arguments
    /// * `data` - Volume data `[Z, Y, X]`
    /// * `indices` - Continuous indices `[N, 3]`, columns `(x, y, z)`
    ///
    /// # Returns
    /// Sampled values `[N]`
    fn interpolate(&self, data: &Tensor<B, 3>, indices: Tensor<B, 2>) -> Tensor<B, 1>;
}
