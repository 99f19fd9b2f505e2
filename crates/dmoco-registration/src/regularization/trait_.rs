//! Regularizer trait definition.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Penalty on a displacement field.
pub trait Regularizer<B: Backend> {
    /// # Arguments
    /// * `displacement` - Field of shape `[3, Z, Y, X]`
    ///
    /// # Returns
    /// A scalar tensor containing the weighted regularization loss.
    fn compute_loss(&self, displacement: Tensor<B, 4>) -> Tensor<B, 1>;

    fn weight(&self) -> f64;

    fn set_weight(&mut self, weight: f64);
}

/// Utility functions for computing spatial gradients.
pub mod utils {
    use burn::tensor::backend::Backend;
    use burn::tensor::Tensor;

    /// Forward differences of a `[C, Z, Y, X]` field along each spatial axis
    /// (z, y, x). An axis with fewer than two samples has no difference and
    /// yields `None`.
    pub fn forward_differences<B: Backend>(field: Tensor<B, 4>) -> [Option<Tensor<B, 4>>; 3] {
        let [c, d, h, w] = field.dims();

        let grad_d = (d > 1).then(|| {
            field.clone().slice([0..c, 1..d, 0..h, 0..w])
                - field.clone().slice([0..c, 0..(d - 1), 0..h, 0..w])
        });
        let grad_h = (h > 1).then(|| {
            field.clone().slice([0..c, 0..d, 1..h, 0..w])
                - field.clone().slice([0..c, 0..d, 0..(h - 1), 0..w])
        });
        let grad_w = (w > 1).then(|| {
            field.clone().slice([0..c, 0..d, 0..h, 1..w])
                - field.clone().slice([0..c, 0..d, 0..h, 0..(w - 1)])
        });

        [grad_d, grad_h, grad_w]
    }
}
