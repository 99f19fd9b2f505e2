//! Optimizer trait for parameter optimization.

use burn::module::AutodiffModule;
use burn::optim::GradientsParams;
use burn::tensor::backend::AutodiffBackend;

/// Updates trainable transform parameters from loss gradients.
///
/// # Type Parameters
/// * `M` - The module/transform type to optimize
/// * `B` - The backend for tensor operations (must support autodiff)
pub trait Optimizer<M, B>
where
    M: AutodiffModule<B>,
    B: AutodiffBackend,
{
    /// Perform a single optimization step and return the updated module.
    fn step(&mut self, module: M, gradients: GradientsParams) -> M;

    fn learning_rate(&self) -> f64;

    fn set_learning_rate(&mut self, lr: f64);
}
