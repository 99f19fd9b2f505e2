//! Diffusion regularization for displacement fields.
//!
//! First-order penalty on the spatial derivatives of the displacement:
//!
//! R(u) = ∫_Ω |∇u|² dx
//!
//! Also known as membrane energy.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::trait_::utils::forward_differences;
use super::trait_::Regularizer;

/// Diffusion regularizer for displacement fields.
#[derive(Clone, Debug)]
pub struct DiffusionRegularizer {
    weight: f64,
}

impl DiffusionRegularizer {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl Default for DiffusionRegularizer {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl<B: Backend> Regularizer<B> for DiffusionRegularizer {
    fn compute_loss(&self, displacement: Tensor<B, 4>) -> Tensor<B, 1> {
        let device = displacement.device();
        forward_differences(displacement)
            .into_iter()
            .flatten()
            .map(|g| g.powf_scalar(2.0).mean())
            .fold(Tensor::<B, 1>::zeros([1], &device), |acc, term| acc + term)
            .mul_scalar(self.weight)
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }
}
