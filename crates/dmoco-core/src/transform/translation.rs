//! Trainable translation transform.

use burn::module::{Module, Param};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nalgebra::{Matrix4, Vector3};

use super::trait_::{tensor_values, Transform};
use crate::error::Result;

/// Translation by a fixed offset, optionally restricted to some axes.
///
/// The effective offset is `translation ⊙ mask`, so masked components stay
/// at zero whatever the optimizer does to the raw parameter.
#[derive(Module, Debug)]
pub struct TranslationTransform<B: Backend> {
    translation: Param<Tensor<B, 1>>,
    mask: Tensor<B, 1>,
}

impl<B: Backend> TranslationTransform<B> {
    /// Free translation along all three axes.
    pub fn new(translation: Tensor<B, 1>) -> Self {
        let mask = Tensor::ones([3], &translation.device());
        Self::with_mask(translation, mask)
    }

    pub fn with_mask(translation: Tensor<B, 1>, mask: Tensor<B, 1>) -> Self {
        Self {
            translation: Param::from_tensor(translation),
            mask,
        }
    }

    /// Zero translation restricted to the x/y plane (slice-wise correction).
    pub fn in_plane(device: &B::Device) -> Self {
        Self::with_mask(
            Tensor::zeros([3], device),
            Tensor::from_floats([1.0, 1.0, 0.0], device),
        )
    }

    pub fn identity(device: &B::Device) -> Self {
        Self::new(Tensor::zeros([3], device))
    }

    /// Effective offset `[3]`.
    pub fn translation(&self) -> Tensor<B, 1> {
        self.translation.val() * self.mask.clone()
    }

    pub fn to_matrix(&self) -> Result<Matrix4<f64>> {
        let t = tensor_values(self.translation())?;
        Ok(Matrix4::new_translation(&Vector3::new(t[0], t[1], t[2])))
    }
}

impl<B: Backend> Transform<B> for TranslationTransform<B> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        points + self.translation().reshape([1, 3])
    }
}
