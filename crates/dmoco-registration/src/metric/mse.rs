//! Mean Squared Error metric implementation.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use dmoco_core::image::generate_grid;
use dmoco_core::interpolation::{Interpolator, LinearInterpolator};
use dmoco_core::transform::Transform;
use dmoco_core::Volume;

use super::trait_::Metric;
use crate::error::{RegistrationError, Result};

/// Mean Squared Error Metric.
///
/// MSE = (1/N) * sum((Fixed(x) - Moving(T(x)))^2)
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanSquaredError {
    interpolator: LinearInterpolator,
}

impl MeanSquaredError {
    pub fn new() -> Self {
        Self {
            interpolator: LinearInterpolator::new(),
        }
    }
}

impl<B: Backend> Metric<B> for MeanSquaredError {
    fn forward(
        &self,
        fixed: &Volume<B>,
        moving: &Volume<B>,
        transform: &impl Transform<B>,
    ) -> Result<Tensor<B, 1>> {
        let diff = residuals(&self.interpolator, fixed, moving, transform)?;
        Ok(diff.powf_scalar(2.0).mean())
    }

    fn name(&self) -> &'static str {
        "MeanSquaredError"
    }
}

/// MSE with per-voxel weights on the fixed grid.
///
/// WMSE = sum(w * (Fixed(x) - Moving(T(x)))^2) / sum(w)
#[derive(Debug, Clone)]
pub struct WeightedMeanSquaredError<B: Backend> {
    weights: Tensor<B, 1>,
    interpolator: LinearInterpolator,
}

impl<B: Backend> WeightedMeanSquaredError<B> {
    /// `weights` must share the fixed volume's shape.
    pub fn new(weights: &Volume<B>) -> Self {
        let [d, h, w] = weights.shape();
        Self {
            weights: weights.data().clone().reshape([d * h * w]),
            interpolator: LinearInterpolator::new(),
        }
    }
}

impl<B: Backend> Metric<B> for WeightedMeanSquaredError<B> {
    fn forward(
        &self,
        fixed: &Volume<B>,
        moving: &Volume<B>,
        transform: &impl Transform<B>,
    ) -> Result<Tensor<B, 1>> {
        let [n] = self.weights.dims();
        let shape = fixed.shape();
        if n != shape.iter().product::<usize>() {
            return Err(RegistrationError::ShapeMismatch {
                expected: shape.to_vec(),
                actual: vec![n],
            });
        }
        let diff = residuals(&self.interpolator, fixed, moving, transform)?;
        let weighted = (diff.powf_scalar(2.0) * self.weights.clone()).sum();
        let total = self.weights.clone().sum().clamp_min(1e-12);
        Ok(weighted / total)
    }

    fn name(&self) -> &'static str {
        "WeightedMeanSquaredError"
    }
}

/// `Moving(T(x)) - Fixed(x)` over every fixed voxel, in `[Z, Y, X]` order.
fn residuals<B: Backend, I: Interpolator<B>>(
    interpolator: &I,
    fixed: &Volume<B>,
    moving: &Volume<B>,
    transform: &impl Transform<B>,
) -> Result<Tensor<B, 1>> {
    let fixed_shape = fixed.shape();
    let device = fixed.device();
    let fixed_indices = generate_grid::<B>(fixed_shape, &device);
    let [n, _] = fixed_indices.dims();
    if n == 0 {
        return Err(RegistrationError::ShapeMismatch {
            expected: vec![1],
            actual: fixed_shape.to_vec(),
        });
    }

    const CHUNK_SIZE: usize = 32768;

    let num_chunks = n.div_ceil(CHUNK_SIZE);
    let mut chunks = Vec::with_capacity(num_chunks);
    for i in 0..num_chunks {
        let start = i * CHUNK_SIZE;
        let end = (start + CHUNK_SIZE).min(n);
        let chunk_indices = fixed_indices.clone().slice([start..end, 0..3]);
        let fixed_points = fixed.index_to_world_tensor(chunk_indices);
        let moving_points = transform.transform_points(fixed_points);
        let moving_indices = moving.world_to_index_tensor(moving_points)?;
        chunks.push(interpolator.interpolate(moving.data(), moving_indices));
    }
    let moving_values = Tensor::cat(chunks, 0);

    let fixed_values = fixed.data().clone().reshape([n]);
    Ok(moving_values - fixed_values)
}
