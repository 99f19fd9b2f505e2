//! Trainable dense displacement.

use burn::module::{Ignored, Module, Param};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use dmoco_core::transform::{displace_points, DisplacementField, Transform};
use dmoco_core::{CoreError, Volume, VoxelGeometry};
use nalgebra::Matrix3;

use crate::error::Result;
use crate::registration::Trainable;

/// Displacement `[3, Z, Y, X]` on the grid of the fixed volume, optimised
/// voxel by voxel.
#[derive(Module, Debug)]
pub struct DisplacementParams<B: Backend> {
    displacement: Param<Tensor<B, 4>>,
    geometry: Ignored<VoxelGeometry>,
    world_to_index: Ignored<Matrix3<f64>>,
}

impl<B: Backend> DisplacementParams<B> {
    /// Zero displacement on the grid of `fixed`.
    pub fn zeros_like(fixed: &Volume<B>) -> Result<Self> {
        let geometry = *fixed.geometry();
        let world_to_index = geometry.world_to_index_matrix().ok_or_else(|| {
            CoreError::degenerate_geometry("fixed grid is not invertible")
        })?;
        let [d, h, w] = fixed.shape();
        Ok(Self {
            displacement: Param::from_tensor(Tensor::zeros([3, d, h, w], &fixed.device())),
            geometry: Ignored(geometry),
            world_to_index: Ignored(world_to_index),
        })
    }

    pub fn displacement(&self) -> Tensor<B, 4> {
        self.displacement.val()
    }

    /// Freeze into a displacement field transform.
    pub fn to_field(&self) -> Result<DisplacementField<B>> {
        Ok(DisplacementField::new(
            self.displacement.val().detach(),
            self.geometry.0,
        )?)
    }
}

impl<B: Backend> Transform<B> for DisplacementParams<B> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        displace_points(
            &self.displacement.val(),
            &self.geometry.0,
            &self.world_to_index.0,
            points,
        )
    }
}

impl<B: Backend> Trainable<B> for DisplacementParams<B> {
    fn displacement(&self) -> Option<Tensor<B, 4>> {
        Some(self.displacement.val())
    }
}
