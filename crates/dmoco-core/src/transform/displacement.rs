//! Dense displacement field transform.
//!
//! Each voxel of a reference grid carries a physical displacement vector;
//! points between voxels take the trilinearly interpolated displacement.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nalgebra::Matrix3;

use super::trait_::Transform;
use crate::error::{CoreError, Result};
use crate::geometry::VoxelGeometry;
use crate::image::Volume;
use crate::interpolation::{Interpolator, LinearInterpolator};

/// `T(x) = x + u(x)` with `u` sampled from a `[3, Z, Y, X]` field.
#[derive(Debug, Clone)]
pub struct DisplacementField<B: Backend> {
    displacement: Tensor<B, 4>,
    geometry: VoxelGeometry,
    world_to_index: Matrix3<f64>,
}

impl<B: Backend> DisplacementField<B> {
    pub fn new(displacement: Tensor<B, 4>, geometry: VoxelGeometry) -> Result<Self> {
        let [components, _, _, _] = displacement.dims();
        if components != 3 {
            return Err(CoreError::ShapeMismatch {
                expected: vec![3],
                actual: vec![components],
            });
        }
        let world_to_index = geometry.world_to_index_matrix().ok_or_else(|| {
            CoreError::degenerate_geometry("displacement grid is not invertible")
        })?;
        Ok(Self {
            displacement,
            geometry,
            world_to_index,
        })
    }

    /// Zero field on the grid of `reference`.
    pub fn zeros_like(reference: &Volume<B>) -> Result<Self> {
        let [d, h, w] = reference.shape();
        Self::new(
            Tensor::zeros([3, d, h, w], &reference.device()),
            *reference.geometry(),
        )
    }

    pub fn displacement(&self) -> &Tensor<B, 4> {
        &self.displacement
    }

    pub fn geometry(&self) -> &VoxelGeometry {
        &self.geometry
    }

    /// `[Z, Y, X]` of the reference grid.
    pub fn grid_shape(&self) -> [usize; 3] {
        let [_, d, h, w] = self.displacement.dims();
        [d, h, w]
    }

    /// Copy with the tensor detached from any autodiff graph.
    pub fn detached(&self) -> Self {
        Self {
            displacement: self.displacement.clone().detach(),
            geometry: self.geometry,
            world_to_index: self.world_to_index,
        }
    }
}

impl<B: Backend> Transform<B> for DisplacementField<B> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        displace_points(&self.displacement, &self.geometry, &self.world_to_index, points)
    }
}

/// `points + u(points)` for a `[3, Z, Y, X]` displacement tensor on
/// `geometry`, whose inverse index matrix is `world_to_index`.
///
/// Shared with trainable displacement parameters, so it only uses
/// differentiable tensor operations.
pub fn displace_points<B: Backend>(
    displacement: &Tensor<B, 4>,
    geometry: &VoxelGeometry,
    world_to_index: &Matrix3<f64>,
    points: Tensor<B, 2>,
) -> Tensor<B, 2> {
    let device = points.device();
    let origin = geometry.origin();
    let origin = Tensor::<B, 1>::from_floats(
        [origin.x as f32, origin.y as f32, origin.z as f32],
        &device,
    )
    .reshape([1, 3]);

    let mut inv_t = Vec::with_capacity(9);
    for r in 0..3 {
        for c in 0..3 {
            inv_t.push(world_to_index[(c, r)] as f32);
        }
    }
    let inv_t = Tensor::<B, 1>::from_floats(inv_t.as_slice(), &device).reshape([3, 3]);
    let indices = (points.clone() - origin).matmul(inv_t);

    let [_, d, h, w] = displacement.dims();
    let interpolator = LinearInterpolator::new();
    let offsets: Vec<Tensor<B, 2>> = (0..3)
        .map(|c| {
            let component = displacement
                .clone()
                .slice([c..c + 1, 0..d, 0..h, 0..w])
                .squeeze::<3>(0);
            interpolator
                .interpolate(&component, indices.clone())
                .unsqueeze_dim::<2>(1)
        })
        .collect();
    points + Tensor::cat(offsets, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_zero_field_is_identity() {
        let device = Default::default();
        let reference = Volume::new(
            Tensor::<TestBackend, 3>::zeros([2, 3, 3], &device),
            VoxelGeometry::identity(),
        );
        let field = DisplacementField::zeros_like(&reference).unwrap();
        let points = Tensor::<TestBackend, 2>::from_floats([[0.5, 1.0, 1.0]], &device);
        let values = field.transform_points(points).into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![0.5, 1.0, 1.0]);
    }

    #[test]
    fn test_uniform_field_shifts_points() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::ones([1, 2, 2, 2], &device).mul_scalar(2.0);
        let rest = Tensor::<TestBackend, 4>::zeros([2, 2, 2, 2], &device);
        let field = DisplacementField::new(Tensor::cat(vec![x, rest], 0), VoxelGeometry::identity()).unwrap();
        let points = Tensor::<TestBackend, 2>::from_floats([[0.3, 0.2, 0.9]], &device);
        let values = field.transform_points(points).into_data().to_vec::<f32>().unwrap();
        assert!((values[0] - 2.3).abs() < 1e-5);
        assert!((values[1] - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_rejects_wrong_component_count() {
        let device = Default::default();
        let field = DisplacementField::new(
            Tensor::<TestBackend, 4>::zeros([2, 2, 2, 2], &device),
            VoxelGeometry::identity(),
        );
        assert!(matches!(field, Err(CoreError::ShapeMismatch { .. })));
    }
}
