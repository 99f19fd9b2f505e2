//! Resample filter.
//!
//! Resamples a volume onto an output grid by mapping every output voxel
//! through a transform into the input's physical space and interpolating.

use std::marker::PhantomData;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::error::Result;
use crate::geometry::VoxelGeometry;
use crate::image::{generate_grid, Volume};
use crate::interpolation::Interpolator;
use crate::transform::Transform;

/// Resample a volume through a transform.
///
/// The transform maps output physical space to input physical space, which
/// is the direction a registration transform points (target to moving).
///
/// # Type Parameters
/// * `B` - The Burn backend
/// * `T` - The transform type
/// * `I` - The interpolator type
pub struct ResampleImageFilter<'a, B, T, I>
where
    B: Backend,
    T: Transform<B>,
    I: Interpolator<B>,
{
    size: [usize; 3],
    geometry: VoxelGeometry,
    transform: &'a T,
    interpolator: I,
    default_value: Option<f32>,
    _phantom: PhantomData<B>,
}

impl<'a, B, T, I> ResampleImageFilter<'a, B, T, I>
where
    B: Backend,
    T: Transform<B>,
    I: Interpolator<B>,
{
    /// # Arguments
    /// * `size` - Output grid `[Z, Y, X]`
    /// * `geometry` - Output voxel geometry
    /// * `transform` - Output space to input space
    /// * `interpolator` - Sampler for the input volume
    pub fn new(size: [usize; 3], geometry: VoxelGeometry, transform: &'a T, interpolator: I) -> Self {
        Self {
            size,
            geometry,
            transform,
            interpolator,
            default_value: None,
            _phantom: PhantomData,
        }
    }

    /// Output grid taken from `reference`.
    pub fn new_from_reference(reference: &Volume<B>, transform: &'a T, interpolator: I) -> Self {
        Self::new(reference.shape(), *reference.geometry(), transform, interpolator)
    }

    /// Value for output voxels that map outside the input grid. Without it the
    /// nearest edge voxel is used.
    pub fn with_default_value(mut self, value: f32) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn apply(&self, input: &Volume<B>) -> Result<Volume<B>> {
        let device = input.device();
        let grid = Volume::new(Tensor::<B, 3>::zeros(self.size, &device), self.geometry);

        let output_indices = generate_grid::<B>(self.size, &device);
        let output_points = grid.index_to_world_tensor(output_indices);
        let input_points = self.transform.transform_points(output_points);
        let input_indices = input.world_to_index_tensor(input_points)?;

        let values = match self.default_value {
            None => self.interpolator.interpolate(input.data(), input_indices),
            Some(fill) => {
                let inside = inside_mask(&input_indices, input.shape());
                let sampled = self.interpolator.interpolate(input.data(), input_indices);
                sampled * inside.clone() + (inside.neg() + 1.0).mul_scalar(fill)
            }
        };

        Ok(Volume::new(values.reshape(self.size), self.geometry))
    }
}

/// 1.0 where `(x, y, z)` indices fall inside a `[Z, Y, X]` grid.
fn inside_mask<B: Backend>(indices: &Tensor<B, 2>, shape: [usize; 3]) -> Tensor<B, 1> {
    let [d, h, w] = shape;
    let n = indices.dims()[0];
    let limits = [w, h, d];
    let mut mask = Tensor::<B, 1>::ones([n], &indices.device());
    for (col, &limit) in limits.iter().enumerate() {
        let c = indices.clone().slice([0..n, col..col + 1]).reshape([n]);
        let lo = c.clone().greater_equal_elem(-0.5).float();
        let hi = c.lower_equal_elem(limit as f32 - 0.5).float();
        mask = mask * lo * hi;
    }
    mask
}
