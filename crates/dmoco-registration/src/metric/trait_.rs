//! Metric trait for volume similarity.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use dmoco_core::transform::Transform;
use dmoco_core::Volume;

use crate::error::Result;

/// Dissimilarity between a fixed volume and a transformed moving volume.
///
/// Lower values mean better alignment. The returned scalar must stay
/// differentiable with respect to the transform parameters.
pub trait Metric<B: Backend> {
    /// # Arguments
    /// * `fixed` - The target volume
    /// * `moving` - The volume being aligned
    /// * `transform` - Maps fixed physical points into the moving volume
    fn forward(
        &self,
        fixed: &Volume<B>,
        moving: &Volume<B>,
        transform: &impl Transform<B>,
    ) -> Result<Tensor<B, 1>>;

    fn name(&self) -> &'static str;
}
