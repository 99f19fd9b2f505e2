//! Diffusion time series: a stack of volumes on one grid.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::volume::Volume;
use crate::error::{CoreError, Result};
use crate::geometry::VoxelGeometry;

/// Ordered acquisitions `[T, Z, Y, X]` sharing one voxel geometry.
///
/// The first axis is the acquisition index; its order is the temporal order
/// of the scan.
#[derive(Debug, Clone)]
pub struct DiffusionSeries<B: Backend> {
    data: Tensor<B, 4>,
    geometry: VoxelGeometry,
}

impl<B: Backend> DiffusionSeries<B> {
    pub fn new(data: Tensor<B, 4>, geometry: VoxelGeometry) -> Self {
        Self { data, geometry }
    }

    /// Stack volumes in the given order. All volumes must share a shape; the
    /// geometry of the first one is kept.
    pub fn from_volumes(volumes: Vec<Volume<B>>) -> Result<Self> {
        let first = volumes
            .first()
            .ok_or_else(|| CoreError::empty_selection("cannot build a series from zero volumes"))?;
        let shape = first.shape();
        let geometry = *first.geometry();
        let mut stacked = Vec::with_capacity(volumes.len());
        for volume in volumes {
            if volume.shape() != shape {
                return Err(CoreError::ShapeMismatch {
                    expected: shape.to_vec(),
                    actual: volume.shape().to_vec(),
                });
            }
            stacked.push(volume.into_tensor().unsqueeze_dim::<4>(0));
        }
        Ok(Self::new(Tensor::cat(stacked, 0), geometry))
    }

    pub fn data(&self) -> &Tensor<B, 4> {
        &self.data
    }

    pub fn geometry(&self) -> &VoxelGeometry {
        &self.geometry
    }

    /// Number of acquisitions `T`.
    pub fn len(&self) -> usize {
        self.data.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spatial shape `[Z, Y, X]` of each volume.
    pub fn volume_shape(&self) -> [usize; 3] {
        let [_, d, h, w] = self.data.dims();
        [d, h, w]
    }

    pub fn volume(&self, index: usize) -> Result<Volume<B>> {
        let len = self.len();
        if index >= len {
            return Err(CoreError::IndexOutOfRange { index, len });
        }
        let [d, h, w] = self.volume_shape();
        let data = self
            .data
            .clone()
            .slice([index..index + 1, 0..d, 0..h, 0..w])
            .squeeze::<3>(0);
        Ok(Volume::new(data, self.geometry))
    }

    /// Sub-series holding `indices` in the given order.
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        if indices.is_empty() {
            return Err(CoreError::empty_selection("selection has no acquisitions"));
        }
        let [d, h, w] = self.volume_shape();
        let len = self.len();
        let mut parts = Vec::with_capacity(indices.len());
        for &index in indices {
            if index >= len {
                return Err(CoreError::IndexOutOfRange { index, len });
            }
            parts.push(self.data.clone().slice([index..index + 1, 0..d, 0..h, 0..w]));
        }
        Ok(Self::new(Tensor::cat(parts, 0), self.geometry))
    }

    /// Voxelwise mean over the acquisitions in `indices`.
    pub fn temporal_mean(&self, indices: &[usize]) -> Result<Volume<B>> {
        let selected = self.select(indices)?;
        let mean = selected.data.mean_dim(0).squeeze::<3>(0);
        Ok(Volume::new(mean, self.geometry))
    }

    pub fn volumes(&self) -> impl Iterator<Item = Result<Volume<B>>> + '_ {
        (0..self.len()).map(move |t| self.volume(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;

    /// Series where every voxel of volume `t` equals `t`.
    fn constant_series(t: usize) -> DiffusionSeries<Backend> {
        let device = Default::default();
        let volumes = (0..t)
            .map(|i| {
                let data = Tensor::<Backend, 3>::ones([2, 3, 3], &device).mul_scalar(i as f32);
                Volume::new(data, VoxelGeometry::identity())
            })
            .collect();
        DiffusionSeries::from_volumes(volumes).unwrap()
    }

    #[test]
    fn test_len_and_shape() {
        let series = constant_series(5);
        assert_eq!(series.len(), 5);
        assert_eq!(series.volume_shape(), [2, 3, 3]);
    }

    #[test]
    fn test_select_keeps_order() {
        let series = constant_series(5);
        let selected = series.select(&[4, 1]).unwrap();
        assert_eq!(selected.len(), 2);
        assert!(selected.volume(0).unwrap().values().unwrap().iter().all(|v| *v == 4.0));
        assert!(selected.volume(1).unwrap().values().unwrap().iter().all(|v| *v == 1.0));
    }

    #[test]
    fn test_temporal_mean() {
        let series = constant_series(6);
        let mean = series.temporal_mean(&[1, 2, 4]).unwrap();
        assert_eq!(mean.shape(), [2, 3, 3]);
        assert!(mean.values().unwrap().iter().all(|v| (v - 7.0 / 3.0).abs() < 1e-5));
    }

    #[test]
    fn test_selection_errors() {
        let series = constant_series(3);
        assert!(matches!(series.select(&[]), Err(CoreError::EmptySelection(_))));
        assert!(matches!(
            series.volume(3),
            Err(CoreError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }
}
