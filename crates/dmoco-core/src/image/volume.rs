//! Single 3D volume with physical metadata.

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};
use nalgebra::{Matrix3, Point3};

use crate::error::{CoreError, Result};
use crate::geometry::VoxelGeometry;

/// One acquisition of a diffusion series.
///
/// Data is laid out `[Z, Y, X]`; the geometry maps `(x, y, z)` voxel indices
/// to physical coordinates.
///
/// # Examples
/// ```rust
/// use dmoco_core::image::Volume;
/// use dmoco_core::geometry::VoxelGeometry;
/// use burn::tensor::Tensor;
/// use burn_ndarray::NdArray;
///
/// type Backend = NdArray<f32>;
///
/// let device = Default::default();
/// let data = Tensor::<Backend, 3>::zeros([4, 8, 8], &device);
/// let volume = Volume::new(data, VoxelGeometry::identity());
/// assert_eq!(volume.shape(), [4, 8, 8]);
/// ```
#[derive(Debug, Clone)]
pub struct Volume<B: Backend> {
    data: Tensor<B, 3>,
    geometry: VoxelGeometry,
}

impl<B: Backend> Volume<B> {
    pub fn new(data: Tensor<B, 3>, geometry: VoxelGeometry) -> Self {
        Self { data, geometry }
    }

    pub fn data(&self) -> &Tensor<B, 3> {
        &self.data
    }

    pub fn into_tensor(self) -> Tensor<B, 3> {
        self.data
    }

    pub fn geometry(&self) -> &VoxelGeometry {
        &self.geometry
    }

    /// `[Z, Y, X]`
    pub fn shape(&self) -> [usize; 3] {
        self.data.dims()
    }

    pub fn num_slices(&self) -> usize {
        self.shape()[0]
    }

    pub fn device(&self) -> B::Device {
        self.data.device()
    }

    /// Physical coordinate of the grid centre, used as the default centre of
    /// rotation.
    pub fn center(&self) -> Point3<f64> {
        let [d, h, w] = self.shape();
        let index = Point3::new(
            (w as f64 - 1.0) / 2.0,
            (h as f64 - 1.0) / 2.0,
            (d as f64 - 1.0) / 2.0,
        );
        self.geometry.index_to_world(&index)
    }

    /// Extract slice `z` as a volume of shape `[1, Y, X]` whose geometry
    /// places it at the same physical location.
    pub fn slice(&self, z: usize) -> Result<Self> {
        let [d, h, w] = self.shape();
        if z >= d {
            return Err(CoreError::IndexOutOfRange { index: z, len: d });
        }
        let data = self.data.clone().slice([z..z + 1, 0..h, 0..w]);
        Ok(Self::new(data, self.geometry.slice(z)))
    }

    /// Reassemble a volume from single-slice volumes, in slice order.
    pub fn from_slices(slices: Vec<Self>, geometry: VoxelGeometry) -> Result<Self> {
        let first = slices
            .first()
            .ok_or_else(|| CoreError::empty_selection("no slices to stack"))?;
        let [_, h, w] = first.shape();
        for slice in &slices {
            let shape = slice.shape();
            if shape != [1, h, w] {
                return Err(CoreError::ShapeMismatch {
                    expected: vec![1, h, w],
                    actual: shape.to_vec(),
                });
            }
        }
        let data = Tensor::cat(slices.into_iter().map(|s| s.data).collect(), 0);
        Ok(Self::new(data, geometry))
    }

    /// Voxelwise mean of several volumes sharing one grid.
    pub fn mean_of(volumes: &[Self]) -> Result<Self> {
        let first = volumes
            .first()
            .ok_or_else(|| CoreError::empty_selection("cannot average zero volumes"))?;
        let shape = first.shape();
        let mut stacked = Vec::with_capacity(volumes.len());
        for volume in volumes {
            if volume.shape() != shape {
                return Err(CoreError::ShapeMismatch {
                    expected: shape.to_vec(),
                    actual: volume.shape().to_vec(),
                });
            }
            stacked.push(volume.data.clone().unsqueeze_dim::<4>(0));
        }
        let mean = Tensor::cat(stacked, 0).mean_dim(0).squeeze::<3>(0);
        Ok(Self::new(mean, first.geometry))
    }

    /// Flattened voxel values in `[Z, Y, X]` order.
    pub fn values(&self) -> Result<Vec<f32>> {
        self.data
            .to_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| CoreError::tensor_data(format!("{:?}", e)))
    }

    /// Map continuous `(x, y, z)` indices `[N, 3]` to physical points `[N, 3]`.
    pub fn index_to_world_tensor(&self, indices: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = indices.device();
        let m = self.geometry.index_to_world_matrix();
        let origin = origin_row::<B>(self.geometry.origin(), &device);
        indices.matmul(transposed_tensor::<B>(&m, &device)) + origin
    }

    /// Map physical points `[N, 3]` to continuous `(x, y, z)` indices `[N, 3]`.
    pub fn world_to_index_tensor(&self, points: Tensor<B, 2>) -> Result<Tensor<B, 2>> {
        let device = points.device();
        let inv = self.geometry.world_to_index_matrix().ok_or_else(|| {
            CoreError::degenerate_geometry("voxel-to-world matrix is not invertible")
        })?;
        let origin = origin_row::<B>(self.geometry.origin(), &device);
        Ok((points - origin).matmul(transposed_tensor::<B>(&inv, &device)))
    }
}

fn origin_row<B: Backend>(origin: &Point3<f64>, device: &B::Device) -> Tensor<B, 2> {
    let values = vec![origin.x as f32, origin.y as f32, origin.z as f32];
    Tensor::<B, 1>::from_data(TensorData::new(values, Shape::new([3])), device).reshape([1, 3])
}

/// Row-vector form: `p @ M^T == (M p^T)^T`.
fn transposed_tensor<B: Backend>(m: &Matrix3<f64>, device: &B::Device) -> Tensor<B, 2> {
    let mut values = Vec::with_capacity(9);
    for r in 0..3 {
        for c in 0..3 {
            values.push(m[(c, r)] as f32);
        }
    }
    Tensor::<B, 1>::from_data(TensorData::new(values, Shape::new([9])), device).reshape([3, 3])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use nalgebra::Vector3;

    type Backend = NdArray<f32>;

    fn ramp(shape: [usize; 3]) -> Tensor<Backend, 3> {
        let n = shape.iter().product::<usize>();
        let values: Vec<f32> = (0..n).map(|v| v as f32).collect();
        Tensor::<Backend, 1>::from_floats(values.as_slice(), &Default::default()).reshape(shape)
    }

    #[test]
    fn test_index_world_tensor_roundtrip() {
        let device = Default::default();
        let geometry = VoxelGeometry::new(
            Point3::new(10.0, 20.0, 30.0),
            Vector3::new(2.0, 2.0, 4.0),
            Matrix3::identity(),
        );
        let volume = Volume::new(Tensor::<Backend, 3>::zeros([4, 4, 4], &device), geometry);

        let indices = Tensor::<Backend, 2>::from_floats([[1.0, 2.0, 3.0], [0.0, 0.0, 0.0]], &device);
        let world = volume.index_to_world_tensor(indices);
        let world_values = world.clone().into_data().to_vec::<f32>().unwrap();
        assert_eq!(world_values, vec![12.0, 24.0, 42.0, 10.0, 20.0, 30.0]);

        let back = volume.world_to_index_tensor(world).unwrap();
        let back_values = back.into_data().to_vec::<f32>().unwrap();
        let expected = [1.0, 2.0, 3.0, 0.0, 0.0, 0.0];
        for (a, b) in back_values.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_slice_and_restack() {
        let volume = Volume::new(ramp([3, 2, 2]), VoxelGeometry::identity());
        let slices: Vec<_> = (0..3).map(|z| volume.slice(z).unwrap()).collect();
        assert_eq!(slices[1].shape(), [1, 2, 2]);
        assert_eq!(slices[1].values().unwrap(), vec![4.0, 5.0, 6.0, 7.0]);
        assert_eq!(slices[2].geometry().origin(), &Point3::new(0.0, 0.0, 2.0));

        let restacked = Volume::from_slices(slices, *volume.geometry()).unwrap();
        assert_eq!(restacked.values().unwrap(), volume.values().unwrap());
    }

    #[test]
    fn test_slice_out_of_range() {
        let volume = Volume::new(ramp([2, 2, 2]), VoxelGeometry::identity());
        assert!(matches!(
            volume.slice(2),
            Err(CoreError::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_mean_of() {
        let device = Default::default();
        let a = Volume::new(Tensor::<Backend, 3>::ones([2, 2, 2], &device), VoxelGeometry::identity());
        let b = Volume::new(Tensor::<Backend, 3>::ones([2, 2, 2], &device).mul_scalar(3.0), VoxelGeometry::identity());
        let mean = Volume::mean_of(&[a, b]).unwrap();
        assert!(mean.values().unwrap().iter().all(|v| (v - 2.0).abs() < 1e-6));
        assert!(Volume::<Backend>::mean_of(&[]).is_err());
    }

    #[test]
    fn test_center() {
        let device = Default::default();
        let volume = Volume::new(Tensor::<Backend, 3>::zeros([3, 5, 7], &device), VoxelGeometry::identity());
        assert_eq!(volume.center(), Point3::new(3.0, 2.0, 1.0));
    }
}
