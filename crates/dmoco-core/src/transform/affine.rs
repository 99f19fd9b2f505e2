//! Affine transform implementation.
//!
//! `T(x) = A(x - c) + c + t` with a free 3×3 matrix `A`.

use burn::module::{Module, Param};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

use super::rigid::homogeneous;
use super::trait_::{tensor_values, Transform};
use crate::error::Result;

#[derive(Module, Debug)]
pub struct AffineTransform<B: Backend> {
    matrix: Param<Tensor<B, 2>>,
    translation: Param<Tensor<B, 1>>,
    center: Tensor<B, 1>,
}

impl<B: Backend> AffineTransform<B> {
    pub fn new(matrix: Tensor<B, 2>, translation: Tensor<B, 1>, center: Tensor<B, 1>) -> Self {
        Self {
            matrix: Param::from_tensor(matrix),
            translation: Param::from_tensor(translation),
            center,
        }
    }

    pub fn identity(center: &Point3<f64>, device: &B::Device) -> Self {
        let c = Tensor::from_floats([center.x as f32, center.y as f32, center.z as f32], device);
        Self::new(Tensor::eye(3, device), Tensor::zeros([3], device), c)
    }

    pub fn matrix(&self) -> Tensor<B, 2> {
        self.matrix.val()
    }

    pub fn translation(&self) -> Tensor<B, 1> {
        self.translation.val()
    }

    pub fn to_matrix(&self) -> Result<Matrix4<f64>> {
        let a = tensor_values(self.matrix())?;
        let t = tensor_values(self.translation())?;
        let c = tensor_values(self.center.clone())?;
        Ok(homogeneous(
            &Matrix3::from_row_slice(&a),
            &Vector3::new(t[0], t[1], t[2]),
            &Vector3::new(c[0], c[1], c[2]),
        ))
    }
}

impl<B: Backend> Transform<B> for AffineTransform<B> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let c = self.center.clone().reshape([1, 3]);
        let t = self.translation.val().reshape([1, 3]);
        (points - c.clone()).matmul(self.matrix.val().transpose()) + c + t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_affine_identity() {
        let device = Default::default();
        let transform = AffineTransform::<TestBackend>::identity(&Point3::new(4.0, 4.0, 2.0), &device);
        let points = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]], &device);
        let values = transform.transform_points(points).into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(transform.to_matrix().unwrap(), Matrix4::identity());
    }

    #[test]
    fn test_affine_scaling_about_center() {
        let device = Default::default();
        let transform = AffineTransform::<TestBackend>::new(
            Tensor::from_floats([[2.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]], &device),
            Tensor::zeros([3], &device),
            Tensor::from_floats([1.0, 0.0, 0.0], &device),
        );
        let points = Tensor::<TestBackend, 2>::from_floats([[3.0, 1.0, 1.0]], &device);
        let values = transform.transform_points(points).into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![5.0, 1.0, 1.0]);

        let m = transform.to_matrix().unwrap();
        assert_eq!(m[(0, 0)], 2.0);
        assert_eq!(m[(0, 3)], -1.0);
    }
}
