//! Rigid transform implementation.
//!
//! Three Euler angles and a translation about a fixed centre:
//! `T(x) = R(x - c) + c + t`, with `R = Rz(γ) Ry(β) Rx(α)`.

use burn::module::{Module, Param};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

use super::trait_::{tensor_values, Transform};
use crate::error::Result;

#[derive(Module, Debug)]
pub struct RigidTransform<B: Backend> {
    translation: Param<Tensor<B, 1>>,
    rotation: Param<Tensor<B, 1>>, // (x, y, z) radians
    center: Tensor<B, 1>,
}

impl<B: Backend> RigidTransform<B> {
    pub fn new(translation: Tensor<B, 1>, rotation: Tensor<B, 1>, center: Tensor<B, 1>) -> Self {
        Self {
            translation: Param::from_tensor(translation),
            rotation: Param::from_tensor(rotation),
            center,
        }
    }

    /// Identity rotating about `center`.
    pub fn identity(center: &Point3<f64>, device: &B::Device) -> Self {
        let c = Tensor::from_floats([center.x as f32, center.y as f32, center.z as f32], device);
        Self::new(Tensor::zeros([3], device), Tensor::zeros([3], device), c)
    }

    pub fn translation(&self) -> Tensor<B, 1> {
        self.translation.val()
    }

    pub fn rotation(&self) -> Tensor<B, 1> {
        self.rotation.val()
    }

    fn rotation_matrix(&self) -> Tensor<B, 2> {
        let r = self.rotation.val();
        let alpha = r.clone().slice([0..1]);
        let beta = r.clone().slice([1..2]);
        let gamma = r.slice([2..3]);

        let cx = alpha.clone().cos();
        let sx = alpha.sin();
        let cy = beta.clone().cos();
        let sy = beta.sin();
        let cz = gamma.clone().cos();
        let sz = gamma.sin();

        let r11 = cz.clone().mul(cy.clone());
        let r12 = cz.clone().mul(sy.clone()).mul(sx.clone()).sub(sz.clone().mul(cx.clone()));
        let r13 = cz.clone().mul(sy.clone()).mul(cx.clone()).add(sz.clone().mul(sx.clone()));

        let r21 = sz.clone().mul(cy.clone());
        let r22 = sz.clone().mul(sy.clone()).mul(sx.clone()).add(cz.clone().mul(cx.clone()));
        let r23 = sz.mul(sy.clone()).mul(cx.clone()).sub(cz.mul(sx.clone()));

        let r31 = sy.neg();
        let r32 = cy.clone().mul(sx);
        let r33 = cy.mul(cx);

        let row1 = Tensor::cat(vec![r11, r12, r13], 0).reshape([1, 3]);
        let row2 = Tensor::cat(vec![r21, r22, r23], 0).reshape([1, 3]);
        let row3 = Tensor::cat(vec![r31, r32, r33], 0).reshape([1, 3]);
        Tensor::cat(vec![row1, row2, row3], 0)
    }

    /// Homogeneous matrix of the current parameters.
    pub fn to_matrix(&self) -> Result<Matrix4<f64>> {
        let angles = tensor_values(self.rotation())?;
        let t = tensor_values(self.translation())?;
        let c = tensor_values(self.center.clone())?;
        let rotation = euler_rotation(angles[0], angles[1], angles[2]);
        Ok(homogeneous(
            &rotation,
            &Vector3::new(t[0], t[1], t[2]),
            &Vector3::new(c[0], c[1], c[2]),
        ))
    }
}

impl<B: Backend> Transform<B> for RigidTransform<B> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let r = self.rotation_matrix();
        let t = self.translation.val().reshape([1, 3]);
        let c = self.center.clone().reshape([1, 3]);
        (points - c.clone()).matmul(r.transpose()) + c + t
    }
}

/// `Rz(γ) Ry(β) Rx(α)`
pub fn euler_rotation(alpha: f64, beta: f64, gamma: f64) -> Matrix3<f64> {
    let (sx, cx) = alpha.sin_cos();
    let (sy, cy) = beta.sin_cos();
    let (sz, cz) = gamma.sin_cos();
    Matrix3::new(
        cz * cy, cz * sy * sx - sz * cx, cz * sy * cx + sz * sx,
        sz * cy, sz * sy * sx + cz * cx, sz * sy * cx - cz * sx,
        -sy, cy * sx, cy * cx,
    )
}

/// Homogeneous form of `x ↦ A(x - c) + c + t`.
pub fn homogeneous(a: &Matrix3<f64>, t: &Vector3<f64>, c: &Vector3<f64>) -> Matrix4<f64> {
    let offset = c + t - a * c;
    let mut m = a.to_homogeneous();
    m[(0, 3)] = offset.x;
    m[(1, 3)] = offset.y;
    m[(2, 3)] = offset.z;
    m
}
