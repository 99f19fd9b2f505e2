//! Estimated motion values.
//!
//! [`MotionTransform`] is what a registration engine hands back for one
//! registration pair: a frozen, parameter-free transform that can be copied
//! between acquisitions, composed and applied. [`VolumeMotion`] holds either
//! one such transform for a whole volume or one per slice.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nalgebra::{Matrix4, Vector3};

use super::displacement::DisplacementField;
use super::trait_::Transform;

#[derive(Debug, Clone)]
pub enum MotionTransform<B: Backend> {
    /// Rigid or affine motion as a homogeneous matrix acting on physical
    /// column vectors.
    Linear(Matrix4<f64>),
    /// Non-linear motion.
    Deformable(DisplacementField<B>),
    /// Applied left to right: `Chained([a, b])` maps `x` to `b(a(x))`.
    Chained(Vec<MotionTransform<B>>),
}

impl<B: Backend> MotionTransform<B> {
    pub fn identity() -> Self {
        Self::Linear(Matrix4::identity())
    }

    pub fn translation(t: Vector3<f64>) -> Self {
        Self::Linear(Matrix4::new_translation(&t))
    }

    pub fn is_linear(&self) -> bool {
        matches!(self, Self::Linear(_))
    }

    pub fn matrix(&self) -> Option<&Matrix4<f64>> {
        match self {
            Self::Linear(m) => Some(m),
            _ => None,
        }
    }

    /// Translation part of a linear transform.
    pub fn translation_part(&self) -> Option<Vector3<f64>> {
        self.matrix()
            .map(|m| Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]))
    }

    /// Same linear part with a replaced translation; `None` for non-linear
    /// transforms.
    pub fn with_translation(&self, t: Vector3<f64>) -> Option<Self> {
        self.matrix().map(|m| {
            let mut m = *m;
            m[(0, 3)] = t.x;
            m[(1, 3)] = t.y;
            m[(2, 3)] = t.z;
            Self::Linear(m)
        })
    }

    /// Apply `self` first, then `next`. Two linear transforms collapse into
    /// one matrix; anything else becomes a chain.
    pub fn then(self, next: Self) -> Self {
        match (self, next) {
            (Self::Linear(a), Self::Linear(b)) => Self::Linear(b * a),
            (Self::Chained(mut items), Self::Chained(rest)) => {
                items.extend(rest);
                Self::Chained(items)
            }
            (Self::Chained(mut items), next) => {
                items.push(next);
                Self::Chained(items)
            }
            (first, Self::Chained(rest)) => {
                let mut items = Vec::with_capacity(rest.len() + 1);
                items.push(first);
                items.extend(rest);
                Self::Chained(items)
            }
            (first, next) => Self::Chained(vec![first, next]),
        }
    }
}

impl<B: Backend> Transform<B> for MotionTransform<B> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        match self {
            Self::Linear(m) => {
                let device = points.device();
                let mut a_t = Vec::with_capacity(9);
                for r in 0..3 {
                    for c in 0..3 {
                        a_t.push(m[(c, r)] as f32);
                    }
                }
                let a_t = Tensor::<B, 1>::from_floats(a_t.as_slice(), &device).reshape([3, 3]);
                let b = Tensor::<B, 1>::from_floats(
                    [m[(0, 3)] as f32, m[(1, 3)] as f32, m[(2, 3)] as f32],
                    &device,
                )
                .reshape([1, 3]);
                points.matmul(a_t) + b
            }
            Self::Deformable(field) => field.transform_points(points),
            Self::Chained(items) => items
                .iter()
                .fold(points, |p, item| item.transform_points(p)),
        }
    }
}

/// Motion of one acquisition: whole-volume or slice-wise.
#[derive(Debug, Clone)]
pub enum VolumeMotion<B: Backend> {
    Whole(MotionTransform<B>),
    /// One transform per slice index, in slice order.
    PerSlice(Vec<MotionTransform<B>>),
}

impl<B: Backend> VolumeMotion<B> {
    /// `None` for whole-volume motion.
    pub fn slice_count(&self) -> Option<usize> {
        match self {
            Self::Whole(_) => None,
            Self::PerSlice(slices) => Some(slices.len()),
        }
    }

    /// Number of individual transforms held.
    pub fn transform_count(&self) -> usize {
        self.slice_count().unwrap_or(1)
    }

    pub fn transforms(&self) -> &[MotionTransform<B>] {
        match self {
            Self::Whole(t) => std::slice::from_ref(t),
            Self::PerSlice(slices) => slices,
        }
    }

    pub fn is_linear(&self) -> bool {
        self.transforms().iter().all(MotionTransform::is_linear)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_linear_then_linear_collapses() {
        let a = MotionTransform::<TestBackend>::translation(Vector3::new(1.0, 0.0, 0.0));
        let b = MotionTransform::<TestBackend>::translation(Vector3::new(0.0, 2.0, 0.0));
        let c = a.then(b);
        assert_eq!(c.translation_part(), Some(Vector3::new(1.0, 2.0, 0.0)));
    }

    #[test]
    fn test_with_translation_keeps_linear_part() {
        let mut m = Matrix4::identity();
        m[(0, 0)] = 2.0;
        m[(1, 3)] = 5.0;
        let t = MotionTransform::<TestBackend>::Linear(m)
            .with_translation(Vector3::new(0.0, 1.0, 0.0))
            .unwrap();
        let m = t.matrix().unwrap();
        assert_eq!(m[(0, 0)], 2.0);
        assert_eq!(m[(1, 3)], 1.0);
    }

    #[test]
    fn test_linear_points() {
        let device = Default::default();
        let mut m = Matrix4::identity();
        m[(0, 1)] = 1.0;
        m[(2, 3)] = -1.0;
        let transform = MotionTransform::<TestBackend>::Linear(m);
        let points = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0, 3.0]], &device);
        let values = transform.transform_points(points).into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![3.0, 2.0, 2.0]);
    }

    #[test]
    fn test_volume_motion_counts() {
        let whole = VolumeMotion::<TestBackend>::Whole(MotionTransform::identity());
        assert_eq!(whole.slice_count(), None);
        assert_eq!(whole.transform_count(), 1);

        let sliced = VolumeMotion::<TestBackend>::PerSlice(vec![MotionTransform::identity(); 4]);
        assert_eq!(sliced.slice_count(), Some(4));
        assert!(sliced.is_linear());
    }
}
