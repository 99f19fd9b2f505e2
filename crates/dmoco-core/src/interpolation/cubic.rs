//! Cubic convolution interpolation.
//!
//! Separable Catmull-Rom kernel over a 4x4x4 neighbourhood. The kernel
//! interpolates (samples at integer coordinates are returned unchanged) and
//! its weights sum to one, so constant regions stay constant.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use super::trait_::Interpolator;

/// Tricubic interpolator with edge replication.
#[derive(Debug, Clone, Copy, Default)]
pub struct CubicInterpolator;

impl CubicInterpolator {
    pub fn new() -> Self {
        Self
    }

    /// Kernel weights for the taps at offsets -1, 0, 1 and 2 from the floor.
    fn weights<B: Backend>(t: Tensor<B, 1>) -> [Tensor<B, 1>; 4] {
        let t2 = t.clone() * t.clone();
        let t3 = t2.clone() * t.clone();
        [
            (t2.clone().mul_scalar(2.0) - t3.clone() - t.clone()).mul_scalar(0.5),
            (t3.clone().mul_scalar(3.0) - t2.clone().mul_scalar(5.0))
                .add_scalar(2.0)
                .mul_scalar(0.5),
            (t2.clone().mul_scalar(4.0) - t3.clone().mul_scalar(3.0) + t).mul_scalar(0.5),
            (t3 - t2).mul_scalar(0.5),
        ]
    }

    /// Clamped integer taps around `floor`.
    fn taps<B: Backend>(floor: &Tensor<B, 1>, len: usize) -> [Tensor<B, 1, Int>; 4] {
        let max = (len - 1) as f64;
        [-1.0, 0.0, 1.0, 2.0].map(|offset| floor.clone().add_scalar(offset).clamp(0.0, max).int())
    }
}

impl<B: Backend> Interpolator<B> for CubicInterpolator {
    fn interpolate(&self, data: &Tensor<B, 3>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        let [d, h, w] = data.dims();
        let [n, _] = indices.dims();
        let device = indices.device();

        let x = indices.clone().narrow(1, 0, 1).squeeze::<1>(1);
        let y = indices.clone().narrow(1, 1, 1).squeeze::<1>(1);
        let z = indices.narrow(1, 2, 1).squeeze::<1>(1);

        let x0 = x.clone().floor();
        let y0 = y.clone().floor();
        let z0 = z.clone().floor();

        let wx = Self::weights(x - x0.clone());
        let wy = Self::weights(y - y0.clone());
        let wz = Self::weights(z - z0.clone());

        let xs = Self::taps(&x0, w);
        let ys = Self::taps(&y0, h);
        let zs = Self::taps(&z0, d);

        let flat = data.clone().reshape([d * h * w]);
        let stride_z = (h * w) as i32;
        let stride_y = w as i32;

        let mut out = Tensor::<B, 1>::zeros([n], &device);
        for (zi, wzk) in zs.iter().zip(&wz) {
            for (yi, wyj) in ys.iter().zip(&wy) {
                let row = zi.clone() * stride_z + yi.clone() * stride_y;
                let wzy = wzk.clone() * wyj.clone();
                for (xi, wxi) in xs.iter().zip(&wx) {
                    let sample = flat.clone().gather(0, row.clone() + xi.clone());
                    out = out + sample * wzy.clone() * wxi.clone();
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;

    fn sample(data: &Tensor<Backend, 3>, points: Vec<[f32; 3]>) -> Vec<f32> {
        let n = points.len();
        let flat: Vec<f32> = points.into_iter().flatten().collect();
        let indices = Tensor::<Backend, 1>::from_floats(flat.as_slice(), &Default::default()).reshape([n, 3]);
        CubicInterpolator::new()
            .interpolate(data, indices)
            .into_data()
            .to_vec::<f32>()
            .unwrap()
    }

    fn quadratic_in_x() -> Tensor<Backend, 3> {
        let mut values = Vec::new();
        for _z in 0..3 {
            for _y in 0..3 {
                for x in 0..8 {
                    values.push((x * x) as f32);
                }
            }
        }
        Tensor::<Backend, 1>::from_floats(values.as_slice(), &Default::default()).reshape([3, 3, 8])
    }

    #[test]
    fn test_reproduces_grid_samples() {
        let values = sample(&quadratic_in_x(), vec![[3.0, 1.0, 1.0], [5.0, 0.0, 2.0]]);
        assert!((values[0] - 9.0).abs() < 1e-4);
        assert!((values[1] - 25.0).abs() < 1e-4);
    }

    #[test]
    fn test_quadratic_between_samples() {
        // Catmull-Rom reproduces polynomials up to degree two away from edges.
        let values = sample(&quadratic_in_x(), vec![[3.5, 1.0, 1.0], [2.25, 1.5, 0.5]]);
        assert!((values[0] - 12.25).abs() < 1e-3);
        assert!((values[1] - 5.0625).abs() < 1e-3);
    }

    #[test]
    fn test_constant_volume_and_clamping() {
        let data = Tensor::<Backend, 3>::ones([1, 4, 4], &Default::default()).mul_scalar(3.0);
        let values = sample(&data, vec![[1.7, 2.2, 0.0], [-4.0, 9.0, 0.3]]);
        assert!(values.iter().all(|v| (v - 3.0).abs() < 1e-5));
    }
}
