//! Nearest neighbour interpolation.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::trait_::Interpolator;

/// Rounds each coordinate to the closest voxel, clamped to the grid.
///
/// Not differentiable with respect to the coordinates; used for the final
/// resampling only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestInterpolator;

impl NearestInterpolator {
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> Interpolator<B> for NearestInterpolator {
    fn interpolate(&self, data: &Tensor<B, 3>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        let [d, h, w] = data.dims();

        let x = indices.clone().narrow(1, 0, 1).squeeze::<1>(1);
        let y = indices.clone().narrow(1, 1, 1).squeeze::<1>(1);
        let z = indices.narrow(1, 2, 1).squeeze::<1>(1);

        let x_i = x.round().clamp(0.0, (w - 1) as f64).int();
        let y_i = y.round().clamp(0.0, (h - 1) as f64).int();
        let z_i = z.round().clamp(0.0, (d - 1) as f64).int();

        let idx = z_i * (h * w) as i32 + y_i * w as i32 + x_i;
        data.clone().reshape([d * h * w]).gather(0, idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;

    fn volume() -> Tensor<Backend, 3> {
        let values: Vec<f32> = (0..8).map(|v| v as f32).collect();
        Tensor::<Backend, 1>::from_floats(values.as_slice(), &Default::default()).reshape([2, 2, 2])
    }

    #[test]
    fn test_rounds_to_nearest_voxel() {
        let indices = Tensor::<Backend, 2>::from_floats(
            [[0.4, 0.4, 0.4], [0.6, 0.6, 0.6], [1.0, 0.0, 0.0]],
            &Default::default(),
        );
        let values = NearestInterpolator::new()
            .interpolate(&volume(), indices)
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(values, vec![0.0, 7.0, 1.0]);
    }

    #[test]
    fn test_clamps_outside_grid() {
        let indices = Tensor::<Backend, 2>::from_floats([[-2.0, 0.0, 0.0], [5.0, 5.0, 5.0]], &Default::default());
        let values = NearestInterpolator::new()
            .interpolate(&volume(), indices)
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(values, vec![0.0, 7.0]);
    }
}
