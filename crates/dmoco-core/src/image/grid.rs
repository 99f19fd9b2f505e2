use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};

/// Continuous `(x, y, z)` voxel indices of every voxel of a `[Z, Y, X]` grid.
///
/// Rows follow the row-major order of the volume data, so a volume flattened
/// with `reshape([n])` lines up with the returned `[N, 3]` tensor.
pub fn generate_grid<B: Backend>(shape: [usize; 3], device: &B::Device) -> Tensor<B, 2> {
    let [d, h, w] = shape;
    let total = d * h * w;

    let mut grid = Vec::with_capacity(total * 3);
    for z in 0..d {
        for y in 0..h {
            for x in 0..w {
                grid.push(x as f32);
                grid.push(y as f32);
                grid.push(z as f32);
            }
        }
    }

    Tensor::<B, 1>::from_data(TensorData::new(grid, Shape::new([total * 3])), device)
        .reshape([total, 3])
}
