use std::path::Path;

use anyhow::{Context, Result};
use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};
use dmoco_core::{DiffusionSeries, Volume, VoxelGeometry};
use nalgebra::{Matrix3, Point3, Vector3};
use ndarray::{Array4, Ix4};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

/// Voxel geometry from the sform, the qform, or pixdim alone, in that order
/// of preference.
pub fn header_geometry(header: &NiftiHeader) -> VoxelGeometry {
    let affine = if header.sform_code > 0 {
        [header.srow_x, header.srow_y, header.srow_z]
    } else if header.qform_code > 0 {
        let b = header.quatern_b;
        let c = header.quatern_c;
        let d = header.quatern_d;
        let a = (1.0 - (b * b + c * c + d * d).min(1.0)).sqrt();

        let qfac = if header.pixdim[0] == 0.0 { 1.0 } else { header.pixdim[0] };

        let r11 = a * a + b * b - c * c - d * d;
        let r12 = 2.0 * b * c - 2.0 * a * d;
        let r13 = 2.0 * b * d + 2.0 * a * c;

        let r21 = 2.0 * b * c + 2.0 * a * d;
        let r22 = a * a + c * c - b * b - d * d;
        let r23 = 2.0 * c * d - 2.0 * a * b;

        let r31 = 2.0 * b * d - 2.0 * a * c;
        let r32 = 2.0 * c * d + 2.0 * a * b;
        let r33 = a * a + d * d - c * c - b * b;

        let dx = header.pixdim[1];
        let dy = header.pixdim[2];
        let dz = header.pixdim[3] * qfac;

        [
            [r11 * dx, r12 * dy, r13 * dz, header.quatern_x],
            [r21 * dx, r22 * dy, r23 * dz, header.quatern_y],
            [r31 * dx, r32 * dy, r33 * dz, header.quatern_z],
        ]
    } else {
        let dx = header.pixdim[1];
        let dy = header.pixdim[2];
        let dz = header.pixdim[3];
        [
            [dx, 0.0, 0.0, 0.0],
            [0.0, dy, 0.0, 0.0],
            [0.0, 0.0, dz, 0.0],
        ]
    };

    let m = Matrix3::from_fn(|r, c| affine[r][c] as f64);
    let origin = Point3::new(affine[0][3] as f64, affine[1][3] as f64, affine[2][3] as f64);

    let mut spacing = Vector3::repeat(1.0);
    let mut direction = Matrix3::identity();
    for axis in 0..3 {
        let column = m.column(axis).into_owned();
        let norm = column.norm();
        if norm > 1e-9 {
            spacing[axis] = norm;
            direction.set_column(axis, &(column / norm));
        }
    }

    VoxelGeometry::new(origin, spacing, direction)
}

/// Header carrying `geometry` as an sform.
pub fn geometry_header(geometry: &VoxelGeometry) -> NiftiHeader {
    let m = geometry.index_to_world_matrix();
    let origin = geometry.origin();
    let spacing = geometry.spacing();
    let row = |r: usize| {
        [
            m[(r, 0)] as f32,
            m[(r, 1)] as f32,
            m[(r, 2)] as f32,
            origin[r] as f32,
        ]
    };

    let mut header = NiftiHeader::default();
    header.pixdim = [
        1.0,
        spacing.x as f32,
        spacing.y as f32,
        spacing.z as f32,
        1.0,
        1.0,
        1.0,
        1.0,
    ];
    header.sform_code = 1;
    header.qform_code = 0;
    header.srow_x = row(0);
    header.srow_y = row(1);
    header.srow_z = row(2);
    header
}

/// Read a 4D NIfTI file as a diffusion series `[T, Z, Y, X]`.
///
/// A 3D file is read as a series of one volume.
pub fn read_series<B: Backend, P: AsRef<Path>>(
    path: P,
    device: &B::Device,
) -> Result<DiffusionSeries<B>> {
    let path = path.as_ref();
    let obj = ReaderOptions::new()
        .read_file(path)
        .with_context(|| format!("Failed to read NIfTI file {}", path.display()))?;
    let geometry = header_geometry(obj.header());

    let array = obj
        .into_volume()
        .into_ndarray::<f32>()
        .context("Failed to convert volume to ndarray")?;

    let array = match array.ndim() {
        3 => array.insert_axis(ndarray::Axis(3)),
        4 => array,
        n => anyhow::bail!("Expected a 3D or 4D NIfTI file, found {} dimensions", n),
    };
    let array = array
        .into_dimensionality::<Ix4>()
        .context("Failed to view volume as 4D")?;

    // NIfTI indexes [X, Y, Z, T]; series tensors are [T, Z, Y, X].
    let (nx, ny, nz, nt) = array.dim();
    let values: Vec<f32> = array.permuted_axes([3, 2, 1, 0]).iter().copied().collect();
    let data = TensorData::new(values, Shape::new([nt, nz, ny, nx]));
    let tensor = Tensor::<B, 4>::from_data(data, device);

    tracing::info!(
        "Read {} volumes of {}x{}x{} from {}",
        nt,
        nx,
        ny,
        nz,
        path.display()
    );
    Ok(DiffusionSeries::new(tensor, geometry))
}

/// Write a diffusion series as a 4D NIfTI file. A `.gz` suffix compresses.
pub fn write_series<B: Backend, P: AsRef<Path>>(path: P, series: &DiffusionSeries<B>) -> Result<()> {
    let [nt, nz, ny, nx] = series.data().dims();
    let values = tensor_values(series.data().clone())?;
    let array = Array4::from_shape_vec((nt, nz, ny, nx), values)
        .context("Failed to create ndarray")?
        .permuted_axes([3, 2, 1, 0]);
    write_array(path.as_ref(), series.geometry(), &array)
}

/// Write a single volume as a 3D NIfTI file.
pub fn write_volume<B: Backend, P: AsRef<Path>>(path: P, volume: &Volume<B>) -> Result<()> {
    let [nz, ny, nx] = volume.shape();
    let values = tensor_values(volume.data().clone())?;
    let array = ndarray::Array3::from_shape_vec((nz, ny, nx), values)
        .context("Failed to create ndarray")?
        .permuted_axes([2, 1, 0]);
    write_array(path.as_ref(), volume.geometry(), &array)
}

fn write_array<D: ndarray::Dimension + ndarray::RemoveAxis>(
    path: &Path,
    geometry: &VoxelGeometry,
    array: &ndarray::Array<f32, D>,
) -> Result<()> {
    use nifti::writer::WriterOptions;

    let header = geometry_header(geometry);
    WriterOptions::new(path)
        .reference_header(&header)
        .write_nifti(array)
        .with_context(|| format!("Failed to write NIfTI file {}", path.display()))?;
    tracing::debug!("Wrote {}", path.display());
    Ok(())
}

fn tensor_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Failed to get tensor data: {:?}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use nifti::writer::WriterOptions;
    use tempfile::tempdir;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_read_series_axis_order() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("dwi.nii");

        // Value encodes its [x, y, z, t] position.
        let array = Array4::from_shape_fn((3, 4, 2, 5), |(x, y, z, t)| {
            (1000 * t + 100 * z + 10 * y + x) as f32
        });
        WriterOptions::new(&file_path).write_nifti(&array)?;

        let device = Default::default();
        let series = read_series::<TestBackend, _>(&file_path, &device)?;
        assert_eq!(series.len(), 5);
        assert_eq!(series.volume_shape(), [2, 4, 3]);

        let volume = series.volume(3)?.values()?;
        // [z=1, y=2, x=1] in a [2, 4, 3] volume
        assert_eq!(volume[(4 + 2) * 3 + 1], 3121.0);
        Ok(())
    }

    #[test]
    fn test_geometry_header_round_trip() {
        let geometry = VoxelGeometry::new(
            Point3::new(-10.0, 5.0, 2.5),
            Vector3::new(2.0, 2.0, 3.0),
            Matrix3::identity(),
        );
        let recovered = header_geometry(&geometry_header(&geometry));
        assert!(recovered.approx_eq(&geometry, 1e-5));
    }
}
