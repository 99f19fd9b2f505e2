#![allow(dead_code)]

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use burn_ndarray::NdArray;
use dmoco_core::{DiffusionSeries, MotionTransform, TransformTable, Volume, VolumeMotion, VoxelGeometry};
use dmoco_moco::GradientTable;
use dmoco_registration::gradient_engine::compose_tables;
use dmoco_registration::{RegistrationEngine, RegistrationError, RegistrationMode};
use nalgebra::Vector3;

pub type B = NdArray<f32>;

pub const SHAPE: [usize; 3] = [3, 2, 2];

/// Series whose volume `t` is filled with `values[t]`.
pub fn constant_series(values: &[f32]) -> DiffusionSeries<B> {
    let [d, h, w] = SHAPE;
    let data: Vec<f32> = values
        .iter()
        .flat_map(|&v| std::iter::repeat(v).take(d * h * w))
        .collect();
    let tensor = Tensor::<B, 4>::from_data(
        TensorData::new(data, [values.len(), d, h, w]),
        &Default::default(),
    );
    DiffusionSeries::new(tensor, VoxelGeometry::identity())
}

/// `'0'` marks a b=0 acquisition, anything else a DWI one.
pub fn gradients(pattern: &str) -> GradientTable {
    let directions = pattern
        .chars()
        .map(|c| {
            if c == '0' {
                Vector3::zeros()
            } else {
                Vector3::new(1.0, 0.0, 0.0)
            }
        })
        .collect();
    GradientTable::new(directions, None).unwrap()
}

pub fn whole_shift(table: &TransformTable<B>, index: usize) -> Vector3<f64> {
    match table.get(index).unwrap() {
        VolumeMotion::Whole(t) => t.translation_part().unwrap(),
        VolumeMotion::PerSlice(_) => panic!("whole-volume motion expected"),
    }
}

fn mean<BB: Backend>(volume: &Volume<BB>) -> Result<f64, RegistrationError> {
    let values = volume.values()?;
    Ok(values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64)
}

/// Engine that estimates an x shift of `mean(moving) - mean(fixed)`, returns
/// series unchanged, and records what it was asked to do.
#[derive(Default)]
pub struct ScriptedEngine {
    /// `(moving mean, fixed mean)` per estimate call.
    pub estimates: Vec<(f64, f64)>,
    pub applied: Vec<TransformTable<B>>,
    pub compositions: usize,
    /// Zero-based estimate call that fails.
    pub fail_estimate_at: Option<usize>,
}

impl RegistrationEngine<B> for ScriptedEngine {
    fn estimate_transform(
        &mut self,
        moving: &Volume<B>,
        fixed: &Volume<B>,
        mode: RegistrationMode,
    ) -> dmoco_registration::Result<VolumeMotion<B>> {
        if self.fail_estimate_at == Some(self.estimates.len()) {
            return Err(RegistrationError::numerical_instability("scripted failure"));
        }
        let (m, f) = (mean(moving)?, mean(fixed)?);
        self.estimates.push((m, f));
        let transform = MotionTransform::translation(Vector3::new(m - f, 0.0, 0.0));
        Ok(if mode.is_slice_wise() {
            VolumeMotion::PerSlice(vec![transform; fixed.num_slices()])
        } else {
            VolumeMotion::Whole(transform)
        })
    }

    fn apply_transforms(
        &mut self,
        series: &DiffusionSeries<B>,
        table: &TransformTable<B>,
        _target: &Volume<B>,
    ) -> dmoco_registration::Result<DiffusionSeries<B>> {
        self.applied.push(table.clone());
        Ok(series.clone())
    }

    fn compose_transforms(
        &mut self,
        primary: &TransformTable<B>,
        secondary: &TransformTable<B>,
    ) -> dmoco_registration::Result<TransformTable<B>> {
        self.compositions += 1;
        compose_tables(primary, secondary)
    }
}
