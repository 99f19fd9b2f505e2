use burn::backend::Autodiff;
use burn::tensor::{Tensor, TensorData};
use burn_ndarray::NdArray;
use dmoco_core::{DiffusionSeries, MotionTransform, TransformTable, Volume, VolumeMotion, VoxelGeometry};
use dmoco_registration::metric::{MeanSquaredError, Metric};
use dmoco_registration::{GradientEngine, GradientEngineConfig, RegistrationEngine, RegistrationError, RegistrationMode};

type Inner = NdArray<f32>;
type B = Autodiff<Inner>;

const SHAPE: [usize; 3] = [10, 12, 12];

fn blob(cx: f32) -> Volume<Inner> {
    let [d, h, w] = SHAPE;
    let sigma = 2.0f32;
    let mut data = Vec::with_capacity(d * h * w);
    for z in 0..d {
        for y in 0..h {
            for x in 0..w {
                let dx = x as f32 - cx;
                let dy = y as f32 - 6.0;
                let dz = z as f32 - 5.0;
                data.push((-(dx * dx + dy * dy + dz * dz) / (2.0 * sigma * sigma)).exp());
            }
        }
    }
    let tensor = Tensor::<Inner, 3>::from_data(TensorData::new(data, SHAPE), &Default::default());
    Volume::new(tensor, VoxelGeometry::identity())
}

fn residual(fixed: &Volume<Inner>, moving: &Volume<Inner>) -> f32 {
    let identity = MotionTransform::<Inner>::identity();
    MeanSquaredError::new()
        .forward(fixed, moving, &identity)
        .unwrap()
        .into_scalar()
}

fn apply(engine: &mut GradientEngine<B>, moving: &Volume<Inner>, motion: VolumeMotion<Inner>, fixed: &Volume<Inner>) -> Volume<Inner> {
    let mut table = TransformTable::new();
    table.insert(0, motion).unwrap();
    let series = DiffusionSeries::from_volumes(vec![moving.clone()]).unwrap();
    engine
        .apply_transforms(&series, &table, fixed)
        .unwrap()
        .volume(0)
        .unwrap()
}

#[test]
fn test_affine_mode_recovers_shift() {
    let fixed = blob(6.0);
    let moving = blob(7.0);

    let config = GradientEngineConfig::new().with_iterations(200).with_tolerance(0.0);
    let mut engine = GradientEngine::<B>::new(config);
    let motion = engine
        .estimate_transform(&moving, &fixed, RegistrationMode::Affine)
        .unwrap();

    let VolumeMotion::Whole(transform) = &motion else {
        panic!("whole-volume motion expected");
    };
    let t = transform.translation_part().unwrap();
    assert!((t.x - 1.0).abs() < 0.3, "x shift {}", t.x);
    assert!(t.y.abs() < 0.3 && t.z.abs() < 0.3, "shift {:?}", t);
}

#[test]
fn test_deformable_mode_reduces_residual() {
    let fixed = blob(6.0);
    let moving = blob(7.0);

    let config = GradientEngineConfig::new()
        .with_iterations(150)
        .with_smoothness_weight(0.01)
        .with_tolerance(0.0);
    let mut engine = GradientEngine::<B>::new(config);
    let motion = engine
        .estimate_transform(&moving, &fixed, RegistrationMode::Deformable)
        .unwrap();
    assert!(!motion.is_linear());

    let corrected = apply(&mut engine, &moving, motion, &fixed);
    let before = residual(&fixed, &moving);
    let after = residual(&fixed, &corrected);
    assert!(after < before * 0.5, "residual {} not below half of {}", after, before);
}

#[test]
fn test_shape_mismatch_is_rejected() {
    let fixed = blob(6.0);
    let moving = Volume::new(
        Tensor::<Inner, 3>::zeros([2, 2, 2], &Default::default()),
        VoxelGeometry::identity(),
    );
    let mut engine = GradientEngine::<B>::default();
    let result = engine.estimate_transform(&moving, &fixed, RegistrationMode::Rigid);
    assert!(matches!(result, Err(RegistrationError::ShapeMismatch { .. })));
}

#[test]
fn test_apply_rejects_incomplete_table() {
    let fixed = blob(6.0);
    let series = DiffusionSeries::from_volumes(vec![fixed.clone(), fixed.clone()]).unwrap();
    let mut table = TransformTable::new();
    table.insert(0, VolumeMotion::Whole(MotionTransform::identity())).unwrap();

    let mut engine = GradientEngine::<B>::default();
    let result = engine.apply_transforms(&series, &table, &fixed);
    assert!(matches!(result, Err(RegistrationError::ApplyFailed(_))));
}
