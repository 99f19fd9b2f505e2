//! Built-in registration engine.
//!
//! Minimises mean squared error with Adam on an autodiff backend `B`, while
//! the volumes, series and transform tables it exchanges live on
//! `B::InnerBackend`.

use std::marker::PhantomData;

use burn::config::Config;
use burn::module::AutodiffModule;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;
use dmoco_core::filter::{GaussianMask, ResampleImageFilter};
use dmoco_core::interpolation::{
    CubicInterpolator, InterpolationKind, Interpolator, LinearInterpolator, NearestInterpolator,
};
use dmoco_core::transform::{AffineTransform, RigidTransform, TranslationTransform};
use dmoco_core::{DiffusionSeries, MotionTransform, TransformTable, Volume, VolumeMotion};

use crate::deformable::DisplacementParams;
use crate::engine::{RegistrationEngine, RegistrationMode};
use crate::error::{self, RegistrationError};
use crate::metric::{MeanSquaredError, Metric, WeightedMeanSquaredError};
use crate::optimizer::AdamOptimizer;
use crate::registration::{Registration, RegistrationOutcome, Trainable};
use crate::regularization::DiffusionRegularizer;

/// Optimisation settings of [`GradientEngine`].
#[derive(Config, Debug, PartialEq)]
pub struct GradientEngineConfig {
    /// Maximum optimiser steps per registration pair
    #[config(default = "100")]
    pub iterations: usize,
    /// Adam learning rate
    #[config(default = "0.1")]
    pub learning_rate: f64,
    /// Weight of the diffusion penalty in deformable mode
    #[config(default = "0.1")]
    pub smoothness_weight: f64,
    /// Relative loss change below which a run stops early
    #[config(default = "1e-6")]
    pub tolerance: f64,
    /// Interpolator of the final resampling
    #[config(default = "InterpolationKind::Linear")]
    pub interpolation: InterpolationKind,
    /// Sigma (mm) of the in-plane Gaussian weighting of the metric; 0 disables it
    #[config(default = "0.0")]
    pub mask_sigma: f64,
}

pub struct GradientEngine<B: AutodiffBackend> {
    config: GradientEngineConfig,
    centerline: Option<Vec<Option<[f64; 2]>>>,
    _phantom: PhantomData<B>,
}

impl<B: AutodiffBackend> GradientEngine<B> {
    pub fn new(config: GradientEngineConfig) -> Self {
        Self {
            config,
            centerline: None,
            _phantom: PhantomData,
        }
    }

    /// Centre the weighting mask on these per-slice `(x, y)` index points
    /// instead of the slice centre. See [`dmoco_core::filter::slice_centroids`].
    pub fn with_centerline(mut self, centers: Vec<Option<[f64; 2]>>) -> Self {
        self.centerline = Some(centers);
        self
    }

    pub fn config(&self) -> &GradientEngineConfig {
        &self.config
    }

    /// Metric weights on `fixed`'s grid, `None` when masking is off.
    fn mask_weights(
        &self,
        fixed: &Volume<B::InnerBackend>,
    ) -> error::Result<Option<Volume<B::InnerBackend>>> {
        let sigma = self.config.mask_sigma;
        if !(sigma.is_finite() && sigma >= 0.0) {
            return Err(RegistrationError::invalid_configuration(format!(
                "mask sigma must be zero or positive, got {}",
                sigma
            )));
        }
        if sigma == 0.0 {
            return Ok(None);
        }
        let mut mask = GaussianMask::new(sigma);
        if let Some(centers) = &self.centerline {
            mask = mask.with_centers(centers.clone());
        }
        Ok(Some(mask.weights(fixed)?))
    }

    fn register<T>(
        &self,
        fixed: &Volume<B>,
        moving: &Volume<B>,
        weights: Option<&Volume<B>>,
        transform: T,
        regularize: bool,
    ) -> error::Result<RegistrationOutcome<T>>
    where
        T: Trainable<B> + AutodiffModule<B>,
    {
        match weights {
            Some(weights) => self.register_with(
                WeightedMeanSquaredError::new(weights),
                fixed,
                moving,
                transform,
                regularize,
            ),
            None => self.register_with(MeanSquaredError::new(), fixed, moving, transform, regularize),
        }
    }

    fn register_with<M, T>(
        &self,
        metric: M,
        fixed: &Volume<B>,
        moving: &Volume<B>,
        transform: T,
        regularize: bool,
    ) -> error::Result<RegistrationOutcome<T>>
    where
        M: Metric<B>,
        T: Trainable<B> + AutodiffModule<B>,
    {
        let optimizer = AdamOptimizer::new(self.config.learning_rate);
        let mut registration =
            Registration::new(optimizer, metric).with_tolerance(self.config.tolerance);
        if regularize {
            registration =
                registration.with_regularizer(DiffusionRegularizer::new(self.config.smoothness_weight));
        }
        registration.execute(
            fixed,
            moving,
            transform,
            self.config.iterations,
            self.config.learning_rate,
        )
    }

    fn estimate_whole(
        &self,
        fixed: &Volume<B>,
        moving: &Volume<B>,
        weights: Option<&Volume<B>>,
        mode: RegistrationMode,
    ) -> error::Result<MotionTransform<B::InnerBackend>> {
        let device = fixed.device();
        let center = fixed.center();
        let motion = match mode {
            RegistrationMode::Rigid => {
                let initial = RigidTransform::<B>::identity(&center, &device);
                let outcome = self.register(fixed, moving, weights, initial, false)?;
                MotionTransform::Linear(outcome.transform.to_matrix()?)
            }
            RegistrationMode::Affine => {
                let initial = AffineTransform::<B>::identity(&center, &device);
                let outcome = self.register(fixed, moving, weights, initial, false)?;
                MotionTransform::Linear(outcome.transform.to_matrix()?)
            }
            RegistrationMode::Deformable => {
                let initial = DisplacementParams::<B>::zeros_like(fixed)?;
                let outcome = self.register(fixed, moving, weights, initial, true)?;
                MotionTransform::Deformable(outcome.transform.valid().to_field()?)
            }
            RegistrationMode::SliceRigid => {
                return Err(RegistrationError::estimation_failed(
                    "slice-wise motion has no whole-volume estimate",
                ))
            }
        };
        Ok(motion)
    }

    fn estimate_slices(
        &self,
        fixed: &Volume<B::InnerBackend>,
        moving: &Volume<B::InnerBackend>,
        weights: Option<&Volume<B::InnerBackend>>,
    ) -> error::Result<Vec<MotionTransform<B::InnerBackend>>> {
        let nz = fixed.num_slices();
        let mut slices = Vec::with_capacity(nz);
        for z in 0..nz {
            let fixed_slice = lift::<B>(&fixed.slice(z)?);
            let moving_slice = lift::<B>(&moving.slice(z)?);
            let weight_slice = weights.map(|w| w.slice(z)).transpose()?.map(|w| lift::<B>(&w));
            let initial = TranslationTransform::<B>::in_plane(&fixed_slice.device());
            let outcome =
                self.register(&fixed_slice, &moving_slice, weight_slice.as_ref(), initial, false)?;
            tracing::debug!(
                "slice {}: {} iterations, loss {:.6}",
                z,
                outcome.iterations,
                outcome.final_loss
            );
            slices.push(MotionTransform::Linear(outcome.transform.to_matrix()?));
        }
        Ok(slices)
    }
}

impl<B: AutodiffBackend> Default for GradientEngine<B> {
    fn default() -> Self {
        Self::new(GradientEngineConfig::new())
    }
}

impl<B: AutodiffBackend> RegistrationEngine<B::InnerBackend> for GradientEngine<B> {
    fn estimate_transform(
        &mut self,
        moving: &Volume<B::InnerBackend>,
        fixed: &Volume<B::InnerBackend>,
        mode: RegistrationMode,
    ) -> error::Result<VolumeMotion<B::InnerBackend>> {
        if moving.shape() != fixed.shape() {
            return Err(RegistrationError::ShapeMismatch {
                expected: fixed.shape().to_vec(),
                actual: moving.shape().to_vec(),
            });
        }
        let weights = self.mask_weights(fixed)?;
        match mode {
            RegistrationMode::SliceRigid => Ok(VolumeMotion::PerSlice(self.estimate_slices(
                fixed,
                moving,
                weights.as_ref(),
            )?)),
            _ => Ok(VolumeMotion::Whole(self.estimate_whole(
                &lift::<B>(fixed),
                &lift::<B>(moving),
                weights.as_ref().map(lift::<B>).as_ref(),
                mode,
            )?)),
        }
    }

    fn apply_transforms(
        &mut self,
        series: &DiffusionSeries<B::InnerBackend>,
        table: &TransformTable<B::InnerBackend>,
        target: &Volume<B::InnerBackend>,
    ) -> error::Result<DiffusionSeries<B::InnerBackend>> {
        let n = series.len();
        if let Some(missing) = table.first_missing(n) {
            return Err(RegistrationError::apply_failed(format!(
                "no transform for acquisition {}",
                missing
            )));
        }
        if table.len() != n {
            return Err(RegistrationError::apply_failed(format!(
                "table has {} entries for a series of {} volumes",
                table.len(),
                n
            )));
        }

        let mut corrected = Vec::with_capacity(n);
        for (t, volume) in series.volumes().enumerate() {
            let volume = volume?;
            let motion = table.get(t).ok_or_else(|| {
                RegistrationError::apply_failed(format!("no transform for acquisition {}", t))
            })?;
            corrected.push(resample_volume(&volume, motion, target, self.config.interpolation)?);
        }
        Ok(DiffusionSeries::from_volumes(corrected)?)
    }

    fn compose_transforms(
        &mut self,
        primary: &TransformTable<B::InnerBackend>,
        secondary: &TransformTable<B::InnerBackend>,
    ) -> error::Result<TransformTable<B::InnerBackend>> {
        compose_tables(primary, secondary)
    }
}

fn lift<B: AutodiffBackend>(volume: &Volume<B::InnerBackend>) -> Volume<B> {
    Volume::new(Tensor::from_inner(volume.data().clone()), *volume.geometry())
}

/// Resample `volume` onto `target`'s grid with the chosen interpolator.
/// Slice-wise motion resamples each target slice with its own transform.
pub fn resample_volume<B: Backend>(
    volume: &Volume<B>,
    motion: &VolumeMotion<B>,
    target: &Volume<B>,
    interpolation: InterpolationKind,
) -> error::Result<Volume<B>> {
    match interpolation {
        InterpolationKind::Nearest => resample_with(volume, motion, target, NearestInterpolator::new()),
        InterpolationKind::Linear => resample_with(volume, motion, target, LinearInterpolator::new()),
        InterpolationKind::Spline => resample_with(volume, motion, target, CubicInterpolator::new()),
    }
}

fn resample_with<B: Backend, I: Interpolator<B> + Copy>(
    volume: &Volume<B>,
    motion: &VolumeMotion<B>,
    target: &Volume<B>,
    interpolator: I,
) -> error::Result<Volume<B>> {
    match motion {
        VolumeMotion::Whole(transform) => {
            Ok(ResampleImageFilter::new_from_reference(target, transform, interpolator).apply(volume)?)
        }
        VolumeMotion::PerSlice(transforms) => {
            let nz = target.num_slices();
            if transforms.len() != nz {
                return Err(RegistrationError::apply_failed(format!(
                    "{} slice transforms for a target of {} slices",
                    transforms.len(),
                    nz
                )));
            }
            let mut slices = Vec::with_capacity(nz);
            for (z, transform) in transforms.iter().enumerate() {
                let target_slice = target.slice(z)?;
                let filter = ResampleImageFilter::new_from_reference(&target_slice, transform, interpolator);
                slices.push(filter.apply(volume)?);
            }
            Ok(Volume::from_slices(slices, *target.geometry())?)
        }
    }
}

/// Entry-wise composition, `primary` applied first. Key sets and slice
/// counts must agree.
pub fn compose_tables<B: Backend>(
    primary: &TransformTable<B>,
    secondary: &TransformTable<B>,
) -> error::Result<TransformTable<B>> {
    if !primary.keys().eq(secondary.keys()) {
        return Err(RegistrationError::composition_mismatch(format!(
            "tables cover different acquisitions ({} vs {} entries)",
            primary.len(),
            secondary.len()
        )));
    }

    let mut composed = TransformTable::new();
    for ((index, first), (_, second)) in primary.iter().zip(secondary.iter()) {
        let motion = match (first, second) {
            (VolumeMotion::Whole(a), VolumeMotion::Whole(b)) => {
                VolumeMotion::Whole(a.clone().then(b.clone()))
            }
            (VolumeMotion::PerSlice(a), VolumeMotion::PerSlice(b)) if a.len() == b.len() => {
                VolumeMotion::PerSlice(
                    a.iter()
                        .zip(b)
                        .map(|(a, b)| a.clone().then(b.clone()))
                        .collect(),
                )
            }
            _ => {
                return Err(RegistrationError::composition_mismatch(format!(
                    "acquisition {}: slice counts {:?} and {:?} differ",
                    index,
                    first.slice_count(),
                    second.slice_count()
                )))
            }
        };
        composed.insert(index, motion)?;
    }
    Ok(composed)
}
