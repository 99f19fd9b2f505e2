//! Stage sequencing of a motion correction run.

use std::marker::PhantomData;

use burn::tensor::backend::Backend;
use dmoco_core::{DiffusionSeries, TransformTable, Volume, VolumeMotion};
use dmoco_registration::RegistrationEngine;

use crate::classify::{Classification, GradientTable, VolumeClassifier};
use crate::config::MocoConfig;
use crate::error::{ClassificationError, MocoError, Result, Stage, Subject};
use crate::expand::TransformExpander;
use crate::grouping::{GroupAverages, GroupPlan, GroupPlanner};
use crate::smoothing::{SmoothingDegradation, SmoothingReport, TemporalSmoother};
use crate::target::{TargetSelection, TargetSelector};

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct MocoOutput<B: Backend> {
    /// Input series resampled into the target frame.
    pub corrected: DiffusionSeries<B>,
    pub b0_mean: Volume<B>,
    /// `None` when the series has no DWI volume.
    pub dwi_mean: Option<Volume<B>>,
    /// Transforms used for the final resampling.
    pub table: TransformTable<B>,
    pub classification: Classification,
    pub plan: GroupPlan,
    pub targets: TargetSelection,
    /// Mean of the DWI group averages before registration; `None` without
    /// DWI volumes.
    pub group_mean_average: Option<Volume<B>>,
    /// Group averages after registration to the target group.
    pub registered_group_means: Option<DiffusionSeries<B>>,
    pub smoothing: Option<SmoothingReport>,
    pub smoothing_degradation: Option<SmoothingDegradation>,
}

/// Drives one run over a series with a registration engine.
pub struct MotionCorrection<'a, B: Backend, E: RegistrationEngine<B>> {
    config: &'a MocoConfig,
    engine: E,
    _backend: PhantomData<B>,
}

impl<'a, B: Backend, E: RegistrationEngine<B>> MotionCorrection<'a, B, E> {
    pub fn new(config: &'a MocoConfig, engine: E) -> Self {
        Self {
            config,
            engine,
            _backend: PhantomData,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Correct `series`, whose acquisitions are described by `gradients`.
    ///
    /// `secondary` is composed after the motion table when
    /// `secondary_correction` is enabled, and must be given in that case.
    pub fn run(
        &mut self,
        series: &DiffusionSeries<B>,
        gradients: &GradientTable,
        secondary: Option<&TransformTable<B>>,
    ) -> Result<MocoOutput<B>> {
        let config = self.config;
        config.validate()?;
        let secondary = match (config.secondary_correction, secondary) {
            (true, None) => {
                return Err(MocoError::config(
                    "secondary correction is enabled but no secondary table was given",
                ))
            }
            (true, Some(table)) => Some(table),
            (false, Some(_)) => {
                tracing::warn!("secondary table ignored: secondary correction is disabled");
                None
            }
            (false, None) => None,
        };
        if series.len() != gradients.len() {
            return Err(MocoError::input_mismatch(format!(
                "series has {} volumes but {} gradient directions were given",
                series.len(),
                gradients.len()
            )));
        }
        let total = series.len();
        let mode = config.registration_mode;
        tracing::info!(
            "motion correction of {} volumes, mode {}, group size {}",
            total,
            mode,
            config.group_size
        );

        enter(Stage::Classify);
        let classification = VolumeClassifier::new(config.bval_threshold).classify(gradients)?;

        enter(Stage::GroupAndAverage);
        let plan = GroupPlanner::new(config.group_size)?.plan(classification.dwi_indices());
        let averages = GroupAverages::compute(series, &classification, &plan)?;
        let targets = TargetSelector::select(&classification, &plan)
            .ok_or(ClassificationError::NoReferenceVolumes { total })?;

        enter(Stage::EstimateB0);
        let b0_fixed = series.volume(targets.b0_target)?;
        let mut b0_motions = Vec::with_capacity(classification.b0_indices().len());
        for &index in classification.b0_indices() {
            let moving = series.volume(index)?;
            let motion = self
                .engine
                .estimate_transform(&moving, &b0_fixed, mode)
                .map_err(|e| MocoError::registration(Stage::EstimateB0, Subject::Acquisition(index), e))?;
            tracing::debug!("b=0 volume {} registered", index);
            b0_motions.push((index, motion));
        }

        enter(Stage::EstimateDwiGroups);
        let mut group_motions = Vec::with_capacity(plan.len());
        let mut registered_group_means = None;
        let final_target = match targets.dwi_target_group {
            Some(target_group) => {
                let fixed = averages.group_means[target_group].clone();
                for (group, mean) in averages.group_means.iter().enumerate() {
                    let motion = self
                        .engine
                        .estimate_transform(mean, &fixed, mode)
                        .map_err(|e| MocoError::registration(Stage::EstimateDwiGroups, Subject::Group(group), e))?;
                    tracing::debug!("group {} of {} registered", group + 1, plan.len());
                    group_motions.push(motion);
                }
                registered_group_means =
                    Some(self.register_group_means(&averages, &group_motions, &fixed)?);
                fixed
            }
            None => {
                tracing::info!("no DWI volumes; resampling into the b=0 target frame");
                b0_fixed
            }
        };

        enter(Stage::ExpandTransforms);
        let slices = config.slice_wise().then(|| series.volume_shape()[0]);
        let mut table = TransformExpander::new(total, slices).expand(b0_motions, &plan, group_motions)?;

        let mut smoothing = None;
        let mut smoothing_degradation = None;
        if config.smoothing {
            enter(Stage::Smooth);
            let smoother = TemporalSmoother::new(config.smoothing_knot_spacing, config.smoothing_b0_policy);
            let outcome = smoother.smooth(table, &classification);
            table = outcome.table;
            smoothing = outcome.report;
            smoothing_degradation = outcome.degradation;
        }

        if let Some(secondary) = secondary {
            enter(Stage::CombineSecondary);
            table = self
                .engine
                .compose_transforms(&table, secondary)
                .map_err(MocoError::Composition)?;
        }

        enter(Stage::Apply);
        let corrected = self
            .engine
            .apply_transforms(series, &table, &final_target)
            .map_err(|e| MocoError::registration(Stage::Apply, Subject::Series, e))?;
        if corrected.len() != total {
            return Err(MocoError::input_mismatch(format!(
                "engine returned {} volumes for a series of {}",
                corrected.len(),
                total
            )));
        }

        enter(Stage::AssembleOutputs);
        let b0_mean = corrected.temporal_mean(classification.b0_indices())?;
        let dwi_mean = if classification.dwi_indices().is_empty() {
            None
        } else {
            Some(corrected.temporal_mean(classification.dwi_indices())?)
        };
        tracing::info!("motion correction done");

        Ok(MocoOutput {
            corrected,
            b0_mean,
            dwi_mean,
            table,
            classification,
            plan,
            targets,
            group_mean_average: averages.grand_mean,
            registered_group_means,
            smoothing,
            smoothing_degradation,
        })
    }

    fn register_group_means(
        &mut self,
        averages: &GroupAverages<B>,
        group_motions: &[VolumeMotion<B>],
        fixed: &Volume<B>,
    ) -> Result<DiffusionSeries<B>> {
        let mut group_table = TransformTable::new();
        for (group, motion) in group_motions.iter().enumerate() {
            group_table.insert(group, motion.clone())?;
        }
        let means = DiffusionSeries::from_volumes(averages.group_means.clone())?;
        self.engine
            .apply_transforms(&means, &group_table, fixed)
            .map_err(|e| MocoError::registration(Stage::EstimateDwiGroups, Subject::GroupMeans, e))
    }
}

fn enter(stage: Stage) {
    tracing::info!("stage {}", stage);
}
