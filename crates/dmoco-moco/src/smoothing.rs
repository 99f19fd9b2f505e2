//! Temporal smoothing of estimated translations.
//!
//! Each translation component is treated as a function of the acquisition
//! index and replaced by a least-squares cubic B-spline with uniform knots.
//! Slice-wise tables get one curve per slice. Rotation and scaling parts of
//! the transforms are left untouched.

use burn::tensor::backend::Backend;
use dmoco_core::{MotionTransform, TransformTable, VolumeMotion};
use nalgebra::{DMatrix, DVector, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::{Classification, VolumeClass};
use crate::config::SmoothingB0Policy;

/// Fewer time points than this cannot carry a cubic fit.
pub const MIN_CURVE_POINTS: usize = 4;

/// Acquisitions a curve runs through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveSubset {
    All,
    B0,
    Dwi,
}

/// Why smoothing was skipped. The run continues with the unsmoothed table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SmoothingDegradation {
    #[error("{subset:?} curve has {points} time points, at least 4 needed")]
    TooFewPoints { subset: CurveSubset, points: usize },

    #[error("acquisition {index} has a non-linear transform")]
    NonLinear { index: usize },

    #[error("acquisition {index} has {found:?} slices, expected {expected:?}")]
    InconsistentSlices {
        index: usize,
        expected: Option<usize>,
        found: Option<usize>,
    },

    #[error("spline fit failed: {0}")]
    FitFailed(String),
}

/// One fitted curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothingCurve {
    /// `None` for whole-volume motion.
    pub slice: Option<usize>,
    /// 0, 1, 2 for x, y, z.
    pub component: usize,
    pub subset: CurveSubset,
    pub indices: Vec<usize>,
    pub raw: Vec<f64>,
    pub fitted: Vec<f64>,
}

/// Raw and fitted translation curves, for plotting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothingReport {
    pub b0_indices: Vec<usize>,
    pub knot_spacing: f64,
    pub policy: SmoothingB0Policy,
    pub curves: Vec<SmoothingCurve>,
}

#[derive(Debug, Clone)]
pub struct SmoothingOutcome<B: Backend> {
    pub table: TransformTable<B>,
    pub report: Option<SmoothingReport>,
    pub degradation: Option<SmoothingDegradation>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemporalSmoother {
    knot_spacing: f64,
    policy: SmoothingB0Policy,
}

struct CurveJob {
    slice: usize,
    component: usize,
    subset: CurveSubset,
    positions: Vec<usize>,
}

impl TemporalSmoother {
    pub fn new(knot_spacing: f64, policy: SmoothingB0Policy) -> Self {
        Self {
            knot_spacing,
            policy,
        }
    }

    /// Smooth `table`. On degradation the input table comes back unchanged
    /// and a warning is logged.
    pub fn smooth<B: Backend>(
        &self,
        table: TransformTable<B>,
        classification: &Classification,
    ) -> SmoothingOutcome<B> {
        match self.try_smooth(&table, classification) {
            Ok((smoothed, report)) => SmoothingOutcome {
                table: smoothed,
                report: Some(report),
                degradation: None,
            },
            Err(degradation) => {
                tracing::warn!("smoothing skipped: {}", degradation);
                SmoothingOutcome {
                    table,
                    report: None,
                    degradation: Some(degradation),
                }
            }
        }
    }

    fn try_smooth<B: Backend>(
        &self,
        table: &TransformTable<B>,
        classification: &Classification,
    ) -> Result<(TransformTable<B>, SmoothingReport), SmoothingDegradation> {
        let keys: Vec<usize> = table.keys().collect();
        let slice_count = table.iter().next().and_then(|(_, m)| m.slice_count());
        let layers = slice_count.unwrap_or(1);

        // raw[slice][position]
        let mut raw = vec![Vec::with_capacity(keys.len()); layers];
        for (index, motion) in table.iter() {
            if motion.slice_count() != slice_count {
                return Err(SmoothingDegradation::InconsistentSlices {
                    index,
                    expected: slice_count,
                    found: motion.slice_count(),
                });
            }
            for (slice, transform) in motion.transforms().iter().enumerate() {
                let t = transform
                    .translation_part()
                    .ok_or(SmoothingDegradation::NonLinear { index })?;
                raw[slice].push(t);
            }
        }

        let subsets = self.subsets(&keys, classification);
        for (subset, positions) in &subsets {
            if positions.len() < MIN_CURVE_POINTS {
                return Err(SmoothingDegradation::TooFewPoints {
                    subset: *subset,
                    points: positions.len(),
                });
            }
        }

        let jobs: Vec<CurveJob> = (0..layers)
            .flat_map(|slice| {
                let subsets = &subsets;
                (0..3).flat_map(move |component| {
                    subsets.iter().map(move |(subset, positions)| CurveJob {
                        slice,
                        component,
                        subset: *subset,
                        positions: positions.clone(),
                    })
                })
            })
            .collect();

        let knot_spacing = self.knot_spacing;
        let curves: Vec<SmoothingCurve> = jobs
            .par_iter()
            .map(|job| -> Result<SmoothingCurve, SmoothingDegradation> {
                let indices: Vec<usize> = job.positions.iter().map(|&p| keys[p]).collect();
                let times: Vec<f64> = indices.iter().map(|&i| i as f64).collect();
                let values: Vec<f64> = job
                    .positions
                    .iter()
                    .map(|&p| raw[job.slice][p][job.component])
                    .collect();
                let fitted = fit_cubic_bspline(&times, &values, knot_spacing).ok_or_else(|| {
                    SmoothingDegradation::FitFailed(format!(
                        "slice {} component {}",
                        job.slice, job.component
                    ))
                })?;
                Ok(SmoothingCurve {
                    slice: slice_count.map(|_| job.slice),
                    component: job.component,
                    subset: job.subset,
                    indices,
                    raw: values,
                    fitted,
                })
            })
            .collect::<Result<Vec<_>, SmoothingDegradation>>()?;

        let mut fitted = raw.clone();
        for (job, curve) in jobs.iter().zip(&curves) {
            for (&p, &value) in job.positions.iter().zip(&curve.fitted) {
                fitted[job.slice][p][job.component] = value;
            }
        }

        let mut smoothed = TransformTable::new();
        for (position, (index, motion)) in table.iter().enumerate() {
            let rebuilt = |slice: usize, transform: &MotionTransform<B>| {
                transform
                    .with_translation(fitted[slice][position])
                    .ok_or(SmoothingDegradation::NonLinear { index })
            };
            let motion = match motion {
                VolumeMotion::Whole(t) => VolumeMotion::Whole(rebuilt(0, t)?),
                VolumeMotion::PerSlice(ts) => VolumeMotion::PerSlice(
                    ts.iter()
                        .enumerate()
                        .map(|(slice, t)| rebuilt(slice, t))
                        .collect::<Result<Vec<_>, _>>()?,
                ),
            };
            smoothed
                .insert(index, motion)
                .map_err(|e| SmoothingDegradation::FitFailed(e.to_string()))?;
        }

        tracing::info!(
            "smoothed {} curves over {} acquisitions",
            curves.len(),
            keys.len()
        );
        let report = SmoothingReport {
            b0_indices: classification.b0_indices().to_vec(),
            knot_spacing,
            policy: self.policy,
            curves,
        };
        Ok((smoothed, report))
    }

    /// Positions into `keys` for each curve the policy asks for.
    fn subsets(&self, keys: &[usize], classification: &Classification) -> Vec<(CurveSubset, Vec<usize>)> {
        let of_class = |class: VolumeClass| -> Vec<usize> {
            keys.iter()
                .enumerate()
                .filter(|(_, k)| classification.class(**k) == Some(class))
                .map(|(p, _)| p)
                .collect()
        };
        match self.policy {
            SmoothingB0Policy::Joint => vec![(CurveSubset::All, (0..keys.len()).collect())],
            SmoothingB0Policy::Separate => {
                let mut subsets = vec![(CurveSubset::B0, of_class(VolumeClass::B0))];
                let dwi = of_class(VolumeClass::Dwi);
                if !dwi.is_empty() {
                    subsets.push((CurveSubset::Dwi, dwi));
                }
                subsets
            }
            SmoothingB0Policy::ExcludeB0 => vec![(CurveSubset::Dwi, of_class(VolumeClass::Dwi))],
        }
    }
}

/// Least-squares cubic B-spline through `(times, values)` with knots every
/// `knot_spacing` time units, evaluated back at `times`.
///
/// The knot count is capped so there are never more basis functions than
/// samples. Returns `None` when the fit is undefined (fewer than
/// [`MIN_CURVE_POINTS`] points, a zero time span, or a failed solve).
pub fn fit_cubic_bspline(times: &[f64], values: &[f64], knot_spacing: f64) -> Option<Vec<f64>> {
    if times.len() != values.len() || times.len() < MIN_CURVE_POINTS || knot_spacing <= 0.0 {
        return None;
    }
    let t_min = times.iter().copied().fold(f64::INFINITY, f64::min);
    let t_max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = t_max - t_min;
    if span <= 0.0 || !span.is_finite() {
        return None;
    }

    // More basis functions than samples leaves the fit underdetermined.
    let max_intervals = times.len() - 3;
    let ratio = (span / knot_spacing).ceil();
    let intervals = if ratio.is_finite() && ratio < max_intervals as f64 {
        (ratio as usize).max(1)
    } else {
        max_intervals
    };
    let h = span / intervals as f64;
    let mut design = DMatrix::<f64>::zeros(times.len(), intervals + 3);
    for (row, &t) in times.iter().enumerate() {
        let u = (t - t_min) / h;
        let k = (u.floor() as usize).min(intervals - 1);
        let v = u - k as f64;
        let weights = [
            (1.0 - v).powi(3) / 6.0,
            (3.0 * v.powi(3) - 6.0 * v.powi(2) + 4.0) / 6.0,
            (-3.0 * v.powi(3) + 3.0 * v.powi(2) + 3.0 * v + 1.0) / 6.0,
            v.powi(3) / 6.0,
        ];
        for (j, w) in weights.iter().enumerate() {
            design[(row, k + j)] = *w;
        }
    }

    let b = DVector::from_column_slice(values);
    let coefficients = design.clone().svd(true, true).solve(&b, 1e-12).ok()?;
    let fitted = design * coefficients;
    Some(fitted.iter().copied().collect())
}

/// Translation of `motion`'s slice `slice`, for callers inspecting tables.
pub fn slice_translation<B: Backend>(motion: &VolumeMotion<B>, slice: usize) -> Option<Vector3<f64>> {
    motion.transforms().get(slice)?.translation_part()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use dmoco_core::transform::DisplacementField;
    use dmoco_core::{Volume, VoxelGeometry};

    type B = NdArray<f32>;

    fn all_classes(n: usize, b0: &[usize]) -> Classification {
        Classification::from_classes(
            (0..n)
                .map(|i| if b0.contains(&i) { VolumeClass::B0 } else { VolumeClass::Dwi })
                .collect(),
        )
    }

    fn whole_table(xs: &[f64]) -> TransformTable<B> {
        let mut table = TransformTable::new();
        for (i, &x) in xs.iter().enumerate() {
            table
                .insert(i, VolumeMotion::Whole(MotionTransform::translation(Vector3::new(x, 0.0, 0.0))))
                .unwrap();
        }
        table
    }

    #[test]
    fn test_linear_trend_is_reproduced() {
        let times: Vec<f64> = (0..12).map(f64::from).collect();
        let values: Vec<f64> = times.iter().map(|t| 0.5 * t - 1.0).collect();
        let fitted = fit_cubic_bspline(&times, &values, 5.0).unwrap();
        for (a, b) in fitted.iter().zip(&values) {
            assert!((a - b).abs() < 1e-8);
        }
    }

    #[test]
    fn test_noise_is_reduced() {
        let times: Vec<f64> = (0..30).map(f64::from).collect();
        let values: Vec<f64> = times
            .iter()
            .map(|t| if (*t as usize) % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let fitted = fit_cubic_bspline(&times, &values, 10.0).unwrap();
        let energy: f64 = fitted.iter().map(|v| v * v).sum();
        assert!(energy < 0.2 * values.len() as f64);
    }

    #[test]
    fn test_too_few_points() {
        assert!(fit_cubic_bspline(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0], 10.0).is_none());
    }

    #[test]
    fn test_tiny_knot_spacing_is_capped() {
        let times: Vec<f64> = (0..10).map(f64::from).collect();
        let values: Vec<f64> = times.iter().map(|t| (t * 0.7).sin()).collect();
        for spacing in [1e-300, 1e-6, f64::MIN_POSITIVE] {
            let fitted = fit_cubic_bspline(&times, &values, spacing).unwrap();
            assert_eq!(fitted.len(), values.len());
            assert!(fitted.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_smooth_with_tiny_knot_spacing_does_not_panic() {
        let xs: Vec<f64> = (0..10).map(|i| i as f64 * 0.1).collect();
        let smoother = TemporalSmoother::new(1e-300, SmoothingB0Policy::Joint);
        let outcome = smoother.smooth(whole_table(&xs), &all_classes(10, &[0]));
        assert_eq!(outcome.table.len(), 10);
        assert!(outcome.degradation.is_none());
    }

    #[test]
    fn test_smooth_preserves_keys_and_linear_part() {
        let xs: Vec<f64> = (0..10).map(|i| i as f64 * 0.1 + if i % 2 == 0 { 0.05 } else { -0.05 }).collect();
        let mut table = TransformTable::<B>::new();
        for (i, &x) in xs.iter().enumerate() {
            let mut m = nalgebra::Matrix4::identity();
            m[(0, 1)] = 0.01;
            m[(0, 3)] = x;
            table.insert(i, VolumeMotion::Whole(MotionTransform::Linear(m))).unwrap();
        }
        let smoother = TemporalSmoother::new(10.0, SmoothingB0Policy::Joint);
        let outcome = smoother.smooth(table, &all_classes(10, &[0]));
        assert!(outcome.degradation.is_none());
        assert_eq!(outcome.table.keys().collect::<Vec<_>>(), (0..10).collect::<Vec<_>>());

        let report = outcome.report.unwrap();
        assert_eq!(report.b0_indices, vec![0]);
        assert_eq!(report.curves.len(), 3);
        for (i, motion) in outcome.table.iter() {
            let VolumeMotion::Whole(t) = motion else { panic!() };
            let m = t.matrix().unwrap();
            assert_eq!(m[(0, 1)], 0.01);
            assert!((m[(0, 3)] - i as f64 * 0.1).abs() < 0.06);
        }
    }

    #[test]
    fn test_exclude_b0_leaves_b0_unchanged() {
        let xs = [5.0, 0.0, 0.1, 0.2, 5.0, 0.4, 0.5, 0.6];
        let smoother = TemporalSmoother::new(10.0, SmoothingB0Policy::ExcludeB0);
        let outcome = smoother.smooth(whole_table(&xs), &all_classes(8, &[0, 4]));
        assert!(outcome.degradation.is_none());
        for i in [0, 4] {
            let t = slice_translation(outcome.table.get(i).unwrap(), 0).unwrap();
            assert_eq!(t.x, 5.0);
        }
        let t = slice_translation(outcome.table.get(5).unwrap(), 0).unwrap();
        assert!((t.x - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_separate_with_few_b0_degrades() {
        let xs = [0.0; 8];
        let smoother = TemporalSmoother::new(10.0, SmoothingB0Policy::Separate);
        let outcome = smoother.smooth(whole_table(&xs), &all_classes(8, &[0, 4]));
        assert_eq!(
            outcome.degradation,
            Some(SmoothingDegradation::TooFewPoints {
                subset: CurveSubset::B0,
                points: 2
            })
        );
        assert!(outcome.report.is_none());
        assert_eq!(outcome.table.len(), 8);
    }

    #[test]
    fn test_short_series_degrades() {
        let smoother = TemporalSmoother::new(10.0, SmoothingB0Policy::Joint);
        let outcome = smoother.smooth(whole_table(&[0.0, 1.0, 2.0]), &all_classes(3, &[0]));
        assert!(matches!(
            outcome.degradation,
            Some(SmoothingDegradation::TooFewPoints { points: 3, .. })
        ));
        let t = slice_translation(outcome.table.get(2).unwrap(), 0).unwrap();
        assert_eq!(t.x, 2.0);
    }

    #[test]
    fn test_deformable_entry_degrades() {
        let device = Default::default();
        let reference = Volume::new(
            burn::tensor::Tensor::<B, 3>::zeros([1, 2, 2], &device),
            VoxelGeometry::identity(),
        );
        let mut table = whole_table(&[0.0, 0.0, 0.0, 0.0]);
        table
            .insert(
                4,
                VolumeMotion::Whole(MotionTransform::Deformable(
                    DisplacementField::zeros_like(&reference).unwrap(),
                )),
            )
            .unwrap();
        let smoother = TemporalSmoother::new(10.0, SmoothingB0Policy::Joint);
        let outcome = smoother.smooth(table, &all_classes(5, &[0]));
        assert_eq!(outcome.degradation, Some(SmoothingDegradation::NonLinear { index: 4 }));
    }

    #[test]
    fn test_report_serializes() {
        let xs: Vec<f64> = (0..6).map(f64::from).collect();
        let smoother = TemporalSmoother::new(2.0, SmoothingB0Policy::Joint);
        let report = smoother.smooth(whole_table(&xs), &all_classes(6, &[0])).report.unwrap();
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"b0_indices\":[0]"));
        let back: SmoothingReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.curves.len(), 3);
        assert_eq!(back.curves[0].indices, report.curves[0].indices);
    }
}
