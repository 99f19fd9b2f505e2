//! Registration engine contract.
//!
//! The motion correction pipeline only talks to registration through
//! [`RegistrationEngine`]; any tool able to estimate, apply and compose
//! transforms can back it.

use burn::tensor::backend::Backend;
use dmoco_core::{DiffusionSeries, TransformTable, Volume, VolumeMotion};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Transform family estimated per registration pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RegistrationMode {
    /// 6 parameters: rotation about the volume centre and translation.
    Rigid,
    /// 12 parameters.
    Affine,
    /// Dense displacement field.
    Deformable,
    /// Independent in-plane translation for every slice.
    #[default]
    SliceRigid,
}

impl RegistrationMode {
    pub fn is_slice_wise(&self) -> bool {
        matches!(self, Self::SliceRigid)
    }

    pub fn is_linear(&self) -> bool {
        !matches!(self, Self::Deformable)
    }
}

impl std::fmt::Display for RegistrationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Rigid => "rigid",
            Self::Affine => "affine",
            Self::Deformable => "deformable",
            Self::SliceRigid => "slice-rigid",
        };
        f.write_str(name)
    }
}

/// Estimates, applies and composes spatial transforms.
///
/// Transforms map target-frame points to moving-volume points. A call either
/// succeeds with a complete result or fails; engines never return partial
/// tables.
pub trait RegistrationEngine<B: Backend> {
    /// Motion that best aligns `moving` onto `fixed`.
    ///
    /// For [`RegistrationMode::SliceRigid`] the result is
    /// [`VolumeMotion::PerSlice`] with one transform per slice of `fixed`.
    fn estimate_transform(
        &mut self,
        moving: &Volume<B>,
        fixed: &Volume<B>,
        mode: RegistrationMode,
    ) -> Result<VolumeMotion<B>>;

    /// Resample every acquisition of `series` into `target`'s frame using its
    /// table entry. The result has the series' length and `target`'s grid.
    fn apply_transforms(
        &mut self,
        series: &DiffusionSeries<B>,
        table: &TransformTable<B>,
        target: &Volume<B>,
    ) -> Result<DiffusionSeries<B>>;

    /// Per entry `secondary ∘ primary` (primary applied first). Both tables
    /// must have the same keys and slice counts.
    fn compose_transforms(
        &mut self,
        primary: &TransformTable<B>,
        secondary: &TransformTable<B>,
    ) -> Result<TransformTable<B>>;
}
