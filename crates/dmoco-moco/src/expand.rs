//! Per-acquisition transforms from per-group estimates.

use burn::tensor::backend::Backend;
use dmoco_core::{CoreError, TransformTable, VolumeMotion};

use crate::error::{MocoError, Result};
use crate::grouping::GroupPlan;

/// Builds the full transform table of a series of `total` acquisitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformExpander {
    total: usize,
    slices: Option<usize>,
}

impl TransformExpander {
    /// `slices` is the per-entry slice count in slice-wise mode, `None` for
    /// whole-volume motion.
    pub fn new(total: usize, slices: Option<usize>) -> Self {
        Self { total, slices }
    }

    /// b=0 estimates are kept verbatim; each group estimate is copied to all
    /// of the group's members. The result covers `0..total` exactly once.
    pub fn expand<B: Backend>(
        &self,
        b0_motions: Vec<(usize, VolumeMotion<B>)>,
        plan: &GroupPlan,
        group_motions: Vec<VolumeMotion<B>>,
    ) -> Result<TransformTable<B>> {
        if group_motions.len() != plan.len() {
            return Err(MocoError::incomplete_table(format!(
                "{} group transforms for {} groups",
                group_motions.len(),
                plan.len()
            )));
        }

        let mut table = TransformTable::new();
        for (index, motion) in b0_motions {
            self.insert(&mut table, index, motion)?;
        }
        for (members, motion) in plan.groups().iter().zip(group_motions) {
            for &index in members {
                self.insert(&mut table, index, motion.clone())?;
            }
        }

        if let Some(missing) = table.first_missing(self.total) {
            return Err(MocoError::incomplete_table(format!(
                "no transform for acquisition {} of {}",
                missing, self.total
            )));
        }
        tracing::debug!(
            "expanded to {} entries, {} transforms",
            table.len(),
            table.transform_count()
        );
        Ok(table)
    }

    fn insert<B: Backend>(
        &self,
        table: &mut TransformTable<B>,
        index: usize,
        motion: VolumeMotion<B>,
    ) -> Result<()> {
        if index >= self.total {
            return Err(CoreError::IndexOutOfRange {
                index,
                len: self.total,
            }
            .into());
        }
        if motion.slice_count() != self.slices {
            return Err(MocoError::incomplete_table(format!(
                "acquisition {} has slice count {:?}, expected {:?}",
                index,
                motion.slice_count(),
                self.slices
            )));
        }
        table.insert(index, motion)?;
        Ok(())
    }
}
