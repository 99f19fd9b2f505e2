//! Registration targets.

use crate::classify::Classification;
use crate::grouping::GroupPlan;

/// Targets for the two registration passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSelection {
    /// Acquisition the b=0 volumes are registered to.
    pub b0_target: usize,
    /// Group whose average the DWI groups are registered to and which frames
    /// the final resampling; `None` without DWI volumes.
    pub dwi_target_group: Option<usize>,
}

pub struct TargetSelector;

impl TargetSelector {
    /// The b=0 acquired right before the first DWI; if the series starts with
    /// a DWI, the first b=0.
    ///
    /// Returns `None` only when there is no b=0 at all.
    pub fn b0_target(classification: &Classification) -> Option<usize> {
        let first_b0 = *classification.b0_indices().first()?;
        match classification.dwi_indices().first() {
            Some(&first_dwi) if first_dwi != 0 => Some(first_dwi - 1),
            _ => Some(first_b0),
        }
    }

    pub fn select(classification: &Classification, plan: &GroupPlan) -> Option<TargetSelection> {
        let b0_target = Self::b0_target(classification)?;
        let dwi_target_group = (!plan.is_empty()).then_some(0);
        tracing::info!(
            "b=0 target: acquisition {}; DWI target: {}",
            b0_target,
            match dwi_target_group {
                Some(g) => format!("group {} average", g),
                None => "none".to_string(),
            }
        );
        Some(TargetSelection {
            b0_target,
            dwi_target_group,
        })
    }
}
