//! DWI grouping and group averages.

use burn::tensor::backend::Backend;
use dmoco_core::{DiffusionSeries, Volume};
use serde::{Deserialize, Serialize};

use crate::classify::Classification;
use crate::error::{MocoError, Result};

/// Contiguous groups of DWI acquisitions, in temporal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPlan {
    groups: Vec<Vec<usize>>,
}

impl GroupPlan {
    pub fn groups(&self) -> &[Vec<usize>] {
        &self.groups
    }

    pub fn group(&self, g: usize) -> Option<&[usize]> {
        self.groups.get(g).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Every member index, in group order.
    pub fn members(&self) -> impl Iterator<Item = usize> + '_ {
        self.groups.iter().flatten().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupPlanner {
    group_size: usize,
}

impl GroupPlanner {
    pub fn new(group_size: usize) -> Result<Self> {
        if group_size == 0 {
            return Err(MocoError::config("group size must be at least 1"));
        }
        Ok(Self { group_size })
    }

    /// `floor(n / g)` full groups, then the remainder as one shorter group.
    pub fn plan(&self, dwi: &[usize]) -> GroupPlan {
        let groups: Vec<Vec<usize>> = dwi.chunks(self.group_size).map(<[usize]>::to_vec).collect();
        tracing::debug!(
            "{} DWI volumes in {} groups of up to {}",
            dwi.len(),
            groups.len(),
            self.group_size
        );
        GroupPlan { groups }
    }
}

/// Averaged volumes used for registration.
#[derive(Debug, Clone)]
pub struct GroupAverages<B: Backend> {
    /// Temporal mean of each group, indexed like the plan.
    pub group_means: Vec<Volume<B>>,
    /// Mean of the group means; `None` without DWI volumes.
    pub grand_mean: Option<Volume<B>>,
    /// Temporal mean of every b=0 volume.
    pub b0_mean: Volume<B>,
}

impl<B: Backend> GroupAverages<B> {
    pub fn compute(
        series: &DiffusionSeries<B>,
        classification: &Classification,
        plan: &GroupPlan,
    ) -> Result<Self> {
        let group_means = plan
            .groups()
            .iter()
            .map(|members| series.temporal_mean(members))
            .collect::<dmoco_core::Result<Vec<_>>>()?;
        let grand_mean = if group_means.is_empty() {
            None
        } else {
            Some(Volume::mean_of(&group_means)?)
        };
        let b0_mean = series.temporal_mean(classification.b0_indices())?;
        Ok(Self {
            group_means,
            grand_mean,
            b0_mean,
        })
    }
}
