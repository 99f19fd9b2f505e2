//! Per-acquisition transform table.

use std::collections::BTreeMap;

use burn::tensor::backend::Backend;

use crate::error::{CoreError, Result};
use crate::transform::VolumeMotion;

/// Motion estimate per acquisition index of the original series.
///
/// Entries are written once; a second write to the same index is an error.
#[derive(Debug, Clone)]
pub struct TransformTable<B: Backend> {
    entries: BTreeMap<usize, VolumeMotion<B>>,
}

impl<B: Backend> Default for TransformTable<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> TransformTable<B> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, index: usize, motion: VolumeMotion<B>) -> Result<()> {
        if self.entries.contains_key(&index) {
            return Err(CoreError::DuplicateEntry(index));
        }
        self.entries.insert(index, motion);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&VolumeMotion<B>> {
        self.entries.get(&index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending acquisition order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &VolumeMotion<B>)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.keys().copied()
    }

    /// Total number of individual transforms (one per slice for slice-wise
    /// entries).
    pub fn transform_count(&self) -> usize {
        self.entries.values().map(VolumeMotion::transform_count).sum()
    }

    /// Whether every index in `0..len` has an entry.
    pub fn is_complete(&self, len: usize) -> bool {
        self.entries.len() == len && (0..len).all(|i| self.entries.contains_key(&i))
    }

    /// First index in `0..len` without an entry.
    pub fn first_missing(&self, len: usize) -> Option<usize> {
        (0..len).find(|i| !self.entries.contains_key(i))
    }
}

impl<B: Backend> IntoIterator for TransformTable<B> {
    type Item = (usize, VolumeMotion<B>);
    type IntoIter = std::collections::btree_map::IntoIter<usize, VolumeMotion<B>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::MotionTransform;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn whole() -> VolumeMotion<TestBackend> {
        VolumeMotion::Whole(MotionTransform::identity())
    }

    #[test]
    fn test_write_once() {
        let mut table = TransformTable::<TestBackend>::new();
        table.insert(2, whole()).unwrap();
        assert_eq!(table.insert(2, whole()), Err(CoreError::DuplicateEntry(2)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_completeness() {
        let mut table = TransformTable::<TestBackend>::new();
        table.insert(0, whole()).unwrap();
        table.insert(2, whole()).unwrap();
        assert!(!table.is_complete(3));
        assert_eq!(table.first_missing(3), Some(1));
        table.insert(1, whole()).unwrap();
        assert!(table.is_complete(3));
        assert!(!table.is_complete(4));
    }

    #[test]
    fn test_transform_count_counts_slices() {
        let mut table = TransformTable::<TestBackend>::new();
        table.insert(0, whole()).unwrap();
        table
            .insert(1, VolumeMotion::PerSlice(vec![MotionTransform::identity(); 5]))
            .unwrap();
        assert_eq!(table.transform_count(), 6);
        assert_eq!(table.keys().collect::<Vec<_>>(), vec![0, 1]);
    }
}
