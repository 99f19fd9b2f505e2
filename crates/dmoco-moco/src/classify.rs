//! Splitting acquisitions into b=0 and diffusion-weighted volumes.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::ClassificationError;

/// Direction norms below this mark a b=0 volume when no b-values are given.
pub const DIRECTION_NORM_THRESHOLD: f64 = 0.01;

/// Gradient record of a series: one direction per acquisition and optional
/// b-values.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientTable {
    directions: Vec<Vector3<f64>>,
    bvals: Option<Vec<f64>>,
    transposed: bool,
}

impl GradientTable {
    pub fn new(
        directions: Vec<Vector3<f64>>,
        bvals: Option<Vec<f64>>,
    ) -> Result<Self, ClassificationError> {
        if let Some(bvals) = &bvals {
            if bvals.len() != directions.len() {
                return Err(ClassificationError::LengthMismatch {
                    directions: directions.len(),
                    bvals: bvals.len(),
                });
            }
        }
        Ok(Self {
            directions,
            bvals,
            transposed: false,
        })
    }

    /// Build from rows as read from a bvecs file: either one row per
    /// acquisition (T×3) or one row per axis (3×T, transposed with a warning).
    pub fn from_rows(
        rows: &[Vec<f64>],
        bvals: Option<Vec<f64>>,
    ) -> Result<Self, ClassificationError> {
        let first = rows
            .first()
            .ok_or_else(|| ClassificationError::MalformedGradients("no gradient rows".into()))?;
        let width = first.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != width) {
            return Err(ClassificationError::MalformedGradients(format!(
                "row {} has {} values, expected {}",
                i,
                row.len(),
                width
            )));
        }

        let transposed = width != 3 && rows.len() == 3;
        let directions = if width == 3 {
            rows.iter()
                .map(|row| Vector3::new(row[0], row[1], row[2]))
                .collect()
        } else if transposed {
            tracing::warn!(
                "gradient directions given as 3x{}; transposing to {}x3",
                width,
                width
            );
            (0..width)
                .map(|t| Vector3::new(rows[0][t], rows[1][t], rows[2][t]))
                .collect()
        } else {
            return Err(ClassificationError::MalformedGradients(format!(
                "expected 3 columns or 3 rows, got {}x{}",
                rows.len(),
                width
            )));
        };

        let mut table = Self::new(directions, bvals)?;
        table.transposed = transposed;
        Ok(table)
    }

    /// Whether [`GradientTable::from_rows`] received the 3×T layout.
    pub fn transposed(&self) -> bool {
        self.transposed
    }

    pub fn len(&self) -> usize {
        self.directions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }

    pub fn directions(&self) -> &[Vector3<f64>] {
        &self.directions
    }

    pub fn bvals(&self) -> Option<&[f64]> {
        self.bvals.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeClass {
    B0,
    Dwi,
}

/// Per-acquisition classes and the two index lists in temporal order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    classes: Vec<VolumeClass>,
    b0: Vec<usize>,
    dwi: Vec<usize>,
}

impl Classification {
    pub fn from_classes(classes: Vec<VolumeClass>) -> Self {
        let mut b0 = Vec::new();
        let mut dwi = Vec::new();
        for (i, class) in classes.iter().enumerate() {
            match class {
                VolumeClass::B0 => b0.push(i),
                VolumeClass::Dwi => dwi.push(i),
            }
        }
        Self { classes, b0, dwi }
    }

    pub fn classes(&self) -> &[VolumeClass] {
        &self.classes
    }

    pub fn class(&self, index: usize) -> Option<VolumeClass> {
        self.classes.get(index).copied()
    }

    pub fn b0_indices(&self) -> &[usize] {
        &self.b0
    }

    pub fn dwi_indices(&self) -> &[usize] {
        &self.dwi
    }

    /// Total number of acquisitions `T`.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeClassifier {
    bval_threshold: f64,
}

impl VolumeClassifier {
    pub fn new(bval_threshold: f64) -> Self {
        Self { bval_threshold }
    }

    /// b-values below the threshold are b=0 when present; otherwise a
    /// direction norm below [`DIRECTION_NORM_THRESHOLD`] is.
    pub fn classify(&self, gradients: &GradientTable) -> Result<Classification, ClassificationError> {
        let classes: Vec<VolumeClass> = match gradients.bvals() {
            Some(bvals) => bvals
                .iter()
                .map(|&b| {
                    if b < self.bval_threshold {
                        VolumeClass::B0
                    } else {
                        VolumeClass::Dwi
                    }
                })
                .collect(),
            None => gradients
                .directions()
                .iter()
                .map(|d| {
                    if d.norm() < DIRECTION_NORM_THRESHOLD {
                        VolumeClass::B0
                    } else {
                        VolumeClass::Dwi
                    }
                })
                .collect(),
        };

        let classification = Classification::from_classes(classes);
        if classification.b0_indices().is_empty() {
            return Err(ClassificationError::NoReferenceVolumes {
                total: classification.len(),
            });
        }

        tracing::info!(
            "Number of b=0: {}, number of DWI: {}",
            classification.b0_indices().len(),
            classification.dwi_indices().len()
        );
        tracing::debug!("b=0 indices: {:?}", classification.b0_indices());
        Ok(classification)
    }
}

impl Default for VolumeClassifier {
    fn default() -> Self {
        Self::new(100.0)
    }
}
