//! In-plane Gaussian weighting mask.
//!
//! Weights every voxel of a slice by a Gaussian of its in-plane physical
//! distance to a centre point: the slice centre, or a per-slice point taken
//! from a centerline volume.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::error::{CoreError, Result};
use crate::image::Volume;

/// Builds Gaussian weight volumes on a reference grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianMask {
    sigma: f64,
    centers: Option<Vec<Option<[f64; 2]>>>,
}

impl GaussianMask {
    /// # Arguments
    /// * `sigma` - Standard deviation in mm, in-plane
    pub fn new(sigma: f64) -> Self {
        Self { sigma, centers: None }
    }

    /// Per-slice `(x, y)` index centres. Slices with `None` use the slice
    /// centre.
    pub fn with_centers(mut self, centers: Vec<Option<[f64; 2]>>) -> Self {
        self.centers = Some(centers);
        self
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Weights in `(0, 1]` with the shape and geometry of `reference`.
    pub fn weights<B: Backend>(&self, reference: &Volume<B>) -> Result<Volume<B>> {
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(CoreError::invalid_parameter(format!(
                "mask sigma must be positive, got {}",
                self.sigma
            )));
        }
        let [d, h, w] = reference.shape();
        if let Some(centers) = &self.centers {
            if centers.len() != d {
                return Err(CoreError::ShapeMismatch {
                    expected: vec![d],
                    actual: vec![centers.len()],
                });
            }
        }

        let spacing = reference.geometry().spacing();
        let (sx, sy) = (spacing.x, spacing.y);
        let slice_center = [(w as f64 - 1.0) / 2.0, (h as f64 - 1.0) / 2.0];
        let denom = 2.0 * self.sigma * self.sigma;

        let mut values = Vec::with_capacity(d * h * w);
        for z in 0..d {
            let [cx, cy] = self
                .centers
                .as_ref()
                .and_then(|c| c[z])
                .unwrap_or(slice_center);
            for y in 0..h {
                let dy = (y as f64 - cy) * sy;
                for x in 0..w {
                    let dx = (x as f64 - cx) * sx;
                    values.push((-(dx * dx + dy * dy) / denom).exp() as f32);
                }
            }
        }
        let data = Tensor::<B, 1>::from_floats(values.as_slice(), &reference.device()).reshape([d, h, w]);
        Ok(Volume::new(data, *reference.geometry()))
    }
}

/// Intensity-weighted in-plane centroid of every slice of a centerline (or
/// cord mask) volume, as `(x, y)` indices. Empty slices give `None`.
pub fn slice_centroids<B: Backend>(centerline: &Volume<B>) -> Result<Vec<Option<[f64; 2]>>> {
    let [d, h, w] = centerline.shape();
    let values = centerline.values()?;
    let centroids = values
        .chunks(h * w)
        .take(d)
        .map(|slice| {
            let (mut total, mut mx, mut my) = (0.0f64, 0.0f64, 0.0f64);
            for (i, &v) in slice.iter().enumerate() {
                if v > 0.0 {
                    let v = f64::from(v);
                    total += v;
                    mx += v * (i % w) as f64;
                    my += v * (i / w) as f64;
                }
            }
            (total > 0.0).then(|| [mx / total, my / total])
        })
        .collect();
    Ok(centroids)
}
