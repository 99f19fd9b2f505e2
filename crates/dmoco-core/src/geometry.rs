//! Physical-space geometry of a voxel grid.
//!
//! Axis order for every physical quantity here is `(x, y, z)`, while volume
//! tensors are laid out `[Z, Y, X]`.

use nalgebra::{Matrix3, Point3, Vector3};
use serde::{Deserialize, Serialize};

pub type Spacing3 = Vector3<f64>;
pub type Direction3 = Matrix3<f64>;

/// Mapping between voxel indices and physical (scanner) coordinates.
///
/// `point = origin + direction * (index ⊙ spacing)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoxelGeometry {
    origin: Point3<f64>,
    spacing: Spacing3,
    direction: Direction3,
}

impl VoxelGeometry {
    pub fn new(origin: Point3<f64>, spacing: Spacing3, direction: Direction3) -> Self {
        Self {
            origin,
            spacing,
            direction,
        }
    }

    /// Unit spacing, identity direction, zero origin.
    pub fn identity() -> Self {
        Self::new(Point3::origin(), Vector3::repeat(1.0), Matrix3::identity())
    }

    pub fn origin(&self) -> &Point3<f64> {
        &self.origin
    }

    pub fn spacing(&self) -> &Spacing3 {
        &self.spacing
    }

    pub fn direction(&self) -> &Direction3 {
        &self.direction
    }

    /// Voxel-to-physical matrix `direction * diag(spacing)`.
    pub fn index_to_world_matrix(&self) -> Matrix3<f64> {
        self.direction * Matrix3::from_diagonal(&self.spacing)
    }

    /// Physical-to-voxel matrix, `None` if the direction is singular or a
    /// spacing is zero.
    pub fn world_to_index_matrix(&self) -> Option<Matrix3<f64>> {
        self.index_to_world_matrix().try_inverse()
    }

    pub fn index_to_world(&self, index: &Point3<f64>) -> Point3<f64> {
        self.origin + self.index_to_world_matrix() * index.coords
    }

    pub fn world_to_index(&self, point: &Point3<f64>) -> Option<Point3<f64>> {
        self.world_to_index_matrix()
            .map(|m| Point3::from(m * (point - self.origin)))
    }

    /// Geometry of the single-slice grid at slice index `z`.
    pub fn slice(&self, z: usize) -> Self {
        let offset = self.index_to_world_matrix() * Vector3::new(0.0, 0.0, z as f64);
        Self::new(self.origin + offset, self.spacing, self.direction)
    }

    /// Tolerant equality used when checking that two grids line up.
    pub fn approx_eq(&self, other: &Self, tol: f64) -> bool {
        (self.origin - other.origin).norm() < tol
            && (self.spacing - other.spacing).norm() < tol
            && (self.direction - other.direction).norm() < tol
    }
}

impl Default for VoxelGeometry {
    fn default() -> Self {
        Self::identity()
    }
}
