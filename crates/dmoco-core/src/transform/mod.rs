//! Transform types and operations.
//!
//! Trainable transforms ([`TranslationTransform`], [`RigidTransform`],
//! [`AffineTransform`]) are burn modules optimised during registration.
//! Their result is frozen into a [`MotionTransform`], the value stored in a
//! transform table and applied when resampling.

pub mod affine;
pub mod displacement;
pub mod motion;
pub mod rigid;
pub mod trait_;
pub mod translation;

pub use affine::AffineTransform;
pub use displacement::{displace_points, DisplacementField};
pub use motion::{MotionTransform, VolumeMotion};
pub use rigid::RigidTransform;
pub use trait_::{tensor_values, Transform};
pub use translation::TranslationTransform;
