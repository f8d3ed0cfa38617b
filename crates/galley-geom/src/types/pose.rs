// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

use galley_math::{Quat, Vec3};

use crate::GeometryError;

/// Rigid pose used for fixtures, objects, and region frames.
///
/// Conventions:
/// - `position` in meters (world space unless the caller names another frame).
/// - `rotation` as a unit quaternion (normalized when applied).
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Pose {
    position: Vec3,
    rotation: Quat,
}

impl Pose {
    /// Identity pose (origin, no rotation).
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::identity(),
        }
    }

    /// Creates a pose from components.
    #[must_use]
    pub const fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Creates a pose at `position` rotated by `yaw` radians about `z`.
    #[must_use]
    pub fn from_yaw(position: Vec3, yaw: f32) -> Self {
        Self::new(position, Quat::from_yaw(yaw))
    }

    /// Creates a pose, rejecting NaN or infinite components.
    ///
    /// # Errors
    /// Returns [`GeometryError::NonFinite`] if any component is not finite.
    pub fn checked(position: Vec3, rotation: Quat) -> Result<Self, GeometryError> {
        if !position.is_finite() {
            return Err(GeometryError::NonFinite("pose position"));
        }
        if !rotation.to_array().iter().all(|c| c.is_finite()) {
            return Err(GeometryError::NonFinite("pose rotation"));
        }
        Ok(Self::new(position, rotation))
    }

    /// Position component.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Rotation component.
    #[must_use]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Maps a point expressed in this pose's frame into the parent frame.
    #[must_use]
    pub fn transform_point(&self, local: &Vec3) -> Vec3 {
        self.rotation.rotate(local).add(&self.position)
    }

    /// Maps a parent-frame point into this pose's frame.
    #[must_use]
    pub fn inverse_transform_point(&self, world: &Vec3) -> Vec3 {
        self.rotation
            .conjugate()
            .rotate(&world.sub(&self.position))
    }

    /// Composes `self` (parent) with a child pose expressed in `self`'s frame.
    #[must_use]
    pub fn compose(&self, child: &Self) -> Self {
        Self {
            position: self.transform_point(&child.position),
            rotation: self.rotation.multiply(&child.rotation).normalize(),
        }
    }
}
