// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

use galley_math::Vec3;

use crate::types::aabb::Aabb;
use crate::types::pose::Pose;
use crate::GeometryError;

/// Box with a world pose and non-negative half-extents along its local axes.
///
/// Regions, declared object bounding boxes, and placed footprints are all
/// expressed as oriented boxes once their owner's pose is known.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OrientedBox {
    pose: Pose,
    half_extents: Vec3,
}

impl OrientedBox {
    /// Creates an oriented box.
    ///
    /// # Errors
    /// Returns an error if the pose or extents are not finite, or any
    /// half-extent is negative.
    pub fn new(pose: Pose, half_extents: Vec3) -> Result<Self, GeometryError> {
        let pose = Pose::checked(pose.position(), pose.rotation())?;
        if !half_extents.is_finite() {
            return Err(GeometryError::NonFinite("half-extents"));
        }
        let he = half_extents.to_array();
        if he.iter().any(|c| *c < 0.0) {
            return Err(GeometryError::NegativeExtent(he));
        }
        Ok(Self { pose, half_extents })
    }

    /// World pose of the box center.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// World-space center.
    pub fn center(&self) -> Vec3 {
        self.pose.position()
    }

    /// Half-extents along the box's local axes.
    pub fn half_extents(&self) -> Vec3 {
        self.half_extents
    }

    /// The eight corners in world space.
    pub fn corners(&self) -> [Vec3; 8] {
        crate::query::bbox_corners(&self.pose, &self.half_extents)
    }

    /// World-space AABB enclosing the box.
    pub fn aabb(&self) -> Aabb {
        Aabb::from_corners(&self.corners())
    }
}
