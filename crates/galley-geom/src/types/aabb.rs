// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

use galley_math::Vec3;

/// World-axis box used for overlap rejection between placed objects.
///
/// `min <= max` holds per component; constructors reorder inputs.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    min: Vec3,
    max: Vec3,
}

impl Aabb {
    /// Box spanning two opposite corners, in any order.
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(&b),
            max: a.max(&b),
        }
    }

    /// Box from a center and (absolute) half-extents.
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        let he = half_extents.abs();
        Self {
            min: center.sub(&he),
            max: center.add(&he),
        }
    }

    /// Tightest box around the eight corners of an oriented box.
    pub fn from_corners(corners: &[Vec3; 8]) -> Self {
        corners[1..]
            .iter()
            .fold(Self::new(corners[0], corners[0]), |bb, c| Self {
                min: bb.min.min(c),
                max: bb.max.max(c),
            })
    }

    /// Minimum corner.
    pub fn min(&self) -> Vec3 {
        self.min
    }

    /// Maximum corner.
    pub fn max(&self) -> Vec3 {
        self.max
    }

    /// Midpoint.
    pub fn center(&self) -> Vec3 {
        self.min.add(&self.max).scale(0.5)
    }

    /// Half the size along each world axis.
    pub fn half_extents(&self) -> Vec3 {
        self.max.sub(&self.min).scale(0.5)
    }

    /// Boxes intersect; touching faces count.
    pub fn overlaps(&self, other: &Self) -> bool {
        let (a0, a1) = (self.min.to_array(), self.max.to_array());
        let (b0, b1) = (other.min.to_array(), other.max.to_array());
        (0..3).all(|i| a0[i] <= b1[i] && b0[i] <= a1[i])
    }

    /// `point` lies inside or on the box.
    pub fn contains_point(&self, point: &Vec3) -> bool {
        let p = point.to_array();
        let (lo, hi) = (self.min.to_array(), self.max.to_array());
        (0..3).all(|i| lo[i] <= p[i] && p[i] <= hi[i])
    }

    /// Grows every face outward by `margin`.
    ///
    /// A negative margin shrinks the box, collapsing onto the center rather
    /// than inverting.
    pub fn inflate(&self, margin: f32) -> Self {
        let he = self.half_extents();
        let grown = Vec3::new(he.x() + margin, he.y() + margin, he.z() + margin)
            .max(&Vec3::ZERO);
        Self::from_center_half_extents(self.center(), grown)
    }
}
