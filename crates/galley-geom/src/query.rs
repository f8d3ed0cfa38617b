// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

use galley_math::Vec3;

use crate::types::oriented_box::OrientedBox;
use crate::types::pose::Pose;

/// Symmetric slack added to each bound of a containment check.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Tolerance {
    /// Per-axis slack in meters (`x`, `y`, `z` of the box frame).
    pub per_axis: Vec3,
    /// When `true`, the vertical axis is ignored entirely.
    pub planar: bool,
}

impl Tolerance {
    /// No slack, full 3D check.
    pub const EXACT: Self = Self {
        per_axis: Vec3::ZERO,
        planar: false,
    };

    /// Uniform slack on every axis.
    pub fn uniform(m: f32) -> Self {
        Self {
            per_axis: Vec3::new(m, m, m),
            planar: false,
        }
    }

    /// Same tolerance, horizontal axes only.
    #[must_use]
    pub fn planar(self) -> Self {
        Self {
            planar: true,
            ..self
        }
    }
}

/// Corners of a box with `half_extents` placed at `pose`.
///
/// Local corners `(±hx, ±hy, ±hz)` are rotated by the pose orientation and
/// then translated. Ordering is stable: x varies slowest, z fastest.
pub fn bbox_corners(pose: &Pose, half_extents: &Vec3) -> [Vec3; 8] {
    let [hx, hy, hz] = half_extents.to_array();
    let mut out = [Vec3::ZERO; 8];
    let mut i = 0;
    for sx in [-1.0f32, 1.0] {
        for sy in [-1.0f32, 1.0] {
            for sz in [-1.0f32, 1.0] {
                out[i] = pose.transform_point(&Vec3::new(sx * hx, sy * hy, sz * hz));
                i += 1;
            }
        }
    }
    out
}

/// The four corners of the horizontal footprint at the pose's height.
pub fn footprint_corners(pose: &Pose, half_extents: &Vec3) -> [Vec3; 4] {
    let [hx, hy, _] = half_extents.to_array();
    [(-1.0f32, -1.0f32), (-1.0, 1.0), (1.0, -1.0), (1.0, 1.0)]
        .map(|(sx, sy)| pose.transform_point(&Vec3::new(sx * hx, sy * hy, 0.0)))
}

/// Expresses a world point in `frame`'s local coordinates.
pub fn world_to_local(point: &Vec3, frame: &Pose) -> Vec3 {
    frame.inverse_transform_point(point)
}

/// Expresses a `frame`-local point in world coordinates.
pub fn local_to_world(point: &Vec3, frame: &Pose) -> Vec3 {
    frame.transform_point(point)
}

/// Containment test in the box's own frame.
///
/// The point is moved into the box frame and each axis is compared against
/// `half_extent + tolerance`, inclusive on the boundary.
pub fn point_in_box(point: &Vec3, bounds: &OrientedBox, tolerance: &Tolerance) -> bool {
    let local = world_to_local(point, &bounds.pose()).to_array();
    let he = bounds.half_extents().to_array();
    let tol = tolerance.per_axis.to_array();
    let axes = if tolerance.planar { 2 } else { 3 };
    (0..axes).all(|i| local[i].abs() <= he[i] + tol[i])
}
