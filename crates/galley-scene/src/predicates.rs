// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reusable success predicates over live simulation state.
//!
//! Every predicate is a pure read. Thresholds are supplied by the caller;
//! counters that span steps (hold-for-N, previous positions) belong to the
//! task engine, not to this module.

use galley_geom::{bbox_corners, point_in_box, OrientedBox, Tolerance};
use galley_math::{angle_delta, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::fixture::{Fixture, FixtureError};
use crate::scene::SceneObject;
use crate::sim::{SimError, SimQuery};

/// Sample points for an object: its center alone, or its eight box corners.
pub fn object_points(
    sim: &dyn SimQuery,
    object: &SceneObject,
    center_only: bool,
) -> Result<Vec<Vec3>, SimError> {
    let pose = sim.body_pose(&object.body)?;
    if center_only {
        Ok(vec![pose.position()])
    } else {
        Ok(bbox_corners(&pose, &object.half_extents).to_vec())
    }
}

/// Every bounding-box corner of `object` lies inside `container`.
pub fn obj_inside_of(
    sim: &dyn SimQuery,
    object: &SceneObject,
    container: &OrientedBox,
    tolerance: &Tolerance,
) -> Result<bool, SimError> {
    Ok(object_points(sim, object, false)?
        .iter()
        .all(|p| point_in_box(p, container, tolerance)))
}

/// [`obj_inside_of`] against a named fixture region.
pub fn obj_inside_fixture(
    sim: &dyn SimQuery,
    object: &SceneObject,
    fixture: &Fixture,
    region: &str,
    tolerance: &Tolerance,
) -> Result<bool, FixtureError> {
    let bounds = fixture.region_bounds_world(region)?;
    Ok(obj_inside_of(sim, object, &bounds, tolerance)?)
}

/// Object center is over the receptacle's footprint and no higher than
/// `height_band` above the receptacle's base.
pub fn check_obj_in_receptacle(
    sim: &dyn SimQuery,
    object: &SceneObject,
    receptacle: &SceneObject,
    height_band: f32,
) -> Result<bool, SimError> {
    let obj = sim.body_pose(&object.body)?.position();
    let recep = sim.body_pose(&receptacle.body)?;
    let footprint = OrientedBox::new(recep, receptacle.half_extents).map_err(|e| {
        SimError::MalformedBox {
            body: receptacle.body.clone(),
            reason: e.to_string(),
        }
    })?;
    let base = recep.position().z() - receptacle.half_extents.z();
    let over = point_in_box(&obj, &footprint, &Tolerance::EXACT.planar());
    Ok(over && obj.z() >= base && obj.z() <= base + height_band)
}

/// The physics engine reports contact between the object and any fixture geom.
pub fn check_obj_fixture_contact(
    sim: &dyn SimQuery,
    object: &SceneObject,
    fixture: &Fixture,
) -> Result<bool, SimError> {
    let obj = sim.body_geoms(&object.body)?;
    Ok(sim.check_contact(&obj, &fixture.geom_names()))
}

/// Two objects touch.
pub fn check_obj_contact(
    sim: &dyn SimQuery,
    a: &SceneObject,
    b: &SceneObject,
) -> Result<bool, SimError> {
    let ga = sim.body_geoms(&a.body)?;
    let gb = sim.body_geoms(&b.body)?;
    Ok(sim.check_contact(&ga, &gb))
}

/// Names the end-effector parts predicates need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gripper {
    /// Site at the grasp center.
    pub site: String,
    /// Collision geoms of the left finger pad.
    pub left_pad_geoms: Vec<String>,
    /// Collision geoms of the right finger pad.
    pub right_pad_geoms: Vec<String>,
}

impl Default for Gripper {
    fn default() -> Self {
        Self {
            site: "gripper0_grip_site".into(),
            left_pad_geoms: vec!["gripper0_finger1_pad_collision".into()],
            right_pad_geoms: vec!["gripper0_finger2_pad_collision".into()],
        }
    }
}

/// Both finger pads touch the object.
pub fn check_obj_grasped(
    sim: &dyn SimQuery,
    object: &SceneObject,
    gripper: &Gripper,
) -> Result<bool, SimError> {
    let obj = sim.body_geoms(&object.body)?;
    Ok(sim.check_contact(&gripper.left_pad_geoms, &obj)
        && sim.check_contact(&gripper.right_pad_geoms, &obj))
}

/// Distance from the grip site to the object center exceeds `threshold`.
pub fn gripper_obj_far(
    sim: &dyn SimQuery,
    object: &SceneObject,
    gripper: &Gripper,
    threshold: f32,
) -> Result<bool, SimError> {
    let site = sim.site_position(&gripper.site)?;
    let obj = sim.body_pose(&object.body)?.position();
    Ok(site.distance(&obj) > threshold)
}

/// Euclidean distance between two object centers.
pub fn obj_distance(sim: &dyn SimQuery, a: &SceneObject, b: &SceneObject) -> Result<f32, SimError> {
    let pa = sim.body_pose(&a.body)?.position();
    let pb = sim.body_pose(&b.body)?.position();
    Ok(pa.distance(&pb))
}

/// Object centers are farther apart than `threshold`.
pub fn obj_far_from(
    sim: &dyn SimQuery,
    a: &SceneObject,
    b: &SceneObject,
    threshold: f32,
) -> Result<bool, SimError> {
    Ok(obj_distance(sim, a, b)? > threshold)
}

/// Wrapped Euler-angle differences between two orientations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationDelta {
    /// Roll difference in `(−π, π]`.
    pub roll: f32,
    /// Pitch difference in `(−π, π]`.
    pub pitch: f32,
    /// Yaw difference in `(−π, π]`.
    pub yaw: f32,
}

/// Per-axis wrapped difference `current − initial`.
///
/// Euler extraction is ambiguous near ±90° pitch; only the thresholded
/// magnitudes are meaningful there.
pub fn quaternion_angle_delta(initial: &Quat, current: &Quat) -> OrientationDelta {
    let a = initial.to_euler();
    let b = current.to_euler();
    OrientationDelta {
        roll: angle_delta(a.roll, b.roll),
        pitch: angle_delta(a.pitch, b.pitch),
        yaw: angle_delta(a.yaw, b.yaw),
    }
}

/// Roll or pitch moved by more than `threshold` radians.
pub fn orientation_flipped(initial: &Quat, current: &Quat, threshold: f32) -> bool {
    let d = quaternion_angle_delta(initial, current);
    d.roll.abs() > threshold || d.pitch.abs() > threshold
}

/// Rotation angle between two orientations, `2·acos(clamp(q0·q1))`.
pub fn tilt_angle(initial: &Quat, current: &Quat) -> f32 {
    initial.angle_to(current)
}

/// Planar displacement between consecutive samples exceeds `threshold`.
pub fn motion_detected(previous: &Vec3, current: &Vec3, threshold: f32) -> bool {
    previous.planar_distance(current) > threshold
}

/// Stirring: the object moved, stays inside the receptacle, and touches the tool.
pub fn stirring_detected(
    sim: &dyn SimQuery,
    object: &SceneObject,
    previous: &Vec3,
    tool: &SceneObject,
    receptacle: &SceneObject,
    threshold: f32,
    height_band: f32,
) -> Result<bool, SimError> {
    let current = sim.body_pose(&object.body)?.position();
    Ok(motion_detected(previous, &current, threshold)
        && check_obj_in_receptacle(sim, object, receptacle, height_band)?
        && check_obj_contact(sim, object, tool)?)
}

/// Vertical cylinder of water between a spout and a basin floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterStream {
    axis: Vec3,
    bottom_z: f32,
    top_z: f32,
    radius: f32,
}

impl WaterStream {
    /// Column under `spout` down to `basin_z`; the bounds are swapped if the
    /// spout sits below the basin reference.
    pub fn new(spout: &Vec3, basin_z: f32, radius: f32) -> Self {
        let (bottom_z, top_z) = if spout.z() < basin_z {
            (spout.z(), basin_z)
        } else {
            (basin_z, spout.z())
        };
        Self {
            axis: spout.with_z(0.0),
            bottom_z,
            top_z,
            radius,
        }
    }

    /// Lower height bound.
    pub fn bottom_z(&self) -> f32 {
        self.bottom_z
    }

    /// Upper height bound.
    pub fn top_z(&self) -> f32 {
        self.top_z
    }

    /// Strictly inside the height band and the radius.
    pub fn contains(&self, point: &Vec3) -> bool {
        self.bottom_z < point.z()
            && point.z() < self.top_z
            && point.planar_distance(&self.axis) < self.radius
    }
}

/// Free-function form of [`WaterStream::contains`].
pub fn point_in_water_stream(point: &Vec3, stream: &WaterStream) -> bool {
    stream.contains(point)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use core::f32::consts::PI;

    #[test]
    fn stream_center_at_mid_height_is_inside() {
        let s = WaterStream::new(&Vec3::new(1.0, 2.0, 1.2), 0.8, 0.05);
        assert!(s.contains(&Vec3::new(1.0, 2.0, 1.0)));
        assert!(!s.contains(&Vec3::new(1.1, 2.0, 1.0)));
    }

    #[test]
    fn inverted_stream_is_swapped() {
        let s = WaterStream::new(&Vec3::new(0.0, 0.0, 0.2), 0.9, 0.05);
        assert_eq!((s.bottom_z(), s.top_z()), (0.2, 0.9));
    }

    #[test]
    fn flip_detects_roll_through_wrap() {
        let q0 = Quat::identity();
        let q1 = Quat::from_axis_angle(Vec3::UNIT_X, PI * 0.9);
        assert!(orientation_flipped(&q0, &q1, 35f32.to_radians()));
        let q2 = Quat::from_axis_angle(Vec3::UNIT_X, 0.3);
        assert!(!orientation_flipped(&q0, &q2, 35f32.to_radians()));
    }

    #[test]
    fn yaw_alone_is_not_a_flip() {
        let q0 = Quat::identity();
        let q1 = Quat::from_yaw(2.5);
        assert!(!orientation_flipped(&q0, &q1, 0.6));
        assert!(tilt_angle(&q0, &q1) > 2.4);
    }

    struct Poses(Vec<(String, galley_geom::Pose)>);

    impl SimQuery for Poses {
        fn body_pose(&self, body: &str) -> Result<galley_geom::Pose, SimError> {
            self.0
                .iter()
                .find(|(name, _)| name == body)
                .map(|(_, pose)| *pose)
                .ok_or_else(|| SimError::UnknownBody(body.to_string()))
        }
        fn joint_value(&self, joint: &str) -> Result<f32, SimError> {
            Err(SimError::UnknownJoint(joint.to_string()))
        }
        fn set_joint_value(&mut self, joint: &str, _value: f32) -> Result<(), SimError> {
            Err(SimError::UnknownJoint(joint.to_string()))
        }
        fn joint_range(&self, joint: &str) -> Result<(f32, f32), SimError> {
            Err(SimError::UnknownJoint(joint.to_string()))
        }
        fn has_joint(&self, _joint: &str) -> bool {
            false
        }
        fn geom_position(&self, geom: &str) -> Result<Vec3, SimError> {
            Err(SimError::UnknownGeom(geom.to_string()))
        }
        fn site_position(&self, site: &str) -> Result<Vec3, SimError> {
            Err(SimError::UnknownSite(site.to_string()))
        }
        fn body_geoms(&self, _body: &str) -> Result<Vec<String>, SimError> {
            Ok(Vec::new())
        }
        fn check_contact(&self, _a: &[String], _b: &[String]) -> bool {
            false
        }
        fn time(&self) -> f32 {
            0.0
        }
    }

    #[test]
    fn receptacle_with_non_finite_pose_is_an_error() {
        let bowl = SceneObject::new("bowl", Vec3::new(0.08, 0.08, 0.04));
        let apple = SceneObject::new("apple", Vec3::new(0.03, 0.03, 0.03));
        let sim = Poses(vec![
            ("apple".into(), galley_geom::Pose::identity()),
            (
                "bowl".into(),
                galley_geom::Pose::new(Vec3::new(f32::NAN, 0.0, 0.0), Quat::identity()),
            ),
        ]);
        let err = check_obj_in_receptacle(&sim, &apple, &bowl, 0.1).unwrap_err();
        assert!(matches!(err, SimError::MalformedBox { ref body, .. } if body == "bowl"));
    }

    #[test]
    fn receptacle_check_accepts_a_resting_object() {
        let bowl = SceneObject::new("bowl", Vec3::new(0.08, 0.08, 0.04));
        let apple = SceneObject::new("apple", Vec3::new(0.03, 0.03, 0.03));
        let sim = Poses(vec![
            ("apple".into(), galley_geom::Pose::new(Vec3::new(0.02, 0.0, 0.0), Quat::identity())),
            ("bowl".into(), galley_geom::Pose::identity()),
        ]);
        assert!(check_obj_in_receptacle(&sim, &apple, &bowl, 0.1).unwrap());
        assert!(!check_obj_in_receptacle(&sim, &apple, &bowl, 0.01).unwrap());
    }

    #[test]
    fn motion_uses_planar_displacement() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        assert!(!motion_detected(&a, &Vec3::new(0.0, 0.0, 1.0), 0.1));
        assert!(motion_detected(&a, &Vec3::new(0.2, 0.0, 0.0), 0.1));
    }
}
