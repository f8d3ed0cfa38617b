// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory [`SimQuery`] fake.
//!
//! Poses, joints, geoms and sites are plain maps; contacts are an explicit
//! set of geom pairs the test declares. Nothing is integrated.

use std::collections::{BTreeMap, BTreeSet};

use galley_geom::Pose;
use galley_math::{clamp, Vec3};
use galley_scene::{Fixture, SceneObject, SimError, SimQuery};

#[derive(Debug, Clone, Copy)]
struct FakeJoint {
    value: f32,
    range: (f32, f32),
}

/// Scripted simulation state.
#[derive(Debug, Clone, Default)]
pub struct FakeSim {
    bodies: BTreeMap<String, Pose>,
    joints: BTreeMap<String, FakeJoint>,
    geoms: BTreeMap<String, Vec3>,
    sites: BTreeMap<String, Vec3>,
    body_geoms: BTreeMap<String, Vec<String>>,
    contacts: BTreeSet<(String, String)>,
    time: f32,
}

impl FakeSim {
    /// Empty simulation at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fixture's joints, geoms and sites at the fixture's pose.
    ///
    /// Joints start at zero clamped into their range; joints without a
    /// declared range get `(0, 1)`.
    pub fn with_fixture(mut self, fixture: &Fixture) -> Self {
        let pose = fixture.pose();
        self.bodies.insert(fixture.name().to_string(), pose);
        let geometry = fixture.geometry();
        for joint in geometry.joints().values() {
            let range = joint.range.unwrap_or((0.0, 1.0));
            self.add_joint(&joint.name, clamp(0.0, range.0, range.1), range);
        }
        for geom in geometry.geoms() {
            self.geoms
                .insert(geom.name.clone(), pose.transform_point(&geom.position));
            let body = geom.body.clone().unwrap_or_else(|| fixture.name().to_string());
            self.body_geoms.entry(body).or_default().push(geom.name.clone());
        }
        for site in geometry.sites().values() {
            self.sites
                .insert(site.name.clone(), pose.transform_point(&site.position));
        }
        self
    }

    /// Registers an object body with one geom named `<name>_g0`, at its
    /// placement pose when placed.
    pub fn with_object(mut self, object: &SceneObject) -> Self {
        let pose = object
            .placement
            .as_ref()
            .map_or_else(Pose::identity, |p| p.pose);
        self.set_body_pose(&object.body, pose);
        self.body_geoms
            .entry(object.body.clone())
            .or_default()
            .push(format!("{}_g0", object.body));
        self
    }

    /// Moves (or creates) a body.
    pub fn set_body_pose(&mut self, body: &str, pose: Pose) {
        self.bodies.insert(body.to_string(), pose);
    }

    /// Declares a joint.
    pub fn add_joint(&mut self, name: &str, value: f32, range: (f32, f32)) {
        self.joints
            .insert(name.to_string(), FakeJoint { value, range });
    }

    /// Declares a geom at a world position, attached to `body`.
    pub fn add_geom(&mut self, name: &str, position: Vec3, body: &str) {
        self.geoms.insert(name.to_string(), position);
        self.body_geoms
            .entry(body.to_string())
            .or_default()
            .push(name.to_string());
    }

    /// Declares or moves a site.
    pub fn set_site(&mut self, name: &str, position: Vec3) {
        self.sites.insert(name.to_string(), position);
    }

    /// Removes a site.
    pub fn remove_site(&mut self, name: &str) {
        self.sites.remove(name);
    }

    /// Records that two geoms touch.
    pub fn add_contact(&mut self, a: &str, b: &str) {
        self.contacts.insert(ordered(a, b));
    }

    /// Forgets every contact.
    pub fn clear_contacts(&mut self) {
        self.contacts.clear();
    }

    /// Advances simulated time.
    pub fn advance(&mut self, seconds: f32) {
        self.time += seconds;
    }
}

fn ordered(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl SimQuery for FakeSim {
    fn body_pose(&self, body: &str) -> Result<Pose, SimError> {
        self.bodies
            .get(body)
            .copied()
            .ok_or_else(|| SimError::UnknownBody(body.to_string()))
    }

    fn joint_value(&self, joint: &str) -> Result<f32, SimError> {
        self.joints
            .get(joint)
            .map(|j| j.value)
            .ok_or_else(|| SimError::UnknownJoint(joint.to_string()))
    }

    fn set_joint_value(&mut self, joint: &str, value: f32) -> Result<(), SimError> {
        let j = self
            .joints
            .get_mut(joint)
            .ok_or_else(|| SimError::UnknownJoint(joint.to_string()))?;
        j.value = value;
        Ok(())
    }

    fn joint_range(&self, joint: &str) -> Result<(f32, f32), SimError> {
        self.joints
            .get(joint)
            .map(|j| j.range)
            .ok_or_else(|| SimError::UnknownJoint(joint.to_string()))
    }

    fn has_joint(&self, joint: &str) -> bool {
        self.joints.contains_key(joint)
    }

    fn geom_position(&self, geom: &str) -> Result<Vec3, SimError> {
        self.geoms
            .get(geom)
            .copied()
            .ok_or_else(|| SimError::UnknownGeom(geom.to_string()))
    }

    fn site_position(&self, site: &str) -> Result<Vec3, SimError> {
        self.sites
            .get(site)
            .copied()
            .ok_or_else(|| SimError::UnknownSite(site.to_string()))
    }

    fn body_geoms(&self, body: &str) -> Result<Vec<String>, SimError> {
        if !self.bodies.contains_key(body) && !self.body_geoms.contains_key(body) {
            return Err(SimError::UnknownBody(body.to_string()));
        }
        Ok(self.body_geoms.get(body).cloned().unwrap_or_default())
    }

    fn check_contact(&self, a: &[String], b: &[String]) -> bool {
        a.iter()
            .any(|ga| b.iter().any(|gb| self.contacts.contains(&ordered(ga, gb))))
    }

    fn time(&self) -> f32 {
        self.time
    }
}

/// Clamps a normalized fraction to a joint range value.
pub fn joint_at(range: (f32, f32), fraction: f32) -> f32 {
    range.0 + (range.1 - range.0) * clamp(fraction, 0.0, 1.0)
}
