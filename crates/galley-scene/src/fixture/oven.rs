// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

use std::collections::BTreeMap;

use galley_math::Prng;

use super::{
    check_unit_range, joint_normalized, Fixture, FixtureError, FixtureKind, FixtureModel, Reading,
};
use crate::sim::SimQuery;

/// Wall oven: door joints discovered from the model, set in normalized units.
#[derive(Debug, Clone)]
pub struct Oven {
    fixture: Fixture,
    door_joints: Vec<String>,
}

impl Oven {
    /// Wraps an oven fixture.
    pub fn new(fixture: &Fixture) -> Result<Self, FixtureError> {
        fixture.expect_kind(FixtureKind::Oven)?;
        Ok(Self {
            door_joints: fixture.door_joints().into_iter().map(String::from).collect(),
            fixture: fixture.clone(),
        })
    }

    /// Door joint names.
    pub fn door_joints(&self) -> &[String] {
        &self.door_joints
    }

    /// Opens every door to a random fraction of its range drawn from `[min, max]`.
    pub fn set_door_state(
        &self,
        sim: &mut dyn SimQuery,
        rng: &mut Prng,
        min: f32,
        max: f32,
    ) -> Result<(), FixtureError> {
        check_unit_range(min, max)?;
        for joint in &self.door_joints {
            let (lo, hi) = sim.joint_range(joint)?;
            let target = rng.uniform(lo + (hi - lo) * min, lo + (hi - lo) * max);
            sim.set_joint_value(joint, target)?;
        }
        Ok(())
    }

    /// Normalized openness per door joint.
    pub fn door_state(&self, sim: &dyn SimQuery) -> Result<BTreeMap<String, f32>, FixtureError> {
        self.door_joints
            .iter()
            .map(|j| Ok((j.clone(), joint_normalized(sim, j)?)))
            .collect()
    }
}

impl FixtureModel for Oven {
    fn fixture_name(&self) -> &str {
        self.fixture.name()
    }

    fn readings(&self, sim: &dyn SimQuery) -> Result<BTreeMap<String, Reading>, FixtureError> {
        let prefix = self.fixture.geometry().naming_prefix();
        Ok(self
            .door_state(sim)?
            .into_iter()
            .map(|(joint, v)| {
                let short = joint.strip_prefix(prefix).unwrap_or(&joint).to_string();
                (short, Reading::Number(v))
            })
            .collect())
    }
}
