// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

use std::collections::BTreeMap;

use galley_math::clamp;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{joint_normalized, set_joint_normalized, Fixture, FixtureError, FixtureKind, FixtureModel, Reading};
use crate::scene::SceneObject;
use crate::sim::SimQuery;

/// Seconds of simulated time per unit of normalized timer travel.
pub const TIMER_DECAY: f32 = 3000.0;

const DOOR_OPEN: f32 = 0.99;

/// Toaster-oven controls, each backed by one joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToasterControl {
    /// Door hinge.
    Door,
    /// Doneness knob.
    Doneness,
    /// Function knob.
    Function,
    /// Temperature knob.
    Temperature,
    /// Timer knob; counts down once set.
    Time,
    /// Sliding rack (present on rack variants).
    Rack,
    /// Sliding tray (present on tray variants).
    Tray,
}

impl ToasterControl {
    /// Every control in update order.
    pub const ALL: [Self; 7] = [
        Self::Door,
        Self::Doneness,
        Self::Function,
        Self::Temperature,
        Self::Time,
        Self::Rack,
        Self::Tray,
    ];

    /// Reading key.
    pub fn name(self) -> &'static str {
        match self {
            Self::Door => "door",
            Self::Doneness => "doneness",
            Self::Function => "function",
            Self::Temperature => "temperature",
            Self::Time => "time",
            Self::Rack => "rack",
            Self::Tray => "tray",
        }
    }

    fn joint_suffix(self) -> &'static str {
        match self {
            Self::Door => "door_joint",
            Self::Doneness => "knob_doneness_joint",
            Self::Function => "knob_function_joint",
            Self::Temperature => "knob_temp_joint",
            Self::Time => "knob_time_joint",
            Self::Rack => "rack0_joint",
            Self::Tray => "tray0_joint",
        }
    }
}

/// Toaster-oven state machine with a decaying timer.
///
/// Settings are stored normalized to each joint's range. The timer loses
/// `elapsed / 3000` per update while positive and floors at zero.
#[derive(Debug, Clone)]
pub struct ToasterOven {
    fixture: Fixture,
    state: BTreeMap<ToasterControl, f32>,
    last_time_update: Option<f32>,
}

impl ToasterOven {
    /// Wraps a toaster-oven fixture.
    pub fn new(fixture: &Fixture) -> Result<Self, FixtureError> {
        fixture.expect_kind(FixtureKind::ToasterOven)?;
        Ok(Self {
            fixture: fixture.clone(),
            state: BTreeMap::new(),
            last_time_update: None,
        })
    }

    /// Full joint name for a control.
    pub fn joint(&self, control: ToasterControl) -> String {
        self.fixture.prefixed(control.joint_suffix())
    }

    fn set_control(
        &mut self,
        sim: &mut dyn SimQuery,
        control: ToasterControl,
        value: f32,
    ) -> Result<f32, FixtureError> {
        let joint = self.joint(control);
        if !sim.has_joint(&joint) {
            return Err(FixtureError::MissingJoint {
                fixture: self.fixture.name().to_string(),
                joint,
            });
        }
        let value = clamp(value, 0.0, 1.0);
        set_joint_normalized(sim, &joint, value)?;
        self.state.insert(control, value);
        Ok(value)
    }

    /// Doneness knob, 0 (off) to 1 (dark).
    pub fn set_doneness(&mut self, sim: &mut dyn SimQuery, value: f32) -> Result<(), FixtureError> {
        self.set_control(sim, ToasterControl::Doneness, value).map(|_| ())
    }

    /// Function knob, normalized.
    pub fn set_function(&mut self, sim: &mut dyn SimQuery, value: f32) -> Result<(), FixtureError> {
        self.set_control(sim, ToasterControl::Function, value).map(|_| ())
    }

    /// Temperature knob, 0 (min) to 1 (max).
    pub fn set_temperature(&mut self, sim: &mut dyn SimQuery, value: f32) -> Result<(), FixtureError> {
        self.set_control(sim, ToasterControl::Temperature, value).map(|_| ())
    }

    /// Sets the timer and starts its countdown from the current sim time.
    pub fn set_time(&mut self, sim: &mut dyn SimQuery, value: f32) -> Result<(), FixtureError> {
        let value = self.set_control(sim, ToasterControl::Time, value)?;
        self.last_time_update = (value > 0.0).then(|| sim.time());
        Ok(())
    }

    /// Swings the door fully open.
    pub fn open_door(&mut self, sim: &mut dyn SimQuery) -> Result<(), FixtureError> {
        self.set_control(sim, ToasterControl::Door, 1.0).map(|_| ())
    }

    /// Slides the rack (or the tray on tray variants), opening the door first
    /// if it is not already open. Returns the control that moved.
    pub fn slide_rack(
        &mut self,
        sim: &mut dyn SimQuery,
        value: f32,
    ) -> Result<ToasterControl, FixtureError> {
        let door = joint_normalized(sim, &self.joint(ToasterControl::Door))?;
        if door <= DOOR_OPEN {
            self.open_door(sim)?;
        }
        let control = self.shelf_control(sim);
        self.set_control(sim, control, value)?;
        Ok(control)
    }

    fn shelf_control(&self, sim: &dyn SimQuery) -> ToasterControl {
        if sim.has_joint(&self.joint(ToasterControl::Rack)) {
            ToasterControl::Rack
        } else {
            ToasterControl::Tray
        }
    }

    /// Pulls every present joint into the stored state and advances the timer.
    pub fn update_state(&mut self, sim: &mut dyn SimQuery) -> Result<(), FixtureError> {
        let now = sim.time();
        for control in ToasterControl::ALL {
            let joint = self.joint(control);
            if !sim.has_joint(&joint) {
                continue;
            }
            let mut value = joint_normalized(sim, &joint)?;
            if control == ToasterControl::Time {
                if value > 0.0 {
                    if let Some(since) = self.last_time_update {
                        value = (value - (now - since) / TIMER_DECAY).max(0.0);
                        set_joint_normalized(sim, &joint, value)?;
                    }
                    self.last_time_update = Some(now);
                } else {
                    self.last_time_update = None;
                }
                debug!(fixture = self.fixture.name(), time = value, "timer updated");
            }
            self.state.insert(control, value);
        }
        Ok(())
    }

    /// Stored setting per control whose joint exists in the model.
    pub fn get_state(&self, sim: &dyn SimQuery) -> BTreeMap<ToasterControl, f32> {
        ToasterControl::ALL
            .into_iter()
            .filter(|c| sim.has_joint(&self.joint(*c)))
            .map(|c| (c, self.state.get(&c).copied().unwrap_or(0.0)))
            .collect()
    }

    /// Object touches the rack (or tray) body.
    pub fn check_rack_contact(
        &self,
        sim: &dyn SimQuery,
        object: &SceneObject,
    ) -> Result<bool, FixtureError> {
        let joint = self.joint(self.shelf_control(sim));
        let body = joint.strip_suffix("_joint").unwrap_or(&joint);
        let shelf = sim.body_geoms(body)?;
        let item = sim.body_geoms(&object.body)?;
        Ok(sim.check_contact(&shelf, &item))
    }
}

impl FixtureModel for ToasterOven {
    fn fixture_name(&self) -> &str {
        self.fixture.name()
    }

    fn readings(&self, sim: &dyn SimQuery) -> Result<BTreeMap<String, Reading>, FixtureError> {
        Ok(self
            .get_state(sim)
            .into_iter()
            .map(|(c, v)| (c.name().to_string(), Reading::Number(v)))
            .collect())
    }
}
