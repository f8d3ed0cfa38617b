// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fixtures: kinds, capability tags, the per-scene registry, and the small
//! state machines layered over fixture joints.

mod oven;
mod sink;
mod toaster_oven;

use std::collections::BTreeMap;

use galley_geom::{point_in_box, OrientedBox, Pose, Tolerance};
use galley_math::{clamp, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::GeometryDescription;
use crate::region::{RegionError, RegionRegistry, RegionSet};
use crate::sim::{SimError, SimQuery};

pub use oven::Oven;
pub use sink::{BasinLocation, HandleMode, Sink, SinkState, SpoutOrientation, WaterPressure, WaterTemp};
pub use toaster_oven::{ToasterControl, ToasterOven};

/// Fixture configuration and state failures. None of these are retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FixtureError {
    /// A joint the fixture model relies on is not declared.
    #[error("fixture `{fixture}` has no joint `{joint}`")]
    MissingJoint {
        /// Fixture name.
        fixture: String,
        /// Joint name.
        joint: String,
    },
    /// A site the fixture model relies on is not declared.
    #[error("fixture `{fixture}` has no site `{site}`")]
    MissingSite {
        /// Fixture name.
        fixture: String,
        /// Site name.
        site: String,
    },
    /// The fixture is not of the kind the caller expected.
    #[error("fixture `{fixture}` is a {actual:?}, expected {expected:?}")]
    WrongKind {
        /// Fixture name.
        fixture: String,
        /// Expected kind.
        expected: FixtureKind,
        /// Registered kind.
        actual: FixtureKind,
    },
    /// No fixture registered under this name.
    #[error("unknown fixture `{0}`")]
    UnknownFixture(String),
    /// A fixture with this name is already registered.
    #[error("duplicate fixture `{0}`")]
    Duplicate(String),
    /// Normalized setter bounds outside `0 <= min <= max <= 1`.
    #[error("invalid normalized range {min}..{max}")]
    InvalidRange {
        /// Lower bound.
        min: f32,
        /// Upper bound.
        max: f32,
    },
    /// Region lookup failed.
    #[error(transparent)]
    Region(#[from] RegionError),
    /// Simulation lookup failed.
    #[error(transparent)]
    Sim(#[from] SimError),
}

/// Every fixture type the scene knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureKind {
    /// Counter top.
    Counter,
    /// Sink with handle, spout and temperature joints.
    Sink,
    /// Free-standing stove.
    Stove,
    /// Cooktop set into a counter.
    Stovetop,
    /// Wall oven.
    Oven,
    /// Counter-top toaster oven.
    ToasterOven,
    /// Counter-top microwave.
    Microwave,
    /// Single-door fridge.
    Fridge,
    /// Two-door fridge.
    FrenchDoorFridge,
    /// Cabinet with one door.
    SingleCabinet,
    /// Cabinet with a pair of hinged doors.
    HingeCabinet,
    /// Tall cabinet housing an appliance.
    HousingCabinet,
    /// Dish rack accessory.
    DishRack,
    /// Floor.
    Floor,
    /// Wall.
    Wall,
}

/// Capability tags resolved once when a fixture kind is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Doors come in pairs; language uses "doors".
    pub has_double_door: bool,
    /// Footprint counts as fixture base when testing whether a point is
    /// blocked by furniture.
    pub participates_in_base_contact_check: bool,
}

impl FixtureKind {
    /// Capability tags for this kind.
    pub fn capabilities(self) -> Capabilities {
        Capabilities {
            has_double_door: matches!(self, Self::HingeCabinet | Self::FrenchDoorFridge),
            participates_in_base_contact_check: matches!(
                self,
                Self::Counter
                    | Self::Stove
                    | Self::Stovetop
                    | Self::HousingCabinet
                    | Self::SingleCabinet
                    | Self::HingeCabinet
                    | Self::Fridge
                    | Self::FrenchDoorFridge
                    | Self::Wall
            ),
        }
    }

    /// Region names objects are reset into by default.
    pub fn default_reset_regions(self) -> &'static [&'static str] {
        match self {
            Self::Sink => &["basin", "basin_right", "basin_left"],
            Self::Oven => &["rack_bottom", "rack_top"],
            Self::ToasterOven => &["rack0", "rack1", "tray0", "tray1"],
            _ => &[],
        }
    }

    /// Natural-language name used in task instructions.
    pub fn nat_lang(self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Sink => "sink",
            Self::Stove => "stove",
            Self::Stovetop => "stovetop",
            Self::Oven => "oven",
            Self::ToasterOven => "toaster oven",
            Self::Microwave => "microwave",
            Self::Fridge | Self::FrenchDoorFridge => "fridge",
            Self::SingleCabinet | Self::HingeCabinet => "cabinet",
            Self::HousingCabinet => "housing cabinet",
            Self::DishRack => "dish rack",
            Self::Floor => "floor",
            Self::Wall => "wall",
        }
    }

    /// `"doors"` for double-door kinds, `"door"` otherwise.
    pub fn door_noun(self) -> &'static str {
        if self.capabilities().has_double_door {
            "doors"
        } else {
            "door"
        }
    }
}

/// A named fixture reading.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    /// Continuous value (joint position, normalized setting).
    Number(f32),
    /// Boolean state.
    Flag(bool),
    /// Discrete bucket such as `"high"` or `"left"`.
    Label(&'static str),
}

impl Reading {
    /// The numeric value, if this is a number.
    pub fn as_number(&self) -> Option<f32> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }
}

/// Uniform read access to fixture state machines.
pub trait FixtureModel {
    /// Name of the underlying fixture.
    fn fixture_name(&self) -> &str;

    /// Current named readings.
    fn readings(&self, sim: &dyn SimQuery) -> Result<BTreeMap<String, Reading>, FixtureError>;
}

/// A placed fixture: static pose plus parsed geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    name: String,
    kind: FixtureKind,
    pose: Pose,
    geometry: GeometryDescription,
    regions: RegionSet,
    capabilities: Capabilities,
}

impl Fixture {
    /// Creates a fixture; regions are parsed from `geometry` immediately.
    pub fn new(
        name: impl Into<String>,
        kind: FixtureKind,
        pose: Pose,
        geometry: GeometryDescription,
    ) -> Result<Self, FixtureError> {
        let name = name.into();
        let regions = RegionSet::from_geometry(name.clone(), &geometry)?;
        Ok(Self {
            name,
            kind,
            pose,
            geometry,
            regions,
            capabilities: kind.capabilities(),
        })
    }

    /// Fixture name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fixture kind.
    pub fn kind(&self) -> FixtureKind {
        self.kind
    }

    /// World pose (static for the episode).
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Parsed geometry.
    pub fn geometry(&self) -> &GeometryDescription {
        &self.geometry
    }

    /// Declared regions.
    pub fn regions(&self) -> &RegionSet {
        &self.regions
    }

    /// Capability tags.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Full model name for a suffix (`handle_joint` → `sink_handle_joint`).
    pub fn prefixed(&self, suffix: &str) -> String {
        self.geometry.prefixed(suffix)
    }

    /// World bounds of a named region.
    pub fn region_bounds_world(&self, name: &str) -> Result<OrientedBox, FixtureError> {
        Ok(self.regions.get(name)?.bounds_world(&self.pose)?)
    }

    /// World box of the declared bounding box, if any.
    pub fn footprint(&self) -> Option<OrientedBox> {
        let bbox = self.geometry.bbox()?;
        let pose = Pose::new(self.pose.transform_point(&bbox.center), self.pose.rotation());
        OrientedBox::new(pose, bbox.half_extents).ok()
    }

    /// All geom names declared by the fixture model.
    pub fn geom_names(&self) -> Vec<String> {
        self.geometry.geoms().iter().map(|g| g.name.clone()).collect()
    }

    /// Joints whose name (after the prefix) mentions a door.
    pub fn door_joints(&self) -> Vec<&str> {
        let prefix = self.geometry.naming_prefix();
        self.geometry
            .joints()
            .keys()
            .filter(|name| name.strip_prefix(prefix).unwrap_or(name.as_str()).contains("door"))
            .map(String::as_str)
            .collect()
    }

    /// Fails unless the fixture is of `expected` kind.
    pub fn expect_kind(&self, expected: FixtureKind) -> Result<(), FixtureError> {
        if self.kind == expected {
            Ok(())
        } else {
            Err(FixtureError::WrongKind {
                fixture: self.name.clone(),
                expected,
                actual: self.kind,
            })
        }
    }
}

/// Reads a joint as a fraction of its declared range.
pub(crate) fn joint_normalized(sim: &dyn SimQuery, joint: &str) -> Result<f32, FixtureError> {
    let q = sim.joint_value(joint)?;
    let (lo, hi) = sim.joint_range(joint)?;
    if (hi - lo).abs() <= f32::EPSILON {
        return Ok(0.0);
    }
    Ok((q - lo) / (hi - lo))
}

/// Writes a joint at a fraction of its declared range.
pub(crate) fn set_joint_normalized(
    sim: &mut dyn SimQuery,
    joint: &str,
    value: f32,
) -> Result<(), FixtureError> {
    let (lo, hi) = sim.joint_range(joint)?;
    sim.set_joint_value(joint, lo + (hi - lo) * value)?;
    Ok(())
}

/// Validates `0 <= min <= max <= 1`.
pub(crate) fn check_unit_range(min: f32, max: f32) -> Result<(), FixtureError> {
    if (0.0..=1.0).contains(&min) && (0.0..=1.0).contains(&max) && min <= max {
        Ok(())
    } else {
        Err(FixtureError::InvalidRange { min, max })
    }
}

/// Mean normalized openness over a fixture's door joints; `None` without doors.
pub fn door_openness(sim: &dyn SimQuery, fixture: &Fixture) -> Result<Option<f32>, FixtureError> {
    let doors = fixture.door_joints();
    if doors.is_empty() {
        return Ok(None);
    }
    let mut total = 0.0;
    for joint in &doors {
        total += clamp(joint_normalized(sim, joint)?, 0.0, 1.0);
    }
    Ok(Some(total / doors.len() as f32))
}

/// Every fixture in a scene, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct FixtureRegistry {
    fixtures: BTreeMap<String, Fixture>,
}

impl FixtureRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fixture; names must be unique.
    pub fn register(&mut self, fixture: Fixture) -> Result<(), FixtureError> {
        if self.fixtures.contains_key(&fixture.name) {
            return Err(FixtureError::Duplicate(fixture.name));
        }
        self.fixtures.insert(fixture.name.clone(), fixture);
        Ok(())
    }

    /// Fixture by name.
    pub fn get(&self, name: &str) -> Result<&Fixture, FixtureError> {
        self.fixtures
            .get(name)
            .ok_or_else(|| FixtureError::UnknownFixture(name.to_string()))
    }

    /// Fixtures in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Fixture> {
        self.fixtures.values()
    }

    /// Fixtures of one kind, in name order.
    pub fn of_kind(&self, kind: FixtureKind) -> impl Iterator<Item = &Fixture> {
        self.fixtures.values().filter(move |f| f.kind == kind)
    }

    /// Region registry seeded with every fixture's regions.
    pub fn region_registry(&self) -> RegionRegistry {
        let mut out = RegionRegistry::new();
        for f in self.fixtures.values() {
            out.insert(f.name.clone(), Some(f.kind), f.regions.clone());
        }
        out
    }

    /// `true` when `point` lies over the footprint of a fixture that counts as
    /// base furniture.
    pub fn point_touches_base(&self, point: &Vec3) -> bool {
        self.fixtures
            .values()
            .filter(|f| f.capabilities.participates_in_base_contact_check)
            .filter_map(Fixture::footprint)
            .any(|fp| point_in_box(point, &fp, &Tolerance::EXACT.planar()))
    }

    /// `true` when `point` is not over any floor fixture.
    pub fn point_outside_scene(&self, point: &Vec3) -> bool {
        !self
            .of_kind(FixtureKind::Floor)
            .filter_map(Fixture::footprint)
            .any(|fp| point_in_box(point, &fp, &Tolerance::EXACT.planar()))
    }
}
