// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

use std::collections::BTreeMap;
use std::f32::consts::{FRAC_PI_6, PI};

use galley_geom::{point_in_box, Tolerance};
use galley_math::{clamp, wrap_angle_positive, Prng, Vec3};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{check_unit_range, Fixture, FixtureError, FixtureKind, FixtureModel, Reading};
use crate::predicates::{object_points, WaterStream};
use crate::region::Region;
use crate::scene::SceneObject;
use crate::sim::SimQuery;

const WATER_ON_MIN: f32 = 0.40;
const HANDLE_ON_MAX: f32 = 0.50;
const HIGH_PRESSURE_RATIO: f32 = 0.5;
const LOW_PRESSURE_SCALE: f32 = 0.75;
const BASIN_TOLERANCE: f32 = 0.05;

/// Flow strength bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterPressure {
    /// Handle past half of its travel.
    High,
    /// Water on, handle below half travel.
    Low,
    /// Water off.
    Zero,
}

impl WaterPressure {
    fn label(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Low => "low",
            Self::Zero => "zero",
        }
    }
}

/// Spout direction bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpoutOrientation {
    /// Swung over the left basin.
    Left,
    /// Roughly straight ahead.
    Center,
    /// Swung over the right basin.
    Right,
}

impl SpoutOrientation {
    fn from_angle(q: f32) -> Self {
        if (PI..=2.0 * PI - FRAC_PI_6).contains(&q) {
            Self::Left
        } else if (FRAC_PI_6..=PI).contains(&q) {
            Self::Right
        } else {
            Self::Center
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }
}

/// Water temperature bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterTemp {
    /// Normalized temperature at or above one half.
    Hot,
    /// Below one half.
    Cold,
}

/// How [`Sink::set_handle_state`] positions the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleMode {
    /// Slightly past the on threshold.
    #[default]
    On,
    /// Fully closed.
    Off,
    /// Coin flip between on and off.
    Random,
}

/// Which basin of a double sink holds an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasinLocation {
    /// Left basin.
    Left,
    /// Right basin.
    Right,
    /// Neither basin.
    None,
}

/// Snapshot of the sink's handle, spout and temperature joints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SinkState {
    /// Handle angle wrapped into `[0, 2π)`.
    pub handle_joint: f32,
    /// Water is flowing.
    pub water_on: bool,
    /// Flow strength.
    pub water_pressure: WaterPressure,
    /// Spout angle wrapped into `[0, 2π)`.
    pub spout_joint: f32,
    /// Spout direction.
    pub spout_ori: SpoutOrientation,
    /// Raw temperature joint position.
    pub temp_joint: f32,
    /// Normalized temperature, 0 coldest, 1 hottest.
    pub water_temp: f32,
    /// Temperature bucket.
    pub water_temp_state: WaterTemp,
}

/// Sink state machine over `handle_joint`, `spout_joint` and `handle_temp_joint`.
#[derive(Debug, Clone)]
pub struct Sink {
    fixture: Fixture,
    handle_joint: String,
    handle_joint_max: f32,
    spout_joint: String,
    temp_joint: String,
    water_site: String,
    water_site_size: Vec<f32>,
}

impl Sink {
    /// Wraps a sink fixture, resolving joint and site names from its geometry.
    pub fn new(fixture: &Fixture) -> Result<Self, FixtureError> {
        fixture.expect_kind(FixtureKind::Sink)?;
        let handle_joint = fixture.prefixed("handle_joint");
        let handle_joint_max = fixture
            .geometry()
            .joint(&handle_joint)
            .and_then(|j| j.range)
            .map(|(_, hi)| hi)
            .ok_or_else(|| FixtureError::MissingJoint {
                fixture: fixture.name().to_string(),
                joint: handle_joint.clone(),
            })?;
        let water_site = fixture.prefixed("water");
        let water_site_size = fixture
            .geometry()
            .site(&water_site)
            .map(|s| s.size.clone())
            .ok_or_else(|| FixtureError::MissingSite {
                fixture: fixture.name().to_string(),
                site: water_site.clone(),
            })?;
        Ok(Self {
            handle_joint,
            handle_joint_max,
            spout_joint: fixture.prefixed("spout_joint"),
            temp_joint: fixture.prefixed("handle_temp_joint"),
            water_site,
            water_site_size,
            fixture: fixture.clone(),
        })
    }

    /// The wrapped fixture.
    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    /// Reads handle, spout and temperature state.
    pub fn handle_state(&self, sim: &dyn SimQuery) -> Result<SinkState, FixtureError> {
        let handle = wrap_angle_positive(sim.joint_value(&self.handle_joint)?);
        let water_on = WATER_ON_MIN < handle && handle < PI;
        let ratio = handle / self.handle_joint_max;
        let water_pressure = if water_on && ratio > HIGH_PRESSURE_RATIO {
            WaterPressure::High
        } else if water_on {
            WaterPressure::Low
        } else {
            WaterPressure::Zero
        };

        let spout = wrap_angle_positive(sim.joint_value(&self.spout_joint)?);

        let temp_joint = sim.joint_value(&self.temp_joint)?;
        let (lo, hi) = sim.joint_range(&self.temp_joint)?;
        let water_temp = clamp(1.0 - (temp_joint - lo) / (hi - lo), 0.0, 1.0);

        Ok(SinkState {
            handle_joint: handle,
            water_on,
            water_pressure,
            spout_joint: spout,
            spout_ori: SpoutOrientation::from_angle(spout),
            temp_joint,
            water_temp,
            water_temp_state: if water_temp >= 0.5 {
                WaterTemp::Hot
            } else {
                WaterTemp::Cold
            },
        })
    }

    /// Positions the handle: on draws from `[0.40, 0.50)`, off writes zero.
    pub fn set_handle_state(
        &self,
        sim: &mut dyn SimQuery,
        rng: &mut Prng,
        mode: HandleMode,
    ) -> Result<(), FixtureError> {
        let mode = match mode {
            HandleMode::Random if rng.next_bool() => HandleMode::On,
            HandleMode::Random => HandleMode::Off,
            other => other,
        };
        let value = if mode == HandleMode::On {
            rng.uniform(WATER_ON_MIN, HANDLE_ON_MAX)
        } else {
            0.0
        };
        sim.set_joint_value(&self.handle_joint, value)?;
        Ok(())
    }

    /// Sets the temperature joint from a normalized `[min, max]` band.
    ///
    /// The joint is written sign-flipped, matching how sink models orient the
    /// temperature lever. Returns the resulting bucket relative to the joint
    /// range midpoint.
    pub fn set_temp_state(
        &self,
        sim: &mut dyn SimQuery,
        rng: &mut Prng,
        min: f32,
        max: f32,
    ) -> Result<WaterTemp, FixtureError> {
        check_unit_range(min, max)?;
        let (lo, hi) = sim.joint_range(&self.temp_joint)?;
        let actual = -rng.uniform(lo + min * (hi - lo), lo + max * (hi - lo));
        sim.set_joint_value(&self.temp_joint, actual)?;
        Ok(if actual < (lo + hi) / 2.0 {
            WaterTemp::Cold
        } else {
            WaterTemp::Hot
        })
    }

    /// Rendered water-site radius for a state: full when high, 0.75× when
    /// low, hidden when off.
    pub fn water_site_radius(&self, state: &SinkState) -> Option<f32> {
        let full = self.water_site_size.first().copied().unwrap_or(0.0);
        match state.water_pressure {
            WaterPressure::High => Some(full),
            WaterPressure::Low => Some(full * LOW_PRESSURE_SCALE),
            WaterPressure::Zero => None,
        }
    }

    /// Left/right basin test in the sink's rotated frame.
    ///
    /// With `partial_check` only the object center is tested, exactly;
    /// otherwise every bounding-box corner must be inside with 5 cm slack.
    pub fn obj_basin_loc(
        &self,
        sim: &dyn SimQuery,
        object: &SceneObject,
        partial_check: bool,
    ) -> Result<BasinLocation, FixtureError> {
        let left = self.fixture.regions().get("basin_left")?;
        let right = self.fixture.regions().get("basin_right")?;
        let points = object_points(sim, object, partial_check)?;
        let slack = if partial_check { 0.0 } else { BASIN_TOLERANCE };
        if self.all_in(left, &points, slack)? {
            Ok(BasinLocation::Left)
        } else if self.all_in(right, &points, slack)? {
            Ok(BasinLocation::Right)
        } else {
            Ok(BasinLocation::None)
        }
    }

    fn all_in(&self, region: &Region, points: &[Vec3], slack: f32) -> Result<bool, FixtureError> {
        let bounds = region.bounds_world(&self.fixture.pose())?;
        let tol = Tolerance {
            per_axis: Vec3::new(slack, slack, 0.0),
            planar: true,
        };
        Ok(points.iter().all(|p| point_in_box(p, &bounds, &tol)))
    }

    /// Object center sits below the water outlet within `xy_thresh`
    /// (default: the object's horizontal radius) while water runs.
    pub fn check_obj_under_water(
        &self,
        sim: &dyn SimQuery,
        object: &SceneObject,
        xy_thresh: Option<f32>,
    ) -> Result<bool, FixtureError> {
        let thresh = xy_thresh.unwrap_or_else(|| object.horizontal_radius());
        let obj = sim.body_pose(&object.body)?.position();
        let site = sim.site_position(&self.water_site)?;
        let reach = self.water_site_size.get(1).copied().unwrap_or(0.0);
        let xy_check = obj.planar_distance(&site) < thresh;
        let z_check = obj.z() < site.z() + reach;
        Ok(xy_check && z_check && self.handle_state(sim)?.water_on)
    }

    /// Vertical water column from `spout_main` down to the basin bottom.
    ///
    /// The bottom comes from the `int_p0` site, else the `bottom` geom.
    /// Returns `None` (and logs) when neither exists.
    pub fn water_stream(
        &self,
        sim: &dyn SimQuery,
        radius: f32,
    ) -> Result<Option<WaterStream>, FixtureError> {
        let spout = sim.geom_position(&self.fixture.prefixed("spout_main"))?;
        let bottom = sim
            .site_position(&self.fixture.prefixed("int_p0"))
            .or_else(|_| sim.geom_position(&self.fixture.prefixed("bottom")));
        match bottom {
            Ok(bottom) => Ok(Some(WaterStream::new(&spout, bottom.z(), radius))),
            Err(_) => {
                warn!(sink = self.fixture.name(), "could not find sink bottom reference");
                Ok(None)
            }
        }
    }

    /// Any sampled object point (or just the center) lies inside the water column.
    pub fn obj_in_water_stream(
        &self,
        sim: &dyn SimQuery,
        object: &SceneObject,
        radius: f32,
        partial_check: bool,
    ) -> Result<bool, FixtureError> {
        let Some(stream) = self.water_stream(sim, radius)? else {
            return Ok(false);
        };
        let points = object_points(sim, object, partial_check)?;
        Ok(points.iter().any(|p| stream.contains(p)))
    }
}

impl FixtureModel for Sink {
    fn fixture_name(&self) -> &str {
        self.fixture.name()
    }

    fn readings(&self, sim: &dyn SimQuery) -> Result<BTreeMap<String, Reading>, FixtureError> {
        let s = self.handle_state(sim)?;
        let mut out = BTreeMap::new();
        out.insert("handle_joint".into(), Reading::Number(s.handle_joint));
        out.insert("water_on".into(), Reading::Flag(s.water_on));
        out.insert("water_pressure".into(), Reading::Label(s.water_pressure.label()));
        out.insert("spout_joint".into(), Reading::Number(s.spout_joint));
        out.insert("spout_ori".into(), Reading::Label(s.spout_ori.label()));
        out.insert("temp_joint".into(), Reading::Number(s.temp_joint));
        out.insert("water_temp".into(), Reading::Number(s.water_temp));
        out.insert(
            "water_temp_state".into(),
            Reading::Label(match s.water_temp_state {
                WaterTemp::Hot => "hot",
                WaterTemp::Cold => "cold",
            }),
        );
        Ok(out)
    }
}
