// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Data-driven tasks: a YAML record naming the objects to sample and a
//! success expression evaluated once per simulation step.
//!
//! Cross-step memory (hold counters, latches, initial orientations and
//! previous positions) lives in [`Episode`]; the predicates it calls stay
//! pure.

use std::collections::BTreeMap;

use galley_geom::Tolerance;
use galley_math::{Quat, Vec3, EPSILON};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::SamplerPolicy;
use crate::fixture::{
    door_openness, BasinLocation, FixtureError, FixtureKind, FixtureRegistry, Sink, ToasterControl,
    ToasterOven,
};
use crate::predicates::{
    check_obj_contact, check_obj_fixture_contact, check_obj_grasped, check_obj_in_receptacle,
    gripper_obj_far, motion_detected, obj_far_from, obj_inside_fixture, orientation_flipped,
    stirring_detected, tilt_angle, Gripper,
};
use crate::scene::{ObjectSpec, SceneObject};
use crate::sim::{SimError, SimQuery};

/// Task loading and evaluation failures. All are fatal.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Task YAML is malformed.
    #[error("task parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// The success expression names an object the episode does not hold.
    #[error("unknown object `{0}`")]
    UnknownObject(String),
    /// A fixture lookup or state read failed.
    #[error(transparent)]
    Fixture(#[from] FixtureError),
    /// A physics query failed.
    #[error(transparent)]
    Sim(#[from] SimError),
}

/// Numeric comparison used by reading leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// Equal within [`EPSILON`].
    Eq,
}

impl Comparison {
    /// Applies the comparison as `lhs <op> rhs`.
    pub fn holds(self, lhs: f32, rhs: f32) -> bool {
        match self {
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
            Self::Eq => (lhs - rhs).abs() <= EPSILON,
        }
    }
}

fn yes() -> bool {
    true
}

fn default_height_band() -> f32 {
    0.3
}

fn default_gripper_far() -> f32 {
    0.25
}

fn default_stream_radius() -> f32 {
    0.05
}

/// Success expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuccessExpr {
    /// Every child holds. All children are evaluated every step.
    All {
        /// Children.
        of: Vec<SuccessExpr>,
    },
    /// Some child holds. All children are evaluated every step.
    Any {
        /// Children.
        of: Vec<SuccessExpr>,
    },
    /// The child does not hold.
    Not {
        /// Child.
        expr: Box<SuccessExpr>,
    },
    /// The child held on each of the last `steps` steps.
    Hold {
        /// Consecutive steps required.
        steps: u32,
        /// Child.
        expr: Box<SuccessExpr>,
    },
    /// The child held on some earlier step of the episode.
    Latch {
        /// Child.
        expr: Box<SuccessExpr>,
    },
    /// Every corner of the object is inside a fixture region.
    InsideFixture {
        /// Object name.
        object: String,
        /// Fixture name.
        fixture: String,
        /// Region name.
        region: String,
    },
    /// Object center is over a receptacle object and near its base.
    InReceptacle {
        /// Object name.
        object: String,
        /// Receptacle object name.
        receptacle: String,
        /// Height band above the receptacle base.
        #[serde(default = "default_height_band")]
        height_band: f32,
    },
    /// Object touches a fixture.
    FixtureContact {
        /// Object name.
        object: String,
        /// Fixture name.
        fixture: String,
    },
    /// Two objects touch.
    ObjectContact {
        /// First object.
        a: String,
        /// Second object.
        b: String,
    },
    /// Both gripper pads touch the object.
    Grasped {
        /// Object name.
        object: String,
    },
    /// Grip site is farther than `threshold` from the object.
    GripperFar {
        /// Object name.
        object: String,
        /// Distance in meters.
        #[serde(default = "default_gripper_far")]
        threshold: f32,
    },
    /// Two objects are farther apart than `threshold`.
    ObjectsFar {
        /// First object.
        a: String,
        /// Second object.
        b: String,
        /// Distance in meters.
        threshold: f32,
    },
    /// Object intersects the sink's water column.
    InWaterStream {
        /// Object name.
        object: String,
        /// Sink fixture name.
        sink: String,
        /// Column radius.
        #[serde(default = "default_stream_radius")]
        radius: f32,
        /// Test only the object center.
        #[serde(default)]
        partial: bool,
    },
    /// Object sits under the running faucet.
    UnderWater {
        /// Object name.
        object: String,
        /// Sink fixture name.
        sink: String,
        /// Planar threshold; the object's radius when absent.
        #[serde(default)]
        xy_thresh: Option<f32>,
    },
    /// Object is in the given basin of a double sink.
    InBasin {
        /// Object name.
        object: String,
        /// Sink fixture name.
        sink: String,
        /// Expected basin.
        location: BasinLocation,
        /// Test only the object center.
        #[serde(default)]
        partial: bool,
    },
    /// Sink water flow matches `on`.
    SinkWaterOn {
        /// Sink fixture name.
        sink: String,
        /// Expected flow state.
        #[serde(default = "yes")]
        on: bool,
    },
    /// Object roll or pitch moved past `threshold` since the episode began.
    Flipped {
        /// Object name.
        object: String,
        /// Radians.
        threshold: f32,
    },
    /// Object rotated by more than `threshold` since the episode began.
    Tilted {
        /// Object name.
        object: String,
        /// Radians.
        threshold: f32,
    },
    /// Object moved more than `threshold` in the plane since the last step.
    Moved {
        /// Object name.
        object: String,
        /// Meters.
        threshold: f32,
    },
    /// Object moves inside a receptacle while touching a tool.
    Stirred {
        /// Stirred object.
        object: String,
        /// Stirring tool object.
        tool: String,
        /// Receptacle object.
        receptacle: String,
        /// Planar displacement per step, meters.
        threshold: f32,
        /// Height band above the receptacle base.
        #[serde(default = "default_height_band")]
        height_band: f32,
    },
    /// A toaster-oven control compared against a value.
    ToasterReading {
        /// Toaster-oven fixture name.
        fixture: String,
        /// Control to read.
        control: ToasterControl,
        /// Comparison.
        cmp: Comparison,
        /// Right-hand side.
        value: f32,
    },
    /// Object touches the toaster-oven rack or tray.
    RackContact {
        /// Object name.
        object: String,
        /// Toaster-oven fixture name.
        fixture: String,
    },
    /// Mean normalized door openness compared against a value.
    DoorOpen {
        /// Fixture name.
        fixture: String,
        /// Comparison.
        cmp: Comparison,
        /// Right-hand side.
        value: f32,
    },
}

impl SuccessExpr {
    fn children(&self) -> Vec<&Self> {
        match self {
            Self::All { of } | Self::Any { of } => of.iter().collect(),
            Self::Not { expr } | Self::Hold { expr, .. } | Self::Latch { expr } => vec![expr.as_ref()],
            _ => Vec::new(),
        }
    }

    /// Nodes in the tree, counted in pre-order.
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(|c| c.node_count()).sum::<usize>()
    }

    fn visit<'a>(&'a self, out: &mut Vec<&'a Self>) {
        out.push(self);
        for c in self.children() {
            c.visit(out);
        }
    }

    fn objects(&self) -> Vec<&str> {
        match self {
            Self::InsideFixture { object, .. }
            | Self::FixtureContact { object, .. }
            | Self::Grasped { object }
            | Self::GripperFar { object, .. }
            | Self::InWaterStream { object, .. }
            | Self::UnderWater { object, .. }
            | Self::InBasin { object, .. }
            | Self::Flipped { object, .. }
            | Self::Tilted { object, .. }
            | Self::Moved { object, .. }
            | Self::RackContact { object, .. } => vec![object.as_str()],
            Self::InReceptacle {
                object, receptacle, ..
            } => vec![object.as_str(), receptacle.as_str()],
            Self::ObjectContact { a, b } | Self::ObjectsFar { a, b, .. } => {
                vec![a.as_str(), b.as_str()]
            }
            Self::Stirred {
                object,
                tool,
                receptacle,
                ..
            } => vec![object.as_str(), tool.as_str(), receptacle.as_str()],
            _ => Vec::new(),
        }
    }

    fn fixture(&self) -> Option<(&str, Option<FixtureKind>)> {
        match self {
            Self::InsideFixture { fixture, .. }
            | Self::FixtureContact { fixture, .. }
            | Self::DoorOpen { fixture, .. } => Some((fixture.as_str(), None)),
            Self::InWaterStream { sink, .. }
            | Self::UnderWater { sink, .. }
            | Self::InBasin { sink, .. }
            | Self::SinkWaterOn { sink, .. } => Some((sink.as_str(), Some(FixtureKind::Sink))),
            Self::ToasterReading { fixture, .. } | Self::RackContact { fixture, .. } => {
                Some((fixture.as_str(), Some(FixtureKind::ToasterOven)))
            }
            _ => None,
        }
    }
}

/// A task: objects to sample and the goal to evaluate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Task name.
    pub name: String,
    /// Instruction template; `{object}` expands to that object's description.
    #[serde(default)]
    pub lang: String,
    /// Objects to sample and place, in order.
    #[serde(default)]
    pub objects: Vec<ObjectSpec>,
    /// End-effector names used by grasp and distance leaves.
    #[serde(default)]
    pub gripper: Gripper,
    /// Goal.
    pub success: SuccessExpr,
}

impl TaskConfig {
    /// Parses a task from YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, TaskError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Expands `{name}` placeholders with object categories (or names for
    /// unsampled objects) and fixture descriptions.
    pub fn render_lang(&self, objects: &[SceneObject], fixtures: &FixtureRegistry) -> String {
        let mut out = self.lang.clone();
        for obj in objects {
            let noun = obj
                .instance
                .as_ref()
                .map_or_else(|| obj.name.replace('_', " "), |i| i.category.replace('_', " "));
            out = out.replace(&format!("{{{}}}", obj.name), &noun);
        }
        for f in fixtures.iter() {
            out = out.replace(&format!("{{{}}}", f.name()), f.kind().nat_lang());
        }
        out
    }
}

/// Per-node counters indexed by pre-order node id.
#[derive(Debug, Clone, Default)]
struct NodeState {
    hold: Vec<u32>,
    latch: Vec<bool>,
}

/// Everything leaves read besides the live simulation.
#[derive(Debug, Clone)]
struct Bindings {
    objects: BTreeMap<String, SceneObject>,
    fixtures: FixtureRegistry,
    sinks: BTreeMap<String, Sink>,
    toasters: BTreeMap<String, ToasterOven>,
    gripper: Gripper,
    tolerance: Tolerance,
    initial: BTreeMap<String, Quat>,
    previous: BTreeMap<String, Vec3>,
}

/// One evaluation run of a task over a scene.
#[derive(Debug, Clone)]
pub struct Episode {
    success: SuccessExpr,
    bindings: Bindings,
    nodes: NodeState,
    started: bool,
    steps: usize,
}

impl Episode {
    /// Binds a task's success expression to concrete objects and fixtures,
    /// rejecting unknown names up front.
    pub fn new(
        config: &TaskConfig,
        objects: Vec<SceneObject>,
        fixtures: &FixtureRegistry,
        policy: &SamplerPolicy,
    ) -> Result<Self, TaskError> {
        let objects: BTreeMap<String, SceneObject> =
            objects.into_iter().map(|o| (o.name.clone(), o)).collect();
        let mut sinks = BTreeMap::new();
        let mut toasters = BTreeMap::new();
        let mut nodes = Vec::new();
        config.success.visit(&mut nodes);
        for node in &nodes {
            if let Some(missing) = node.objects().into_iter().find(|o| !objects.contains_key(*o)) {
                return Err(TaskError::UnknownObject(missing.to_string()));
            }
            let Some((name, kind)) = node.fixture() else {
                continue;
            };
            let fixture = fixtures.get(name)?;
            match kind {
                Some(FixtureKind::Sink) if !sinks.contains_key(name) => {
                    sinks.insert(name.to_string(), Sink::new(fixture)?);
                }
                Some(FixtureKind::ToasterOven) if !toasters.contains_key(name) => {
                    toasters.insert(name.to_string(), ToasterOven::new(fixture)?);
                }
                _ => {}
            }
        }
        let count = config.success.node_count();
        Ok(Self {
            success: config.success.clone(),
            bindings: Bindings {
                objects,
                fixtures: fixtures.clone(),
                sinks,
                toasters,
                gripper: config.gripper.clone(),
                tolerance: Tolerance::uniform(policy.containment_tolerance),
                initial: BTreeMap::new(),
                previous: BTreeMap::new(),
            },
            nodes: NodeState {
                hold: vec![0; count],
                latch: vec![false; count],
            },
            started: false,
            steps: 0,
        })
    }

    /// Records initial orientations and positions and clears every counter.
    pub fn begin(&mut self, sim: &dyn SimQuery) -> Result<(), TaskError> {
        self.bindings.initial.clear();
        self.bindings.previous.clear();
        for obj in self.bindings.objects.values() {
            let pose = sim.body_pose(&obj.body)?;
            self.bindings.initial.insert(obj.name.clone(), pose.rotation());
            self.bindings.previous.insert(obj.name.clone(), pose.position());
        }
        self.nodes.hold.iter_mut().for_each(|c| *c = 0);
        self.nodes.latch.iter_mut().for_each(|l| *l = false);
        self.started = true;
        self.steps = 0;
        Ok(())
    }

    /// Advances fixture state, evaluates the goal, then records positions for
    /// the next step. Begins the episode implicitly on the first call.
    #[instrument(skip(self, sim), fields(step = self.steps))]
    pub fn step(&mut self, sim: &mut dyn SimQuery) -> Result<bool, TaskError> {
        if !self.started {
            self.begin(sim)?;
        }
        for toaster in self.bindings.toasters.values_mut() {
            toaster.update_state(sim)?;
        }
        let mut id = 0;
        let success = self.bindings.eval(&self.success, sim, &mut self.nodes, &mut id)?;
        for obj in self.bindings.objects.values() {
            let pos = sim.body_pose(&obj.body)?.position();
            self.bindings.previous.insert(obj.name.clone(), pos);
        }
        self.steps += 1;
        debug!(success, "task evaluated");
        Ok(success)
    }

    /// Steps evaluated since the episode began.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Toaster oven bound to the episode, for driving its controls.
    pub fn toaster_mut(&mut self, name: &str) -> Option<&mut ToasterOven> {
        self.bindings.toasters.get_mut(name)
    }

    /// Sink bound to the episode.
    pub fn sink(&self, name: &str) -> Option<&Sink> {
        self.bindings.sinks.get(name)
    }
}

impl Bindings {
    fn object(&self, name: &str) -> Result<&SceneObject, TaskError> {
        self.objects
            .get(name)
            .ok_or_else(|| TaskError::UnknownObject(name.to_string()))
    }

    fn sink(&self, name: &str) -> Result<&Sink, TaskError> {
        self.sinks
            .get(name)
            .ok_or_else(|| FixtureError::UnknownFixture(name.to_string()).into())
    }

    fn toaster(&self, name: &str) -> Result<&ToasterOven, TaskError> {
        self.toasters
            .get(name)
            .ok_or_else(|| FixtureError::UnknownFixture(name.to_string()).into())
    }

    fn initial(&self, object: &str) -> Result<Quat, TaskError> {
        self.initial
            .get(object)
            .copied()
            .ok_or_else(|| TaskError::UnknownObject(object.to_string()))
    }

    fn previous(&self, object: &str) -> Result<Vec3, TaskError> {
        self.previous
            .get(object)
            .copied()
            .ok_or_else(|| TaskError::UnknownObject(object.to_string()))
    }

    fn eval(
        &self,
        expr: &SuccessExpr,
        sim: &dyn SimQuery,
        nodes: &mut NodeState,
        id: &mut usize,
    ) -> Result<bool, TaskError> {
        let me = *id;
        *id += 1;
        Ok(match expr {
            SuccessExpr::All { of } => {
                let mut all = true;
                for child in of {
                    all &= self.eval(child, sim, nodes, id)?;
                }
                all
            }
            SuccessExpr::Any { of } => {
                let mut any = false;
                for child in of {
                    any |= self.eval(child, sim, nodes, id)?;
                }
                any
            }
            SuccessExpr::Not { expr } => !self.eval(expr, sim, nodes, id)?,
            SuccessExpr::Hold { steps, expr } => {
                let held = self.eval(expr, sim, nodes, id)?;
                nodes.hold[me] = if held { nodes.hold[me].saturating_add(1) } else { 0 };
                nodes.hold[me] >= *steps
            }
            SuccessExpr::Latch { expr } => {
                let now = self.eval(expr, sim, nodes, id)?;
                nodes.latch[me] |= now;
                nodes.latch[me]
            }
            leaf => self.eval_leaf(leaf, sim)?,
        })
    }

    fn eval_leaf(&self, expr: &SuccessExpr, sim: &dyn SimQuery) -> Result<bool, TaskError> {
        Ok(match expr {
            SuccessExpr::InsideFixture {
                object,
                fixture,
                region,
            } => obj_inside_fixture(
                sim,
                self.object(object)?,
                self.fixtures.get(fixture)?,
                region,
                &self.tolerance,
            )?,
            SuccessExpr::InReceptacle {
                object,
                receptacle,
                height_band,
            } => check_obj_in_receptacle(
                sim,
                self.object(object)?,
                self.object(receptacle)?,
                *height_band,
            )?,
            SuccessExpr::FixtureContact { object, fixture } => {
                check_obj_fixture_contact(sim, self.object(object)?, self.fixtures.get(fixture)?)?
            }
            SuccessExpr::ObjectContact { a, b } => {
                check_obj_contact(sim, self.object(a)?, self.object(b)?)?
            }
            SuccessExpr::Grasped { object } => {
                check_obj_grasped(sim, self.object(object)?, &self.gripper)?
            }
            SuccessExpr::GripperFar { object, threshold } => {
                gripper_obj_far(sim, self.object(object)?, &self.gripper, *threshold)?
            }
            SuccessExpr::ObjectsFar { a, b, threshold } => {
                obj_far_from(sim, self.object(a)?, self.object(b)?, *threshold)?
            }
            SuccessExpr::InWaterStream {
                object,
                sink,
                radius,
                partial,
            } => self
                .sink(sink)?
                .obj_in_water_stream(sim, self.object(object)?, *radius, *partial)?,
            SuccessExpr::UnderWater {
                object,
                sink,
                xy_thresh,
            } => self
                .sink(sink)?
                .check_obj_under_water(sim, self.object(object)?, *xy_thresh)?,
            SuccessExpr::InBasin {
                object,
                sink,
                location,
                partial,
            } => {
                self.sink(sink)?
                    .obj_basin_loc(sim, self.object(object)?, *partial)?
                    == *location
            }
            SuccessExpr::SinkWaterOn { sink, on } => {
                self.sink(sink)?.handle_state(sim)?.water_on == *on
            }
            SuccessExpr::Flipped { object, threshold } => {
                let current = sim.body_pose(&self.object(object)?.body)?.rotation();
                orientation_flipped(&self.initial(object)?, &current, *threshold)
            }
            SuccessExpr::Tilted { object, threshold } => {
                let current = sim.body_pose(&self.object(object)?.body)?.rotation();
                tilt_angle(&self.initial(object)?, &current) > *threshold
            }
            SuccessExpr::Moved { object, threshold } => {
                let current = sim.body_pose(&self.object(object)?.body)?.position();
                motion_detected(&self.previous(object)?, &current, *threshold)
            }
            SuccessExpr::Stirred {
                object,
                tool,
                receptacle,
                threshold,
                height_band,
            } => stirring_detected(
                sim,
                self.object(object)?,
                &self.previous(object)?,
                self.object(tool)?,
                self.object(receptacle)?,
                *threshold,
                *height_band,
            )?,
            SuccessExpr::ToasterReading {
                fixture,
                control,
                cmp,
                value,
            } => {
                let state = self.toaster(fixture)?.get_state(sim);
                let reading = state.get(control).ok_or_else(|| FixtureError::MissingJoint {
                    fixture: fixture.clone(),
                    joint: control.name().to_string(),
                })?;
                cmp.holds(*reading, *value)
            }
            SuccessExpr::RackContact { object, fixture } => self
                .toaster(fixture)?
                .check_rack_contact(sim, self.object(object)?)?,
            SuccessExpr::DoorOpen {
                fixture,
                cmp,
                value,
            } => door_openness(sim, self.fixtures.get(fixture)?)?
                .is_some_and(|open| cmp.holds(open, *value)),
            SuccessExpr::All { .. }
            | SuccessExpr::Any { .. }
            | SuccessExpr::Not { .. }
            | SuccessExpr::Hold { .. }
            | SuccessExpr::Latch { .. } => false,
        })
    }
}
