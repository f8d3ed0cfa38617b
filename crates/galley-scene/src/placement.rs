// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Region-constrained placement with bounded rejection sampling.
//!
//! Requests resolve in declaration order against one [`Placer`]. Each
//! request picks a container region, checks that the footprint can fit at
//! all, then draws rotation and offsets until the candidate clears every
//! object placed earlier or the attempt budget runs out. The resulting
//! distribution is not uniform over the feasible set.

use std::collections::BTreeMap;
use std::f32::consts::TAU;

use galley_geom::{AabbTree, BroadPhase, GeometryError, OrientedBox, Pose};
use galley_math::{clamp, Prng, Quat, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::{ConfigError, SamplerPolicy};
use crate::fixture::FixtureRegistry;
use crate::region::{Region, RegionError, RegionRegistry, RegionSet};

/// Placement failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlacementError {
    /// The footprint plus margin cannot fit the region on some axis.
    #[error("`{object}` cannot fit region `{region}` (usable half-size {usable:?})")]
    Infeasible {
        /// Object being placed.
        object: String,
        /// Region tried last.
        region: String,
        /// Usable half-size per planar axis; at least one is non-positive.
        usable: [f32; 2],
    },
    /// Every candidate overlapped or fell outside the region.
    #[error("`{object}` not placed after {attempts} attempts")]
    Exhausted {
        /// Object being placed.
        object: String,
        /// Candidates tried.
        attempts: usize,
    },
    /// The container is neither a fixture nor a placed object.
    #[error("unknown container `{0}`")]
    UnknownContainer(String),
    /// The reference entity has not been placed.
    #[error("unknown reference `{0}`")]
    UnknownReference(String),
    /// An axis is reference-relative but no reference was given.
    #[error("`{0}` uses a reference-relative axis without a reference")]
    MissingReference(String),
    /// A request field is out of range.
    #[error("invalid request for `{object}`: {reason}")]
    InvalidRequest {
        /// Object being placed.
        object: String,
        /// What is wrong.
        reason: String,
    },
    /// The object name is already placed.
    #[error("`{0}` is already placed")]
    Duplicate(String),
    /// Region lookup failed.
    #[error(transparent)]
    Region(#[from] RegionError),
    /// A candidate box is malformed.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

impl PlacementError {
    /// Whether a fresh scene attempt may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Infeasible { .. } | Self::Exhausted { .. })
    }
}

/// How one planar coordinate is chosen, in the region's normalized `[-1, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisSpec {
    /// Uniform over the usable range.
    #[default]
    Random,
    /// Fixed normalized value.
    Fixed(f32),
    /// Uniform in a band of width `2·|bias|` from an edge (`±1`) or the
    /// center (`0`) toward the interior.
    Anchor {
        /// `-1`, `0` or `1`.
        anchor: f32,
        /// Band half-width; for a center anchor the sign picks the side.
        bias: f32,
    },
    /// The reference's coordinate plus a signed offset in meters.
    Reference {
        /// Offset from the reference along this axis.
        offset: f32,
    },
}

/// Yaw about the container's vertical axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationSpec {
    /// Full turn, or the policy's narrow band for upright requests.
    #[default]
    Default,
    /// Uniform in `[min, max]`.
    Range {
        /// Lower bound in radians.
        min: f32,
        /// Upper bound in radians.
        max: f32,
    },
    /// Exactly this yaw.
    Fixed(f32),
}

/// Entity a request is positioned relative to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSpec {
    /// Fixture or previously placed object.
    pub entity: String,
    /// Restricts the region to this half-size around the reference.
    #[serde(default)]
    pub near: Option<[f32; 2]>,
}

fn yes() -> bool {
    true
}

/// Where and how to place one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementRequest {
    /// Fixture or placed object holding the region.
    pub container: String,
    /// Region name; `None` picks among the container's reset regions.
    #[serde(default)]
    pub region: Option<String>,
    /// Optional positioning reference.
    #[serde(default)]
    pub reference: Option<ReferenceSpec>,
    /// x and y specifiers.
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub position: [AxisSpec; 2],
    /// Yaw specifier.
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub rotation: RotationSpec,
    /// Keep the yaw inside the policy's upright band.
    #[serde(default)]
    pub upright: bool,
    /// Clearance from the region boundary, in meters.
    #[serde(default)]
    pub margin: f32,
    /// Height above the region floor, in meters.
    #[serde(default)]
    pub z_offset: f32,
    /// Keep the whole footprint inside the region, not just the center.
    #[serde(default = "yes")]
    pub ensure_object_boundary_in_range: bool,
}

impl PlacementRequest {
    /// Uniform placement anywhere in `container`'s `region`.
    pub fn in_region(container: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            region: Some(region.into()),
            ..Self::on(container)
        }
    }

    /// Uniform placement in one of `container`'s reset regions.
    pub fn on(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            region: None,
            reference: None,
            position: [AxisSpec::Random; 2],
            rotation: RotationSpec::Default,
            upright: false,
            margin: 0.0,
            z_offset: 0.0,
            ensure_object_boundary_in_range: true,
        }
    }
}

/// A resolved placement.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Object name.
    pub name: String,
    /// World pose of the object center.
    pub pose: Pose,
    /// Object half-extents.
    pub half_extents: Vec3,
    /// Candidates drawn, including the accepted one.
    pub attempts: usize,
    /// Container entity.
    pub container: String,
    /// Region the object landed in.
    pub region: String,
}

impl Placement {
    /// World box of the placed object.
    pub fn bounds(&self) -> Result<OrientedBox, GeometryError> {
        OrientedBox::new(self.pose, self.half_extents)
    }
}

/// Planar rectangle in a region's frame.
#[derive(Debug, Clone, Copy)]
struct Rect {
    center: [f32; 2],
    half: [f32; 2],
}

/// Everything fixed for a request before any draw.
struct Target<'r> {
    region: &'r Region,
    frame: Pose,
    rect: Rect,
    reference_local: Option<Vec3>,
}

/// Places objects one after another, rejecting overlaps with earlier ones.
#[derive(Debug, Clone)]
pub struct Placer {
    regions: RegionRegistry,
    poses: BTreeMap<String, Pose>,
    broad: AabbTree,
    ids: BTreeMap<String, usize>,
    placed: Vec<Placement>,
    policy: SamplerPolicy,
}

impl Placer {
    /// Placer over `fixtures`, with nothing placed yet.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] when `policy` fails
    /// [`SamplerPolicy::validate`].
    pub fn new(fixtures: &FixtureRegistry, policy: SamplerPolicy) -> Result<Self, ConfigError> {
        policy.validate()?;
        Ok(Self {
            regions: fixtures.region_registry(),
            poses: fixtures
                .iter()
                .map(|f| (f.name().to_string(), f.pose()))
                .collect(),
            broad: AabbTree::new(),
            ids: BTreeMap::new(),
            placed: Vec::new(),
            policy,
        })
    }

    /// Regions of every fixture and placed object.
    pub fn regions(&self) -> &RegionRegistry {
        &self.regions
    }

    /// Pose of a fixture or placed object.
    pub fn pose_of(&self, entity: &str) -> Option<Pose> {
        self.poses.get(entity).copied()
    }

    /// Placements so far, in resolution order.
    pub fn placed(&self) -> &[Placement] {
        &self.placed
    }

    /// Resolves `request` for an object with `half_extents`, then registers
    /// the object's own `regions` so later requests can target it.
    #[instrument(skip(self, half_extents, regions, request, rng), fields(container = %request.container))]
    pub fn place(
        &mut self,
        name: &str,
        half_extents: Vec3,
        regions: RegionSet,
        request: &PlacementRequest,
        rng: &mut Prng,
    ) -> Result<Placement, PlacementError> {
        if self.ids.contains_key(name) {
            return Err(PlacementError::Duplicate(name.to_string()));
        }
        validate_request(name, &half_extents, request)?;
        let placement = {
            let target = self.select_target(name, &half_extents, request, rng)?;
            self.sample(name, half_extents, request, &target, rng)?
        };
        let id = self.ids.len();
        self.broad.upsert(id, placement.bounds()?.aabb());
        self.ids.insert(name.to_string(), id);
        self.poses.insert(name.to_string(), placement.pose);
        self.regions.insert(name, None, regions);
        self.placed.push(placement.clone());
        Ok(placement)
    }

    fn select_target(
        &self,
        name: &str,
        half_extents: &Vec3,
        request: &PlacementRequest,
        rng: &mut Prng,
    ) -> Result<Target<'_>, PlacementError> {
        let owner_pose = self
            .pose_of(&request.container)
            .ok_or_else(|| PlacementError::UnknownContainer(request.container.clone()))?;
        let candidates: Vec<&Region> = match &request.region {
            Some(r) => vec![self.regions.region(&request.container, r)?],
            None => self.regions.reset_regions(&request.container)?,
        };
        let reference = match &request.reference {
            Some(spec) => Some(
                self.pose_of(&spec.entity)
                    .ok_or_else(|| PlacementError::UnknownReference(spec.entity.clone()))?
                    .position(),
            ),
            None => None,
        };

        let mut feasible = Vec::new();
        let mut last_usable = [0.0; 2];
        for region in candidates {
            let frame = Pose::new(
                owner_pose.transform_point(&region.center()),
                owner_pose.rotation(),
            );
            let reference_local = reference.map(|p| frame.inverse_transform_point(&p));
            let he = region.half_extents();
            let mut rect = Rect {
                center: [0.0, 0.0],
                half: [he.x(), he.y()],
            };
            if let (Some(local), Some(near)) = (
                reference_local,
                request.reference.as_ref().and_then(|s| s.near),
            ) {
                rect = intersect(rect, [local.x(), local.y()], near);
            }
            let usable = usable_half(&rect, half_extents, request);
            if usable[0] > 0.0 && usable[1] > 0.0 {
                feasible.push(Target {
                    region,
                    frame,
                    rect,
                    reference_local,
                });
            } else {
                last_usable = usable;
            }
        }
        let region_label = request.region.clone().unwrap_or_else(|| "reset".into());
        let idx = rng
            .next_index(feasible.len())
            .ok_or_else(|| PlacementError::Infeasible {
                object: name.to_string(),
                region: region_label,
                usable: last_usable,
            })?;
        Ok(feasible.swap_remove(idx))
    }

    fn sample(
        &self,
        name: &str,
        half_extents: Vec3,
        request: &PlacementRequest,
        target: &Target<'_>,
        rng: &mut Prng,
    ) -> Result<Placement, PlacementError> {
        let skip = self.ids.get(&request.container).copied();
        let floor = -target.region.half_extents().z();
        for attempt in 1..=self.policy.placement_attempts {
            let yaw = self.draw_yaw(request, rng);
            let (c, s) = (yaw.cos().abs(), yaw.sin().abs());
            let rotated = [
                c * half_extents.x() + s * half_extents.y(),
                s * half_extents.x() + c * half_extents.y(),
            ];
            let usable = rotated_usable(&target.rect, rotated, request);
            if usable[0] < 0.0 || usable[1] < 0.0 {
                debug!(attempt, yaw, "rotated footprint exceeds region; redrawing");
                continue;
            }
            let reference = target.reference_local.map(Vec3::to_array);
            let mut draw = |axis: usize| {
                draw_axis(
                    name,
                    request.position[axis],
                    usable[axis],
                    target.rect.center[axis],
                    reference.map(|r| r[axis]),
                    rng,
                )
            };
            let offset = [draw(0)?, draw(1)?];
            let local = Vec3::new(
                target.rect.center[0] + offset[0],
                target.rect.center[1] + offset[1],
                floor + half_extents.z() + request.z_offset,
            );
            let pose = Pose::new(
                target.frame.transform_point(&local),
                target.frame.rotation().multiply(&Quat::from_yaw(yaw)),
            );
            let probe = OrientedBox::new(pose, half_extents)?
                .aabb()
                .inflate(self.policy.safety_margin);
            let hits: Vec<usize> = self
                .broad
                .query(&probe)
                .into_iter()
                .filter(|id| Some(*id) != skip)
                .collect();
            if !hits.is_empty() {
                debug!(attempt, ?hits, "candidate overlaps placed objects; redrawing");
                continue;
            }
            return Ok(Placement {
                name: name.to_string(),
                pose,
                half_extents,
                attempts: attempt,
                container: request.container.clone(),
                region: target.region.name().to_string(),
            });
        }
        Err(PlacementError::Exhausted {
            object: name.to_string(),
            attempts: self.policy.placement_attempts,
        })
    }

    fn draw_yaw(&self, request: &PlacementRequest, rng: &mut Prng) -> f32 {
        match request.rotation {
            RotationSpec::Fixed(yaw) => yaw,
            RotationSpec::Range { min, max } => rng.uniform(min, max),
            RotationSpec::Default if request.upright => {
                rng.uniform(-self.policy.upright_band, self.policy.upright_band)
            }
            RotationSpec::Default => rng.uniform(0.0, TAU),
        }
    }
}

fn validate_request(
    name: &str,
    half_extents: &Vec3,
    request: &PlacementRequest,
) -> Result<(), PlacementError> {
    let invalid = |reason: String| PlacementError::InvalidRequest {
        object: name.to_string(),
        reason,
    };
    if !half_extents.is_finite() || half_extents.min(&Vec3::ZERO) != Vec3::ZERO {
        return Err(invalid(format!("bad half-extents {half_extents:?}")));
    }
    if !request.margin.is_finite() || request.margin < 0.0 {
        return Err(invalid(format!("bad margin {}", request.margin)));
    }
    if let RotationSpec::Range { min, max } = request.rotation {
        if !(min.is_finite() && max.is_finite()) || min > max {
            return Err(invalid(format!("rotation range {min}..{max}")));
        }
    }
    for axis in request.position {
        match axis {
            AxisSpec::Fixed(v) if !(-1.0..=1.0).contains(&v) => {
                return Err(invalid(format!("fixed axis value {v} outside [-1, 1]")));
            }
            AxisSpec::Anchor { anchor, .. } if ![-1.0, 0.0, 1.0].contains(&anchor) => {
                return Err(invalid(format!("anchor {anchor} is not -1, 0 or 1")));
            }
            AxisSpec::Anchor { bias, .. } if !bias.is_finite() => {
                return Err(invalid(format!("anchor bias {bias} is not finite")));
            }
            AxisSpec::Reference { .. } if request.reference.is_none() => {
                return Err(PlacementError::MissingReference(name.to_string()));
            }
            _ => {}
        }
    }
    Ok(())
}

fn intersect(rect: Rect, around: [f32; 2], near: [f32; 2]) -> Rect {
    let span = |axis: usize| {
        let lo = (rect.center[axis] - rect.half[axis]).max(around[axis] - near[axis]);
        let hi = (rect.center[axis] + rect.half[axis]).min(around[axis] + near[axis]);
        ((lo + hi) * 0.5, ((hi - lo) * 0.5).max(0.0))
    };
    let (x, y) = (span(0), span(1));
    Rect {
        center: [x.0, y.0],
        half: [x.1, y.1],
    }
}

/// Usable half-size with the unrotated footprint.
fn usable_half(rect: &Rect, half_extents: &Vec3, request: &PlacementRequest) -> [f32; 2] {
    rotated_usable(rect, [half_extents.x(), half_extents.y()], request)
}

fn rotated_usable(rect: &Rect, footprint: [f32; 2], request: &PlacementRequest) -> [f32; 2] {
    let body = |axis: usize| {
        if request.ensure_object_boundary_in_range {
            footprint[axis]
        } else {
            0.0
        }
    };
    [
        rect.half[0] - (body(0) + request.margin),
        rect.half[1] - (body(1) + request.margin),
    ]
}

/// Offset from the rectangle center along one axis.
fn draw_axis(
    name: &str,
    spec: AxisSpec,
    usable: f32,
    center: f32,
    reference: Option<f32>,
    rng: &mut Prng,
) -> Result<f32, PlacementError> {
    let u = usable.max(0.0);
    Ok(match spec {
        AxisSpec::Random => rng.uniform(-u, u),
        AxisSpec::Fixed(v) => v * u,
        AxisSpec::Anchor { anchor, bias } => {
            let width = 2.0 * bias.abs();
            let (lo, hi) = if anchor < 0.0 {
                (-1.0, -1.0 + width)
            } else if anchor > 0.0 {
                (1.0 - width, 1.0)
            } else if bias < 0.0 {
                (-width, 0.0)
            } else {
                (0.0, width)
            };
            rng.uniform(clamp(lo, -1.0, 1.0), clamp(hi, -1.0, 1.0)) * u
        }
        AxisSpec::Reference { offset } => {
            let r = reference.ok_or_else(|| PlacementError::MissingReference(name.to_string()))?;
            clamp(r + offset - center, -u, u)
        }
    })
}
