// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Named placement/containment regions per fixture or object.
//!
//! Regions are immutable once parsed. Their world bounds are recomputed from
//! the owner's pose on every query, so moving objects and rotated fixtures
//! are handled the same way.

use std::collections::BTreeMap;

use galley_geom::{GeometryError, OrientedBox, Pose};
use galley_math::{Quat, Vec3};
use thiserror::Error;

use crate::fixture::FixtureKind;
use crate::geometry::GeometryDescription;

/// Region lookup failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegionError {
    /// The entity exists but declares no region by that name.
    #[error("region `{name}` not found on `{entity}`")]
    RegionNotFound {
        /// Owning entity.
        entity: String,
        /// Requested region.
        name: String,
    },
    /// No entity registered under this name.
    #[error("unknown entity `{0}`")]
    UnknownEntity(String),
    /// A declared region box is malformed.
    #[error("malformed region on `{entity}`: {source}")]
    Geometry {
        /// Owning entity.
        entity: String,
        /// Underlying geometry failure.
        source: GeometryError,
    },
}

/// A named box in its owner's local frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    owner: String,
    name: String,
    center: Vec3,
    half_extents: Vec3,
}

impl Region {
    /// Creates a region, rejecting non-finite or negative extents.
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        center: Vec3,
        half_extents: Vec3,
    ) -> Result<Self, RegionError> {
        let owner = owner.into();
        if let Err(source) = OrientedBox::new(Pose::new(center, Quat::identity()), half_extents) {
            return Err(RegionError::Geometry {
                entity: owner,
                source,
            });
        }
        Ok(Self {
            owner,
            name: name.into(),
            center,
            half_extents,
        })
    }

    /// Owning entity name.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Short region name (e.g. `basin_left`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Center in the owner's frame.
    pub fn center(&self) -> Vec3 {
        self.center
    }

    /// Half-extents along the owner's axes.
    pub fn half_extents(&self) -> Vec3 {
        self.half_extents
    }

    /// World-space box given the owner's current pose.
    pub fn bounds_world(&self, owner_pose: &Pose) -> Result<OrientedBox, RegionError> {
        let pose = Pose::new(
            owner_pose.transform_point(&self.center),
            owner_pose.rotation(),
        );
        OrientedBox::new(pose, self.half_extents).map_err(|source| RegionError::Geometry {
            entity: self.owner.clone(),
            source,
        })
    }
}

/// All regions of one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionSet {
    owner: String,
    regions: BTreeMap<String, Region>,
}

impl RegionSet {
    /// Empty set for `owner`.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            regions: BTreeMap::new(),
        }
    }

    /// Builds the set from parsed `reg_*` geoms.
    pub fn from_geometry(
        owner: impl Into<String>,
        geometry: &GeometryDescription,
    ) -> Result<Self, RegionError> {
        Self::from_geometry_scaled(owner, geometry, &Vec3::new(1.0, 1.0, 1.0))
    }

    /// Builds the set from parsed `reg_*` geoms, scaling each box.
    pub fn from_geometry_scaled(
        owner: impl Into<String>,
        geometry: &GeometryDescription,
        scale: &Vec3,
    ) -> Result<Self, RegionError> {
        let mut set = Self::new(owner);
        for (name, decl) in geometry.regions() {
            let decl = decl.scaled(scale);
            set.insert(Region::new(
                set.owner.clone(),
                name.clone(),
                decl.center,
                decl.half_extents,
            )?);
        }
        Ok(set)
    }

    /// Adds or replaces a region.
    pub fn insert(&mut self, region: Region) {
        self.regions.insert(region.name.clone(), region);
    }

    /// Owning entity.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Looks a region up by name.
    pub fn get(&self, name: &str) -> Result<&Region, RegionError> {
        self.regions
            .get(name)
            .ok_or_else(|| RegionError::RegionNotFound {
                entity: self.owner.clone(),
                name: name.to_string(),
            })
    }

    /// Whether `name` is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.regions.contains_key(name)
    }

    /// Region names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    /// Regions in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    /// Number of regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// `true` when nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[derive(Debug, Clone)]
struct RegisteredEntity {
    kind: Option<FixtureKind>,
    regions: RegionSet,
}

/// Region sets for every fixture and placed object in a scene.
#[derive(Debug, Clone, Default)]
pub struct RegionRegistry {
    entities: BTreeMap<String, RegisteredEntity>,
}

impl RegionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity's regions. `kind` is `None` for movable objects.
    pub fn insert(&mut self, entity: impl Into<String>, kind: Option<FixtureKind>, regions: RegionSet) {
        self.entities
            .insert(entity.into(), RegisteredEntity { kind, regions });
    }

    /// Whether `entity` is registered.
    pub fn contains(&self, entity: &str) -> bool {
        self.entities.contains_key(entity)
    }

    /// All regions of `entity`.
    pub fn regions_for(&self, entity: &str) -> Result<&RegionSet, RegionError> {
        self.entities
            .get(entity)
            .map(|e| &e.regions)
            .ok_or_else(|| RegionError::UnknownEntity(entity.to_string()))
    }

    /// One region of `entity`.
    pub fn region(&self, entity: &str, name: &str) -> Result<&Region, RegionError> {
        self.regions_for(entity)?.get(name)
    }

    /// `(center, half_extents)` in the entity's local frame.
    pub fn region_bounds_local(&self, entity: &str, name: &str) -> Result<(Vec3, Vec3), RegionError> {
        let r = self.region(entity, name)?;
        Ok((r.center(), r.half_extents()))
    }

    /// World box for `entity`'s region at the entity's current pose.
    pub fn region_bounds_world(
        &self,
        entity: &str,
        name: &str,
        entity_pose: &Pose,
    ) -> Result<OrientedBox, RegionError> {
        self.region(entity, name)?.bounds_world(entity_pose)
    }

    /// Regions objects may be reset into.
    ///
    /// Uses the entity kind's default set filtered to what the entity actually
    /// declares, then every declared region, and fails with `RegionNotFound`
    /// when neither yields anything.
    pub fn reset_regions(&self, entity: &str) -> Result<Vec<&Region>, RegionError> {
        let registered = self
            .entities
            .get(entity)
            .ok_or_else(|| RegionError::UnknownEntity(entity.to_string()))?;
        let defaults = registered
            .kind
            .map_or(&[][..], FixtureKind::default_reset_regions);
        let preferred: Vec<&Region> = defaults
            .iter()
            .filter_map(|name| registered.regions.get(name).ok())
            .collect();
        if !preferred.is_empty() {
            return Ok(preferred);
        }
        let all: Vec<&Region> = registered.regions.iter().collect();
        if all.is_empty() {
            return Err(RegionError::RegionNotFound {
                entity: entity.to_string(),
                name: defaults.first().copied().unwrap_or("reset").to_string(),
            });
        }
        Ok(all)
    }
}
