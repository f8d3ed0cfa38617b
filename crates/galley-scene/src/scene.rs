// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scene objects and whole-scene generation.
//!
//! A generation attempt samples every object from the catalog and places
//! it in declaration order. Recoverable failures restart the attempt from
//! the catalog step on the same RNG stream; anything else aborts.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use galley_math::{Prng, Vec3};

use crate::catalog::{Catalog, CatalogError, SampleQuery, SampledObjectInstance};
use crate::config::SamplerPolicy;
use crate::error::SceneError;
use crate::fixture::FixtureRegistry;
use crate::placement::{Placement, PlacementRequest, Placer};
use crate::region::{Region, RegionError, RegionSet};

/// A movable object in a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    /// Object name.
    pub name: String,
    /// Simulator body carrying the object.
    pub body: String,
    /// Scaled half-extents of the declared bounding box.
    pub half_extents: Vec3,
    /// Catalog draw, when sampled.
    pub instance: Option<SampledObjectInstance>,
    /// Resolved placement, when placed.
    pub placement: Option<Placement>,
}

impl SceneObject {
    /// Bare object whose body shares its name.
    pub fn new(name: impl Into<String>, half_extents: Vec3) -> Self {
        let name = name.into();
        Self {
            body: name.clone(),
            name,
            half_extents,
            instance: None,
            placement: None,
        }
    }

    /// Object built from a catalog draw; the draw must declare a bounding box.
    pub fn from_instance(
        name: impl Into<String>,
        instance: SampledObjectInstance,
    ) -> Result<Self, CatalogError> {
        let half_extents = instance
            .scaled_half_extents()
            .ok_or_else(|| CatalogError::MissingBoundingBox(instance.asset_path.clone()))?;
        let mut obj = Self::new(name, half_extents);
        obj.instance = Some(instance);
        Ok(obj)
    }

    /// Half-diagonal of the horizontal footprint.
    pub fn horizontal_radius(&self) -> f32 {
        self.half_extents.x().hypot(self.half_extents.y())
    }

    /// The asset's declared regions, scaled like the object.
    pub fn regions(&self) -> Result<RegionSet, RegionError> {
        let mut set = RegionSet::new(self.name.clone());
        let Some(inst) = &self.instance else {
            return Ok(set);
        };
        let scale = inst.scale.as_vec3();
        for (name, r) in &inst.regions {
            set.insert(Region::new(
                self.name.clone(),
                name.clone(),
                Vec3::from(r.center).mul_elem(&scale),
                Vec3::from(r.half_extents).mul_elem(&scale),
            )?);
        }
        Ok(set)
    }
}

/// One object entry of a scene description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpec {
    /// Object name, unique within the scene.
    pub name: String,
    /// Catalog query.
    #[serde(default)]
    pub query: SampleQuery,
    /// Where to put it.
    pub placement: PlacementRequest,
}

/// A fully sampled and placed set of objects.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    /// Objects in declaration order.
    pub objects: Vec<SceneObject>,
    /// Generation attempts consumed, including the successful one.
    pub attempts: usize,
}

impl Scene {
    /// Object by name.
    pub fn object(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.name == name)
    }
}

/// Generates scenes over a fixed catalog and fixture layout.
#[derive(Debug, Clone, Copy)]
pub struct SceneGenerator<'a> {
    catalog: &'a Catalog,
    fixtures: &'a FixtureRegistry,
    policy: SamplerPolicy,
}

impl<'a> SceneGenerator<'a> {
    /// Generator over `catalog` and `fixtures`.
    pub fn new(catalog: &'a Catalog, fixtures: &'a FixtureRegistry, policy: SamplerPolicy) -> Self {
        Self {
            catalog,
            fixtures,
            policy,
        }
    }

    /// Samples and places every entry of `specs`, retrying the whole scene on
    /// recoverable failures up to the policy's scene budget.
    #[instrument(skip(self, specs, rng), fields(objects = specs.len()))]
    pub fn generate(&self, specs: &[ObjectSpec], rng: &mut Prng) -> Result<Scene, SceneError> {
        self.policy.validate()?;
        let mut last = None;
        for attempt in 1..=self.policy.scene_attempts {
            match self.attempt(specs, rng) {
                Ok(objects) => {
                    info!(attempt, objects = objects.len(), "scene resolved");
                    return Ok(Scene {
                        objects,
                        attempts: attempt,
                    });
                }
                Err(err) if err.is_recoverable() => {
                    warn!(attempt, error = %err, "scene attempt failed; restarting");
                    last = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(SceneError::SceneAttemptsExhausted {
            attempts: self.policy.scene_attempts,
            last: last.map(Box::new),
        })
    }

    fn attempt(&self, specs: &[ObjectSpec], rng: &mut Prng) -> Result<Vec<SceneObject>, SceneError> {
        let mut placer = Placer::new(self.fixtures, self.policy)?;
        let mut objects = Vec::with_capacity(specs.len());
        for spec in specs {
            let instance = self
                .catalog
                .sample(&spec.query, rng, self.policy.size_attempts)?;
            let mut obj = SceneObject::from_instance(spec.name.clone(), instance)?;
            let placement = placer.place(
                &obj.name,
                obj.half_extents,
                obj.regions()?,
                &spec.placement,
                rng,
            )?;
            obj.placement = Some(placement);
            objects.push(obj);
        }
        Ok(objects)
    }
}
