// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![doc = r"Galley scene core.

Procedurally furnishes simulated kitchen scenes and decides whether a
manipulation episode reached its goal:
- `catalog`: object categories, registries and the seeded asset sampler.
- `placement`: region-constrained placement with bounded rejection sampling.
- `scene`: whole-scene generation with recoverable restarts.
- `fixture`: sink, oven and toaster-oven state machines over fixture joints.
- `predicates`: containment, contact, distance, orientation and water-stream
  tests over live simulation state.
- `task`: data-driven success expressions evaluated per step.

The physics engine is reached only through [`SimQuery`]. All randomness flows
through an explicit [`galley_math::Prng`], so equal seeds give equal scenes.
"]

/// Object catalog and asset sampling.
pub mod catalog;
/// Sampler policy and config storage.
pub mod config;
/// Crate-level error.
pub mod error;
/// Fixture kinds, registry and state machines.
pub mod fixture;
/// Static geometry (MJCF) parsing.
pub mod geometry;
/// Placement sampler.
pub mod placement;
/// Success predicates.
pub mod predicates;
/// Named regions per fixture or object.
pub mod region;
/// Scene objects and generation.
pub mod scene;
/// Physics query port.
pub mod sim;
/// Data-driven tasks.
pub mod task;

pub use catalog::{
    split_boundary, Catalog, CatalogError, CapabilityFlags, GroupSelection, MaterialParams,
    SampleQuery, SampledObjectInstance, Scale, Split,
};
pub use config::{ConfigError, ConfigService, ConfigStore, FsConfigStore, SamplerPolicy};
pub use error::SceneError;
pub use fixture::{
    Fixture, FixtureError, FixtureKind, FixtureModel, FixtureRegistry, Oven, Reading, Sink,
    ToasterControl, ToasterOven,
};
pub use geometry::{GeometryDescription, ModelParseError};
pub use placement::{
    AxisSpec, Placement, PlacementError, PlacementRequest, Placer, ReferenceSpec, RotationSpec,
};
pub use region::{Region, RegionError, RegionRegistry, RegionSet};
pub use scene::{ObjectSpec, Scene, SceneGenerator, SceneObject};
pub use sim::{SimError, SimQuery};
pub use task::{Comparison, Episode, SuccessExpr, TaskConfig, TaskError};
