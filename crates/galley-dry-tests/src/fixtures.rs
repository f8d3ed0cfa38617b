// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Canned fixtures and a small object catalog.
//!
//! Geometry is declared in each fixture's local frame with the fixture name
//! plus `_` as naming prefix, mirroring how kitchen models are authored.

use std::f32::consts::{FRAC_PI_2, PI};

use galley_geom::Pose;
use galley_math::Vec3;
use galley_scene::geometry::GeomShape;
use galley_scene::{Catalog, CatalogError, Fixture, FixtureError, FixtureKind, GeometryDescription};

/// Handle joint range of [`sink`].
pub const SINK_HANDLE_RANGE: (f32, f32) = (0.0, FRAC_PI_2);
/// Water site `size` of [`sink`]: radius then reach.
pub const SINK_WATER_SITE_SIZE: [f32; 2] = [0.02, 0.3];
/// Spout geom offset of [`sink`] in the sink frame.
pub const SINK_SPOUT: Vec3 = Vec3::new(0.0, 0.1, 0.35);
/// Bottom geom offset of [`sink`] in the sink frame.
pub const SINK_BOTTOM: Vec3 = Vec3::new(0.0, 0.0, -0.1);

fn prefix(name: &str) -> String {
    format!("{name}_")
}

/// Double-basin sink with handle, spout and temperature joints.
pub fn sink(name: &str, pose: Pose) -> Result<Fixture, FixtureError> {
    let geom = GeometryDescription::new(prefix(name))
        .with_bbox(Vec3::ZERO, Vec3::new(0.45, 0.3, 0.15))
        .with_region("basin", Vec3::ZERO, Vec3::new(0.4, 0.2, 0.1))
        .with_region("basin_left", Vec3::new(-0.2, 0.0, 0.0), Vec3::new(0.15, 0.2, 0.1))
        .with_region("basin_right", Vec3::new(0.2, 0.0, 0.0), Vec3::new(0.15, 0.2, 0.1))
        .with_joint("handle_joint", Some(SINK_HANDLE_RANGE))
        .with_joint("spout_joint", Some((-PI, PI)))
        .with_joint("handle_temp_joint", Some((-1.0, 1.0)))
        .with_site("water", SINK_SPOUT.with_z(0.3), &SINK_WATER_SITE_SIZE)
        .with_geom(
            "spout_main",
            GeomShape::Cylinder,
            SINK_SPOUT,
            Vec3::new(0.01, 0.01, 0.05),
            Some("spout"),
        )
        .with_geom(
            "bottom",
            GeomShape::Box,
            SINK_BOTTOM,
            Vec3::new(0.4, 0.2, 0.005),
            None,
        );
    Fixture::new(name, FixtureKind::Sink, pose, geom)
}

/// Toaster oven with a rack (or, when `rack` is false, a tray) variant.
pub fn toaster_oven(name: &str, pose: Pose, rack: bool) -> Result<Fixture, FixtureError> {
    let shelf = if rack { "rack0" } else { "tray0" };
    let geom = GeometryDescription::new(prefix(name))
        .with_bbox(Vec3::ZERO, Vec3::new(0.2, 0.15, 0.12))
        .with_region(shelf, Vec3::new(0.0, 0.0, -0.05), Vec3::new(0.15, 0.12, 0.03))
        .with_joint("door_joint", Some((0.0, FRAC_PI_2)))
        .with_joint("knob_doneness_joint", Some((0.0, 1.0)))
        .with_joint("knob_function_joint", Some((0.0, 1.0)))
        .with_joint("knob_temp_joint", Some((0.0, 1.0)))
        .with_joint("knob_time_joint", Some((0.0, 1.0)))
        .with_joint(&format!("{shelf}_joint"), Some((0.0, 0.2)))
        .with_geom(
            &format!("{shelf}_g"),
            GeomShape::Box,
            Vec3::new(0.0, 0.0, -0.07),
            Vec3::new(0.15, 0.12, 0.005),
            Some(shelf),
        );
    Fixture::new(name, FixtureKind::ToasterOven, pose, geom)
}

/// Wall oven with one door and two racks.
pub fn oven(name: &str, pose: Pose) -> Result<Fixture, FixtureError> {
    let geom = GeometryDescription::new(prefix(name))
        .with_bbox(Vec3::ZERO, Vec3::new(0.3, 0.3, 0.3))
        .with_region("rack_bottom", Vec3::new(0.0, 0.0, -0.1), Vec3::new(0.25, 0.25, 0.05))
        .with_region("rack_top", Vec3::new(0.0, 0.0, 0.1), Vec3::new(0.25, 0.25, 0.05))
        .with_joint("door_joint", Some((0.0, FRAC_PI_2)))
        .with_geom(
            "door_g",
            GeomShape::Box,
            Vec3::new(0.0, -0.3, 0.0),
            Vec3::new(0.3, 0.01, 0.3),
            Some("door"),
        );
    Fixture::new(name, FixtureKind::Oven, pose, geom)
}

/// Counter whose `top` region has the given half-extents.
pub fn counter(name: &str, pose: Pose, top_half_extents: Vec3) -> Result<Fixture, FixtureError> {
    let geom = GeometryDescription::new(prefix(name))
        .with_bbox(Vec3::ZERO, top_half_extents)
        .with_region("top", Vec3::ZERO, top_half_extents)
        .with_geom("top_g", GeomShape::Box, Vec3::ZERO, top_half_extents, None);
    Fixture::new(name, FixtureKind::Counter, pose, geom)
}

/// Catalog used across the test suite.
///
/// - `apple`: ten objaverse assets (train/test split 6/4), washable fruit.
/// - `bowl`: two lightwheel assets with an `int` region, a receptacle.
/// - `knife`: one objaverse asset, not washable.
/// - `pot`: one oversized asset for size-bound tests.
/// - `mystery`: no bounding box declared.
pub const DEMO_CATALOG_YAML: &str = r"
groups:
  receptacle: [bowl, pot]
  utensil: [knife]
categories:
  apple:
    types: [fruit, food]
    graspable: true
    washable: true
    cookable: true
    registries:
      objaverse:
        scale: 1.0
        assets:
          - { path: objaverse/apple/apple_0/model.xml, half_size: [0.04, 0.04, 0.04] }
          - { path: objaverse/apple/apple_1/model.xml, half_size: [0.04, 0.04, 0.04] }
          - { path: objaverse/apple/apple_2/model.xml, half_size: [0.04, 0.04, 0.04] }
          - { path: objaverse/apple/apple_3/model.xml, half_size: [0.04, 0.04, 0.04] }
          - { path: objaverse/apple/apple_4/model.xml, half_size: [0.04, 0.04, 0.04] }
          - { path: objaverse/apple/apple_5/model.xml, half_size: [0.04, 0.04, 0.04] }
          - { path: objaverse/apple/apple_6/model.xml, half_size: [0.04, 0.04, 0.04] }
          - { path: objaverse/apple/apple_7/model.xml, half_size: [0.04, 0.04, 0.04] }
          - { path: objaverse/apple/apple_8/model.xml, half_size: [0.04, 0.04, 0.04] }
          - { path: objaverse/apple/apple_9/model.xml, half_size: [0.04, 0.04, 0.04] }
  bowl:
    types: [tableware]
    graspable: true
    washable: true
    dishwashable: true
    registries:
      lightwheel:
        scale: [1.0, 1.0, 0.8]
        material: { density: 300.0 }
        assets:
          - path: lightwheel/bowl/bowl_0/model.xml
            half_size: [0.08, 0.08, 0.04]
            regions:
              int: { center: [0.0, 0.0, 0.0], half_extents: [0.07, 0.07, 0.035] }
          - path: lightwheel/bowl/bowl_1/model.xml
            half_size: [0.09, 0.09, 0.05]
            regions:
              int: { center: [0.0, 0.0, 0.0], half_extents: [0.08, 0.08, 0.045] }
  knife:
    types: [utensil_blade]
    graspable: true
    registries:
      objaverse:
        assets:
          - { path: objaverse/knife/knife_0/model.xml, half_size: [0.12, 0.015, 0.01] }
  pot:
    types: [cookware]
    graspable: true
    washable: true
    registries:
      objaverse:
        scale: 1.5
        assets:
          - { path: objaverse/pot/pot_0/model.xml, half_size: [0.2, 0.2, 0.1] }
  mystery:
    registries:
      objaverse:
        assets:
          - { path: objaverse/mystery/mystery_0/model.xml }
";

/// Parses [`DEMO_CATALOG_YAML`].
pub fn demo_catalog() -> Result<Catalog, CatalogError> {
    Catalog::from_yaml_str(DEMO_CATALOG_YAML)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn fixtures_build() {
        let s = sink("sink", Pose::identity()).unwrap();
        assert!(s.regions().contains("basin_left"));
        assert_eq!(s.prefixed("water"), "sink_water");
        let t = toaster_oven("toaster", Pose::identity(), false).unwrap();
        assert!(t.geometry().joint("toaster_tray0_joint").is_some());
        let o = oven("oven", Pose::identity()).unwrap();
        assert_eq!(o.door_joints(), vec!["oven_door_joint"]);
        assert!(counter("counter", Pose::identity(), Vec3::new(0.5, 0.3, 0.02)).is_ok());
    }

    #[test]
    fn demo_catalog_parses() {
        let c = demo_catalog().unwrap();
        assert_eq!(c.group("receptacle").unwrap(), ["bowl".to_string(), "pot".to_string()]);
        assert!(c.group("fruit").unwrap().contains(&"apple".to_string()));
        assert_eq!(c.group("all").unwrap().len(), 5);
    }
}
