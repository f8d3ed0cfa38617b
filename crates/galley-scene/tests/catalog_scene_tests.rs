// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Catalog sampling and whole-scene generation.

use galley_dry_tests::fixtures::{counter, demo_catalog, sink};
use galley_geom::Pose;
use galley_math::{Prng, Quat, Vec3};
use galley_scene::catalog::AssetEntry;
use galley_scene::{
    CapabilityFlags, Catalog, CatalogError, ConfigError, FixtureRegistry, GroupSelection,
    ObjectSpec, PlacementError, PlacementRequest, SampleQuery, SamplerPolicy, Scale, SceneError,
    SceneGenerator, SceneObject, Split,
};

fn washable_graspable() -> CapabilityFlags {
    CapabilityFlags {
        graspable: true,
        washable: true,
        ..CapabilityFlags::default()
    }
}

fn asset_index(path: &str) -> usize {
    // objaverse/apple/apple_<n>/model.xml
    path.split('/').nth(2).unwrap()["apple_".len()..].parse().unwrap()
}

#[test]
fn implicit_groups_cover_categories_and_types() {
    let c = demo_catalog().unwrap();
    assert_eq!(c.group("apple").unwrap(), ["apple".to_string()]);
    assert_eq!(c.group("fruit").unwrap(), ["apple".to_string()]);
    assert_eq!(
        c.groups_containing("apple"),
        vec!["all", "apple", "food", "fruit"]
    );
    assert!(matches!(c.group("tools"), Err(CatalogError::UnknownGroup(_))));
}

#[test]
fn groups_must_name_known_categories() {
    let yaml = "groups: { sweets: [cake] }\ncategories: {}\n";
    assert!(matches!(
        Catalog::from_yaml_str(yaml),
        Err(CatalogError::UnknownCategory { .. })
    ));
}

#[test]
fn capability_filter_checks_every_enabled_registry() {
    let c = demo_catalog().unwrap();
    let query = SampleQuery {
        require: washable_graspable(),
        registries: vec!["objaverse".into()],
        ..SampleQuery::default()
    };
    assert_eq!(c.eligible_categories(&query).unwrap(), vec!["apple", "pot"]);

    let query = SampleQuery {
        exclude_groups: vec!["receptacle".into()],
        require: CapabilityFlags {
            graspable: true,
            ..CapabilityFlags::default()
        },
        ..SampleQuery::default()
    };
    assert_eq!(c.eligible_categories(&query).unwrap(), vec!["apple", "knife"]);
}

#[test]
fn no_eligible_category_is_an_error() {
    let c = demo_catalog().unwrap();
    let query = SampleQuery {
        require: CapabilityFlags {
            freezable: true,
            ..CapabilityFlags::default()
        },
        ..SampleQuery::default()
    };
    let mut rng = Prng::from_seed_u64(1);
    assert!(matches!(
        c.sample(&query, &mut rng, 10),
        Err(CatalogError::NoEligibleCategory(_))
    ));
}

#[test]
fn split_partitions_ten_assets_six_to_four() {
    let c = demo_catalog().unwrap();
    let mut train = std::collections::BTreeSet::new();
    let mut test = std::collections::BTreeSet::new();
    for seed in 0..200 {
        let mut rng = Prng::from_seed_u64(seed);
        let q = SampleQuery {
            split: Some(Split::Train),
            ..SampleQuery::groups(["apple"])
        };
        train.insert(asset_index(&c.sample(&q, &mut rng, 1).unwrap().asset_path));
        let q = SampleQuery {
            split: Some(Split::Test),
            ..SampleQuery::groups(["apple"])
        };
        let inst = c.sample(&q, &mut rng, 1).unwrap();
        assert_eq!(inst.split, Some(Split::Test));
        test.insert(asset_index(&inst.asset_path));
    }
    assert_eq!(train.into_iter().collect::<Vec<_>>(), (0..6).collect::<Vec<_>>());
    assert_eq!(test.into_iter().collect::<Vec<_>>(), (6..10).collect::<Vec<_>>());
}

#[test]
fn scale_and_material_follow_the_registry() {
    let c = demo_catalog().unwrap();
    let mut rng = Prng::from_seed_u64(3);
    let bowl = c.sample(&SampleQuery::groups(["bowl"]), &mut rng, 1).unwrap();
    assert_eq!(bowl.registry, "lightwheel");
    assert_eq!(bowl.scale, Scale::PerAxis([1.0, 1.0, 0.8]));
    assert_eq!(bowl.material.density, 300.0);
    assert_eq!(bowl.material.friction, [0.95, 0.3, 0.1]);
    let obj = SceneObject::from_instance("bowl", bowl).unwrap();
    let int = obj.regions().unwrap();
    let he = int.get("int").unwrap().half_extents();
    assert!((he.z() - obj.instance.as_ref().unwrap().regions["int"].half_extents[2] * 0.8).abs() < 1e-6);

    let knife = c
        .sample(
            &SampleQuery {
                object_scale: Some(2.0),
                ..SampleQuery::groups(["knife"])
            },
            &mut rng,
            1,
        )
        .unwrap();
    assert_eq!(knife.scale, Scale::Uniform(2.0));
    let he = knife.scaled_half_extents().unwrap();
    assert!((he.x() - 0.24).abs() < 1e-6);
}

#[test]
fn upright_variant_and_explicit_assets() {
    let c = demo_catalog().unwrap();
    let mut rng = Prng::from_seed_u64(5);
    let knife = c
        .sample(
            &SampleQuery {
                rotate_upright: true,
                ..SampleQuery::groups(["knife"])
            },
            &mut rng,
            1,
        )
        .unwrap();
    assert_eq!(knife.asset_path, "objaverse/knife/knife_0/model_upright.xml");

    let before = rng;
    let explicit = c
        .sample(
            &SampleQuery {
                select: GroupSelection::Asset("objaverse/knife/knife_0/model_upright.xml".into()),
                ..SampleQuery::default()
            },
            &mut rng,
            1,
        )
        .unwrap();
    assert_eq!(explicit.category, "knife");
    assert_eq!(explicit.asset_path, "objaverse/knife/knife_0/model_upright.xml");
    assert_eq!(rng, before);

    let missing = c.sample(
        &SampleQuery {
            select: GroupSelection::Asset("objaverse/spoon/spoon_0/model.xml".into()),
            ..SampleQuery::default()
        },
        &mut rng,
        1,
    );
    assert!(matches!(missing, Err(CatalogError::UnknownAsset(_))));
}

#[test]
fn size_bound_redraws_then_gives_up() {
    let c = demo_catalog().unwrap();
    let mut rng = Prng::from_seed_u64(6);
    let small = SampleQuery {
        max_size: [Some(0.5), None, None],
        ..SampleQuery::groups(["receptacle"])
    };
    for _ in 0..20 {
        assert_eq!(c.sample(&small, &mut rng, 100).unwrap().category, "bowl");
    }
    let pot = SampleQuery {
        max_size: [Some(0.5), None, None],
        ..SampleQuery::groups(["pot"])
    };
    assert!(matches!(
        c.sample(&pot, &mut rng, 5),
        Err(CatalogError::SizeBoundExhausted { attempts: 5 })
    ));
    let mystery = SampleQuery {
        max_size: [Some(0.5), None, None],
        ..SampleQuery::groups(["mystery"])
    };
    assert!(matches!(
        c.sample(&mystery, &mut rng, 5),
        Err(CatalogError::MissingBoundingBox(_))
    ));
}

#[test]
fn objects_without_bounding_boxes_cannot_enter_a_scene() {
    let c = demo_catalog().unwrap();
    let mut rng = Prng::from_seed_u64(1);
    let inst = c.sample(&SampleQuery::groups(["mystery"]), &mut rng, 1).unwrap();
    assert!(matches!(
        SceneObject::from_instance("thing", inst),
        Err(CatalogError::MissingBoundingBox(_))
    ));
}

#[test]
fn asset_entries_read_regions_from_mjcf() {
    let xml = r#"
        <mujoco>
          <worldbody>
            <body name="object" pos="0 0 0">
              <geom name="reg_bbox" type="box" pos="0 0 0" size="0.08 0.08 0.04"/>
              <geom name="reg_int" type="box" pos="0 0 0.01" size="0.07 0.07 0.03"/>
              <geom name="visual" type="mesh"/>
            </body>
          </worldbody>
        </mujoco>"#;
    let entry = AssetEntry::from_mjcf("lightwheel/bowl/bowl_9/model.xml", xml).unwrap();
    assert_eq!(entry.half_size, Some([0.08, 0.08, 0.04]));
    assert_eq!(entry.regions.len(), 1);
    assert_eq!(entry.regions["int"].center, [0.0, 0.0, 0.01]);
}

fn kitchen() -> FixtureRegistry {
    let mut reg = FixtureRegistry::new();
    reg.register(counter("counter", Pose::identity(), Vec3::new(0.6, 0.4, 0.02)).unwrap())
        .unwrap();
    reg.register(
        sink("sink", Pose::new(Vec3::new(1.5, 0.0, 0.0), Quat::identity())).unwrap(),
    )
    .unwrap();
    reg
}

fn breakfast() -> Vec<ObjectSpec> {
    vec![
        ObjectSpec {
            name: "bowl".into(),
            query: SampleQuery::groups(["bowl"]),
            placement: PlacementRequest::in_region("counter", "top"),
        },
        ObjectSpec {
            name: "apple".into(),
            query: SampleQuery::groups(["fruit"]),
            placement: PlacementRequest::in_region("bowl", "int"),
        },
        ObjectSpec {
            name: "knife".into(),
            query: SampleQuery::groups(["utensil"]),
            placement: PlacementRequest {
                upright: true,
                ..PlacementRequest::in_region("counter", "top")
            },
        },
        ObjectSpec {
            name: "sponge_stand_in".into(),
            query: SampleQuery::groups(["apple"]),
            placement: PlacementRequest::on("sink"),
        },
    ]
}

#[test]
fn scene_places_every_object_in_order() {
    let catalog = demo_catalog().unwrap();
    let fixtures = kitchen();
    let generator = SceneGenerator::new(&catalog, &fixtures, SamplerPolicy::default());
    let mut rng = Prng::from_seed_u64(2024);
    let scene = generator.generate(&breakfast(), &mut rng).unwrap();
    let names: Vec<_> = scene.objects.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["bowl", "apple", "knife", "sponge_stand_in"]);
    let apple = scene.object("apple").unwrap();
    assert_eq!(apple.placement.as_ref().unwrap().container, "bowl");
    assert_eq!(apple.instance.as_ref().unwrap().category, "apple");
    let knife = scene.object("knife").unwrap().placement.as_ref().unwrap();
    let yaw = knife.pose.rotation().to_euler().yaw;
    assert!(yaw.abs() <= SamplerPolicy::default().upright_band + 1e-5);
    let sponge = scene.object("sponge_stand_in").unwrap().placement.as_ref().unwrap();
    assert_eq!(sponge.container, "sink");
}

#[test]
fn scene_generation_is_deterministic() {
    let catalog = demo_catalog().unwrap();
    let fixtures = kitchen();
    let generator = SceneGenerator::new(&catalog, &fixtures, SamplerPolicy::default());
    let run = |seed| {
        let mut rng = Prng::from_seed_u64(seed);
        generator.generate(&breakfast(), &mut rng).unwrap()
    };
    assert_eq!(run(77), run(77));
}

#[test]
fn infeasible_scenes_exhaust_the_scene_budget() {
    let catalog = demo_catalog().unwrap();
    let mut fixtures = FixtureRegistry::new();
    fixtures
        .register(counter("counter", Pose::identity(), Vec3::new(0.25, 0.25, 0.02)).unwrap())
        .unwrap();
    let policy = SamplerPolicy {
        scene_attempts: 3,
        ..SamplerPolicy::default()
    };
    let specs = [ObjectSpec {
        name: "pot".into(),
        query: SampleQuery::groups(["pot"]),
        placement: PlacementRequest::in_region("counter", "top"),
    }];
    let mut rng = Prng::from_seed_u64(1);
    let err = SceneGenerator::new(&catalog, &fixtures, policy)
        .generate(&specs, &mut rng)
        .unwrap_err();
    let SceneError::SceneAttemptsExhausted { attempts, last } = err else {
        panic!("expected exhaustion, got {err:?}");
    };
    assert_eq!(attempts, 3);
    assert!(matches!(
        last.as_deref(),
        Some(SceneError::Placement(PlacementError::Infeasible { .. }))
    ));
}

#[test]
fn recoverable_failures_restart_the_scene() {
    let catalog = demo_catalog().unwrap();
    let mut fixtures = FixtureRegistry::new();
    fixtures
        .register(counter("counter", Pose::identity(), Vec3::new(0.25, 0.25, 0.02)).unwrap())
        .unwrap();
    let policy = SamplerPolicy {
        scene_attempts: 30,
        ..SamplerPolicy::default()
    };
    // The pot never fits; the bowl always does.
    let specs = [ObjectSpec {
        name: "dish".into(),
        query: SampleQuery::groups(["receptacle"]),
        placement: PlacementRequest::in_region("counter", "top"),
    }];
    let generator = SceneGenerator::new(&catalog, &fixtures, policy);
    let mut retried = false;
    for seed in 0..20 {
        let mut rng = Prng::from_seed_u64(seed);
        let scene = generator.generate(&specs, &mut rng).unwrap();
        assert_eq!(scene.objects[0].instance.as_ref().unwrap().category, "bowl");
        retried |= scene.attempts > 1;
    }
    assert!(retried);
}

#[test]
fn fatal_errors_abort_immediately() {
    let catalog = demo_catalog().unwrap();
    let fixtures = kitchen();
    let specs = [ObjectSpec {
        name: "x".into(),
        query: SampleQuery::groups(["tools"]),
        placement: PlacementRequest::in_region("counter", "top"),
    }];
    let mut rng = Prng::from_seed_u64(1);
    let err = SceneGenerator::new(&catalog, &fixtures, SamplerPolicy::default())
        .generate(&specs, &mut rng)
        .unwrap_err();
    assert!(matches!(err, SceneError::Catalog(CatalogError::UnknownGroup(_))));

    let bad = SamplerPolicy {
        placement_attempts: 0,
        ..SamplerPolicy::default()
    };
    let err = SceneGenerator::new(&catalog, &fixtures, bad)
        .generate(&specs, &mut rng)
        .unwrap_err();
    assert!(matches!(err, SceneError::Config(ConfigError::Invalid { .. })));
}
