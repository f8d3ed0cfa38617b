// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for region-constrained placement.

use galley_dry_tests::fixtures::{counter, sink};
use galley_geom::{bbox_corners, point_in_box, Pose, Tolerance};
use galley_math::{Prng, Vec3};
use galley_scene::{
    AxisSpec, FixtureRegistry, Placement, PlacementError, PlacementRequest, Placer, Region,
    ReferenceSpec, RegionSet, RotationSpec, SamplerPolicy,
};
use proptest::prelude::*;

const TOP: Vec3 = Vec3::new(0.5, 0.3, 0.02);

fn kitchen(counter_pose: Pose) -> FixtureRegistry {
    let mut reg = FixtureRegistry::new();
    reg.register(counter("counter", counter_pose, TOP).unwrap())
        .unwrap();
    reg
}

fn place(
    placer: &mut Placer,
    name: &str,
    half: Vec3,
    request: &PlacementRequest,
    rng: &mut Prng,
) -> Result<Placement, PlacementError> {
    placer.place(name, half, RegionSet::new(name), request, rng)
}

fn assert_close(a: f32, b: f32) {
    assert!((a - b).abs() < 1e-5, "expected {b}, got {a}");
}

#[test]
fn footprint_that_fits_is_placed_inside_the_region() {
    let reg = {
        let mut r = FixtureRegistry::new();
        r.register(counter("counter", Pose::identity(), Vec3::new(0.25, 0.25, 0.02)).unwrap())
            .unwrap();
        r
    };
    let mut placer = Placer::new(&reg, SamplerPolicy::default()).unwrap();
    let mut rng = Prng::from_seed_u64(7);
    let p = place(
        &mut placer,
        "box",
        Vec3::new(0.1, 0.1, 0.05),
        &PlacementRequest::in_region("counter", "top"),
        &mut rng,
    )
    .unwrap();
    assert_eq!(p.attempts, 1);
    assert_eq!(p.region, "top");
    let aabb = p.bounds().unwrap().aabb();
    assert!(aabb.min().x() >= -0.25 - 1e-5 && aabb.max().x() <= 0.25 + 1e-5);
    assert!(aabb.min().y() >= -0.25 - 1e-5 && aabb.max().y() <= 0.25 + 1e-5);
}

#[test]
fn oversized_footprint_is_infeasible_without_drawing() {
    let reg = {
        let mut r = FixtureRegistry::new();
        r.register(counter("counter", Pose::identity(), Vec3::new(0.25, 0.25, 0.02)).unwrap())
            .unwrap();
        r
    };
    let mut placer = Placer::new(&reg, SamplerPolicy::default()).unwrap();
    let mut rng = Prng::from_seed_u64(7);
    let before = rng;
    let err = place(
        &mut placer,
        "slab",
        Vec3::new(0.3, 0.3, 0.05),
        &PlacementRequest::in_region("counter", "top"),
        &mut rng,
    )
    .unwrap_err();
    assert!(matches!(err, PlacementError::Infeasible { .. }));
    assert!(err.is_recoverable());
    assert_eq!(rng, before);
    assert!(placer.placed().is_empty());
}

#[test]
fn center_only_constraint_admits_oversized_objects() {
    let reg = {
        let mut r = FixtureRegistry::new();
        r.register(counter("counter", Pose::identity(), Vec3::new(0.25, 0.25, 0.02)).unwrap())
            .unwrap();
        r
    };
    let mut placer = Placer::new(&reg, SamplerPolicy::default()).unwrap();
    let mut rng = Prng::from_seed_u64(3);
    let request = PlacementRequest {
        ensure_object_boundary_in_range: false,
        ..PlacementRequest::in_region("counter", "top")
    };
    let p = place(&mut placer, "slab", Vec3::new(0.3, 0.3, 0.05), &request, &mut rng).unwrap();
    let c = p.pose.position();
    assert!(c.x().abs() <= 0.25 && c.y().abs() <= 0.25);
}

#[test]
fn fixed_axes_hit_the_usable_edges_at_floor_height() {
    let reg = kitchen(Pose::new(Vec3::new(1.0, 2.0, 0.9), galley_math::Quat::identity()));
    let mut placer = Placer::new(&reg, SamplerPolicy::default()).unwrap();
    let mut rng = Prng::from_seed_u64(1);
    let request = PlacementRequest {
        position: [AxisSpec::Fixed(1.0), AxisSpec::Fixed(-1.0)],
        rotation: RotationSpec::Fixed(0.0),
        margin: 0.05,
        z_offset: 0.01,
        ..PlacementRequest::in_region("counter", "top")
    };
    let before = rng;
    let p = place(&mut placer, "cup", Vec3::new(0.1, 0.05, 0.05), &request, &mut rng).unwrap();
    let c = p.pose.position();
    assert_close(c.x(), 1.0 + 0.5 - 0.1 - 0.05);
    assert_close(c.y(), 2.0 - (0.3 - 0.05 - 0.05));
    assert_close(c.z(), 0.9 - 0.02 + 0.05 + 0.01);
    assert_eq!(rng, before);
}

#[test]
fn placements_follow_a_rotated_container() {
    let yaw = std::f32::consts::FRAC_PI_2;
    let counter_pose = Pose::from_yaw(Vec3::new(2.0, 0.0, 0.9), yaw);
    let reg = kitchen(counter_pose);
    let mut placer = Placer::new(&reg, SamplerPolicy::default()).unwrap();
    let mut rng = Prng::from_seed_u64(11);
    let request = PlacementRequest {
        position: [AxisSpec::Fixed(1.0), AxisSpec::Fixed(0.0)],
        rotation: RotationSpec::Fixed(0.0),
        ..PlacementRequest::in_region("counter", "top")
    };
    let p = place(&mut placer, "cup", Vec3::new(0.05, 0.05, 0.05), &request, &mut rng).unwrap();
    let c = p.pose.position();
    // Local +x of the counter points along world +y.
    assert_close(c.x(), 2.0);
    assert_close(c.y(), 0.45);
}

#[test]
fn same_seed_same_layout() {
    let reg = kitchen(Pose::identity());
    let layout = |seed: u64| {
        let mut placer = Placer::new(&reg, SamplerPolicy::default()).unwrap();
        let mut rng = Prng::from_seed_u64(seed);
        let request = PlacementRequest::in_region("counter", "top");
        for name in ["a", "b", "c"] {
            place(&mut placer, name, Vec3::new(0.05, 0.04, 0.05), &request, &mut rng).unwrap();
        }
        (placer.placed().to_vec(), rng)
    };
    assert_eq!(layout(42), layout(42));
    assert_ne!(layout(42).0, layout(43).0);
}

#[test]
fn duplicate_names_are_rejected() {
    let reg = kitchen(Pose::identity());
    let mut placer = Placer::new(&reg, SamplerPolicy::default()).unwrap();
    let mut rng = Prng::from_seed_u64(5);
    let request = PlacementRequest::in_region("counter", "top");
    place(&mut placer, "a", Vec3::new(0.05, 0.05, 0.05), &request, &mut rng).unwrap();
    let err = place(&mut placer, "a", Vec3::new(0.05, 0.05, 0.05), &request, &mut rng).unwrap_err();
    assert_eq!(err, PlacementError::Duplicate("a".into()));
    assert!(!err.is_recoverable());
}

#[test]
fn unknown_container_and_region_are_fatal() {
    let reg = kitchen(Pose::identity());
    let mut placer = Placer::new(&reg, SamplerPolicy::default()).unwrap();
    let mut rng = Prng::from_seed_u64(5);
    let half = Vec3::new(0.05, 0.05, 0.05);
    let err = place(&mut placer, "a", half, &PlacementRequest::on("shelf"), &mut rng).unwrap_err();
    assert_eq!(err, PlacementError::UnknownContainer("shelf".into()));
    let err = place(
        &mut placer,
        "a",
        half,
        &PlacementRequest::in_region("counter", "drawer"),
        &mut rng,
    )
    .unwrap_err();
    assert!(matches!(err, PlacementError::Region(_)));
    assert!(!err.is_recoverable());
}

#[test]
fn reference_offset_positions_relative_to_a_placed_object() {
    let reg = kitchen(Pose::identity());
    let mut placer = Placer::new(&reg, SamplerPolicy::default()).unwrap();
    let mut rng = Prng::from_seed_u64(9);
    let fixed = PlacementRequest {
        position: [AxisSpec::Fixed(0.0), AxisSpec::Fixed(0.0)],
        rotation: RotationSpec::Fixed(0.0),
        ..PlacementRequest::in_region("counter", "top")
    };
    place(&mut placer, "plate", Vec3::new(0.05, 0.05, 0.01), &fixed, &mut rng).unwrap();
    let request = PlacementRequest {
        reference: Some(ReferenceSpec {
            entity: "plate".into(),
            near: None,
        }),
        position: [
            AxisSpec::Reference { offset: 0.15 },
            AxisSpec::Reference { offset: 0.0 },
        ],
        rotation: RotationSpec::Fixed(0.0),
        ..PlacementRequest::in_region("counter", "top")
    };
    let p = place(&mut placer, "cup", Vec3::new(0.04, 0.04, 0.05), &request, &mut rng).unwrap();
    assert_close(p.pose.position().x(), 0.15);
    assert_close(p.pose.position().y(), 0.0);
}

#[test]
fn near_restricts_to_a_window_around_a_fixture() {
    let mut reg = kitchen(Pose::identity());
    reg.register(
        counter(
            "marker",
            Pose::new(Vec3::new(0.3, 0.1, 0.0), galley_math::Quat::identity()),
            Vec3::new(0.01, 0.01, 0.01),
        )
        .unwrap(),
    )
    .unwrap();
    for seed in 0..20 {
        let mut placer = Placer::new(&reg, SamplerPolicy::default()).unwrap();
        let mut rng = Prng::from_seed_u64(seed);
        let request = PlacementRequest {
            reference: Some(ReferenceSpec {
                entity: "marker".into(),
                near: Some([0.1, 0.1]),
            }),
            ..PlacementRequest::in_region("counter", "top")
        };
        let p = place(&mut placer, "cup", Vec3::new(0.04, 0.04, 0.05), &request, &mut rng).unwrap();
        let c = p.pose.position();
        assert!((c.x() - 0.3).abs() <= 0.06 + 1e-5, "x = {}", c.x());
        assert!((c.y() - 0.1).abs() <= 0.06 + 1e-5, "y = {}", c.y());
    }
}

#[test]
fn objects_can_be_placed_inside_placed_objects() {
    let reg = kitchen(Pose::identity());
    let mut placer = Placer::new(&reg, SamplerPolicy::default()).unwrap();
    let mut rng = Prng::from_seed_u64(21);
    let mut bowl_regions = RegionSet::new("bowl");
    bowl_regions.insert(
        Region::new("bowl", "int", Vec3::ZERO, Vec3::new(0.07, 0.07, 0.03)).unwrap(),
    );
    let bowl = placer
        .place(
            "bowl",
            Vec3::new(0.08, 0.08, 0.04),
            bowl_regions,
            &PlacementRequest::in_region("counter", "top"),
            &mut rng,
        )
        .unwrap();
    let apple = place(
        &mut placer,
        "apple",
        Vec3::new(0.03, 0.03, 0.03),
        &PlacementRequest::in_region("bowl", "int"),
        &mut rng,
    )
    .unwrap();
    assert_eq!(apple.container, "bowl");
    let offset = apple.pose.position().planar_distance(&bowl.pose.position());
    assert!(offset <= 0.07 * std::f32::consts::SQRT_2);
    assert_close(apple.pose.position().z(), bowl.pose.position().z() - 0.03 + 0.03);
}

#[test]
fn crowded_region_exhausts_the_attempt_budget() {
    let reg = {
        let mut r = FixtureRegistry::new();
        r.register(counter("counter", Pose::identity(), Vec3::new(0.12, 0.12, 0.02)).unwrap())
            .unwrap();
        r
    };
    let policy = SamplerPolicy {
        placement_attempts: 5,
        ..SamplerPolicy::default()
    };
    let mut placer = Placer::new(&reg, policy).unwrap();
    let mut rng = Prng::from_seed_u64(2);
    let request = PlacementRequest::in_region("counter", "top");
    let half = Vec3::new(0.05, 0.05, 0.05);
    place(&mut placer, "a", half, &request, &mut rng).unwrap();
    // Pinned to the center, a second box always overlaps the first.
    let tight = PlacementRequest {
        position: [AxisSpec::Fixed(0.0), AxisSpec::Fixed(0.0)],
        ..request
    };
    let err = place(&mut placer, "b", half, &tight, &mut rng).unwrap_err();
    assert_eq!(
        err,
        PlacementError::Exhausted {
            object: "b".into(),
            attempts: 5,
        }
    );
}

#[test]
fn reset_regions_of_a_sink_are_used_when_no_region_is_named() {
    let mut reg = FixtureRegistry::new();
    reg.register(sink("sink", Pose::identity()).unwrap()).unwrap();
    let mut seen = std::collections::BTreeSet::new();
    for seed in 0..40 {
        let mut placer = Placer::new(&reg, SamplerPolicy::default()).unwrap();
        let mut rng = Prng::from_seed_u64(seed);
        let p = place(
            &mut placer,
            "sponge",
            Vec3::new(0.03, 0.03, 0.02),
            &PlacementRequest::on("sink"),
            &mut rng,
        )
        .unwrap();
        seen.insert(p.region);
    }
    assert!(seen.len() >= 2);
    assert!(seen.iter().all(|r| ["basin", "basin_left", "basin_right"].contains(&r.as_str())));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn placed_corners_stay_inside_the_region(
        seed in any::<u64>(),
        yaw in -3.2f32..3.2,
        hx in 0.01f32..0.2,
        hy in 0.01f32..0.2,
        margin in 0.0f32..0.05,
    ) {
        let counter_pose = Pose::from_yaw(Vec3::new(0.4, -1.0, 0.9), yaw);
        let reg = kitchen(counter_pose);
        let mut placer = Placer::new(&reg, SamplerPolicy::default()).unwrap();
        let mut rng = Prng::from_seed_u64(seed);
        let half = Vec3::new(hx, hy, 0.04);
        let request = PlacementRequest {
            margin,
            ..PlacementRequest::in_region("counter", "top")
        };
        let Ok(p) = place(&mut placer, "obj", half, &request, &mut rng) else {
            // Long thin boxes can miss every yaw draw; those are reported, not misplaced.
            return Ok(());
        };
        let region = reg.get("counter").unwrap().region_bounds_world("top").unwrap();
        let tol = Tolerance::uniform(1e-4).planar();
        for c in bbox_corners(&p.pose, &half) {
            prop_assert!(point_in_box(&c, &region, &tol));
        }
    }

    #[test]
    fn placed_objects_never_overlap(seed in any::<u64>()) {
        let reg = kitchen(Pose::identity());
        let mut placer = Placer::new(&reg, SamplerPolicy::default()).unwrap();
        let mut rng = Prng::from_seed_u64(seed);
        let request = PlacementRequest::in_region("counter", "top");
        for name in ["a", "b", "c", "d"] {
            // Exhaustion is a legal outcome; overlap never is.
            let _ = place(&mut placer, name, Vec3::new(0.05, 0.05, 0.05), &request, &mut rng);
        }
        let boxes: Vec<_> = placer
            .placed()
            .iter()
            .map(|p| p.bounds().unwrap().aabb())
            .collect();
        for (i, a) in boxes.iter().enumerate() {
            for b in &boxes[i + 1..] {
                prop_assert!(!a.overlaps(b));
            }
        }
    }
}
