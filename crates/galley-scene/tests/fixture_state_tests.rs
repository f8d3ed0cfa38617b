// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used)]
//! Sink, toaster-oven and oven state machines against the in-memory sim.

use std::f32::consts::FRAC_PI_2;

use galley_dry_tests::fixtures::{oven, sink, toaster_oven, SINK_HANDLE_RANGE};
use galley_dry_tests::FakeSim;
use galley_geom::Pose;
use galley_math::{Prng, Quat, Vec3};
use galley_scene::fixture::{door_openness, BasinLocation, HandleMode, WaterPressure, WaterTemp};
use galley_scene::{
    FixtureError, FixtureModel, Oven, Reading, SceneObject, SimQuery, Sink, ToasterControl,
    ToasterOven,
};

const SINK_AT: Vec3 = Vec3::new(1.0, 0.0, 0.8);

fn sink_scene() -> (Sink, FakeSim, SceneObject) {
    let fixture = sink("sink", Pose::new(SINK_AT, Quat::identity())).unwrap();
    let cup = SceneObject::new("cup", Vec3::new(0.03, 0.03, 0.03));
    let sim = FakeSim::new().with_fixture(&fixture).with_object(&cup);
    (Sink::new(&fixture).unwrap(), sim, cup)
}

fn at(sim: &mut FakeSim, body: &str, x: f32, y: f32, z: f32) {
    sim.set_body_pose(body, Pose::new(Vec3::new(x, y, z), Quat::identity()));
}

#[test]
fn handle_thresholds_bucket_water_pressure() {
    let (sink, mut sim, _) = sink_scene();
    sim.set_joint_value("sink_handle_joint", 0.39).unwrap();
    let s = sink.handle_state(&sim).unwrap();
    assert!(!s.water_on);
    assert_eq!(s.water_pressure, WaterPressure::Zero);

    sim.set_joint_value("sink_handle_joint", 0.41).unwrap();
    let s = sink.handle_state(&sim).unwrap();
    assert!(s.water_on);
    assert_eq!(s.water_pressure, WaterPressure::Low);

    sim.set_joint_value("sink_handle_joint", 0.9 * SINK_HANDLE_RANGE.1)
        .unwrap();
    let s = sink.handle_state(&sim).unwrap();
    assert_eq!(s.water_pressure, WaterPressure::High);
    assert_eq!(sink.water_site_radius(&s), Some(0.02));
}

#[test]
fn water_site_shrinks_at_low_pressure_and_hides_when_off() {
    let (sink, mut sim, _) = sink_scene();
    sim.set_joint_value("sink_handle_joint", 0.45).unwrap();
    let low = sink.handle_state(&sim).unwrap();
    assert!((sink.water_site_radius(&low).unwrap() - 0.015).abs() < 1e-6);
    sim.set_joint_value("sink_handle_joint", 0.0).unwrap();
    let off = sink.handle_state(&sim).unwrap();
    assert_eq!(sink.water_site_radius(&off), None);
}

#[test]
fn set_handle_state_writes_on_band_or_zero() {
    let (sink, mut sim, _) = sink_scene();
    let mut rng = Prng::from_seed_u64(4);
    sink.set_handle_state(&mut sim, &mut rng, HandleMode::On)
        .unwrap();
    let q = sim.joint_value("sink_handle_joint").unwrap();
    assert!((0.40..=0.50).contains(&q));
    sink.set_handle_state(&mut sim, &mut rng, HandleMode::Off)
        .unwrap();
    assert_eq!(sim.joint_value("sink_handle_joint").unwrap(), 0.0);
}

#[test]
fn temperature_is_written_sign_flipped() {
    let (sink, mut sim, _) = sink_scene();
    let mut rng = Prng::from_seed_u64(8);
    let state = sink.set_temp_state(&mut sim, &mut rng, 0.0, 0.3).unwrap();
    let q = sim.joint_value("sink_handle_temp_joint").unwrap();
    // Drawn from [-1, -0.4], then negated.
    assert!((0.4..=1.0).contains(&q));
    assert_eq!(state, WaterTemp::Hot);
    let err = sink.set_temp_state(&mut sim, &mut rng, 0.8, 0.2).unwrap_err();
    assert!(matches!(err, FixtureError::InvalidRange { .. }));
}

#[test]
fn handle_state_normalizes_temperature() {
    let (sink, mut sim, _) = sink_scene();
    sim.set_joint_value("sink_handle_temp_joint", -1.0).unwrap();
    let s = sink.handle_state(&sim).unwrap();
    assert!((s.water_temp - 1.0).abs() < 1e-6);
    assert_eq!(s.water_temp_state, WaterTemp::Hot);
    sim.set_joint_value("sink_handle_temp_joint", 0.5).unwrap();
    assert_eq!(
        sink.handle_state(&sim).unwrap().water_temp_state,
        WaterTemp::Cold
    );
}

#[test]
fn water_stream_contains_the_center_line_only() {
    let (sink, mut sim, cup) = sink_scene();
    // Spout at z 1.15 above the bottom geom at z 0.7; column axis at (1.0, 0.1).
    at(&mut sim, "cup", 1.0, 0.1, 0.925);
    assert!(sink.obj_in_water_stream(&sim, &cup, 0.05, true).unwrap());
    assert!(sink.obj_in_water_stream(&sim, &cup, 0.05, false).unwrap());

    at(&mut sim, "cup", 1.1, 0.1, 0.925);
    assert!(!sink.obj_in_water_stream(&sim, &cup, 0.05, true).unwrap());
    assert!(!sink.obj_in_water_stream(&sim, &cup, 0.05, false).unwrap());

    at(&mut sim, "cup", 1.0, 0.1, 1.3);
    assert!(!sink.obj_in_water_stream(&sim, &cup, 0.05, true).unwrap());
}

#[test]
fn interior_site_overrides_the_bottom_geom() {
    let (sink, mut sim, cup) = sink_scene();
    sim.set_site("sink_int_p0", Vec3::new(1.0, 0.0, 1.0));
    let stream = sink.water_stream(&sim, 0.05).unwrap().unwrap();
    assert!((stream.bottom_z() - 1.0).abs() < 1e-6);
    at(&mut sim, "cup", 1.0, 0.1, 0.925);
    assert!(!sink.obj_in_water_stream(&sim, &cup, 0.05, true).unwrap());
}

#[test]
fn under_water_needs_flow_and_planar_proximity() {
    let (sink, mut sim, cup) = sink_scene();
    // Water site at (1.0, 0.1, 1.1).
    at(&mut sim, "cup", 1.0, 0.1, 0.9);
    assert!(!sink.check_obj_under_water(&sim, &cup, None).unwrap());
    sim.set_joint_value("sink_handle_joint", 0.5).unwrap();
    assert!(sink.check_obj_under_water(&sim, &cup, None).unwrap());
    at(&mut sim, "cup", 1.1, 0.1, 0.9);
    assert!(!sink.check_obj_under_water(&sim, &cup, None).unwrap());
    assert!(sink.check_obj_under_water(&sim, &cup, Some(0.2)).unwrap());
}

#[test]
fn basin_location_uses_the_sink_frame() {
    let (sink, mut sim, cup) = sink_scene();
    at(&mut sim, "cup", 0.8, 0.0, 0.8);
    assert_eq!(sink.obj_basin_loc(&sim, &cup, false).unwrap(), BasinLocation::Left);
    at(&mut sim, "cup", 1.2, 0.05, 0.8);
    assert_eq!(sink.obj_basin_loc(&sim, &cup, true).unwrap(), BasinLocation::Right);
    at(&mut sim, "cup", 1.0, 0.0, 0.8);
    assert_eq!(sink.obj_basin_loc(&sim, &cup, true).unwrap(), BasinLocation::None);
    assert_eq!(sink.obj_basin_loc(&sim, &cup, false).unwrap(), BasinLocation::None);
}

#[test]
fn sink_readings_carry_labels() {
    let (sink, mut sim, _) = sink_scene();
    sim.set_joint_value("sink_handle_joint", 1.5).unwrap();
    let r = sink.readings(&sim).unwrap();
    assert_eq!(r["water_on"], Reading::Flag(true));
    assert_eq!(r["water_pressure"], Reading::Label("high"));
    assert_eq!(sink.fixture_name(), "sink");
}

fn toaster_scene(rack: bool) -> (ToasterOven, FakeSim) {
    let fixture = toaster_oven("toaster", Pose::identity(), rack).unwrap();
    let sim = FakeSim::new().with_fixture(&fixture);
    (ToasterOven::new(&fixture).unwrap(), sim)
}

#[test]
fn timer_decays_with_elapsed_time_and_floors_at_zero() {
    let (mut toaster, mut sim) = toaster_scene(true);
    toaster.set_time(&mut sim, 1.0).unwrap();
    sim.advance(300.0);
    toaster.update_state(&mut sim).unwrap();
    let t = toaster.get_state(&sim)[&ToasterControl::Time];
    assert!((t - 0.9).abs() < 1e-5);
    sim.advance(600.0);
    toaster.update_state(&mut sim).unwrap();
    let t = toaster.get_state(&sim)[&ToasterControl::Time];
    assert!((t - 0.7).abs() < 1e-5);
    sim.advance(6000.0);
    toaster.update_state(&mut sim).unwrap();
    assert_eq!(toaster.get_state(&sim)[&ToasterControl::Time], 0.0);
    assert_eq!(sim.joint_value("toaster_knob_time_joint").unwrap(), 0.0);
}

#[test]
fn unset_timer_does_not_move() {
    let (mut toaster, mut sim) = toaster_scene(true);
    sim.advance(1000.0);
    toaster.update_state(&mut sim).unwrap();
    assert_eq!(toaster.get_state(&sim)[&ToasterControl::Time], 0.0);
}

#[test]
fn controls_are_clamped_to_unit_range() {
    let (mut toaster, mut sim) = toaster_scene(true);
    toaster.set_doneness(&mut sim, 2.0).unwrap();
    toaster.set_temperature(&mut sim, -1.0).unwrap();
    toaster.set_function(&mut sim, 0.25).unwrap();
    let s = toaster.get_state(&sim);
    assert_eq!(s[&ToasterControl::Doneness], 1.0);
    assert_eq!(s[&ToasterControl::Temperature], 0.0);
    assert_eq!(s[&ToasterControl::Function], 0.25);
}

#[test]
fn state_lists_only_present_controls() {
    let (toaster, sim) = toaster_scene(true);
    let s = toaster.get_state(&sim);
    assert!(s.contains_key(&ToasterControl::Rack));
    assert!(!s.contains_key(&ToasterControl::Tray));
    let (toaster, sim) = toaster_scene(false);
    assert!(toaster.get_state(&sim).contains_key(&ToasterControl::Tray));
}

#[test]
fn sliding_the_rack_opens_the_door_first() {
    let (mut toaster, mut sim) = toaster_scene(true);
    let moved = toaster.slide_rack(&mut sim, 0.5).unwrap();
    assert_eq!(moved, ToasterControl::Rack);
    assert!((sim.joint_value("toaster_door_joint").unwrap() - FRAC_PI_2).abs() < 1e-6);
    assert!((sim.joint_value("toaster_rack0_joint").unwrap() - 0.1).abs() < 1e-6);

    let (mut toaster, mut sim) = toaster_scene(false);
    assert_eq!(toaster.slide_rack(&mut sim, 1.0).unwrap(), ToasterControl::Tray);
}

#[test]
fn rack_contact_reads_the_shelf_body() {
    let (toaster, sim) = toaster_scene(true);
    let bread = SceneObject::new("bread", Vec3::new(0.05, 0.05, 0.02));
    let mut sim = sim.with_object(&bread);
    assert!(!toaster.check_rack_contact(&sim, &bread).unwrap());
    sim.add_contact("toaster_rack0_g", "bread_g0");
    assert!(toaster.check_rack_contact(&sim, &bread).unwrap());
}

#[test]
fn toaster_rejects_other_fixture_kinds() {
    let fixture = oven("oven", Pose::identity()).unwrap();
    assert!(matches!(
        ToasterOven::new(&fixture),
        Err(FixtureError::WrongKind { .. })
    ));
}

#[test]
fn oven_doors_open_within_the_requested_band() {
    let fixture = oven("oven", Pose::identity()).unwrap();
    let mut sim = FakeSim::new().with_fixture(&fixture);
    let oven = Oven::new(&fixture).unwrap();
    assert_eq!(door_openness(&sim, &fixture).unwrap(), Some(0.0));
    let mut rng = Prng::from_seed_u64(12);
    oven.set_door_state(&mut sim, &mut rng, 0.5, 0.8).unwrap();
    let open = oven.door_state(&sim).unwrap()["oven_door_joint"];
    assert!((0.5 - 1e-5..=0.8 + 1e-5).contains(&open));
    let r = oven.readings(&sim).unwrap();
    assert_eq!(r["door_joint"], Reading::Number(open));
}
