// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Core geometry types (AABB, pose, oriented box).
//!
//! Overlap semantics are inclusive on faces: touching boxes count as
//! overlapping, so a placement flush against a neighbour is rejected.

#[doc = "Axis-aligned bounding boxes (world space)."]
pub mod aabb;
#[doc = "Oriented boxes: a pose plus half-extents."]
pub mod oriented_box;
#[doc = "Rigid poses (translation + rotation)."]
pub mod pose;
