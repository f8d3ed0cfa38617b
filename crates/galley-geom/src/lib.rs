// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![deny(
    clippy::all,
    clippy::pedantic,
    rust_2018_idioms,
    missing_docs,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]
#![doc = r"Geometry primitives for Galley scene generation.

This crate provides:
- Axis-aligned bounding boxes (`Aabb`).
- Rigid poses (`Pose`) and oriented boxes (`OrientedBox`).
- Pure queries: bounding-box corners, point-in-box with tolerance, and
  world/local frame transforms (`query`).
- A minimal broad-phase trait and an AABB-based store used to reject
  overlapping placements.

Design notes:
- Pure function layer: malformed inputs are reported immediately, nothing is
  retried or suppressed here.
- Float32 throughout; the vertical axis is `z`.
"]

/// Broad-phase overlap bookkeeping.
pub mod broad;
/// Pure geometric queries over poses and boxes.
pub mod query;
/// Foundational geometric types.
pub mod types;

use thiserror::Error;

pub use broad::aabb_tree::{AabbTree, BroadPhase};
pub use query::{
    bbox_corners, footprint_corners, local_to_world, point_in_box, world_to_local, Tolerance,
};
pub use types::aabb::Aabb;
pub use types::oriented_box::OrientedBox;
pub use types::pose::Pose;

/// Errors raised when geometric inputs are malformed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// A position, rotation, or extent contained NaN or infinity.
    #[error("non-finite {0}")]
    NonFinite(&'static str),
    /// A half-extent was negative.
    #[error("negative half-extent {0:?}")]
    NegativeExtent([f32; 3]),
}
