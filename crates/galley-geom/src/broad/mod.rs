// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Broad-phase interfaces and a minimal reference implementation.
//!
//! Probes return ids in ascending order. Overlap is inclusive on faces
//! (touching AABBs are considered overlapping).

#[doc = "Reference AABB-based broad-phase and trait definitions."]
pub mod aabb_tree;
