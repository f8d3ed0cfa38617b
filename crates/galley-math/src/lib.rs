// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Deterministic math helpers for scene generation: vectors, quaternions,
//! angle wrapping, and a seedable pseudo-random number generator.
//!
//! All operations use `f32` to match the simulator's single-precision poses.
#![forbid(unsafe_code)]

use std::f32::consts::{PI, TAU};

mod prng;
mod quat;
mod vec3;

pub use prng::Prng;
pub use quat::{Euler, Quat};
pub use vec3::Vec3;

/// Global epsilon used by math routines when detecting degenerate values.
pub const EPSILON: f32 = 1e-6;

/// Clamps `value` to the inclusive `[min, max]` range.
///
/// # Panics
/// Panics if `min > max`.
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    assert!(min <= max, "invalid clamp range: {min} > {max}");
    value.max(min).min(max)
}

/// Converts degrees to radians with float32 precision.
pub fn deg_to_rad(value: f32) -> f32 {
    value * (TAU / 360.0)
}

/// Converts radians to degrees with float32 precision.
pub fn rad_to_deg(value: f32) -> f32 {
    value * (360.0 / TAU)
}

/// Wraps an angle into `[0, 2π)`.
pub fn wrap_angle_positive(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs.
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Wrapped difference `b - a` in `(−π, π]`.
///
/// The sign follows the shortest rotation from `a` to `b`; an exact half turn
/// reports `+π`.
pub fn angle_delta(a: f32, b: f32) -> f32 {
    let d = (b - a + PI).rem_euclid(TAU) - PI;
    if d <= -PI {
        d + TAU
    } else {
        d
    }
}
