// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

use crate::{Vec3, EPSILON};

/// Roll/pitch/yaw triple in radians (rotations about x, y, z).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Euler {
    /// Rotation about the x axis.
    pub roll: f32,
    /// Rotation about the y axis.
    pub pitch: f32,
    /// Rotation about the z axis.
    pub yaw: f32,
}

/// Quaternion stored as `(x, y, z, w)`.
///
/// * All angles are expressed in radians.
/// * Simulators commonly report `(w, x, y, z)`; use [`Quat::from_wxyz`] at that
///   boundary.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Quat {
    data: [f32; 4],
}

impl Quat {
    /// Creates a quaternion from components.
    ///
    /// Callers should provide finite components; use
    /// [`Quat::from_axis_angle`] for axis/angle construction.
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { data: [x, y, z, w] }
    }

    /// Creates a quaternion from a scalar-first `(w, x, y, z)` array.
    pub const fn from_wxyz(wxyz: [f32; 4]) -> Self {
        Self::new(wxyz[1], wxyz[2], wxyz[3], wxyz[0])
    }

    /// Returns the quaternion as an `(x, y, z, w)` array.
    pub fn to_array(self) -> [f32; 4] {
        self.data
    }

    fn component(&self, idx: usize) -> f32 {
        self.data[idx]
    }

    /// Constructs a quaternion from a rotation axis and angle in radians.
    ///
    /// Returns the identity quaternion when the axis length is ≤ `EPSILON`.
    pub fn from_axis_angle(axis: Vec3, angle: f32) -> Self {
        let len_sq = axis.length_squared();
        if len_sq <= EPSILON * EPSILON {
            return Self::identity();
        }
        let len = len_sq.sqrt();
        let norm_axis = axis.scale(1.0 / len);
        let half = angle * 0.5;
        let (sin_half, cos_half) = half.sin_cos();
        let scaled = norm_axis.scale(sin_half);
        Self::new(
            scaled.component(0),
            scaled.component(1),
            scaled.component(2),
            cos_half,
        )
    }

    /// Rotation of `angle` radians about the vertical (`z`) axis.
    pub fn from_yaw(angle: f32) -> Self {
        Self::from_axis_angle(Vec3::UNIT_Z, angle)
    }

    /// Hamilton product of two quaternions (`self * other`).
    ///
    /// Operand order matters: applying the product to a vector rotates by
    /// `other` first, then by `self`.
    pub fn multiply(&self, other: &Self) -> Self {
        let ax = self.component(0);
        let ay = self.component(1);
        let az = self.component(2);
        let aw = self.component(3);

        let bx = other.component(0);
        let by = other.component(1);
        let bz = other.component(2);
        let bw = other.component(3);

        Self::new(
            aw * bx + ax * bw + ay * bz - az * by,
            aw * by - ax * bz + ay * bw + az * bx,
            aw * bz + ax * by - ay * bx + az * bw,
            aw * bw - ax * bx - ay * by - az * bz,
        )
    }

    /// Four-component dot product.
    pub fn dot(&self, other: &Self) -> f32 {
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    /// Normalises the quaternion; returns identity when norm is ~0.
    pub fn normalize(&self) -> Self {
        let len = self.dot(self).sqrt();
        if len <= EPSILON {
            return Self::identity();
        }
        let inv = 1.0 / len;
        Self::new(
            self.component(0) * inv,
            self.component(1) * inv,
            self.component(2) * inv,
            self.component(3) * inv,
        )
    }

    /// Conjugate; the inverse rotation for unit quaternions.
    pub fn conjugate(&self) -> Self {
        Self::new(
            -self.component(0),
            -self.component(1),
            -self.component(2),
            self.component(3),
        )
    }

    /// Returns the identity quaternion.
    pub const fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    /// Rotates a vector by this quaternion (normalised first).
    pub fn rotate(&self, v: &Vec3) -> Vec3 {
        let q = self.normalize();
        let u = Vec3::new(q.component(0), q.component(1), q.component(2));
        let w = q.component(3);
        // v' = v + 2w(u × v) + 2u × (u × v)
        let uv = u.cross(v);
        let uuv = u.cross(&uv);
        v.add(&uv.scale(2.0 * w)).add(&uuv.scale(2.0))
    }

    /// Converts to roll/pitch/yaw.
    ///
    /// Pitch saturates at `±π/2`; near that configuration roll and yaw are
    /// not individually meaningful, so callers must compare differences of
    /// angles taken away from gimbal lock.
    pub fn to_euler(&self) -> Euler {
        let q = self.normalize();
        let x = q.component(0);
        let y = q.component(1);
        let z = q.component(2);
        let w = q.component(3);

        let roll = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));
        let sin_pitch = 2.0 * (w * y - z * x);
        let pitch = if sin_pitch.abs() >= 1.0 {
            core::f32::consts::FRAC_PI_2.copysign(sin_pitch)
        } else {
            sin_pitch.asin()
        };
        let yaw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));
        Euler { roll, pitch, yaw }
    }

    /// Rotation angle between two orientations, `2·acos(clamp(self · other))`.
    ///
    /// The dot product is not sign-folded: `q` and `-q` report a full turn.
    pub fn angle_to(&self, other: &Self) -> f32 {
        let d = self.dot(other).clamp(-1.0, 1.0);
        2.0 * d.acos()
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::identity()
    }
}

/// Converts a 4‑element `[f32; 4]` array `(x, y, z, w)` into a `Quat`.
/// The components are taken verbatim; normalization is not enforced.
impl From<[f32; 4]> for Quat {
    fn from(value: [f32; 4]) -> Self {
        Self { data: value }
    }
}
