// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Physics query port.
//!
//! The scene core never owns a physics engine. Everything it needs from live
//! simulation state goes through [`SimQuery`]; adapters (a MuJoCo binding, the
//! in-memory fake in `galley-dry-tests`) implement it.

use galley_geom::Pose;
use galley_math::Vec3;
use thiserror::Error;

/// Lookup failures reported by a [`SimQuery`] adapter.
///
/// Every variant names an entity absent from the loaded model or reported in
/// an unusable state, which is a configuration defect rather than a
/// transient condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// No body with this name.
    #[error("unknown body: {0}")]
    UnknownBody(String),
    /// No joint with this name.
    #[error("unknown joint: {0}")]
    UnknownJoint(String),
    /// No geom with this name.
    #[error("unknown geom: {0}")]
    UnknownGeom(String),
    /// No site with this name.
    #[error("unknown site: {0}")]
    UnknownSite(String),
    /// A body's pose or box is NaN, infinite or inverted.
    #[error("malformed box for body `{body}`: {reason}")]
    MalformedBox {
        /// Body whose box was built.
        body: String,
        /// Underlying geometry failure.
        reason: String,
    },
}

/// Narrow read/write interface over a running simulation.
pub trait SimQuery {
    /// World pose of a body.
    fn body_pose(&self, body: &str) -> Result<Pose, SimError>;

    /// Current position of a scalar joint.
    fn joint_value(&self, joint: &str) -> Result<f32, SimError>;

    /// Writes a scalar joint position.
    fn set_joint_value(&mut self, joint: &str, value: f32) -> Result<(), SimError>;

    /// Declared `(lo, hi)` range of a joint.
    fn joint_range(&self, joint: &str) -> Result<(f32, f32), SimError>;

    /// Whether the model declares `joint`.
    fn has_joint(&self, joint: &str) -> bool;

    /// World position of a geom.
    fn geom_position(&self, geom: &str) -> Result<Vec3, SimError>;

    /// World position of a site.
    fn site_position(&self, site: &str) -> Result<Vec3, SimError>;

    /// Names of the geoms attached directly to `body`.
    fn body_geoms(&self, body: &str) -> Result<Vec<String>, SimError>;

    /// `true` when any geom in `a` touches any geom in `b`.
    fn check_contact(&self, a: &[String], b: &[String]) -> bool;

    /// Simulated time in seconds.
    fn time(&self) -> f32;
}
