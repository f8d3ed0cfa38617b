// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Crate-level error and its retry classification.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::fixture::FixtureError;
use crate::geometry::ModelParseError;
use crate::placement::PlacementError;
use crate::region::RegionError;
use crate::sim::SimError;
use crate::task::TaskError;

/// Any failure surfaced by scene generation or task evaluation.
#[derive(Debug, Error)]
pub enum SceneError {
    /// Physics query failed.
    #[error(transparent)]
    Sim(#[from] SimError),
    /// Static geometry could not be parsed.
    #[error(transparent)]
    Model(#[from] ModelParseError),
    /// Region lookup failed.
    #[error(transparent)]
    Region(#[from] RegionError),
    /// Catalog loading or sampling failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// Placement failed.
    #[error(transparent)]
    Placement(#[from] PlacementError),
    /// Fixture state access failed.
    #[error(transparent)]
    Fixture(#[from] FixtureError),
    /// Config could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Task configuration or evaluation failed.
    #[error(transparent)]
    Task(#[from] TaskError),
    /// Every scene attempt failed recoverably.
    #[error("scene not generated after {attempts} attempts")]
    SceneAttemptsExhausted {
        /// Attempts made.
        attempts: usize,
        /// Failure of the final attempt.
        last: Option<Box<SceneError>>,
    },
}

impl SceneError {
    /// Infeasible and exhausted placements restart the scene; everything
    /// else is a configuration or predicate error and is fatal.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Placement(e) => e.is_recoverable(),
            _ => false,
        }
    }
}
