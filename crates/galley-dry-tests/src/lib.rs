// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for Galley crates.
//!
//! # Modules
//!
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`fixtures`] - Canned sink, oven, toaster-oven and counter fixtures plus a
//!   demo object catalog
//! - [`sim`] - In-memory `SimQuery` fake with scripted poses, joints and contacts
#![forbid(unsafe_code)]

pub mod config;
pub mod fixtures;
pub mod sim;

pub use config::InMemoryConfigStore;
pub use fixtures::{counter, demo_catalog, oven, sink, toaster_oven, DEMO_CATALOG_YAML};
pub use sim::{joint_at, FakeSim};
