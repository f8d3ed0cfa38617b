// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Sampler policy plus the config service and storage port that load it.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Key under which [`SamplerPolicy`] is stored.
pub const SAMPLER_POLICY_KEY: &str = "sampler_policy";

/// Storage port for raw config blobs (keyed by logical name).
pub trait ConfigStore {
    /// Load a raw config blob. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist a raw config blob.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Error type for config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// A loaded value is out of range.
    #[error("invalid `{field}`: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// Catch-all error variant.
    #[error("other: {0}")]
    Other(String),
}

/// Serializes config values as JSON and delegates storage to a [`ConfigStore`].
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Create a new service using the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Consume the service and return the inner store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> ConfigService<S>
where
    S: ConfigStore,
{
    /// Load and deserialize a config value for `key`. Returns `Ok(None)` if missing.
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: DeserializeOwned,
    {
        match self.store.load_raw(key) {
            Ok(bytes) => {
                if bytes.is_empty() {
                    return Ok(None);
                }
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
            Err(ConfigError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Serialize and persist a config value for `key`.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), ConfigError>
    where
        T: Serialize,
    {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }
}

/// Config files as `<base>/<key>.json`.
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Store rooted at `base`; the directory is created on first save.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Store rooted at the user config directory (e.g. `~/.config/galley`).
    pub fn user_default() -> Result<Self, ConfigError> {
        let proj = ProjectDirs::from("dev", "flyingrobots", "galley")
            .ok_or_else(|| ConfigError::Other("could not resolve config dir".into()))?;
        Ok(Self::new(proj.config_dir()))
    }

    /// Root directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }
}

/// Retry budgets and tolerances for scene generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerPolicy {
    /// Candidate poses tried per placement before giving up.
    pub placement_attempts: usize,
    /// Inflation of candidate boxes for the overlap test, in meters.
    pub safety_margin: f32,
    /// Per-axis slack for containment checks, in meters.
    pub containment_tolerance: f32,
    /// Catalog redraws allowed per object under a size bound.
    pub size_attempts: usize,
    /// Whole-scene restarts before generation fails.
    pub scene_attempts: usize,
    /// Half-width of the yaw band for upright placements, in radians.
    pub upright_band: f32,
}

impl Default for SamplerPolicy {
    fn default() -> Self {
        Self {
            placement_attempts: 30,
            safety_margin: 0.0,
            containment_tolerance: 1e-4,
            size_attempts: 100,
            scene_attempts: 10,
            upright_band: 0.05,
        }
    }
}

impl SamplerPolicy {
    /// Rejects zero budgets and negative or non-finite lengths.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let budgets = [
            ("placement_attempts", self.placement_attempts),
            ("size_attempts", self.size_attempts),
            ("scene_attempts", self.scene_attempts),
        ];
        for (field, value) in budgets {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be at least 1".into(),
                });
            }
        }
        let lengths = [
            ("safety_margin", self.safety_margin),
            ("containment_tolerance", self.containment_tolerance),
            ("upright_band", self.upright_band),
        ];
        for (field, value) in lengths {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{value} is not a finite non-negative number"),
                });
            }
        }
        Ok(())
    }

    /// Loads the stored policy, falling back to defaults when absent.
    pub fn load<S: ConfigStore>(service: &ConfigService<S>) -> Result<Self, ConfigError> {
        let policy = service
            .load::<Self>(SAMPLER_POLICY_KEY)?
            .unwrap_or_default();
        policy.validate()?;
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let p: SamplerPolicy = serde_json::from_str(r#"{"safety_margin": 0.01}"#).unwrap();
        assert!((p.safety_margin - 0.01).abs() < f32::EPSILON);
        assert_eq!(p.placement_attempts, 30);
        assert_eq!(p.scene_attempts, 10);
    }

    #[test]
    fn zero_budget_is_rejected() {
        let p = SamplerPolicy {
            scene_attempts: 0,
            ..SamplerPolicy::default()
        };
        assert!(matches!(
            p.validate(),
            Err(ConfigError::Invalid {
                field: "scene_attempts",
                ..
            })
        ));
    }

    #[test]
    fn negative_margin_is_rejected() {
        let p = SamplerPolicy {
            safety_margin: -0.1,
            ..SamplerPolicy::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn fs_store_round_trips_and_reports_missing() {
        let dir = std::env::temp_dir().join(format!("galley-config-{}", std::process::id()));
        let service = ConfigService::new(FsConfigStore::new(&dir));
        assert!(service.load::<SamplerPolicy>("absent").unwrap().is_none());
        let p = SamplerPolicy {
            placement_attempts: 7,
            ..SamplerPolicy::default()
        };
        service.save(SAMPLER_POLICY_KEY, &p).unwrap();
        assert_eq!(SamplerPolicy::load(&service).unwrap(), p);
        let _ = fs::remove_dir_all(dir);
    }
}
