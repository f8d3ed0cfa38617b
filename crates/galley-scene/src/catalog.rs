// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Object catalog and the kitchen-object sampler.
//!
//! The catalog is loaded once (YAML) and never mutated. Sampling expands
//! group names to categories, filters by capability flags and registry
//! presence, then picks a category uniformly, a registry weighted by its
//! asset count, and an asset uniformly inside the requested split.

use std::collections::BTreeMap;

use galley_math::{Prng, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::geometry::{GeometryDescription, ModelParseError};

/// Registries sampled when a query does not name any.
pub const DEFAULT_REGISTRIES: [&str; 2] = ["objaverse", "lightwheel"];

const ALL_GROUP: &str = "all";
const MODEL_FILE: &str = "model.xml";
const UPRIGHT_MODEL_FILE: &str = "model_upright.xml";

/// Catalog loading and sampling failures.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Catalog YAML is malformed.
    #[error("catalog parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// An asset model could not be read.
    #[error("asset model error: {0}")]
    Model(#[from] ModelParseError),
    /// A query or exclusion names a group the catalog does not define.
    #[error("unknown group `{0}`")]
    UnknownGroup(String),
    /// A group lists a category the catalog does not define.
    #[error("group `{group}` lists unknown category `{category}`")]
    UnknownCategory {
        /// Offending group.
        group: String,
        /// Missing category.
        category: String,
    },
    /// Filters left no category to choose from.
    #[error("no category satisfies the filters for groups {0:?}")]
    NoEligibleCategory(Vec<String>),
    /// An explicit asset path maps to no known category.
    #[error("asset `{0}` is not in any enabled registry")]
    UnknownAsset(String),
    /// The chosen category has no assets left after the split.
    #[error("category `{0}` has no assets in the enabled registries and split")]
    EmptyPool(String),
    /// A size bound was requested but the asset declares no bounding box.
    #[error("asset `{0}` declares no bounding box")]
    MissingBoundingBox(String),
    /// Every draw exceeded the caller's size bound.
    #[error("no asset within size bounds after {attempts} draws")]
    SizeBoundExhausted {
        /// Draws made before giving up.
        attempts: usize,
    },
}

/// Boolean capability flags of a category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityFlags {
    /// Can be picked up by the gripper.
    pub graspable: bool,
    /// Can go under running water.
    pub washable: bool,
    /// Can go in a microwave.
    pub microwavable: bool,
    /// Can be cooked.
    pub cookable: bool,
    /// Can go in a freezer.
    pub freezable: bool,
    /// Can go in a dishwasher.
    pub dishwashable: bool,
}

impl CapabilityFlags {
    /// Every flag set in `required` is also set here.
    pub fn satisfies(&self, required: &Self) -> bool {
        (!required.graspable || self.graspable)
            && (!required.washable || self.washable)
            && (!required.microwavable || self.microwavable)
            && (!required.cookable || self.cookable)
            && (!required.freezable || self.freezable)
            && (!required.dishwashable || self.dishwashable)
    }
}

/// Mesh scale: one factor or one per axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scale {
    /// Same factor on every axis.
    Uniform(f32),
    /// Separate x, y, z factors.
    PerAxis([f32; 3]),
}

impl Default for Scale {
    fn default() -> Self {
        Self::Uniform(1.0)
    }
}

impl Scale {
    /// Multiplies every factor by `k`.
    #[must_use]
    pub fn times(self, k: f32) -> Self {
        match self {
            Self::Uniform(s) => Self::Uniform(s * k),
            Self::PerAxis(v) => Self::PerAxis(v.map(|e| e * k)),
        }
    }

    /// Factors as a vector.
    pub fn as_vec3(self) -> Vec3 {
        match self {
            Self::Uniform(s) => Vec3::new(s, s, s),
            Self::PerAxis(v) => Vec3::from(v),
        }
    }
}

/// Contact and mass parameters applied to every geom of a sampled object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialParams {
    /// Constraint impedance.
    pub solimp: [f32; 3],
    /// Constraint reference.
    pub solref: [f32; 2],
    /// Density in kg/m³.
    pub density: f32,
    /// Sliding, torsional and rolling friction.
    pub friction: [f32; 3],
    /// Contact priority, when set.
    pub priority: Option<i32>,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            solimp: [0.998, 0.998, 0.001],
            solref: [0.001, 2.0],
            density: 100.0,
            friction: [0.95, 0.3, 0.1],
            priority: None,
        }
    }
}

/// A box declared on an asset, in the asset's unscaled frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetRegion {
    /// Box center.
    pub center: [f32; 3],
    /// Box half-extents.
    pub half_extents: [f32; 3],
}

/// One asset model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetEntry {
    /// Model path, ending in `model.xml`.
    pub path: String,
    /// Declared `reg_bbox` half-size at unit scale.
    #[serde(default)]
    pub half_size: Option<[f32; 3]>,
    /// Declared `reg_*` boxes other than the bounding box.
    #[serde(default)]
    pub regions: BTreeMap<String, AssetRegion>,
}

impl AssetEntry {
    /// Builds an entry from the asset's MJCF text.
    pub fn from_mjcf(path: impl Into<String>, xml: &str) -> Result<Self, CatalogError> {
        let geom = GeometryDescription::from_mjcf_str(xml, "")?;
        Ok(Self {
            path: path.into(),
            half_size: geom.bbox().map(|b| b.half_extents.to_array()),
            regions: geom
                .regions()
                .iter()
                .map(|(name, r)| {
                    (
                        name.clone(),
                        AssetRegion {
                            center: r.center.to_array(),
                            half_extents: r.half_extents.to_array(),
                        },
                    )
                })
                .collect(),
        })
    }
}

/// A category's assets within one registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryAssets {
    /// Default scale for this registry's meshes.
    #[serde(default)]
    pub scale: Scale,
    /// Contact parameters.
    #[serde(default)]
    pub material: MaterialParams,
    /// Per-registry override of the category flags.
    #[serde(default)]
    pub flags: Option<CapabilityFlags>,
    /// Asset models; kept sorted by path.
    pub assets: Vec<AssetEntry>,
}

/// An object category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectCategory {
    /// Type tags (e.g. `fruit`); each doubles as a group name.
    #[serde(default)]
    pub types: Vec<String>,
    /// Capability flags shared by all registries.
    #[serde(flatten)]
    pub flags: CapabilityFlags,
    /// Registry name to assets.
    pub registries: BTreeMap<String, RegistryAssets>,
}

impl ObjectCategory {
    fn flags_in(&self, registry: &RegistryAssets) -> CapabilityFlags {
        registry.flags.unwrap_or(self.flags)
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    categories: BTreeMap<String, ObjectCategory>,
    #[serde(default)]
    groups: BTreeMap<String, Vec<String>>,
}

/// Train/test partition of a registry's assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    /// Assets before the split boundary.
    Train,
    /// Assets from the boundary on.
    Test,
}

/// Index separating train from test assets: `max(count − 4, ⌈count / 2⌉)`.
pub fn split_boundary(count: usize) -> usize {
    count.saturating_sub(4).max(count.div_ceil(2))
}

/// What to sample from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupSelection {
    /// Union of these groups.
    Groups(Vec<String>),
    /// This exact asset model.
    Asset(String),
}

impl Default for GroupSelection {
    fn default() -> Self {
        Self::Groups(vec![ALL_GROUP.to_string()])
    }
}

/// Parameters for one object draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleQuery {
    /// Groups or an explicit asset, written `groups: [...]` or `asset: path`.
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub select: GroupSelection,
    /// Groups whose categories are excluded.
    pub exclude_groups: Vec<String>,
    /// Flags the category must carry.
    pub require: CapabilityFlags,
    /// Registries to draw from, in weighting order.
    pub registries: Vec<String>,
    /// Asset split, or all assets when `None`.
    pub split: Option<Split>,
    /// Per-axis full-size limits after scaling.
    pub max_size: [Option<f32>; 3],
    /// Multiplier on the category scale.
    pub object_scale: Option<f32>,
    /// Use the upright model variant.
    pub rotate_upright: bool,
}

impl Default for SampleQuery {
    fn default() -> Self {
        Self {
            select: GroupSelection::default(),
            exclude_groups: Vec::new(),
            require: CapabilityFlags::default(),
            registries: DEFAULT_REGISTRIES.iter().map(|r| (*r).to_string()).collect(),
            split: None,
            max_size: [None; 3],
            object_scale: None,
            rotate_upright: false,
        }
    }
}

impl SampleQuery {
    /// Query over `groups` with every other field defaulted.
    pub fn groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            select: GroupSelection::Groups(groups.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }
}

/// The concrete asset chosen for one scene object.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledObjectInstance {
    /// Category name.
    pub category: String,
    /// Registry the asset came from.
    pub registry: String,
    /// Model path (upright variant when requested).
    pub asset_path: String,
    /// Declared half-size at unit scale.
    pub half_size: Option<Vec3>,
    /// Resolved scale.
    pub scale: Scale,
    /// Contact parameters.
    pub material: MaterialParams,
    /// Every group that lists the category.
    pub groups_containing: Vec<String>,
    /// Split the asset was drawn from.
    pub split: Option<Split>,
    /// Declared asset regions at unit scale.
    pub regions: BTreeMap<String, AssetRegion>,
}

impl SampledObjectInstance {
    /// Half-size after scaling.
    pub fn scaled_half_extents(&self) -> Option<Vec3> {
        self.half_size.map(|h| h.mul_elem(&self.scale.as_vec3()))
    }

    fn within(&self, max_size: &[Option<f32>; 3]) -> Result<bool, CatalogError> {
        if max_size.iter().all(Option::is_none) {
            return Ok(true);
        }
        let half = self
            .scaled_half_extents()
            .ok_or_else(|| CatalogError::MissingBoundingBox(self.asset_path.clone()))?;
        let size = half.scale(2.0).to_array();
        Ok(max_size
            .iter()
            .zip(size)
            .all(|(limit, s)| limit.map_or(true, |m| s <= m)))
    }
}

/// Immutable object catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    categories: BTreeMap<String, ObjectCategory>,
    groups: BTreeMap<String, Vec<String>>,
}

impl Catalog {
    /// Builds a catalog. Implicit groups are added: `all`, one per category
    /// name and one per type tag.
    pub fn new(
        mut categories: BTreeMap<String, ObjectCategory>,
        mut groups: BTreeMap<String, Vec<String>>,
    ) -> Result<Self, CatalogError> {
        for (group, cats) in &groups {
            if let Some(missing) = cats.iter().find(|c| !categories.contains_key(*c)) {
                return Err(CatalogError::UnknownCategory {
                    group: group.clone(),
                    category: missing.clone(),
                });
            }
        }
        for (name, cat) in &mut categories {
            for reg in cat.registries.values_mut() {
                reg.assets.sort_by(|a, b| a.path.cmp(&b.path));
            }
            add_member(&mut groups, ALL_GROUP, name);
            add_member(&mut groups, name, name);
            for t in &cat.types {
                add_member(&mut groups, t, name);
            }
        }
        Ok(Self { categories, groups })
    }

    /// Parses a YAML catalog with `categories` and optional `groups`.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;
        Self::new(file.categories, file.groups)
    }

    /// Category by name.
    pub fn category(&self, name: &str) -> Option<&ObjectCategory> {
        self.categories.get(name)
    }

    /// Categories in a group, in listed order.
    pub fn group(&self, name: &str) -> Result<&[String], CatalogError> {
        self.groups
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| CatalogError::UnknownGroup(name.to_string()))
    }

    /// Groups listing `category`, in name order.
    pub fn groups_containing(&self, category: &str) -> Vec<String> {
        self.groups
            .iter()
            .filter(|(_, cats)| cats.iter().any(|c| c == category))
            .map(|(g, _)| g.clone())
            .collect()
    }

    /// Categories eligible for `query`, in first-seen order.
    pub fn eligible_categories(&self, query: &SampleQuery) -> Result<Vec<&str>, CatalogError> {
        let GroupSelection::Groups(groups) = &query.select else {
            return Ok(Vec::new());
        };
        let mut excluded: Vec<&str> = Vec::new();
        for g in &query.exclude_groups {
            excluded.extend(self.group(g)?.iter().map(String::as_str));
        }
        let mut out: Vec<&str> = Vec::new();
        for g in groups {
            for name in self.group(g)? {
                if out.contains(&name.as_str()) || excluded.contains(&name.as_str()) {
                    continue;
                }
                let Some(cat) = self.categories.get(name) else {
                    continue;
                };
                let enabled: Vec<&RegistryAssets> = query
                    .registries
                    .iter()
                    .filter_map(|r| cat.registries.get(r))
                    .collect();
                if enabled.is_empty() {
                    continue;
                }
                if enabled
                    .iter()
                    .any(|reg| !cat.flags_in(reg).satisfies(&query.require))
                {
                    continue;
                }
                out.push(name.as_str());
            }
        }
        Ok(out)
    }

    /// Draws one instance, redrawing while it violates `max_size`, at most
    /// `max_attempts` times.
    pub fn sample(
        &self,
        query: &SampleQuery,
        rng: &mut Prng,
        max_attempts: usize,
    ) -> Result<SampledObjectInstance, CatalogError> {
        for attempt in 1..=max_attempts {
            let inst = self.sample_once(query, rng)?;
            if inst.within(&query.max_size)? {
                return Ok(inst);
            }
            debug!(
                attempt,
                asset = inst.asset_path.as_str(),
                "sampled asset exceeds size bound; redrawing"
            );
        }
        Err(CatalogError::SizeBoundExhausted {
            attempts: max_attempts,
        })
    }

    /// One draw without the size check.
    pub fn sample_once(
        &self,
        query: &SampleQuery,
        rng: &mut Prng,
    ) -> Result<SampledObjectInstance, CatalogError> {
        let (category, registry, entry) = match &query.select {
            GroupSelection::Asset(path) => self.lookup_asset(path, &query.registries)?,
            GroupSelection::Groups(groups) => {
                let eligible = self.eligible_categories(query)?;
                let idx = rng
                    .next_index(eligible.len())
                    .ok_or_else(|| CatalogError::NoEligibleCategory(groups.clone()))?;
                self.draw_asset(eligible[idx], query, rng)?
            }
        };
        let cat = self
            .categories
            .get(category)
            .ok_or_else(|| CatalogError::UnknownAsset(entry.path.clone()))?;
        let reg = cat
            .registries
            .get(registry)
            .ok_or_else(|| CatalogError::UnknownAsset(entry.path.clone()))?;
        let asset_path = match &query.select {
            GroupSelection::Asset(path) => path.clone(),
            GroupSelection::Groups(_) if query.rotate_upright => {
                entry.path.replace(MODEL_FILE, UPRIGHT_MODEL_FILE)
            }
            GroupSelection::Groups(_) => entry.path.clone(),
        };
        let scale = query
            .object_scale
            .map_or(reg.scale, |k| reg.scale.times(k));
        Ok(SampledObjectInstance {
            category: category.to_string(),
            registry: registry.to_string(),
            asset_path,
            half_size: entry.half_size.map(Vec3::from),
            scale,
            material: reg.material,
            groups_containing: self.groups_containing(category),
            split: query.split,
            regions: entry.regions.clone(),
        })
    }

    fn draw_asset<'a>(
        &'a self,
        category: &'a str,
        query: &'a SampleQuery,
        rng: &mut Prng,
    ) -> Result<(&'a str, &'a str, &'a AssetEntry), CatalogError> {
        let cat = self
            .categories
            .get(category)
            .ok_or_else(|| CatalogError::EmptyPool(category.to_string()))?;
        let pools: Vec<(&str, &[AssetEntry])> = query
            .registries
            .iter()
            .map(|r| {
                let pool = cat
                    .registries
                    .get(r)
                    .map_or(&[][..], |reg| split_pool(&reg.assets, query.split));
                (r.as_str(), pool)
            })
            .collect();
        let weights: Vec<usize> = pools.iter().map(|(_, p)| p.len()).collect();
        let chosen = rng
            .choose_weighted(&weights)
            .ok_or_else(|| CatalogError::EmptyPool(category.to_string()))?;
        let (registry, pool) = pools[chosen];
        let idx = rng
            .next_index(pool.len())
            .ok_or_else(|| CatalogError::EmptyPool(category.to_string()))?;
        Ok((category, registry, &pool[idx]))
    }

    fn lookup_asset<'a>(
        &'a self,
        path: &str,
        registries: &'a [String],
    ) -> Result<(&'a str, &'a str, &'a AssetEntry), CatalogError> {
        let model = sibling_model(path);
        for (name, cat) in &self.categories {
            for r in registries {
                let Some(reg) = cat.registries.get(r) else {
                    continue;
                };
                if let Some(entry) = reg.assets.iter().find(|a| a.path == model) {
                    return Ok((name.as_str(), r.as_str(), entry));
                }
            }
        }
        Err(CatalogError::UnknownAsset(path.to_string()))
    }
}

fn add_member(groups: &mut BTreeMap<String, Vec<String>>, group: &str, category: &str) {
    let members = groups.entry(group.to_string()).or_default();
    if !members.iter().any(|c| c == category) {
        members.push(category.to_string());
    }
}

fn split_pool(assets: &[AssetEntry], split: Option<Split>) -> &[AssetEntry] {
    let boundary = split_boundary(assets.len());
    match split {
        None => assets,
        Some(Split::Train) => &assets[..boundary],
        Some(Split::Test) => &assets[boundary..],
    }
}

fn sibling_model(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/{MODEL_FILE}"),
        None => MODEL_FILE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn split_boundary_matches_documented_examples() {
        assert_eq!(split_boundary(10), 6);
        assert_eq!(split_boundary(4), 2);
        assert_eq!(split_boundary(5), 3);
        assert_eq!(split_boundary(1), 1);
        assert_eq!(split_boundary(0), 0);
    }

    #[test]
    fn selection_reads_as_a_single_key_map() {
        let q: SampleQuery = serde_yaml::from_str("select: { groups: [fruit, receptacle] }").unwrap();
        assert_eq!(
            q.select,
            GroupSelection::Groups(vec!["fruit".into(), "receptacle".into()])
        );
        let q: SampleQuery =
            serde_yaml::from_str("select:\n  asset: objaverse/apple/apple_0/model.xml\n").unwrap();
        assert_eq!(
            q.select,
            GroupSelection::Asset("objaverse/apple/apple_0/model.xml".into())
        );
        let q: SampleQuery = serde_yaml::from_str("split: train").unwrap();
        assert_eq!(q.select, GroupSelection::default());
    }

    #[test]
    fn flags_only_constrain_required_bits() {
        let have = CapabilityFlags {
            graspable: true,
            washable: true,
            ..CapabilityFlags::default()
        };
        let need = CapabilityFlags {
            graspable: true,
            ..CapabilityFlags::default()
        };
        assert!(have.satisfies(&need));
        assert!(!need.satisfies(&have));
    }

    #[test]
    fn scale_multiplies_per_axis() {
        assert_eq!(Scale::Uniform(2.0).times(0.5), Scale::Uniform(1.0));
        assert_eq!(
            Scale::PerAxis([1.0, 2.0, 4.0]).times(0.5),
            Scale::PerAxis([0.5, 1.0, 2.0])
        );
    }

    #[test]
    fn sibling_model_replaces_file_name() {
        assert_eq!(
            sibling_model("objaverse/apple/apple_0/model_upright.xml"),
            "objaverse/apple/apple_0/model.xml"
        );
    }
}
