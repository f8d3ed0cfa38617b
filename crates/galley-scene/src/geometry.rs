// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Static geometry descriptions parsed from MJCF.
//!
//! Fixtures and objects ship an MJCF model. The scene core only needs a thin
//! slice of it: named region boxes (`reg_*` geoms), the declared bounding box
//! (`reg_bbox`), joint ranges, site sizes and geom placements. Positions are
//! resolved into the model's root frame by accumulating parent body poses.

use std::collections::BTreeMap;

use galley_geom::Pose;
use galley_math::{Quat, Vec3};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

const REGION_PREFIX: &str = "reg_";
const BBOX_REGION: &str = "bbox";

/// Errors raised while reading an MJCF document.
#[derive(Debug, Error)]
pub enum ModelParseError {
    /// The XML itself is malformed.
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    /// An attribute could not be decoded.
    #[error("invalid attribute: {0}")]
    Attribute(String),
    /// A numeric attribute held something other than numbers.
    #[error("attribute `{attr}` is not numeric: {value:?}")]
    Number {
        /// Attribute name.
        attr: String,
        /// Raw attribute text.
        value: String,
    },
}

/// Primitive shape of a geom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeomShape {
    /// `type="box"`, `size="hx hy hz"`.
    Box,
    /// `type="cylinder"`, `size="r h"`.
    Cylinder,
    /// `type="sphere"`, `size="r"` (the MJCF default).
    Sphere,
    /// `type="capsule"`, `size="r h"`.
    Capsule,
    /// Meshes and anything else; extents come from `size` when present.
    Other,
}

impl GeomShape {
    fn parse(value: &str) -> Self {
        match value {
            "box" => Self::Box,
            "cylinder" => Self::Cylinder,
            "sphere" => Self::Sphere,
            "capsule" => Self::Capsule,
            _ => Self::Other,
        }
    }

    /// Maps an MJCF `size` vector to box half-extents.
    pub fn half_extents(self, size: &[f32]) -> Vec3 {
        let at = |i: usize| size.get(i).copied().unwrap_or(0.0);
        match self {
            Self::Box => Vec3::new(at(0), at(1), at(2)),
            Self::Cylinder => Vec3::new(at(0), at(0), at(1)),
            Self::Sphere => Vec3::new(at(0), at(0), at(0)),
            Self::Capsule => Vec3::new(at(0), at(0), at(1) + at(0)),
            Self::Other => match size.len() {
                0 => Vec3::ZERO,
                1 | 2 => Vec3::new(at(0), at(0), at(size.len() - 1)),
                _ => Vec3::new(at(0), at(1), at(2)),
            },
        }
    }
}

/// A named, axis-aligned box in the model's root frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionDecl {
    /// Box center in the root frame.
    pub center: Vec3,
    /// Half-extents along the root frame axes.
    pub half_extents: Vec3,
}

impl RegionDecl {
    /// Scales center and extents elementwise (object models are authored at unit scale).
    #[must_use]
    pub fn scaled(&self, scale: &Vec3) -> Self {
        Self {
            center: self.center.mul_elem(scale),
            half_extents: self.half_extents.mul_elem(scale),
        }
    }
}

/// A geom placement.
#[derive(Debug, Clone, PartialEq)]
pub struct GeomDecl {
    /// Full geom name as it appears in the model.
    pub name: String,
    /// Primitive shape.
    pub shape: GeomShape,
    /// Position in the root frame.
    pub position: Vec3,
    /// Box half-extents derived from `size`.
    pub half_extents: Vec3,
    /// Enclosing body, if any.
    pub body: Option<String>,
}

/// A joint and its declared range.
#[derive(Debug, Clone, PartialEq)]
pub struct JointDecl {
    /// Full joint name.
    pub name: String,
    /// `(lo, hi)` from the `range` attribute.
    pub range: Option<(f32, f32)>,
    /// Enclosing body, if any.
    pub body: Option<String>,
}

/// A site and its raw `size` vector.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteDecl {
    /// Full site name.
    pub name: String,
    /// Position in the root frame.
    pub position: Vec3,
    /// Raw `size` attribute.
    pub size: Vec<f32>,
}

/// The parts of an MJCF model the scene core consumes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryDescription {
    naming_prefix: String,
    regions: BTreeMap<String, RegionDecl>,
    bbox: Option<RegionDecl>,
    geoms: Vec<GeomDecl>,
    joints: BTreeMap<String, JointDecl>,
    sites: BTreeMap<String, SiteDecl>,
}

impl GeometryDescription {
    /// Empty description whose entity names start with `naming_prefix`.
    pub fn new(naming_prefix: impl Into<String>) -> Self {
        Self {
            naming_prefix: naming_prefix.into(),
            ..Self::default()
        }
    }

    /// Parses the `<worldbody>` of an MJCF document.
    ///
    /// Geoms named `{naming_prefix}reg_<name>` (or `reg_<name>`) become regions;
    /// `reg_bbox` becomes the declared bounding box and is not listed as a region.
    pub fn from_mjcf_str(xml: &str, naming_prefix: &str) -> Result<Self, ModelParseError> {
        let mut out = Self::new(naming_prefix);
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut in_worldbody = false;
        let mut body_stack: Vec<(Pose, Option<String>)> = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    if tag == "worldbody" {
                        in_worldbody = true;
                    } else if in_worldbody {
                        if tag == "body" {
                            let frame = parse_body(&e, body_stack.last())?;
                            body_stack.push(frame);
                        } else {
                            out.parse_leaf(&tag, &e, body_stack.last())?;
                        }
                    }
                }
                Event::Empty(e) => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    if in_worldbody && tag != "body" {
                        out.parse_leaf(&tag, &e, body_stack.last())?;
                    }
                }
                Event::End(e) => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    if tag == "body" && in_worldbody {
                        body_stack.pop();
                    } else if tag == "worldbody" {
                        in_worldbody = false;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(out)
    }

    fn parse_leaf(
        &mut self,
        tag: &str,
        e: &BytesStart<'_>,
        parent: Option<&(Pose, Option<String>)>,
    ) -> Result<(), ModelParseError> {
        let frame = parent.map_or_else(Pose::identity, |(pose, _)| *pose);
        let body = parent.and_then(|(_, name)| name.clone());
        let attrs = read_attributes(e)?;
        let name = attrs.get("name").cloned();
        match tag {
            "geom" => {
                let Some(name) = name else { return Ok(()) };
                let shape = attrs
                    .get("type")
                    .map_or(GeomShape::Sphere, |t| GeomShape::parse(t));
                let local = optional_vec3(&attrs, "pos")?.unwrap_or(Vec3::ZERO);
                let size = optional_floats(&attrs, "size")?.unwrap_or_default();
                let geom = GeomDecl {
                    position: frame.transform_point(&local),
                    half_extents: shape.half_extents(&size),
                    shape,
                    body,
                    name,
                };
                self.push_geom(geom);
            }
            "joint" => {
                let Some(name) = name else { return Ok(()) };
                let range = match optional_floats(&attrs, "range")? {
                    Some(r) if r.len() == 2 => Some((r[0], r[1])),
                    _ => None,
                };
                self.joints
                    .insert(name.clone(), JointDecl { name, range, body });
            }
            "site" => {
                let Some(name) = name else { return Ok(()) };
                let local = optional_vec3(&attrs, "pos")?.unwrap_or(Vec3::ZERO);
                let size = optional_floats(&attrs, "size")?.unwrap_or_default();
                self.sites.insert(
                    name.clone(),
                    SiteDecl {
                        name,
                        position: frame.transform_point(&local),
                        size,
                    },
                );
            }
            _ => {}
        }
        Ok(())
    }

    fn push_geom(&mut self, geom: GeomDecl) {
        let stripped = geom
            .name
            .strip_prefix(self.naming_prefix.as_str())
            .unwrap_or(&geom.name);
        if let Some(region) = stripped.strip_prefix(REGION_PREFIX) {
            let decl = RegionDecl {
                center: geom.position,
                half_extents: geom.half_extents,
            };
            if region == BBOX_REGION {
                self.bbox = Some(decl);
            } else {
                self.regions.entry(region.to_string()).or_insert(decl);
            }
        }
        self.geoms.push(geom);
    }

    /// Adds a region box (name without the `reg_` prefix).
    #[must_use]
    pub fn with_region(mut self, name: &str, center: Vec3, half_extents: Vec3) -> Self {
        self.regions.insert(
            name.to_string(),
            RegionDecl {
                center,
                half_extents,
            },
        );
        self
    }

    /// Sets the declared bounding box.
    #[must_use]
    pub fn with_bbox(mut self, center: Vec3, half_extents: Vec3) -> Self {
        self.bbox = Some(RegionDecl {
            center,
            half_extents,
        });
        self
    }

    /// Adds a joint; `name` is the suffix after the naming prefix.
    #[must_use]
    pub fn with_joint(mut self, name: &str, range: Option<(f32, f32)>) -> Self {
        let full = self.prefixed(name);
        self.joints.insert(
            full.clone(),
            JointDecl {
                name: full,
                range,
                body: None,
            },
        );
        self
    }

    /// Adds a site; `name` is the suffix after the naming prefix.
    #[must_use]
    pub fn with_site(mut self, name: &str, position: Vec3, size: &[f32]) -> Self {
        let full = self.prefixed(name);
        self.sites.insert(
            full.clone(),
            SiteDecl {
                name: full,
                position,
                size: size.to_vec(),
            },
        );
        self
    }

    /// Adds a geom; `name` is the suffix after the naming prefix.
    #[must_use]
    pub fn with_geom(
        mut self,
        name: &str,
        shape: GeomShape,
        position: Vec3,
        half_extents: Vec3,
        body: Option<&str>,
    ) -> Self {
        let geom = GeomDecl {
            name: self.prefixed(name),
            shape,
            position,
            half_extents,
            body: body.map(|b| self.prefixed(b)),
        };
        self.push_geom(geom);
        self
    }

    /// Prepends the naming prefix to `suffix`.
    pub fn prefixed(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.naming_prefix)
    }

    /// Entity naming prefix (e.g. `sink_main_`).
    pub fn naming_prefix(&self) -> &str {
        &self.naming_prefix
    }

    /// Declared regions keyed by their short name.
    pub fn regions(&self) -> &BTreeMap<String, RegionDecl> {
        &self.regions
    }

    /// One region by short name.
    pub fn region(&self, name: &str) -> Option<&RegionDecl> {
        self.regions.get(name)
    }

    /// The `reg_bbox` box, if declared.
    pub fn bbox(&self) -> Option<&RegionDecl> {
        self.bbox.as_ref()
    }

    /// All geoms in document order.
    pub fn geoms(&self) -> &[GeomDecl] {
        &self.geoms
    }

    /// Geom by full name.
    pub fn geom(&self, name: &str) -> Option<&GeomDecl> {
        self.geoms.iter().find(|g| g.name == name)
    }

    /// Joints keyed by full name.
    pub fn joints(&self) -> &BTreeMap<String, JointDecl> {
        &self.joints
    }

    /// Joint by full name.
    pub fn joint(&self, name: &str) -> Option<&JointDecl> {
        self.joints.get(name)
    }

    /// Sites keyed by full name.
    pub fn sites(&self) -> &BTreeMap<String, SiteDecl> {
        &self.sites
    }

    /// Site by full name.
    pub fn site(&self, name: &str) -> Option<&SiteDecl> {
        self.sites.get(name)
    }
}

fn parse_body(
    e: &BytesStart<'_>,
    parent: Option<&(Pose, Option<String>)>,
) -> Result<(Pose, Option<String>), ModelParseError> {
    let attrs = read_attributes(e)?;
    let pos = optional_vec3(&attrs, "pos")?.unwrap_or(Vec3::ZERO);
    let rot = match optional_floats(&attrs, "quat")? {
        None => Quat::identity(),
        Some(q) if q.len() == 4 => Quat::from_wxyz([q[0], q[1], q[2], q[3]]).normalize(),
        Some(_) => {
            return Err(ModelParseError::Number {
                attr: "quat".to_string(),
                value: attrs.get("quat").cloned().unwrap_or_default(),
            })
        }
    };
    let local = Pose::new(pos, rot);
    let world = parent.map_or(local, |(frame, _)| frame.compose(&local));
    Ok((world, attrs.get("name").cloned()))
}

fn read_attributes(e: &BytesStart<'_>) -> Result<BTreeMap<String, String>, ModelParseError> {
    let mut out = BTreeMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ModelParseError::Attribute(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = String::from_utf8_lossy(&attr.value).to_string();
        out.insert(key, value);
    }
    Ok(out)
}

fn optional_floats(
    attrs: &BTreeMap<String, String>,
    key: &str,
) -> Result<Option<Vec<f32>>, ModelParseError> {
    let Some(raw) = attrs.get(key) else {
        return Ok(None);
    };
    raw.split_whitespace()
        .map(|s| {
            s.parse::<f32>().map_err(|_| ModelParseError::Number {
                attr: key.to_string(),
                value: raw.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn optional_vec3(
    attrs: &BTreeMap<String, String>,
    key: &str,
) -> Result<Option<Vec3>, ModelParseError> {
    match optional_floats(attrs, key)? {
        None => Ok(None),
        Some(v) if v.len() == 3 => Ok(Some(Vec3::new(v[0], v[1], v[2]))),
        Some(_) => Err(ModelParseError::Number {
            attr: key.to_string(),
            value: attrs.get(key).cloned().unwrap_or_default(),
        }),
    }
}
