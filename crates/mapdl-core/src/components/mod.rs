//! Named node/keypoint/surface groups of a model and its unit system.

use crate::domain::{SessionError, SessionResult, codes};
use crate::literal::{LiteralDocument, Value};
use crate::units::UnitSystem;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    Surface,
    Keypoint,
    Node,
}

impl GroupKind {
    /// Visit order used when assembling inputs and exporting results.
    pub const ALL: [Self; 3] = [Self::Surface, Self::Keypoint, Self::Node];

    /// The engine's component type code for this kind of group.
    pub const fn engine_component_type(self) -> i32 {
        match self {
            Self::Surface => 8,
            Self::Keypoint => 6,
            Self::Node => 1,
        }
    }

    /// Command that reduces the selection to the group's nodes, if the group
    /// is not already a node set.
    pub const fn node_selection(self) -> Option<&'static str> {
        match self {
            Self::Surface => Some("NSLA,S,1"),
            Self::Keypoint => Some("NSLK,S"),
            Self::Node => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Surface => "surface",
            Self::Keypoint => "keypoint",
            Self::Node => "node",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentGroup {
    pub name: String,
    pub kind: GroupKind,
}

impl ComponentGroup {
    pub fn new(name: impl Into<String>, kind: GroupKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentCatalog {
    #[serde(default)]
    pub groups: Vec<ComponentGroup>,
    #[serde(default = "default_units")]
    pub units: i32,
}

fn default_units() -> i32 {
    UnitSystem::default().code()
}

impl Default for ComponentCatalog {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            units: default_units(),
        }
    }
}

impl ComponentCatalog {
    pub fn new(units: i32) -> Self {
        Self {
            groups: Vec::new(),
            units,
        }
    }

    pub fn with_group(mut self, name: impl Into<String>, kind: GroupKind) -> Self {
        self.push(name, kind);
        self
    }

    /// Adds a group unless one of the same name and kind is already listed.
    pub fn push(&mut self, name: impl Into<String>, kind: GroupKind) {
        let name = name.into();
        if !self.groups.iter().any(|g| g.name == name && g.kind == kind) {
            self.groups.push(ComponentGroup::new(name, kind));
        }
    }

    pub fn groups_of(&self, kind: GroupKind) -> impl Iterator<Item = &ComponentGroup> {
        self.groups.iter().filter(move |group| group.kind == kind)
    }

    /// `None` for codes the engine does not define.
    pub fn unit_system(&self) -> Option<UnitSystem> {
        UnitSystem::from_code(self.units)
    }

    /// Reads a components file: `nodeMap` keys become node groups,
    /// `keypointMap` keys keypoint groups, `facetMap` keys surface groups,
    /// and `units` the unit system code.
    pub fn from_literal(text: &str) -> SessionResult<Self> {
        let document = LiteralDocument::parse(text).map_err(|error| {
            SessionError::parse(
                codes::COMPONENTS_FILE,
                format!("components file is not a valid literal: {}", error),
            )
        })?;

        let units = match document.field("units") {
            None => default_units(),
            Some(value) => value.as_i64().map(|code| code as i32).ok_or_else(|| {
                SessionError::parse(codes::COMPONENTS_FILE, "'units' must be an integer code")
            })?,
        };

        let mut catalog = Self::new(units);
        for (field, kind) in [
            ("facetMap", GroupKind::Surface),
            ("keypointMap", GroupKind::Keypoint),
            ("nodeMap", GroupKind::Node),
        ] {
            let Some(value) = document.field(field) else {
                continue;
            };
            for name in group_names(field, value)? {
                catalog.push(name, kind);
            }
        }
        Ok(catalog)
    }

    pub fn load(path: &Path) -> SessionResult<Self> {
        let text = fs::read_to_string(path).map_err(|error| {
            SessionError::io(
                codes::COMPONENTS_READ,
                format!("failed to read components file '{}': {}", path.display(), error),
            )
        })?;
        Self::from_literal(&text)
    }
}

fn group_names(field: &str, value: &Value) -> SessionResult<Vec<String>> {
    let entries = value.as_map().ok_or_else(|| {
        SessionError::parse(codes::COMPONENTS_FILE, format!("'{}' must be a mapping", field))
    })?;
    entries
        .iter()
        .map(|(key, _)| {
            key.as_str().map(str::to_string).ok_or_else(|| {
                SessionError::parse(
                    codes::COMPONENTS_FILE,
                    format!("'{}' keys must be group names", field),
                )
            })
        })
        .collect()
}
