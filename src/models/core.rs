// src/models/core.rs
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A source record describing one real-world subject as seen by one origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub uid: String,
    pub name: Option<String>,
    pub origin: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Written by canonicalisation; `None` until the column has been populated.
    #[serde(default)]
    pub canonical_uid: Option<String>,
}

impl Entity {
    pub fn new(uid: impl Into<String>, name: Option<&str>, origin: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: name.map(|n| n.to_string()),
            origin: origin.into(),
            attributes: BTreeMap::new(),
            canonical_uid: None,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alias {
    pub uid: String,
    pub name: Option<String>,
    #[serde(default)]
    pub canonical_uid: Option<String>,
}

impl Alias {
    pub fn new(uid: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            uid: uid.into(),
            name: name.map(|n| n.to_string()),
            canonical_uid: None,
        }
    }
}

/// A directed relationship between two entity uids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub source: String,
    pub target: String,
    pub link_type: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub source_canonical: Option<String>,
    #[serde(default)]
    pub target_canonical: Option<String>,
}

impl Link {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        link_type: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            link_type: link_type.into(),
            attributes: BTreeMap::new(),
            source_canonical: None,
            target_canonical: None,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// One representative record per canonical identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedEntity {
    pub canonical_uid: String,
    pub name: Option<String>,
    pub origins: BTreeSet<String>,
    pub member_uids: Vec<String>,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedLink {
    pub source_canonical: String,
    pub target_canonical: String,
    pub link_type: String,
    /// Number of source links collapsed into this one.
    pub link_count: usize,
    pub attributes: BTreeMap<String, String>,
}
