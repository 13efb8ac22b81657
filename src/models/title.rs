// src/models/title.rs

//! Title identifiers and the tracked-title catalog.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::TitleConfig;

/// Case-insensitive canonical name of a tracked title.
///
/// The name is trimmed and lowercased on construction, so `"Solo Leveling "`
/// and `"solo leveling"` refer to the same title.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TitleId(String);

impl TitleId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TitleId {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&str> for TitleId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<TitleId> for String {
    fn from(id: TitleId) -> Self {
        id.0
    }
}

impl fmt::Display for TitleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tracked serialized work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Title {
    pub id: TitleId,
    pub description: String,
}

/// Immutable set of titles the notifier tracks, built from configuration.
#[derive(Debug, Clone, Default)]
pub struct TitleCatalog {
    titles: BTreeMap<TitleId, Title>,
}

impl TitleCatalog {
    /// Build the catalog from configured titles. Later duplicates are ignored.
    pub fn from_config(titles: &[TitleConfig]) -> Self {
        let mut catalog = BTreeMap::new();
        for title in titles {
            let id = TitleId::new(&title.name);
            catalog.entry(id.clone()).or_insert_with(|| Title {
                id,
                description: title.description.clone(),
            });
        }
        Self { titles: catalog }
    }

    pub fn get(&self, id: &TitleId) -> Option<&Title> {
        self.titles.get(id)
    }

    pub fn contains(&self, id: &TitleId) -> bool {
        self.titles.contains_key(id)
    }

    /// Title ids in canonical order.
    pub fn ids(&self) -> Vec<TitleId> {
        self.titles.keys().cloned().collect()
    }

    pub fn titles(&self) -> impl Iterator<Item = &Title> {
        self.titles.values()
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}
