// src/index/types.rs
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Sentinel the index uses for unset string fields.
pub const UNKNOWN: &str = "UNKNOWN";

/// One changelog record. Lives for a single polling cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub name: String,
    pub version: Option<String>,
    pub timestamp: i64, // unix seconds
    pub actions: Vec<String>,
}

impl ChangeEvent {
    /// Build an event from the index's comma-separated action text,
    /// e.g. `"update description, classifiers"`.
    pub fn new(name: &str, version: Option<&str>, timestamp: i64, actions: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.map(str::to_string),
            timestamp,
            actions: actions
                .split(',')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    fn has_action(&self, keyword: &str) -> bool {
        self.actions.iter().any(|a| a.contains(keyword))
    }

    pub fn is_creation(&self) -> bool {
        self.has_action("create")
    }

    pub fn is_update(&self) -> bool {
        self.has_action("new release") || self.has_action("classifiers")
    }
}

/// Descriptive record for a (name, version). Never cached across cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    #[serde(default, deserialize_with = "null_as_default")]
    pub classifiers: BTreeSet<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub home_page: Option<String>,
}

impl PackageMetadata {
    /// Summary, unless empty or the `UNKNOWN` sentinel.
    pub fn summary(&self) -> Option<&str> {
        known_value(self.summary.as_deref())
    }

    /// Home page, unless empty or the `UNKNOWN` sentinel.
    pub fn home_page(&self) -> Option<&str> {
        known_value(self.home_page.as_deref())
    }

    pub fn matches_any(&self, interest: &BTreeSet<String>) -> bool {
        !self.classifiers.is_disjoint(interest)
    }
}

fn known_value(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty() && *s != UNKNOWN)
}

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}
