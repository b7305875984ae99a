// src/known.rs
use std::collections::HashSet;

use crate::error::Result;
use crate::index::PackageIndex;

/// Projects already confirmed to carry an interest classifier.
/// Append-only for the lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct KnownSet {
    names: HashSet<String>,
}

impl KnownSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Returns `true` if the name was not known before.
    pub fn insert(&mut self, name: &str) -> bool {
        if self.names.contains(name) {
            return false;
        }
        self.names.insert(name.to_string())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for KnownSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Build the initial set: one browse per classifier in a single batch,
/// union of every returned project.
pub async fn seed<I: PackageIndex + ?Sized>(interest: &[String], index: &I) -> Result<KnownSet> {
    let batches = index.browse_each(interest).await?;
    let known: KnownSet = batches.into_iter().flatten().collect();
    tracing::info!(
        target: "known",
        classifiers = interest.len(),
        projects = known.len(),
        "seeded known projects"
    );
    Ok(known)
}
