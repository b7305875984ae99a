// src/index/mod.rs
pub mod json;
pub mod types;
pub mod xmlrpc;

use async_trait::async_trait;

use crate::error::Result;
use crate::index::types::{ChangeEvent, PackageMetadata};

/// The part of the index the metadata resolver needs.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// `Ok(None)` when the index has no record for this name/version.
    async fn release_data(&self, name: &str, version: &str) -> Result<Option<PackageMetadata>>;

    /// Known versions of a project, latest first.
    async fn package_releases(&self, name: &str) -> Result<Vec<String>>;

    fn name(&self) -> &'static str;
}

/// Full index surface used by the polling loop.
#[async_trait]
pub trait PackageIndex: ReleaseSource {
    /// All events since `since` (unix seconds). Malformed rows are dropped.
    async fn changelog(&self, since: i64) -> Result<Vec<ChangeEvent>>;

    /// Project names listed under all of `classifiers`.
    async fn browse(&self, classifiers: &[String]) -> Result<Vec<String>>;

    /// One browse per classifier. Adapters that can batch should override this.
    async fn browse_each(&self, classifiers: &[String]) -> Result<Vec<Vec<String>>> {
        let mut out = Vec::with_capacity(classifiers.len());
        for c in classifiers {
            out.push(self.browse(std::slice::from_ref(c)).await?);
        }
        Ok(out)
    }
}
