// src/resolver.rs
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::index::types::PackageMetadata;
use crate::index::ReleaseSource;

/// Fetches metadata for a name/version. Holds no state besides the source.
#[derive(Clone)]
pub struct MetadataResolver {
    source: Arc<dyn ReleaseSource>,
    timeout: Duration,
}

impl MetadataResolver {
    /// `timeout` bounds every individual index call.
    pub fn new(source: Arc<dyn ReleaseSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Resolve metadata. A transient failure on the first attempt (timeouts,
    /// transport errors, or an absent version) is retried once against the
    /// first entry of the project's release list.
    pub async fn resolve(&self, name: &str, version: Option<&str>) -> Result<PackageMetadata> {
        let first = match version {
            Some(v) => self.release_data(name, v).await,
            None => Err(Error::TransientFetch(format!(
                "{name}: index reported no version"
            ))),
        };

        match first {
            Err(e) if e.is_transient() => {
                tracing::debug!(
                    target: "resolver",
                    name,
                    error = %e,
                    "retrying via release list"
                );
                let latest = self.latest_version(name).await?;
                self.release_data(name, &latest).await
            }
            other => other,
        }
    }

    async fn release_data(&self, name: &str, version: &str) -> Result<PackageMetadata> {
        self.bounded(self.source.release_data(name, version))
            .await?
            .ok_or_else(|| Error::not_found(name, Some(version)))
    }

    async fn latest_version(&self, name: &str) -> Result<String> {
        self.bounded(self.source.package_releases(name))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(name, None))
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| {
                Error::TransientFetch(format!(
                    "{} index call timed out after {:?}",
                    self.source.name(),
                    self.timeout
                ))
            })?
    }
}
