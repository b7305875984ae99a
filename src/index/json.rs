// src/index/json.rs
//! HTTP+JSON variant of the index (`GET <base>/<name>/json`). It only
//! exposes release metadata, so it can back the resolver but not the loop.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::index::types::PackageMetadata;
use crate::index::ReleaseSource;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    info: T,
}

#[derive(Debug, Deserialize)]
struct LatestInfo {
    #[serde(default)]
    version: Option<String>,
}

#[derive(Clone)]
pub struct JsonIndex {
    base: String,
    client: reqwest::Client,
}

impl JsonIndex {
    pub fn new(base: impl Into<String>) -> Self {
        Self::with_client(base, reqwest::Client::new())
    }

    pub fn with_client(base: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn project_url(&self, name: &str) -> String {
        format!("{}/{}/json", self.base, urlencoding::encode(name))
    }

    fn release_url(&self, name: &str, version: &str) -> String {
        format!(
            "{}/{}/{}/json",
            self.base,
            urlencoding::encode(name),
            urlencoding::encode(version)
        )
    }

    /// `Ok(None)` on 404.
    async fn get_info<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status.is_server_error() {
            return Err(Error::TransientFetch(format!("GET {url}: HTTP {status}")));
        }
        if !status.is_success() {
            return Err(Error::Decode(format!("GET {url}: HTTP {status}")));
        }
        let body = resp.text().await?;
        let env: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| Error::Decode(format!("GET {url}: {e}")))?;
        Ok(Some(env.info))
    }
}

#[async_trait]
impl ReleaseSource for JsonIndex {
    async fn release_data(&self, name: &str, version: &str) -> Result<Option<PackageMetadata>> {
        self.get_info(&self.release_url(name, version)).await
    }

    /// The JSON API only names the latest release.
    async fn package_releases(&self, name: &str) -> Result<Vec<String>> {
        let info: Option<LatestInfo> = self.get_info(&self.project_url(name)).await?;
        Ok(info.and_then(|i| i.version).into_iter().collect())
    }

    fn name(&self) -> &'static str {
        "json"
    }
}
