// src/config.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "HERALD_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/herald.toml";

pub const DEFAULT_INTERVAL_SECS: u64 = 2 * 60;
pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/pypi";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MIRROR_URL: &str = "https://crate.io/packages";
pub const DEFAULT_CLASSIFIERS: [&str; 5] = [
    "Programming Language :: Python :: 3",
    "Programming Language :: Python :: 3.0",
    "Programming Language :: Python :: 3.1",
    "Programming Language :: Python :: 3.2",
    "Programming Language :: Python :: 3.3",
];

/// Where release metadata is fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataBackend {
    Xmlrpc,
    Json,
}

impl std::str::FromStr for MetadataBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xmlrpc" => Ok(MetadataBackend::Xmlrpc),
            "json" => Ok(MetadataBackend::Json),
            other => Err(anyhow!("unknown metadata backend: {other}")),
        }
    }
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}
fn default_index_url() -> String {
    DEFAULT_INDEX_URL.to_string()
}
fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_mirror_url() -> String {
    DEFAULT_MIRROR_URL.to_string()
}
fn default_classifiers() -> Vec<String> {
    DEFAULT_CLASSIFIERS.iter().map(|c| c.to_string()).collect()
}
fn default_backend() -> MetadataBackend {
    MetadataBackend::Xmlrpc
}
fn default_index_label() -> String {
    "pypi:".to_string()
}
fn default_homepage_label() -> String {
    "www:".to_string()
}
fn default_hashtag() -> String {
    "#python".to_string()
}

/// Static process configuration. Read once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// XML-RPC endpoint; also the base of the per-project page link.
    #[serde(default = "default_index_url")]
    pub index_url: String,
    #[serde(default = "default_classifiers")]
    pub classifiers: Vec<String>,
    /// Per metadata request.
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_backend")]
    pub metadata: MetadataBackend,
    /// Fallback link when a project has no home page.
    #[serde(default = "default_mirror_url")]
    pub mirror_url: String,
    #[serde(default = "default_index_label")]
    pub index_label: String,
    #[serde(default = "default_homepage_label")]
    pub homepage_label: String,
    #[serde(default = "default_hashtag")]
    pub hashtag: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            index_url: default_index_url(),
            classifiers: default_classifiers(),
            request_timeout_secs: default_timeout(),
            metadata: default_backend(),
            mirror_url: default_mirror_url(),
            index_label: default_index_label(),
            homepage_label: default_homepage_label(),
            hashtag: default_hashtag(),
        }
    }
}

impl Config {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn interest(&self) -> BTreeSet<String> {
        self.classifiers.iter().cloned().collect()
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(s).context("parsing herald config")?;
        cfg.normalized()
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $HERALD_CONFIG_PATH
    /// 2) config/herald.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        let base = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_CONFIG_PATH} points to non-existent path");
            }
            Self::load_from(&pb)?
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::load_from(Path::new(DEFAULT_CONFIG_PATH))?
        } else {
            Self::default()
        };
        base.with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(v) = env_parse::<u64>("HERALD_INTERVAL_SECS")? {
            self.interval_secs = v;
        }
        if let Ok(v) = std::env::var("HERALD_INDEX_URL") {
            self.index_url = v;
        }
        if let Some(v) = env_parse::<u64>("HERALD_TIMEOUT_SECS")? {
            self.request_timeout_secs = v;
        }
        if let Some(v) = env_parse::<MetadataBackend>("HERALD_METADATA")? {
            self.metadata = v;
        }
        self.normalized()
    }

    fn normalized(mut self) -> Result<Self> {
        self.index_url = self.index_url.trim().trim_end_matches('/').to_string();
        self.mirror_url = self.mirror_url.trim().trim_end_matches('/').to_string();
        self.classifiers = clean_list(std::mem::take(&mut self.classifiers));

        if self.interval_secs == 0 {
            bail!("interval_secs must be positive");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be positive");
        }
        if self.classifiers.is_empty() {
            bail!("at least one classifier is required");
        }
        if self.index_url.is_empty() {
            bail!("index_url must not be empty");
        }
        Ok(self)
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("invalid {key}={v:?}: {e}")),
        Err(_) => Ok(None),
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut set = BTreeSet::new();
    for it in items {
        let t = it.trim();
        if !t.is_empty() {
            set.insert(t.to_string());
        }
    }
    set.into_iter().collect()
}
