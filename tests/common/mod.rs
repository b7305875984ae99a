// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use release_herald::error::{Error, Result};
use release_herald::index::types::{ChangeEvent, PackageMetadata};
use release_herald::index::{PackageIndex, ReleaseSource};
use release_herald::publish::Publisher;
use release_herald::MetadataResolver;

pub const PY3: &str = "Programming Language :: Python :: 3";
pub const PY2: &str = "Programming Language :: Python :: 2";

pub fn interest() -> BTreeSet<String> {
    [PY3.to_string()].into_iter().collect()
}

pub fn meta(classifiers: &[&str], summary: Option<&str>) -> PackageMetadata {
    PackageMetadata {
        classifiers: classifiers.iter().map(|c| c.to_string()).collect(),
        summary: summary.map(str::to_string),
        home_page: None,
    }
}

pub fn event(name: &str, version: Option<&str>, ts: i64, actions: &str) -> ChangeEvent {
    ChangeEvent::new(name, version, ts, actions)
}

pub fn resolver(index: Arc<FakeIndex>) -> MetadataResolver {
    MetadataResolver::new(index, Duration::from_secs(5))
}

/// In-memory index. Releases are listed latest first.
#[derive(Default)]
pub struct FakeIndex {
    releases: HashMap<(String, String), PackageMetadata>,
    versions: HashMap<String, Vec<String>>,
    browse: HashMap<String, Vec<String>>,
    changelog: Vec<ChangeEvent>,
    fail_changelog: bool,
    changelog_delay: Option<Duration>,
    hanging: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_release(mut self, name: &str, version: &str, meta: PackageMetadata) -> Self {
        self.releases
            .insert((name.to_string(), version.to_string()), meta);
        self.versions
            .entry(name.to_string())
            .or_default()
            .insert(0, version.to_string());
        self
    }

    pub fn with_browse(mut self, classifier: &str, names: &[&str]) -> Self {
        self.browse.insert(
            classifier.to_string(),
            names.iter().map(|n| n.to_string()).collect(),
        );
        self
    }

    pub fn with_changelog(mut self, events: Vec<ChangeEvent>) -> Self {
        self.changelog = events;
        self
    }

    pub fn failing_changelog(mut self) -> Self {
        self.fail_changelog = true;
        self
    }

    /// Every changelog call takes `delay` before answering.
    pub fn slow_changelog(mut self, delay: Duration) -> Self {
        self.changelog_delay = Some(delay);
        self
    }

    /// `release_data` for this project never answers.
    pub fn hanging_on(mut self, name: &str) -> Self {
        self.hanging.insert(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

#[async_trait]
impl ReleaseSource for FakeIndex {
    async fn release_data(&self, name: &str, version: &str) -> Result<Option<PackageMetadata>> {
        self.calls.lock().push(format!("release_data {name} {version}"));
        if self.hanging.contains(name) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(self
            .releases
            .get(&(name.to_string(), version.to_string()))
            .cloned())
    }

    async fn package_releases(&self, name: &str) -> Result<Vec<String>> {
        self.calls.lock().push(format!("package_releases {name}"));
        Ok(self.versions.get(name).cloned().unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

#[async_trait]
impl PackageIndex for FakeIndex {
    async fn changelog(&self, since: i64) -> Result<Vec<ChangeEvent>> {
        self.calls.lock().push(format!("changelog {since}"));
        if let Some(delay) = self.changelog_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_changelog {
            return Err(Error::TransientFetch("index unreachable".into()));
        }
        Ok(self
            .changelog
            .iter()
            .filter(|e| e.timestamp >= since)
            .cloned()
            .collect())
    }

    async fn browse(&self, classifiers: &[String]) -> Result<Vec<String>> {
        self.calls.lock().push(format!("browse {}", classifiers.join("|")));
        let mut lists = classifiers
            .iter()
            .map(|c| self.browse.get(c).cloned().unwrap_or_default());
        let first = lists.next().unwrap_or_default();
        let rest: Vec<Vec<String>> = lists.collect();
        Ok(first
            .into_iter()
            .filter(|n| rest.iter().all(|l| l.contains(n)))
            .collect())
    }
}

/// Publisher that records statuses and fails for those containing `fail_on`.
#[derive(Default)]
pub struct RecordingPublisher {
    posted: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(needle: &str) -> Self {
        Self {
            posted: Mutex::new(Vec::new()),
            fail_on: Some(needle.to_string()),
        }
    }

    pub fn posted(&self) -> Vec<String> {
        self.posted.lock().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, status: &str) -> Result<()> {
        if let Some(needle) = &self.fail_on {
            if status.contains(needle.as_str()) {
                return Err(Error::Publish("rate limited (HTTP 429)".into()));
            }
        }
        self.posted.lock().push(status.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
