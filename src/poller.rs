// src/poller.rs
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use tokio::time::Instant;

use crate::classify::classify;
use crate::compose::Composer;
use crate::config::Config;
use crate::error::Result;
use crate::index::PackageIndex;
use crate::known::{seed, KnownSet};
use crate::publish::Publisher;
use crate::resolver::MetadataResolver;

/// Outcome of one polling cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub events: usize,
    pub announcements: usize,
    pub published: usize,
    pub failed: usize,
}

/// Time left in the interval after a cycle that took `elapsed`.
pub fn remaining_pause(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// The polling loop. Only exists once the known set has been seeded.
pub struct Poller {
    index: Arc<dyn PackageIndex>,
    publisher: Arc<dyn Publisher>,
    resolver: MetadataResolver,
    composer: Composer,
    interest: BTreeSet<String>,
    interval: Duration,
    known: KnownSet,
}

impl Poller {
    /// Seeding state: build the known set from the index. Errors here are
    /// fatal; the loop never starts without a seeded set.
    pub async fn seed(
        cfg: &Config,
        index: Arc<dyn PackageIndex>,
        resolver: MetadataResolver,
        publisher: Arc<dyn Publisher>,
    ) -> Result<Self> {
        let known = seed(&cfg.classifiers, index.as_ref()).await?;
        Ok(Self::with_known(cfg, index, resolver, publisher, known))
    }

    pub fn with_known(
        cfg: &Config,
        index: Arc<dyn PackageIndex>,
        resolver: MetadataResolver,
        publisher: Arc<dyn Publisher>,
        known: KnownSet,
    ) -> Self {
        gauge!("herald_known_projects").set(known.len() as f64);
        Self {
            index,
            publisher,
            resolver,
            composer: Composer::from_config(cfg),
            interest: cfg.interest(),
            interval: cfg.interval(),
            known,
        }
    }

    pub fn known(&self) -> &KnownSet {
        &self.known
    }

    /// One cycle over the changelog window ending at `now` (unix seconds).
    /// Every failure is contained: the report says what happened.
    pub async fn run_cycle(&mut self, now: i64) -> CycleReport {
        counter!("herald_cycles_total").increment(1);
        let mut report = CycleReport::default();

        let since = now - self.interval.as_secs() as i64;
        let events = match self.index.changelog(since).await {
            Ok(evs) => evs,
            Err(e) => {
                tracing::warn!(target: "poller", since, error = %e, "changelog fetch failed");
                counter!("herald_changelog_errors_total").increment(1);
                return report;
            }
        };
        report.events = events.len();
        counter!("herald_events_total").increment(events.len() as u64);
        if !events.is_empty() {
            tracing::debug!(target: "poller", ?events, "changelog batch");
        }

        let announcements =
            classify(&events, &mut self.known, &self.interest, &self.resolver).await;
        report.announcements = announcements.len();
        gauge!("herald_known_projects").set(self.known.len() as f64);

        for a in &announcements {
            let status = self.composer.compose(&a.name, &a.metadata, a.tag);
            counter!("herald_announcements_total", "kind" => a.tag.as_str()).increment(1);
            match self.publisher.publish(&status).await {
                Ok(()) => {
                    report.published += 1;
                    tracing::info!(
                        target: "poller",
                        name = %a.name,
                        kind = a.tag.as_str(),
                        publisher = self.publisher.name(),
                        "announced"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    counter!("herald_publish_errors_total").increment(1);
                    tracing::error!(
                        target: "poller",
                        name = %a.name,
                        publisher = self.publisher.name(),
                        error = %e,
                        "publish failed"
                    );
                }
            }
        }

        report
    }

    /// Polling state. Waits one interval after seeding, then runs a cycle
    /// per interval with the processing time taken out of each pause.
    /// Never returns.
    pub async fn run(mut self) {
        tokio::time::sleep(self.interval).await;
        loop {
            let started = Instant::now();
            let report = self.run_cycle(chrono::Utc::now().timestamp()).await;
            let elapsed = started.elapsed();
            histogram!("herald_cycle_ms").record(elapsed.as_secs_f64() * 1_000.0);

            tracing::info!(
                target: "poller",
                events = report.events,
                announced = report.published,
                failed = report.failed,
                known = self.known.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "cycle done"
            );
            tokio::time::sleep(remaining_pause(self.interval, elapsed)).await;
        }
    }
}
