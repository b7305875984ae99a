//! release-herald: binary entrypoint.
//! Seeds the known-project set, then polls the index changelog forever.

use std::sync::Arc;

use anyhow::Context;
use release_herald::config::{Config, MetadataBackend};
use release_herald::index::json::JsonIndex;
use release_herald::index::xmlrpc::XmlRpcIndex;
use release_herald::index::{PackageIndex, ReleaseSource};
use release_herald::publish::{LogPublisher, Publisher, TwitterCredentials, TwitterPublisher};
use release_herald::{telemetry, MetadataResolver, Poller};

fn dry_run() -> bool {
    std::env::var("HERALD_DRY_RUN")
        .ok()
        .is_some_and(|v| v == "1")
}

fn build_publisher() -> anyhow::Result<Arc<dyn Publisher>> {
    if dry_run() {
        tracing::warn!("HERALD_DRY_RUN=1: announcements are logged, not posted");
        return Ok(Arc::new(LogPublisher));
    }
    let creds = TwitterCredentials::from_env().context("loading publisher credentials")?;
    Ok(Arc::new(TwitterPublisher::new(creds)))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();
    telemetry::init_metrics_exporter()?;

    let cfg = Config::load_default().context("loading configuration")?;
    tracing::info!(
        interval_secs = cfg.interval_secs,
        index_url = %cfg.index_url,
        classifiers = cfg.classifiers.len(),
        metadata = ?cfg.metadata,
        "configuration loaded"
    );

    let publisher = build_publisher()?;

    let index = Arc::new(XmlRpcIndex::new(cfg.index_url.clone()));
    let source: Arc<dyn ReleaseSource> = match cfg.metadata {
        MetadataBackend::Xmlrpc => index.clone(),
        MetadataBackend::Json => Arc::new(JsonIndex::new(cfg.index_url.clone())),
    };
    let resolver = MetadataResolver::new(source, cfg.request_timeout());

    let index: Arc<dyn PackageIndex> = index;
    let poller = Poller::seed(&cfg, index, resolver, publisher)
        .await
        .context("seeding known projects")?;

    poller.run().await;
    Ok(())
}
