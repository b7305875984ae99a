// src/telemetry.rs
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_METRICS_ADDR: &str = "HERALD_METRICS_ADDR";

/// Used when `RUST_LOG` is unset. Core modules log under short targets.
pub const DEFAULT_FILTER: &str =
    "release_herald=info,poller=info,classify=info,known=info,resolver=info,index=info,publish=info,warn";

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("herald_cycles_total", "Polling cycles run.");
        describe_counter!("herald_events_total", "Changelog events fetched.");
        describe_counter!(
            "herald_malformed_events_total",
            "Changelog rows dropped as malformed."
        );
        describe_counter!(
            "herald_resolve_errors_total",
            "Events skipped because metadata could not be resolved."
        );
        describe_counter!(
            "herald_announcements_total",
            "Announcements produced, by kind."
        );
        describe_counter!("herald_publish_errors_total", "Failed publish attempts.");
        describe_counter!(
            "herald_changelog_errors_total",
            "Cycles whose changelog fetch failed."
        );
        describe_gauge!("herald_known_projects", "Size of the known-project set.");
        describe_histogram!("herald_cycle_ms", "Cycle processing time in milliseconds.");
    });
}

/// Install tracing. `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

/// Start the Prometheus listener when `HERALD_METRICS_ADDR` is set.
/// Must run inside the tokio runtime.
pub fn init_metrics_exporter() -> anyhow::Result<()> {
    ensure_metrics_described();
    let Ok(addr) = std::env::var(ENV_METRICS_ADDR) else {
        tracing::debug!("metrics exporter disabled (no {ENV_METRICS_ADDR})");
        return Ok(());
    };
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid {ENV_METRICS_ADDR}={addr:?}: {e}"))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("prometheus: install exporter: {e}"))?;
    tracing::info!(%addr, "metrics exporter listening");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn default_filter_keeps_core_info_logs() {
        let subscriber = tracing_subscriber::registry().with(EnvFilter::new(DEFAULT_FILTER));
        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(target: "poller", Level::INFO));
            assert!(tracing::enabled!(target: "classify", Level::INFO));
            assert!(tracing::enabled!(target: "known", Level::INFO));
            assert!(tracing::enabled!(target: "publish", Level::INFO));
            assert!(!tracing::enabled!(target: "classify", Level::DEBUG));
            assert!(!tracing::enabled!(target: "hyper", Level::INFO));
            assert!(tracing::enabled!(target: "hyper", Level::WARN));
        });
    }
}
