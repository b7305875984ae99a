// src/publish/log.rs
use crate::error::Result;

use super::Publisher;

/// Dry-run publisher: logs the status instead of posting it.
#[derive(Debug, Clone, Default)]
pub struct LogPublisher;

#[async_trait::async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, status: &str) -> Result<()> {
        tracing::info!(target: "publish", status, "dry run, not posting");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
