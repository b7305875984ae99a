// src/publish/mod.rs
pub mod log;
pub mod twitter;

use crate::error::Result;

pub use self::log::LogPublisher;
pub use self::twitter::{TwitterCredentials, TwitterPublisher};

/// Posts one pre-composed status. Failures are not retried here.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, status: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}
