// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod error;
pub mod config;
pub mod telemetry;

// Index collaborators (XML-RPC + JSON)
pub mod index;

// Change detection core
pub mod resolver;
pub mod compose;
pub mod known;
pub mod classify;
pub mod poller;

// Outbound announcements
pub mod publish;

// ---- Re-exports for stable public API ----
pub use crate::classify::{classify, Announcement};
pub use crate::compose::{Composer, EventTag};
pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::index::types::{ChangeEvent, PackageMetadata};
pub use crate::index::{PackageIndex, ReleaseSource};
pub use crate::known::{seed, KnownSet};
pub use crate::poller::{CycleReport, Poller};
pub use crate::publish::Publisher;
pub use crate::resolver::MetadataResolver;
