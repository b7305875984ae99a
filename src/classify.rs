// src/classify.rs
//! Turns a changelog batch into announcements.
//!
//! Events sharing a timestamp arrive in no particular order, so a
//! `classifiers` record may precede the `create` record of the same project.
//! Creations are therefore handled in a first pass over the whole batch and
//! updates in a second one; a project announced as new is already known when
//! the second pass reaches it. An event tagged as both a creation and an
//! update belongs to the first pass only.

use std::collections::BTreeSet;

use metrics::counter;

use crate::compose::EventTag;
use crate::index::types::{ChangeEvent, PackageMetadata};
use crate::known::KnownSet;
use crate::resolver::MetadataResolver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub name: String,
    pub metadata: PackageMetadata,
    pub tag: EventTag,
}

pub async fn classify(
    events: &[ChangeEvent],
    known: &mut KnownSet,
    interest: &BTreeSet<String>,
    resolver: &MetadataResolver,
) -> Vec<Announcement> {
    let mut out = Vec::new();

    for ev in events.iter().filter(|ev| ev.is_creation()) {
        if let Some(a) = consider(ev, EventTag::New, known, interest, resolver).await {
            out.push(a);
        }
    }

    for ev in events.iter().filter(|ev| ev.is_update() && !ev.is_creation()) {
        if let Some(a) = consider(ev, EventTag::Update, known, interest, resolver).await {
            out.push(a);
        }
    }

    out
}

async fn consider(
    ev: &ChangeEvent,
    tag: EventTag,
    known: &mut KnownSet,
    interest: &BTreeSet<String>,
    resolver: &MetadataResolver,
) -> Option<Announcement> {
    if known.contains(&ev.name) {
        return None;
    }

    let metadata = match resolver.resolve(&ev.name, ev.version.as_deref()).await {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(
                target: "classify",
                name = %ev.name,
                version = ?ev.version,
                kind = e.kind(),
                error = %e,
                "skipping event, metadata unavailable"
            );
            counter!("herald_resolve_errors_total", "kind" => e.kind()).increment(1);
            return None;
        }
    };

    if !metadata.matches_any(interest) {
        tracing::trace!(target: "classify", name = %ev.name, "no interest classifier");
        return None;
    }

    known.insert(&ev.name);
    tracing::debug!(target: "classify", name = %ev.name, tag = tag.as_str(), "matched");
    Some(Announcement {
        name: ev.name.clone(),
        metadata,
        tag,
    })
}
