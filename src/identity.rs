//! Identity keys and deduplication against the published index.

use crate::constants::IDENTITY_SEPARATOR;
use crate::types::Brevet;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Composite key for providers without a stable id of their own.
///
/// Absent segments render empty so keys stay aligned with what was
/// published before.
pub fn identity_key(
    date_display: &str,
    distance: Option<u32>,
    country: &str,
    location: &str,
) -> String {
    let distance = distance.map(|d| d.to_string()).unwrap_or_default();
    [date_display, distance.as_str(), country, location].join(IDENTITY_SEPARATOR)
}

/// Key for providers that expose their own numeric id.
pub fn native_identity(prefix: &str, id: impl std::fmt::Display) -> String {
    format!("{prefix}{IDENTITY_SEPARATOR}{id}")
}

/// Point-in-time set of identities already present in the destination index
#[derive(Debug, Clone, Default)]
pub struct IdentitySnapshot {
    ids: HashSet<String>,
}

impl IdentitySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>) {
        self.ids.insert(id.into());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for IdentitySnapshot {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Events split by whether the index already knows them
#[derive(Debug, Default)]
pub struct Partition {
    pub fresh: Vec<Brevet>,
    pub existing: Vec<Brevet>,
}

/// Split `events` against `snapshot`, keeping input order in both halves.
pub fn partition(events: Vec<Brevet>, snapshot: &IdentitySnapshot) -> Partition {
    let (existing, fresh): (Vec<_>, Vec<_>) = events
        .into_iter()
        .partition(|b| snapshot.contains(&b.object_id));
    debug!(
        fresh = fresh.len(),
        existing = existing.len(),
        "Partitioned batch against index snapshot"
    );
    Partition { fresh, existing }
}

/// Keep the first brevet for each identity and drop later collisions.
pub fn dedupe_batch(events: Vec<Brevet>) -> Vec<Brevet> {
    let mut seen = HashSet::with_capacity(events.len());
    let mut out = Vec::with_capacity(events.len());
    for brevet in events {
        if seen.insert(brevet.object_id.clone()) {
            out.push(brevet);
        } else {
            warn!(object_id = %brevet.object_id, "Duplicate identity in batch, keeping first");
        }
    }
    out
}
