//! Sync points: what canonical and derived looked like when last in sync
//!
//! The decision engine compares live digests against these to tell a
//! direct edit of a derived artifact (pull it back) from independent edits
//! on both sides (conflict).

use chrono::{DateTime, Utc};
use ctx_fs::{ContentIdentity, NormalizedPath};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Identities of one mirror's two sides at its last synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPoint {
    pub canonical: ContentIdentity,
    pub derived: ContentIdentity,
    pub synced_at: DateTime<Utc>,
}

impl SyncPoint {
    pub fn new(canonical: ContentIdentity, derived: ContentIdentity) -> Self {
        Self {
            canonical,
            derived,
            synced_at: Utc::now(),
        }
    }
}

/// Sync points keyed by (tool slug, derived path identity).
#[derive(Debug, Default)]
pub struct SyncLedger {
    points: HashMap<(String, String), SyncPoint>,
}

impl SyncLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(tool: &str, derived: &NormalizedPath) -> (String, String) {
        (tool.to_string(), derived.identity_key())
    }

    pub fn get(&self, tool: &str, derived: &NormalizedPath) -> Option<&SyncPoint> {
        self.points.get(&Self::key(tool, derived))
    }

    /// Record the current identities as the new sync point.
    pub fn record(&mut self, tool: &str, derived: &NormalizedPath, point: SyncPoint) {
        debug!(tool, derived = %derived, "Advanced sync point");
        self.points.insert(Self::key(tool, derived), point);
    }

    /// Record a sync point only if the mirror has none yet.
    ///
    /// Returns `true` when a point was inserted.
    pub fn seed(&mut self, tool: &str, derived: &NormalizedPath, point: SyncPoint) -> bool {
        let key = Self::key(tool, derived);
        if self.points.contains_key(&key) {
            return false;
        }
        self.points.insert(key, point);
        true
    }

    pub fn remove(&mut self, tool: &str, derived: &NormalizedPath) -> Option<SyncPoint> {
        self.points.remove(&Self::key(tool, derived))
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
