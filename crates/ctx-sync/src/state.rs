//! Last-observed identity of every tracked path

use chrono::{DateTime, Utc};
use ctx_fs::{ContentIdentity, Digest, NormalizedPath, identify};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::{debug, warn};

/// What a single look at a path found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum Observation {
    /// Nothing exists at the path
    Absent,
    /// The path exists and hashed to `digest`
    Present { digest: Digest },
    /// The path exists but its digest could not be computed.
    ///
    /// `last_known` carries the last readable identity forward so the next
    /// successful observation is compared against it.
    Unreadable {
        reason: String,
        last_known: Option<ContentIdentity>,
    },
}

/// The last-known identity of a tracked path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathState {
    pub observation: Observation,
    pub observed_at: DateTime<Utc>,
}

impl PathState {
    /// Look at `path` now.
    ///
    /// `previous` is only consulted when the path turns out to be
    /// unreadable, to carry its baseline forward.
    pub fn observe(path: &NormalizedPath, previous: Option<&PathState>) -> Self {
        let observation = match identify(&path.to_native()) {
            Ok(ContentIdentity::Absent) => Observation::Absent,
            Ok(ContentIdentity::Present(digest)) => Observation::Present { digest },
            Err(e) => {
                warn!(path = %path, error = %e, "Failed to compute digest");
                Observation::Unreadable {
                    reason: e.to_string(),
                    last_known: previous.and_then(PathState::baseline),
                }
            }
        };
        Self {
            observation,
            observed_at: Utc::now(),
        }
    }

    pub fn exists(&self) -> bool {
        !matches!(self.observation, Observation::Absent)
    }

    /// Digest of the content; `None` when absent or unreadable.
    pub fn digest(&self) -> Option<&Digest> {
        match &self.observation {
            Observation::Present { digest } => Some(digest),
            _ => None,
        }
    }

    pub fn is_unreadable(&self) -> bool {
        matches!(self.observation, Observation::Unreadable { .. })
    }

    /// Identity the next observation is compared against.
    ///
    /// `None` means no readable identity has been seen yet.
    pub fn baseline(&self) -> Option<ContentIdentity> {
        match &self.observation {
            Observation::Absent => Some(ContentIdentity::Absent),
            Observation::Present { digest } => Some(ContentIdentity::Present(digest.clone())),
            Observation::Unreadable { last_known, .. } => last_known.clone(),
        }
    }
}

/// Mapping from path identity to its last observed state.
///
/// Written only by the sync session and the executor, one path at a time.
#[derive(Debug, Default)]
pub struct StateStore {
    states: HashMap<String, PathState>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-derive the state of `path` from disk and store it.
    pub fn record_current(&mut self, path: &NormalizedPath) -> &PathState {
        let key = path.identity_key();
        let state = PathState::observe(path, self.states.get(&key));
        debug!(path = %path, exists = state.exists(), "Recorded path state");
        match self.states.entry(key) {
            Entry::Occupied(mut entry) => {
                entry.insert(state);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(state),
        }
    }

    /// Last stored state; `None` if the path was never recorded.
    pub fn get(&self, path: &NormalizedPath) -> Option<&PathState> {
        self.states.get(&path.identity_key())
    }

    pub fn contains(&self, path: &NormalizedPath) -> bool {
        self.states.contains_key(&path.identity_key())
    }

    pub fn commit(&mut self, path: &NormalizedPath, state: PathState) {
        self.states.insert(path.identity_key(), state);
    }

    pub fn remove(&mut self, path: &NormalizedPath) -> Option<PathState> {
        self.states.remove(&path.identity_key())
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
