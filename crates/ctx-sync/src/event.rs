//! Change events and watcher notifications

use ctx_fs::{ContentIdentity, Digest, NormalizedPath};
use ctx_tools::BindingInfo;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::decision::Conflict;
use crate::executor::SyncOutcome;

/// Kind of existence or content transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Changed,
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Changed => "changed",
            Self::Deleted => "deleted",
        })
    }
}

/// A classified transition of one tracked path between two observations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: NormalizedPath,
    pub kind: ChangeKind,
    /// Digest before the transition (`Changed`, `Deleted`)
    pub previous: Option<Digest>,
    /// Digest after the transition (`Created`, `Changed`)
    pub current: Option<Digest>,
}

impl ChangeEvent {
    /// Compare two readable identities of `path`.
    ///
    /// Existence transitions take precedence over content: absent to present
    /// is `Created` even when the content matches what was there before.
    pub fn classify(
        path: &NormalizedPath,
        previous: &ContentIdentity,
        current: &ContentIdentity,
    ) -> Option<Self> {
        let kind = match (previous, current) {
            (ContentIdentity::Absent, ContentIdentity::Present(_)) => ChangeKind::Created,
            (ContentIdentity::Present(_), ContentIdentity::Absent) => ChangeKind::Deleted,
            (ContentIdentity::Present(a), ContentIdentity::Present(b)) if a != b => {
                ChangeKind::Changed
            }
            _ => return None,
        };
        Some(Self {
            path: path.clone(),
            kind,
            previous: previous.digest().cloned(),
            current: current.digest().cloned(),
        })
    }
}

/// Notification delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The background poll loop started
    Ready,
    Created {
        path: NormalizedPath,
        bindings: Vec<BindingInfo>,
    },
    Changed {
        path: NormalizedPath,
        previous: Digest,
        current: Digest,
        bindings: Vec<BindingInfo>,
    },
    Deleted {
        path: NormalizedPath,
        bindings: Vec<BindingInfo>,
    },
    /// The background poll loop stopped
    Stopped,
    /// A propagate, pullback or resolution was written
    Synced(SyncOutcome),
    /// Independent divergence needing an external decision
    Conflict(Conflict),
    /// An action could not be materialized; retried next poll
    SyncFailed { path: NormalizedPath, error: String },
}

impl WatchEvent {
    /// Notification for a change event; `None` for a malformed event.
    pub(crate) fn from_change(event: &ChangeEvent, bindings: Vec<BindingInfo>) -> Option<Self> {
        let path = event.path.clone();
        Some(match event.kind {
            ChangeKind::Created => Self::Created { path, bindings },
            ChangeKind::Deleted => Self::Deleted { path, bindings },
            ChangeKind::Changed => Self::Changed {
                path,
                previous: event.previous.clone()?,
                current: event.current.clone()?,
                bindings,
            },
        })
    }
}

impl fmt::Display for WatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::Stopped => write!(f, "stopped"),
            Self::Created { path, .. } => write!(f, "created {}", path),
            Self::Deleted { path, .. } => write!(f, "deleted {}", path),
            Self::Changed {
                path,
                previous,
                current,
                ..
            } => write!(
                f,
                "changed {} ({} -> {})",
                path,
                previous.short(),
                current.short()
            ),
            Self::Synced(outcome) => write!(f, "synced {}", outcome),
            Self::Conflict(conflict) => write!(f, "conflict {}", conflict),
            Self::SyncFailed { path, error } => write!(f, "sync failed {}: {}", path, error),
        }
    }
}
