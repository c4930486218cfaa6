//! Sync executor
//!
//! Materializes propagate and pullback actions with atomic writes, then
//! refreshes the state store and advances the sync point. Nothing is
//! recorded for a write that did not complete.

use ctx_fs::{ContentIdentity, Digest, NormalizedPath, RobustnessConfig, identify, io};
use ctx_tools::MirrorKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::decision::{Conflict, ConflictReason, SyncAction};
use crate::ledger::{SyncLedger, SyncPoint};
use crate::state::StateStore;
use crate::{Error, Result};

/// Direction content flowed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    CanonicalToDerived,
    DerivedToCanonical,
    /// The target was removed to accept a deletion
    Removal,
}

/// One completed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub tool: String,
    pub direction: SyncDirection,
    pub source: NormalizedPath,
    pub target: NormalizedPath,
    /// Identity of the target after the write; `None` after a removal
    pub digest: Option<Digest>,
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            SyncDirection::Removal => write!(f, "removed {} ({})", self.target, self.tool),
            _ => write!(f, "{} -> {} ({})", self.source, self.target, self.tool),
        }
    }
}

/// How an external policy settles a [`Conflict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Overwrite the derived artifact, or remove it if the canonical is gone
    CanonicalWins,
    /// Overwrite the canonical with the derived content
    DerivedWins,
    /// Leave both sides alone
    Defer,
}

/// Applies actions against the session's state store and sync ledger.
pub struct Executor<'a> {
    states: &'a mut StateStore,
    ledger: &'a mut SyncLedger,
    robustness: RobustnessConfig,
}

impl<'a> Executor<'a> {
    pub fn new(
        states: &'a mut StateStore,
        ledger: &'a mut SyncLedger,
        robustness: RobustnessConfig,
    ) -> Self {
        Self {
            states,
            ledger,
            robustness,
        }
    }

    /// Apply `action`. Conflicts and no-ops write nothing and yield no
    /// results; a propagate yields one result per target.
    pub fn execute(&mut self, action: &SyncAction) -> Vec<Result<SyncOutcome>> {
        match action {
            SyncAction::Propagate {
                canonical,
                kind,
                targets,
            } => targets
                .iter()
                .map(|target| {
                    self.copy(
                        &target.tool,
                        canonical,
                        &target.derived,
                        *kind,
                        SyncDirection::CanonicalToDerived,
                    )
                })
                .collect(),
            SyncAction::Pullback {
                tool,
                derived,
                canonical,
                kind,
            } => vec![self.copy(tool, derived, canonical, *kind, SyncDirection::DerivedToCanonical)],
            SyncAction::Conflict(_) | SyncAction::Noop { .. } => Vec::new(),
        }
    }

    /// Settle a conflict. `Defer` returns `Ok(None)`.
    pub fn resolve(&mut self, conflict: &Conflict, resolution: Resolution) -> Result<Option<SyncOutcome>> {
        let Conflict {
            tool,
            canonical,
            derived,
            kind,
            ..
        } = conflict;

        match resolution {
            Resolution::Defer => Ok(None),
            Resolution::CanonicalWins if !canonical.exists() => {
                io::remove_path(derived).map_err(|e| Error::write(derived.to_native(), e))?;
                self.settle(tool, canonical, derived, derived)?;
                info!(tool = %tool, path = %derived, "Removed derived artifact of deleted canonical");
                Ok(Some(SyncOutcome {
                    tool: tool.clone(),
                    direction: SyncDirection::Removal,
                    source: canonical.clone(),
                    target: derived.clone(),
                    digest: None,
                }))
            }
            Resolution::CanonicalWins => self
                .copy(tool, canonical, derived, *kind, SyncDirection::CanonicalToDerived)
                .map(Some),
            Resolution::DerivedWins if conflict.reason == ConflictReason::DerivedDeleted => {
                // Accept the deletion: the missing artifact becomes the sync point.
                self.settle(tool, canonical, derived, derived)?;
                Ok(None)
            }
            Resolution::DerivedWins => self
                .copy(tool, derived, canonical, *kind, SyncDirection::DerivedToCanonical)
                .map(Some),
        }
    }

    fn copy(
        &mut self,
        tool: &str,
        source: &NormalizedPath,
        target: &NormalizedPath,
        kind: MirrorKind,
        direction: SyncDirection,
    ) -> Result<SyncOutcome> {
        match kind {
            MirrorKind::File => {
                let bytes = io::read_bytes(source).map_err(|e| Error::read(source.to_native(), e))?;
                io::write_atomic(target, &bytes, self.robustness)
                    .map_err(|e| Error::write(target.to_native(), e))?;
            }
            MirrorKind::Directory => {
                let source_native = source.to_native();
                io::copy_tree(source, target, self.robustness).map_err(|e| {
                    let unreadable_source = matches!(
                        &e,
                        ctx_fs::Error::Io { path, .. } if path.starts_with(&source_native)
                    );
                    if unreadable_source {
                        Error::read(&source_native, e)
                    } else {
                        Error::write(target.to_native(), e)
                    }
                })?;
            }
        }

        let (canonical, derived) = match direction {
            SyncDirection::DerivedToCanonical => (target, source),
            _ => (source, target),
        };
        let digest = self.settle(tool, canonical, derived, target)?;
        info!(tool, from = %source, to = %target, "Synced");

        Ok(SyncOutcome {
            tool: tool.to_string(),
            direction,
            source: source.clone(),
            target: target.clone(),
            digest,
        })
    }

    /// Refresh the written path if tracked and advance the mirror's sync
    /// point to the current identities. Returns the target's digest.
    fn settle(
        &mut self,
        tool: &str,
        canonical: &NormalizedPath,
        derived: &NormalizedPath,
        written: &NormalizedPath,
    ) -> Result<Option<Digest>> {
        if self.states.contains(written) {
            self.states.record_current(written);
        }

        let canonical_identity = current_identity(canonical)?;
        let derived_identity = current_identity(derived)?;
        let digest = if written == canonical {
            canonical_identity.digest().cloned()
        } else {
            derived_identity.digest().cloned()
        };
        self.ledger.record(
            tool,
            derived,
            SyncPoint::new(canonical_identity, derived_identity),
        );
        Ok(digest)
    }
}

fn current_identity(path: &NormalizedPath) -> Result<ContentIdentity> {
    identify(&path.to_native()).map_err(|e| {
        warn!(path = %path, error = %e, "Failed to identify after write");
        Error::read(path.to_native(), e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::SyncTarget;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn propagate_overwrites_target_and_advances_ledger() {
        let dir = tempdir().unwrap();
        let root = NormalizedPath::new(dir.path());
        fs::write(dir.path().join("context.md"), "B").unwrap();
        fs::write(dir.path().join("copilot.md"), "A").unwrap();

        let mut states = StateStore::new();
        let mut ledger = SyncLedger::new();
        let derived = root.join("copilot.md");
        states.record_current(&derived);

        let action = SyncAction::Propagate {
            canonical: root.join("context.md"),
            kind: MirrorKind::File,
            targets: vec![SyncTarget {
                tool: "copilot".into(),
                derived: derived.clone(),
            }],
        };
        let results = Executor::new(&mut states, &mut ledger, RobustnessConfig::default())
            .execute(&action);

        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
        assert_eq!(fs::read_to_string(dir.path().join("copilot.md")).unwrap(), "B");

        let recorded = states.get(&derived).unwrap().digest().cloned();
        let point = ledger.get("copilot", &derived).unwrap();
        assert_eq!(point.canonical, point.derived);
        assert_eq!(point.derived.digest().cloned(), recorded);
    }

    #[test]
    fn conflict_writes_nothing() {
        let dir = tempdir().unwrap();
        let root = NormalizedPath::new(dir.path());
        let mut states = StateStore::new();
        let mut ledger = SyncLedger::new();

        let conflict = Conflict {
            tool: "copilot".into(),
            canonical: root.join("context.md"),
            derived: root.join("copilot.md"),
            kind: MirrorKind::File,
            reason: ConflictReason::ConcurrentEdit,
            canonical_digest: None,
            derived_digest: None,
        };
        let results = Executor::new(&mut states, &mut ledger, RobustnessConfig::default())
            .execute(&SyncAction::Conflict(conflict));

        assert!(results.is_empty());
        assert!(ledger.is_empty());
        assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
