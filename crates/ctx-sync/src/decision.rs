//! Sync decision engine
//!
//! Turns one [`ChangeEvent`] into the actions that bring the affected
//! mirrors back in line. Rules, in priority order:
//!
//! 1. A canonical path was created or changed: propagate to every derived
//!    artifact whose live digest differs. A derived artifact edited since its
//!    sync point is not overwritten and yields a conflict instead.
//! 2. A derived artifact was created or changed and its canonical still
//!    matches the sync point: pull the derived content back.
//! 3. A derived artifact was created or changed and its canonical moved on
//!    independently: conflict carrying both digests.
//! 4. A canonical path was deleted: conflict for every derived artifact that
//!    still exists. Deletions are never propagated automatically.
//! 5. A derived artifact was deleted: conflict.
//!
//! Anything else is a no-op. Digests are recomputed from disk at decision
//! time.

use ctx_fs::{ContentIdentity, Digest, NormalizedPath, identify};
use ctx_tools::{Mirror, MirrorKind, PathRole, ToolBinding, ToolRegistry};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::event::{ChangeEvent, ChangeKind};
use crate::ledger::SyncLedger;

/// Why a mirror needs an external decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    /// Canonical and derived were both edited since the last sync
    ConcurrentEdit,
    /// The canonical source disappeared while the derived artifact remains
    CanonicalDeleted,
    /// The derived artifact disappeared while the canonical source remains
    DerivedDeleted,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ConcurrentEdit => "concurrent edit",
            Self::CanonicalDeleted => "canonical deleted",
            Self::DerivedDeleted => "derived deleted",
        })
    }
}

/// A diverged mirror awaiting resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub tool: String,
    pub canonical: NormalizedPath,
    pub derived: NormalizedPath,
    pub kind: MirrorKind,
    pub reason: ConflictReason,
    pub canonical_digest: Option<Digest>,
    pub derived_digest: Option<Digest>,
}

impl Conflict {
    /// Identity of the mirror this conflict is about.
    pub fn key(&self) -> (String, String) {
        (self.tool.clone(), self.derived.identity_key())
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} between {} and {} ({})",
            self.reason, self.canonical, self.derived, self.tool
        )
    }
}

/// One derived artifact a propagate writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub tool: String,
    pub derived: NormalizedPath,
}

/// The decided outcome for one change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// Overwrite each target with the canonical content
    Propagate {
        canonical: NormalizedPath,
        kind: MirrorKind,
        targets: Vec<SyncTarget>,
    },
    /// Overwrite the canonical with the derived content
    Pullback {
        tool: String,
        derived: NormalizedPath,
        canonical: NormalizedPath,
        kind: MirrorKind,
    },
    Conflict(Conflict),
    Noop { path: NormalizedPath, reason: String },
}

impl SyncAction {
    fn noop(path: &NormalizedPath, reason: impl Into<String>) -> Self {
        Self::Noop {
            path: path.clone(),
            reason: reason.into(),
        }
    }
}

/// Live identity of a path, or the reason it could not be read.
fn live(path: &NormalizedPath) -> Result<ContentIdentity, String> {
    identify(&path.to_native()).map_err(|e| e.to_string())
}

/// Decides actions against a registry, the project root of the event and
/// the sync ledger.
pub struct DecisionEngine<'a> {
    registry: &'a ToolRegistry,
    root: &'a NormalizedPath,
    ledger: &'a SyncLedger,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(registry: &'a ToolRegistry, root: &'a NormalizedPath, ledger: &'a SyncLedger) -> Self {
        Self {
            registry,
            root,
            ledger,
        }
    }

    /// Actions for `event`, never empty.
    pub fn decide(&self, event: &ChangeEvent) -> Vec<SyncAction> {
        let Some(relative) = event.path.relative_to(self.root) else {
            return vec![SyncAction::noop(&event.path, "outside the project root")];
        };

        let actions = match (self.registry.role_of(&relative), event.kind) {
            (PathRole::Canonical(mirrors), ChangeKind::Deleted) => {
                self.canonical_deleted(&event.path, &mirrors)
            }
            (PathRole::Canonical(mirrors), _) => self.canonical_changed(&event.path, &mirrors),
            (PathRole::Derived(binding, mirror), ChangeKind::Deleted) => {
                self.derived_deleted(&event.path, binding, mirror)
            }
            (PathRole::Derived(binding, mirror), _) => {
                self.derived_changed(&event.path, binding, mirror)
            }
            (PathRole::Unbound, _) => Vec::new(),
        };

        if actions.is_empty() {
            vec![SyncAction::noop(&event.path, "no mirror needs an update")]
        } else {
            debug!(path = %event.path, kind = %event.kind, actions = actions.len(), "Decided");
            actions
        }
    }

    fn canonical_changed(
        &self,
        canonical: &NormalizedPath,
        mirrors: &[(&ToolBinding, &Mirror)],
    ) -> Vec<SyncAction> {
        let canonical_live = match live(canonical) {
            Ok(ContentIdentity::Present(digest)) => digest,
            Ok(ContentIdentity::Absent) => {
                return vec![SyncAction::noop(canonical, "canonical vanished before sync")];
            }
            Err(reason) => return vec![SyncAction::noop(canonical, reason)],
        };

        let mut actions = Vec::new();
        let mut targets = Vec::new();
        let mut kind = MirrorKind::File;

        for (binding, mirror) in mirrors {
            kind = mirror.kind;
            let derived = self.root.join(&mirror.derived);
            let derived_live = match live(&derived) {
                Ok(identity) => identity,
                Err(reason) => {
                    actions.push(SyncAction::noop(&derived, reason));
                    continue;
                }
            };
            if derived_live.digest() == Some(&canonical_live) {
                continue;
            }

            let edited_since_sync = self
                .ledger
                .get(&binding.slug, &derived)
                .is_some_and(|point| point.derived != derived_live);

            if edited_since_sync {
                let reason = if derived_live.exists() {
                    ConflictReason::ConcurrentEdit
                } else {
                    ConflictReason::DerivedDeleted
                };
                actions.push(SyncAction::Conflict(Conflict {
                    tool: binding.slug.clone(),
                    canonical: canonical.clone(),
                    derived,
                    kind: mirror.kind,
                    reason,
                    canonical_digest: Some(canonical_live.clone()),
                    derived_digest: derived_live.digest().cloned(),
                }));
            } else {
                targets.push(SyncTarget {
                    tool: binding.slug.clone(),
                    derived,
                });
            }
        }

        if !targets.is_empty() {
            actions.insert(
                0,
                SyncAction::Propagate {
                    canonical: canonical.clone(),
                    kind,
                    targets,
                },
            );
        }
        actions
    }

    fn canonical_deleted(
        &self,
        canonical: &NormalizedPath,
        mirrors: &[(&ToolBinding, &Mirror)],
    ) -> Vec<SyncAction> {
        mirrors
            .iter()
            .filter_map(|(binding, mirror)| {
                let derived = self.root.join(&mirror.derived);
                let derived_live = live(&derived).ok()?;
                let digest = derived_live.digest()?.clone();
                Some(SyncAction::Conflict(Conflict {
                    tool: binding.slug.clone(),
                    canonical: canonical.clone(),
                    derived,
                    kind: mirror.kind,
                    reason: ConflictReason::CanonicalDeleted,
                    canonical_digest: None,
                    derived_digest: Some(digest),
                }))
            })
            .collect()
    }

    fn derived_changed(
        &self,
        derived: &NormalizedPath,
        binding: &ToolBinding,
        mirror: &Mirror,
    ) -> Vec<SyncAction> {
        let canonical = self.root.join(&mirror.canonical);
        let (derived_live, canonical_live) = match (live(derived), live(&canonical)) {
            (Ok(d), Ok(c)) => (d, c),
            (Err(reason), _) | (_, Err(reason)) => return vec![SyncAction::noop(derived, reason)],
        };
        if !derived_live.exists() {
            return vec![SyncAction::noop(derived, "derived vanished before sync")];
        }
        if derived_live == canonical_live {
            return Vec::new();
        }

        let canonical_unchanged = self
            .ledger
            .get(&binding.slug, derived)
            .is_none_or(|point| point.canonical == canonical_live);

        if canonical_unchanged {
            return vec![SyncAction::Pullback {
                tool: binding.slug.clone(),
                derived: derived.clone(),
                canonical,
                kind: mirror.kind,
            }];
        }

        let reason = if canonical_live.exists() {
            ConflictReason::ConcurrentEdit
        } else {
            ConflictReason::CanonicalDeleted
        };
        vec![SyncAction::Conflict(Conflict {
            tool: binding.slug.clone(),
            canonical,
            derived: derived.clone(),
            kind: mirror.kind,
            reason,
            canonical_digest: canonical_live.digest().cloned(),
            derived_digest: derived_live.digest().cloned(),
        })]
    }

    fn derived_deleted(
        &self,
        derived: &NormalizedPath,
        binding: &ToolBinding,
        mirror: &Mirror,
    ) -> Vec<SyncAction> {
        let canonical = self.root.join(&mirror.canonical);
        match live(&canonical) {
            Ok(ContentIdentity::Present(digest)) => vec![SyncAction::Conflict(Conflict {
                tool: binding.slug.clone(),
                canonical,
                derived: derived.clone(),
                kind: mirror.kind,
                reason: ConflictReason::DerivedDeleted,
                canonical_digest: Some(digest),
                derived_digest: None,
            })],
            Ok(ContentIdentity::Absent) => Vec::new(),
            Err(reason) => vec![SyncAction::noop(derived, reason)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::SyncPoint;
    use ctx_fs::checksum::compute_content_checksum;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        dir: TempDir,
        root: NormalizedPath,
        registry: ToolRegistry,
        ledger: SyncLedger,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let root = NormalizedPath::new(dir.path());
            let registry = ToolRegistry::from_bindings([ToolBinding::new(
                "copilot",
                "Copilot",
                ctx_tools::ToolCategory::Copilot,
            )
            .with_mirror(Mirror::file("context.md", "copilot.md"))])
            .unwrap();
            Self {
                dir,
                root,
                registry,
                ledger: SyncLedger::new(),
            }
        }

        fn write(&self, name: &str, content: &str) {
            fs::write(self.dir.path().join(name), content).unwrap();
        }

        fn path(&self, name: &str) -> NormalizedPath {
            self.root.join(name)
        }

        fn sync_point(&mut self, canonical: &str, derived: &str) {
            let point = SyncPoint::new(
                ContentIdentity::Present(compute_content_checksum(canonical)),
                ContentIdentity::Present(compute_content_checksum(derived)),
            );
            let derived_path = self.path("copilot.md");
            self.ledger.record("copilot", &derived_path, point);
        }

        fn decide(&self, name: &str, kind: ChangeKind) -> Vec<SyncAction> {
            let event = ChangeEvent {
                path: self.path(name),
                kind,
                previous: None,
                current: None,
            };
            DecisionEngine::new(&self.registry, &self.root, &self.ledger).decide(&event)
        }
    }

    #[test]
    fn canonical_change_propagates_to_stale_mirror() {
        let mut fx = Fixture::new();
        fx.write("context.md", "B");
        fx.write("copilot.md", "A");
        fx.sync_point("A", "A");

        let actions = fx.decide("context.md", ChangeKind::Changed);
        match &actions[..] {
            [SyncAction::Propagate { targets, .. }] => {
                assert_eq!(targets.len(), 1);
                assert_eq!(targets[0].derived, fx.path("copilot.md"));
            }
            other => panic!("expected propagate, got {:?}", other),
        }
    }

    #[test]
    fn canonical_change_skips_mirror_already_equal() {
        let mut fx = Fixture::new();
        fx.write("context.md", "B");
        fx.write("copilot.md", "B");
        fx.sync_point("A", "A");

        let actions = fx.decide("context.md", ChangeKind::Changed);
        assert!(matches!(&actions[..], [SyncAction::Noop { .. }]));
    }

    #[test]
    fn derived_edit_with_stable_canonical_pulls_back() {
        let mut fx = Fixture::new();
        fx.write("context.md", "A");
        fx.write("copilot.md", "edited");
        fx.sync_point("A", "A");

        let actions = fx.decide("copilot.md", ChangeKind::Changed);
        assert!(matches!(&actions[..], [SyncAction::Pullback { tool, .. }] if tool == "copilot"));
    }

    #[test]
    fn independent_edits_conflict_with_both_digests() {
        let mut fx = Fixture::new();
        fx.write("context.md", "B");
        fx.write("copilot.md", "C");
        fx.sync_point("A", "A");

        for name in ["context.md", "copilot.md"] {
            let actions = fx.decide(name, ChangeKind::Changed);
            match &actions[..] {
                [SyncAction::Conflict(conflict)] => {
                    assert_eq!(conflict.reason, ConflictReason::ConcurrentEdit);
                    assert_eq!(conflict.canonical_digest, Some(compute_content_checksum("B")));
                    assert_eq!(conflict.derived_digest, Some(compute_content_checksum("C")));
                }
                other => panic!("expected conflict for {}, got {:?}", name, other),
            }
        }
    }

    #[test]
    fn canonical_deletion_is_a_conflict() {
        let mut fx = Fixture::new();
        fx.write("copilot.md", "A");
        fx.sync_point("A", "A");

        let actions = fx.decide("context.md", ChangeKind::Deleted);
        assert!(matches!(
            &actions[..],
            [SyncAction::Conflict(Conflict { reason: ConflictReason::CanonicalDeleted, .. })]
        ));
    }

    #[test]
    fn derived_deletion_is_a_conflict() {
        let mut fx = Fixture::new();
        fx.write("context.md", "A");
        fx.sync_point("A", "A");

        let actions = fx.decide("copilot.md", ChangeKind::Deleted);
        assert!(matches!(
            &actions[..],
            [SyncAction::Conflict(Conflict { reason: ConflictReason::DerivedDeleted, .. })]
        ));
    }

    #[test]
    fn unbound_path_is_noop() {
        let fx = Fixture::new();
        fx.write("README.md", "x");
        let actions = fx.decide("README.md", ChangeKind::Changed);
        assert!(matches!(&actions[..], [SyncAction::Noop { .. }]));
    }
}
