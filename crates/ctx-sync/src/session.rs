//! Sync session: tracked paths, their state and one poll cycle
//!
//! A cycle first observes and commits every due path, then hands each
//! change to the decision engine and the executor in turn. Committing
//! before dispatch means a failing consumer never causes the same change to
//! be reported twice; failed actions are kept aside and re-decided on the
//! next cycle instead.

use ctx_fs::{NormalizedPath, RobustnessConfig, identify};
use ctx_tools::{BindingInfo, PathRole, ToolRegistry};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::decision::{Conflict, DecisionEngine, SyncAction};
use crate::event::{ChangeEvent, ChangeKind, WatchEvent};
use crate::executor::{Executor, Resolution, SyncOutcome};
use crate::ledger::{SyncLedger, SyncPoint};
use crate::state::{PathState, StateStore};
use crate::tracked::{TrackedPath, WatchOptions};
use crate::{Error, Result};

/// A change whose action failed, waiting for the next cycle.
#[derive(Debug, Clone)]
struct PendingEvent {
    event: ChangeEvent,
    root: NormalizedPath,
}

/// Everything one watcher owns. Not shared between watchers.
pub struct SyncSession {
    registry: Arc<ToolRegistry>,
    default_interval: Duration,
    robustness: RobustnessConfig,
    tracked: BTreeMap<String, TrackedPath>,
    states: StateStore,
    ledger: SyncLedger,
    pending: Vec<PendingEvent>,
    subscribers: Vec<Sender<WatchEvent>>,
}

/// Absolute form of `path`; relative paths are taken from the current
/// directory.
fn absolute(path: &Path) -> Result<NormalizedPath> {
    let normalized = NormalizedPath::new(path);
    if normalized.is_absolute() {
        Ok(normalized)
    } else {
        let cwd = NormalizedPath::new(std::env::current_dir()?);
        Ok(normalized.resolve_against(&cwd))
    }
}

impl SyncSession {
    pub fn new(
        registry: Arc<ToolRegistry>,
        default_interval: Duration,
        robustness: RobustnessConfig,
    ) -> Self {
        Self {
            registry,
            default_interval,
            robustness,
            tracked: BTreeMap::new(),
            states: StateStore::new(),
            ledger: SyncLedger::new(),
            pending: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Start tracking `path`. Relative paths are resolved against
    /// `project_root`.
    ///
    /// The current on-disk state becomes the baseline, so a path that
    /// already exists is never reported as created. Returns `false` if the
    /// path was already tracked.
    pub fn watch(
        &mut self,
        path: impl AsRef<Path>,
        project_root: impl AsRef<Path>,
        options: WatchOptions,
    ) -> Result<bool> {
        let root = absolute(project_root.as_ref())?;
        let path = NormalizedPath::new(path.as_ref()).resolve_against(&root);
        let key = path.identity_key();
        if self.tracked.contains_key(&key) {
            debug!(path = %path, "Already watched");
            return Ok(false);
        }

        let is_directory = options.is_directory.unwrap_or_else(|| {
            path.is_dir() || self.registered_kind_is_directory(&path, &root)
        });
        let state = self.states.record_current(&path);
        debug!(path = %path, exists = state.exists(), is_directory, "Watching");

        self.seed_sync_points(&path, &root);
        self.tracked.insert(
            key,
            TrackedPath::new(path, root, is_directory, options.interval),
        );
        Ok(true)
    }

    /// Track every canonical and derived path of one tool.
    pub fn watch_tool(&mut self, slug: &str, project_root: impl AsRef<Path>) -> Result<usize> {
        let binding = self
            .registry
            .get(slug)
            .ok_or_else(|| Error::UnknownTool {
                slug: slug.to_string(),
            })?
            .clone();
        let root = absolute(project_root.as_ref())?;

        let mut added = 0;
        for mirror in &binding.mirrors {
            let options = WatchOptions {
                is_directory: Some(mirror.kind.is_directory()),
                ..Default::default()
            };
            for relative in [&mirror.canonical, &mirror.derived] {
                if self.watch(root.join(relative).to_native(), root.to_native(), options)? {
                    added += 1;
                }
            }
        }
        info!(tool = slug, added, "Watching tool artifacts");
        Ok(added)
    }

    /// Track every path the registry knows about.
    pub fn watch_registry(&mut self, project_root: impl AsRef<Path>) -> Result<usize> {
        let slugs: Vec<String> = self.registry.list().into_iter().map(String::from).collect();
        let mut added = 0;
        for slug in slugs {
            added += self.watch_tool(&slug, project_root.as_ref())?;
        }
        Ok(added)
    }

    /// Stop tracking `path`.
    ///
    /// A relative path names the tracked path at that location under the
    /// project root it was watched with, the same way [`watch`](Self::watch)
    /// resolved it.
    pub fn unwatch(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let key = self.tracked_key(&NormalizedPath::new(path.as_ref()))?;
        let tracked = self.tracked.remove(&key).ok_or_else(|| Error::NotWatched {
            path: key.clone(),
        })?;
        self.states.remove(&tracked.path);
        self.pending
            .retain(|pending| pending.event.path.identity_key() != key);
        debug!(path = %tracked.path, "Unwatched");
        Ok(())
    }

    fn tracked_key(&self, path: &NormalizedPath) -> Result<String> {
        let not_watched = || Error::NotWatched {
            path: path.to_string(),
        };
        if path.is_absolute() {
            let key = path.identity_key();
            return if self.tracked.contains_key(&key) {
                Ok(key)
            } else {
                Err(not_watched())
            };
        }

        let wanted = path.identity_key();
        let mut matches = self.tracked.iter().filter_map(|(key, tracked)| {
            tracked
                .relative()
                .filter(|relative| NormalizedPath::new(relative).identity_key() == wanted)
                .map(|_| key.clone())
        });
        match (matches.next(), matches.next()) {
            (Some(key), None) => Ok(key),
            (None, _) => Err(not_watched()),
            (Some(_), Some(_)) => Err(Error::AmbiguousPath {
                path: path.to_string(),
            }),
        }
    }

    /// Stop tracking everything and forget all sync points.
    pub fn unwatch_all(&mut self) {
        self.tracked.clear();
        self.states.clear();
        self.ledger.clear();
        self.pending.clear();
    }

    /// Tracked paths in identity order.
    pub fn list_watched(&self) -> Vec<NormalizedPath> {
        self.tracked.values().map(|t| t.path.clone()).collect()
    }

    pub fn tracked(&self, path: impl AsRef<Path>) -> Option<&TrackedPath> {
        self.tracked
            .get(&NormalizedPath::new(path.as_ref()).identity_key())
    }

    pub fn state(&self, path: impl AsRef<Path>) -> Option<&PathState> {
        self.states.get(&NormalizedPath::new(path.as_ref()))
    }

    pub fn sync_point(&self, tool: &str, derived: impl AsRef<Path>) -> Option<&SyncPoint> {
        self.ledger.get(tool, &NormalizedPath::new(derived.as_ref()))
    }

    /// Number of failed changes waiting for the next cycle.
    pub fn pending_retries(&self) -> usize {
        self.pending.len()
    }

    /// Shortest interval any tracked path asks for.
    pub fn tick(&self) -> Duration {
        self.tracked
            .values()
            .filter_map(|t| t.interval)
            .fold(self.default_interval, Duration::min)
    }

    fn registered_kind_is_directory(&self, path: &NormalizedPath, root: &NormalizedPath) -> bool {
        let Some(relative) = path.relative_to(root) else {
            return false;
        };
        match self.registry.role_of(&relative) {
            PathRole::Canonical(mirrors) => mirrors.iter().any(|(_, m)| m.kind.is_directory()),
            PathRole::Derived(_, mirror) => mirror.kind.is_directory(),
            PathRole::Unbound => false,
        }
    }

    /// Record the current identities of every mirror `path` takes part in,
    /// unless the mirror already has a sync point.
    fn seed_sync_points(&mut self, path: &NormalizedPath, root: &NormalizedPath) {
        let Some(relative) = path.relative_to(root) else {
            return;
        };
        let mirrors: Vec<(String, String, String)> = match self.registry.role_of(&relative) {
            PathRole::Canonical(pairs) => pairs
                .into_iter()
                .map(|(b, m)| (b.slug.clone(), m.canonical.clone(), m.derived.clone()))
                .collect(),
            PathRole::Derived(b, m) => vec![(b.slug.clone(), m.canonical.clone(), m.derived.clone())],
            PathRole::Unbound => return,
        };

        for (tool, canonical, derived) in mirrors {
            let canonical = root.join(&canonical);
            let derived = root.join(&derived);
            if self.ledger.get(&tool, &derived).is_some() {
                continue;
            }
            match (identify(&canonical.to_native()), identify(&derived.to_native())) {
                (Ok(c), Ok(d)) => {
                    self.ledger.seed(&tool, &derived, SyncPoint::new(c, d));
                }
                (Err(e), _) | (_, Err(e)) => {
                    debug!(tool = %tool, derived = %derived, error = %e, "Sync point not seeded");
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn subscribe(&mut self) -> Receiver<WatchEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver to every live subscriber; disconnected ones are dropped.
    pub fn emit(&mut self, event: WatchEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn bindings_for(&self, path: &NormalizedPath, root: &NormalizedPath) -> Vec<BindingInfo> {
        path.relative_to(root)
            .map(|relative| self.registry.bindings_for(&relative))
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Poll cycle
    // ------------------------------------------------------------------

    /// One cycle over every tracked path.
    pub fn poll(&mut self) -> Vec<ChangeEvent> {
        self.run_cycle(None)
    }

    /// One cycle over the paths whose interval has elapsed at `now`.
    pub fn poll_due(&mut self, now: Instant) -> Vec<ChangeEvent> {
        self.run_cycle(Some(now))
    }

    fn run_cycle(&mut self, due_at: Option<Instant>) -> Vec<ChangeEvent> {
        let now = due_at.unwrap_or_else(Instant::now);
        let mut changes: Vec<(ChangeEvent, NormalizedPath)> = Vec::new();

        // Observe and commit every path before any consumer runs.
        for tracked in self.tracked.values_mut() {
            if due_at.is_some_and(|at| !tracked.is_due(at, self.default_interval)) {
                continue;
            }
            tracked.mark_polled(now);

            let previous = self.states.get(&tracked.path).and_then(PathState::baseline);
            let current = self.states.record_current(&tracked.path);
            let Some(current) = current.baseline().filter(|_| !current.is_unreadable()) else {
                continue;
            };
            if current.exists() && tracked.note_kind(tracked.path.is_dir()) {
                warn!(
                    path = %tracked.path,
                    is_directory = tracked.is_directory,
                    "Path switched between file and directory"
                );
            }
            let Some(previous) = previous else {
                continue;
            };
            if let Some(event) = ChangeEvent::classify(&tracked.path, &previous, &current) {
                debug!(path = %event.path, kind = %event.kind, "Detected change");
                changes.push((event, tracked.project_root.clone()));
            }
        }

        let fresh: HashSet<String> = changes
            .iter()
            .map(|(event, _)| event.path.identity_key())
            .collect();
        let retries: Vec<PendingEvent> = std::mem::take(&mut self.pending)
            .into_iter()
            .filter(|pending| !fresh.contains(&pending.event.path.identity_key()))
            .collect();

        let mut conflicted = HashSet::new();
        for pending in retries {
            debug!(path = %pending.event.path, "Retrying failed sync");
            self.dispatch(&pending.event, &pending.root, &mut conflicted);
        }
        for (event, root) in &changes {
            let bindings = self.bindings_for(&event.path, root);
            if let Some(notification) = WatchEvent::from_change(event, bindings) {
                self.emit(notification);
            }
            self.dispatch(event, root, &mut conflicted);
        }

        changes.into_iter().map(|(event, _)| event).collect()
    }

    /// Decide and execute the actions for one change. Returns the writes
    /// that completed.
    fn dispatch(
        &mut self,
        event: &ChangeEvent,
        root: &NormalizedPath,
        conflicted: &mut HashSet<(String, String)>,
    ) -> Vec<SyncOutcome> {
        let actions = DecisionEngine::new(&self.registry, root, &self.ledger).decide(event);

        let mut completed = Vec::new();
        let mut failed = false;
        for action in actions {
            match &action {
                SyncAction::Noop { path, reason } => {
                    debug!(path = %path, reason = %reason, "Nothing to sync");
                }
                SyncAction::Conflict(conflict) => {
                    if conflicted.insert(conflict.key()) {
                        warn!(
                            tool = %conflict.tool,
                            canonical = %conflict.canonical,
                            derived = %conflict.derived,
                            reason = %conflict.reason,
                            "Sync conflict"
                        );
                        self.emit(WatchEvent::Conflict(conflict.clone()));
                    }
                }
                SyncAction::Propagate { .. } | SyncAction::Pullback { .. } => {
                    let results = Executor::new(&mut self.states, &mut self.ledger, self.robustness)
                        .execute(&action);
                    let mut pulled_back = None;
                    for result in results {
                        match result {
                            Ok(outcome) => {
                                if let SyncAction::Pullback { canonical, .. } = &action {
                                    pulled_back = Some((canonical.clone(), outcome.digest.clone()));
                                }
                                self.emit(WatchEvent::Synced(outcome.clone()));
                                completed.push(outcome);
                            }
                            Err(e) => {
                                warn!(path = %event.path, error = %e, "Sync failed");
                                failed |= e.is_transient();
                                self.emit(WatchEvent::SyncFailed {
                                    path: event.path.clone(),
                                    error: e.to_string(),
                                });
                            }
                        }
                    }
                    // Fan the new canonical content out to the other mirrors.
                    if let Some((canonical, digest)) = pulled_back {
                        let follow_up = ChangeEvent {
                            path: canonical,
                            kind: ChangeKind::Changed,
                            previous: None,
                            current: digest,
                        };
                        completed.extend(self.dispatch(&follow_up, root, conflicted));
                    }
                }
            }
        }

        if failed {
            debug!(path = %event.path, "Queued for retry on next poll");
            self.pending.push(PendingEvent {
                event: event.clone(),
                root: root.clone(),
            });
        }
        completed
    }

    // ------------------------------------------------------------------
    // Conflict resolution
    // ------------------------------------------------------------------

    /// Apply an external decision to a conflict.
    ///
    /// When the derived side wins, the new canonical content is fanned out
    /// to the remaining mirrors in the same call.
    pub fn resolve(&mut self, conflict: &Conflict, resolution: Resolution) -> Result<Vec<SyncOutcome>> {
        let outcome = Executor::new(&mut self.states, &mut self.ledger, self.robustness)
            .resolve(conflict, resolution)?;
        let Some(outcome) = outcome else {
            debug!(conflict = %conflict, ?resolution, "Conflict settled without a write");
            return Ok(Vec::new());
        };
        info!(conflict = %conflict, ?resolution, "Resolved conflict");
        self.emit(WatchEvent::Synced(outcome.clone()));

        let mut outcomes = vec![outcome];
        if resolution == Resolution::DerivedWins {
            let root = self.root_for(&conflict.canonical);
            let follow_up = ChangeEvent {
                path: conflict.canonical.clone(),
                kind: ChangeKind::Changed,
                previous: None,
                current: outcomes[0].digest.clone(),
            };
            let mut conflicted = HashSet::from([conflict.key()]);
            outcomes.extend(self.dispatch(&follow_up, &root, &mut conflicted));
        }
        Ok(outcomes)
    }

    /// Project root of the mirror `path` belongs to.
    fn root_for(&self, path: &NormalizedPath) -> NormalizedPath {
        self.tracked
            .values()
            .map(|t| &t.project_root)
            .find(|root| path.starts_with(root))
            .cloned()
            .or_else(|| path.parent())
            .unwrap_or_else(|| path.clone())
    }
}
