//! Polling watcher
//!
//! Owns a [`SyncSession`] and, while running, a background thread that
//! polls it on a fixed interval. Detection latency is bounded by the poll
//! interval; there is no kernel notification involved.

use ctx_fs::NormalizedPath;
use ctx_tools::ToolRegistry;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::check::{CheckReport, check};
use crate::config::WatcherConfig;
use crate::decision::Conflict;
use crate::event::{ChangeEvent, WatchEvent};
use crate::executor::{Resolution, SyncOutcome};
use crate::ledger::SyncPoint;
use crate::session::SyncSession;
use crate::state::PathState;
use crate::tracked::WatchOptions;
use crate::{Error, Result};

/// Handle on the running poll thread.
struct PollLoop {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Change detection and sync for a set of tracked paths.
///
/// `Idle` until [`start`](Self::start), `Running` until
/// [`stop`](Self::stop) or drop. Registration and manual polls work in
/// either state and never overlap with a background cycle.
pub struct Watcher {
    config: WatcherConfig,
    session: Arc<Mutex<SyncSession>>,
    poll_loop: Option<PollLoop>,
}

impl Watcher {
    /// Build a watcher with the registry the config selects.
    pub fn new(config: WatcherConfig) -> Result<Self> {
        let registry = config.build_registry()?;
        Self::with_registry(config, registry)
    }

    /// Build a watcher over an already validated registry.
    pub fn with_registry(config: WatcherConfig, registry: ToolRegistry) -> Result<Self> {
        config.validate()?;
        let session = SyncSession::new(
            Arc::new(registry),
            config.poll_interval(),
            config.robustness(),
        );
        Ok(Self {
            config,
            session: Arc::new(Mutex::new(session)),
            poll_loop: None,
        })
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    fn session(&self) -> MutexGuard<'_, SyncSession> {
        lock(&self.session)
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    pub fn watch(
        &self,
        path: impl AsRef<Path>,
        project_root: impl AsRef<Path>,
        options: WatchOptions,
    ) -> Result<bool> {
        self.session().watch(path, project_root, options)
    }

    pub fn watch_tool(&self, slug: &str, project_root: impl AsRef<Path>) -> Result<usize> {
        self.session().watch_tool(slug, project_root)
    }

    pub fn watch_registry(&self, project_root: impl AsRef<Path>) -> Result<usize> {
        self.session().watch_registry(project_root)
    }

    pub fn unwatch(&self, path: impl AsRef<Path>) -> Result<()> {
        self.session().unwatch(path)
    }

    pub fn unwatch_all(&self) {
        self.session().unwatch_all();
    }

    pub fn list_watched(&self) -> Vec<NormalizedPath> {
        self.session().list_watched()
    }

    /// Last recorded state of a tracked path.
    pub fn state(&self, path: impl AsRef<Path>) -> Option<PathState> {
        self.session().state(path).cloned()
    }

    pub fn sync_point(&self, tool: &str, derived: impl AsRef<Path>) -> Option<SyncPoint> {
        self.session().sync_point(tool, derived).cloned()
    }

    pub fn pending_retries(&self) -> usize {
        self.session().pending_retries()
    }

    // ------------------------------------------------------------------
    // Events and sync
    // ------------------------------------------------------------------

    pub fn subscribe(&self) -> Receiver<WatchEvent> {
        self.session().subscribe()
    }

    /// Run one cycle over every tracked path now.
    pub fn poll(&self) -> Vec<ChangeEvent> {
        self.session().poll()
    }

    pub fn resolve(&self, conflict: &Conflict, resolution: Resolution) -> Result<Vec<SyncOutcome>> {
        self.session().resolve(conflict, resolution)
    }

    /// Drift report for every mirror of the registry under `project_root`.
    pub fn check(&self, project_root: impl AsRef<Path>) -> CheckReport {
        let root = NormalizedPath::new(project_root.as_ref());
        check(self.session().registry(), &root)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub fn is_running(&self) -> bool {
        self.poll_loop.is_some()
    }

    /// Start the background poll loop. No-op while running.
    pub fn start(&mut self) -> Result<()> {
        if self.poll_loop.is_some() {
            debug!("Watcher already running");
            return Ok(());
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let session = Arc::clone(&self.session);
        let handle = thread::Builder::new()
            .name("ctx-sync-poll".into())
            .spawn(move || run_poll_loop(&session, &stop_rx))
            .map_err(Error::Io)?;

        self.poll_loop = Some(PollLoop { stop_tx, handle });
        let mut session = self.session();
        info!(
            paths = session.list_watched().len(),
            interval_ms = self.config.poll_interval_ms,
            "Watcher started"
        );
        session.emit(WatchEvent::Ready);
        Ok(())
    }

    /// Stop the background poll loop. An in-flight cycle completes first.
    /// Idempotent.
    pub fn stop(&mut self) {
        let Some(poll_loop) = self.poll_loop.take() else {
            return;
        };
        // A send error means the loop already exited.
        let _ = poll_loop.stop_tx.send(());
        if poll_loop.handle.join().is_err() {
            warn!("Poll thread panicked");
        }
        self.session().emit(WatchEvent::Stopped);
        info!("Watcher stopped");
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A panic inside one cycle must not wedge every later call.
fn lock(session: &Mutex<SyncSession>) -> MutexGuard<'_, SyncSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

fn run_poll_loop(session: &Mutex<SyncSession>, stop_rx: &Receiver<()>) {
    loop {
        let tick = lock(session).tick();
        match stop_rx.recv_timeout(tick) {
            Err(RecvTimeoutError::Timeout) => {
                let events = lock(session).poll_due(Instant::now());
                if !events.is_empty() {
                    debug!(changes = events.len(), "Poll cycle complete");
                }
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
