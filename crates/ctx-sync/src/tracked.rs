//! Paths under observation

use ctx_fs::NormalizedPath;
use std::time::{Duration, Instant};

/// Per-path registration options.
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    /// Poll this path on its own cadence instead of the global interval
    pub interval: Option<Duration>,
    /// Force the directory flag; detected from disk (or the registry) when
    /// unset
    pub is_directory: Option<bool>,
}

impl WatchOptions {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn directory(mut self) -> Self {
        self.is_directory = Some(true);
        self
    }
}

/// A registered path and its polling bookkeeping.
#[derive(Debug, Clone)]
pub struct TrackedPath {
    pub path: NormalizedPath,
    pub project_root: NormalizedPath,
    pub is_directory: bool,
    pub interval: Option<Duration>,
    last_polled: Option<Instant>,
}

impl TrackedPath {
    pub fn new(
        path: NormalizedPath,
        project_root: NormalizedPath,
        is_directory: bool,
        interval: Option<Duration>,
    ) -> Self {
        Self {
            path,
            project_root,
            is_directory,
            interval,
            last_polled: None,
        }
    }

    /// Path relative to its project root, if it lies inside it.
    pub fn relative(&self) -> Option<String> {
        self.path.relative_to(&self.project_root)
    }

    /// Whether the path should be looked at in a cycle starting at `now`.
    pub fn is_due(&self, now: Instant, default_interval: Duration) -> bool {
        let interval = self.interval.unwrap_or(default_interval);
        self.last_polled
            .is_none_or(|last| now.saturating_duration_since(last) >= interval)
    }

    pub(crate) fn mark_polled(&mut self, now: Instant) {
        self.last_polled = Some(now);
    }

    /// Record the kind found on disk. Returns `true` when it differs from
    /// the kind seen before.
    pub(crate) fn note_kind(&mut self, is_directory: bool) -> bool {
        let switched = self.is_directory != is_directory;
        self.is_directory = is_directory;
        switched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracked(interval: Option<Duration>) -> TrackedPath {
        TrackedPath::new(
            NormalizedPath::new("/p/CLAUDE.md"),
            NormalizedPath::new("/p"),
            false,
            interval,
        )
    }

    #[test]
    fn never_polled_path_is_due() {
        let path = tracked(None);
        assert!(path.is_due(Instant::now(), Duration::from_secs(1)));
    }

    #[test]
    fn override_interval_delays_next_poll() {
        let mut path = tracked(Some(Duration::from_secs(60)));
        let start = Instant::now();
        path.mark_polled(start);

        assert!(!path.is_due(start + Duration::from_secs(1), Duration::from_secs(1)));
        assert!(path.is_due(start + Duration::from_secs(60), Duration::from_secs(1)));
    }

    #[test]
    fn relative_path_inside_root() {
        assert_eq!(tracked(None).relative().as_deref(), Some("CLAUDE.md"));
    }

    #[test]
    fn kind_switch_is_reported_once() {
        let mut path = tracked(None);
        assert!(!path.note_kind(false));
        assert!(path.note_kind(true));
        assert!(path.is_directory);
        assert!(!path.note_kind(true));
    }
}
