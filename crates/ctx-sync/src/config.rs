//! Watcher configuration
//!
//! Loaded through [`ConfigStore`], so TOML, JSON and YAML all work; the
//! conventional location is `.ai-context/sync.toml` under the project root.

use ctx_fs::{ConfigStore, NormalizedPath, RobustnessConfig};
use ctx_tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::{Error, Result};

/// Default location of the watcher config, relative to the project root.
pub const CONFIG_FILE: &str = ".ai-context/sync.toml";

/// Default poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

/// Configuration for a [`Watcher`](crate::Watcher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Global poll interval; the upper bound on detection latency
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,
    /// Tool registry file; built-in tools when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_path: Option<PathBuf>,
    /// Register every registry path under the project root on startup
    #[serde(default = "default_true")]
    pub watch_all_tools: bool,
    /// How long a write waits for another writer's lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub fsync: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            project_root: default_project_root(),
            registry_path: None,
            watch_all_tools: true,
            lock_timeout_ms: default_lock_timeout_ms(),
            fsync: true,
        }
    }
}

impl WatcherConfig {
    /// Defaults rooted at `root`.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: root.into(),
            ..Self::default()
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    /// Load a config file. A relative `project_root` in the file is taken
    /// relative to `base`, not to the file's own location.
    pub fn load(path: &NormalizedPath, base: &NormalizedPath) -> Result<Self> {
        let mut config: Self = ConfigStore::new().load(path)?;
        if config.project_root.is_relative() {
            config.project_root = NormalizedPath::new(&config.project_root)
                .resolve_against(base)
                .to_native();
        }
        debug!(path = %path, project_root = %config.project_root.display(), "Loaded watcher config");
        Ok(config)
    }

    /// Load `<root>/.ai-context/sync.toml` if present, defaults otherwise.
    pub fn discover(root: &NormalizedPath) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if path.is_file() {
            Self::load(&path, root)
        } else {
            Ok(Self::for_root(root.to_native()))
        }
    }

    /// Write this config to `path`. The project root is stored as `.` so
    /// the file keeps working when the project moves.
    pub fn save(&self, path: &NormalizedPath) -> Result<()> {
        let stored = Self {
            project_root: default_project_root(),
            ..self.clone()
        };
        ConfigStore::with_robustness(self.robustness()).save(path, &stored)?;
        debug!(path = %path, "Saved watcher config");
        Ok(())
    }

    /// Reject settings the watcher cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::configuration("poll_interval_ms must be greater than zero"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn project_root(&self) -> NormalizedPath {
        NormalizedPath::new(&self.project_root)
    }

    pub fn robustness(&self) -> RobustnessConfig {
        RobustnessConfig {
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
            enable_fsync: self.fsync,
        }
    }

    /// The tool registry this config selects.
    pub fn build_registry(&self) -> Result<ToolRegistry> {
        match &self.registry_path {
            Some(path) => {
                let path = NormalizedPath::new(path).resolve_against(&self.project_root());
                Ok(ToolRegistry::load(&path)?)
            }
            None => Ok(ToolRegistry::with_builtins()?),
        }
    }
}
