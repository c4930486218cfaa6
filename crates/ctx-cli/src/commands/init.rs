//! Config scaffolding

use std::path::Path;

use colored::Colorize;
use ctx_fs::NormalizedPath;
use ctx_sync::{CONFIG_FILE, WatcherConfig};

use crate::error::{CliError, Result};

/// Run the init command
///
/// Writes the default watcher config, or `config_path` when given.
pub fn run_init(
    root: &Path,
    config_path: Option<&Path>,
    interval_ms: Option<u64>,
    force: bool,
) -> Result<()> {
    let root = NormalizedPath::new(root);
    let path = match config_path {
        Some(path) => NormalizedPath::new(path),
        None => root.join(CONFIG_FILE),
    };
    if path.exists() && !force {
        return Err(CliError::user(format!(
            "{} already exists. Use --force to overwrite",
            path
        )));
    }

    let mut config = WatcherConfig::for_root(root.to_native());
    if let Some(interval_ms) = interval_ms {
        config.poll_interval_ms = interval_ms;
    }
    config.validate()?;
    config.save(&path)?;

    println!("{} Wrote {}", "OK".green().bold(), path.as_str().cyan());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_discoverable_config() {
        let temp_dir = TempDir::new().unwrap();
        run_init(temp_dir.path(), None, Some(300), false).unwrap();

        let config = WatcherConfig::discover(&NormalizedPath::new(temp_dir.path())).unwrap();
        assert_eq!(config.poll_interval_ms, 300);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        run_init(temp_dir.path(), None, None, false).unwrap();

        let result = run_init(temp_dir.path(), None, None, false);
        assert!(matches!(result, Err(CliError::User { .. })));
        assert!(run_init(temp_dir.path(), None, Some(50), true).is_ok());
    }

    #[test]
    fn test_init_rejects_zero_interval() {
        let temp_dir = TempDir::new().unwrap();
        assert!(run_init(temp_dir.path(), None, Some(0), false).is_err());
        assert!(!temp_dir.path().join(CONFIG_FILE).exists());
    }
}
