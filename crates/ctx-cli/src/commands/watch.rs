//! Watch command
//!
//! Runs the watcher in the foreground and prints every event it emits.

use std::thread;

use colored::Colorize;
use ctx_sync::{Resolution, WatchEvent, Watcher, WatcherConfig};
use tracing::debug;

use crate::error::{CliError, Result};

/// Options for [`run_watch`]
#[derive(Debug, Clone)]
pub struct WatchArgs {
    /// Tools to watch; every registered tool when empty
    pub tools: Vec<String>,
    pub interval_ms: Option<u64>,
    /// Run this many manual cycles instead of the background loop
    pub cycles: Option<u32>,
    pub resolution: Resolution,
}

/// Run the watch command
pub fn run_watch(mut config: WatcherConfig, args: WatchArgs) -> Result<()> {
    if let Some(interval_ms) = args.interval_ms {
        config.poll_interval_ms = interval_ms;
    }
    let root = config.project_root();
    let interval = config.poll_interval();
    let watch_all = config.watch_all_tools;

    let mut watcher = Watcher::new(config)?;
    let tracked = if !args.tools.is_empty() {
        let mut total = 0;
        for slug in &args.tools {
            total += watcher.watch_tool(slug, root.to_native())?;
        }
        total
    } else if watch_all {
        watcher.watch_registry(root.to_native())?
    } else {
        return Err(CliError::user(
            "No tools selected. Pass --tool or set watch_all_tools = true",
        ));
    };

    println!(
        "{} Watching {} paths under {} every {}ms",
        "=>".blue().bold(),
        tracked,
        root.as_str().cyan(),
        interval.as_millis()
    );

    let events = watcher.subscribe();
    match args.cycles {
        Some(cycles) => {
            for cycle in 0..cycles {
                thread::sleep(interval);
                let changes = watcher.poll();
                debug!(cycle, changes = changes.len(), "Manual poll");
                for event in events.try_iter() {
                    handle_event(&watcher, &event, args.resolution);
                }
            }
        }
        None => {
            watcher.start()?;
            for event in events.iter() {
                handle_event(&watcher, &event, args.resolution);
            }
        }
    }

    Ok(())
}

fn handle_event(watcher: &Watcher, event: &WatchEvent, resolution: Resolution) {
    print_event(event);

    let WatchEvent::Conflict(conflict) = event else {
        return;
    };
    if resolution == Resolution::Defer {
        println!("   {} left for manual resolution", "?".yellow());
        return;
    }
    // Writes made here arrive as Synced events on the next drain.
    if let Err(e) = watcher.resolve(conflict, resolution) {
        eprintln!("{} could not resolve: {}", "warning:".yellow().bold(), e);
    }
}

fn print_event(event: &WatchEvent) {
    let marker = match event {
        WatchEvent::Ready | WatchEvent::Stopped => "=>".blue().bold(),
        WatchEvent::Created { .. } => "+".green(),
        WatchEvent::Changed { .. } => "~".cyan(),
        WatchEvent::Deleted { .. } => "-".yellow(),
        WatchEvent::Synced(_) => "OK".green().bold(),
        WatchEvent::Conflict(_) => "!!".red().bold(),
        WatchEvent::SyncFailed { .. } => "!!".red().bold(),
    };
    println!("{} {}", marker, event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args(tools: &[&str]) -> WatchArgs {
        WatchArgs {
            tools: tools.iter().map(|s| s.to_string()).collect(),
            interval_ms: Some(5),
            cycles: Some(1),
            resolution: Resolution::Defer,
        }
    }

    #[test]
    fn test_watch_single_cycle() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("AI_CONTEXT.md"), "context").unwrap();
        let config = WatcherConfig::for_root(temp_dir.path());

        assert!(run_watch(config, args(&["claude"])).is_ok());
    }

    #[test]
    fn test_watch_unknown_tool_fails() {
        let temp_dir = TempDir::new().unwrap();
        let config = WatcherConfig::for_root(temp_dir.path());

        assert!(run_watch(config, args(&["nonexistent"])).is_err());
    }

    #[test]
    fn test_watch_without_selection_fails() {
        let temp_dir = TempDir::new().unwrap();
        let config = WatcherConfig {
            watch_all_tools: false,
            ..WatcherConfig::for_root(temp_dir.path())
        };

        let result = run_watch(config, args(&[]));
        assert!(matches!(result, Err(CliError::User { .. })));
    }
}
