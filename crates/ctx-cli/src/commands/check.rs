//! Drift check command

use colored::Colorize;
use ctx_sync::{CheckStatus, DriftItem, WatcherConfig, check};

use crate::error::{CliError, Result};

fn print_items(items: &[DriftItem], marker: &str) {
    for item in items {
        println!(
            "   {} {} ({}): {}",
            marker,
            item.derived.cyan(),
            item.tool.dimmed(),
            item.description
        );
    }
}

/// Run the check command
///
/// Compares every mirror on disk and fails when anything is out of sync.
pub fn run_check(config: &WatcherConfig, json: bool) -> Result<()> {
    let registry = config.build_registry()?;
    let report = check(&registry, &config.project_root());

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{} Checking context artifacts...", "=>".blue().bold());
        match report.status {
            CheckStatus::InSync => {
                println!(
                    "{} {} mirrors in sync. No drift detected.",
                    "OK".green().bold(),
                    report.in_sync
                );
            }
            CheckStatus::Missing => {
                println!("{} Some artifacts are missing:", "MISSING".yellow().bold());
                print_items(&report.missing, &"-".yellow().to_string());
            }
            CheckStatus::Drifted => {
                println!("{} Artifacts have drifted:", "DRIFTED".red().bold());
                print_items(&report.drifted, &"!".red().to_string());
                if !report.missing.is_empty() {
                    println!();
                    println!("{} Also missing:", "MISSING".yellow().bold());
                    print_items(&report.missing, &"-".yellow().to_string());
                }
            }
        }
    }

    if report.is_in_sync() {
        Ok(())
    } else {
        Err(CliError::user(format!(
            "{} drifted, {} missing",
            report.drifted.len(),
            report.missing.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_with_one_tool(dir: &std::path::Path) -> WatcherConfig {
        fs::write(
            dir.join("tools.toml"),
            "include_builtins = false\n\n[tools.demo]\nmirrors = [{ canonical = \"ctx.md\", derived = \"DEMO.md\" }]\n",
        )
        .unwrap();
        WatcherConfig {
            registry_path: Some("tools.toml".into()),
            ..WatcherConfig::for_root(dir)
        }
    }

    #[test]
    fn test_check_in_sync() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_with_one_tool(temp_dir.path());
        fs::write(temp_dir.path().join("ctx.md"), "same").unwrap();
        fs::write(temp_dir.path().join("DEMO.md"), "same").unwrap();

        assert!(run_check(&config, false).is_ok());
    }

    #[test]
    fn test_check_drift_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_with_one_tool(temp_dir.path());
        fs::write(temp_dir.path().join("ctx.md"), "same").unwrap();
        fs::write(temp_dir.path().join("DEMO.md"), "other").unwrap();

        let result = run_check(&config, true);
        assert!(matches!(result, Err(CliError::User { .. })));
    }
}
