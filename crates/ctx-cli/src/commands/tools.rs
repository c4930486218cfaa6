//! Tool listing

use colored::Colorize;
use ctx_sync::WatcherConfig;
use ctx_tools::{MirrorKind, ToolCategory};

use crate::error::Result;

const CATEGORIES: [(ToolCategory, &str); 5] = [
    (ToolCategory::Ide, "IDE Tools"),
    (ToolCategory::CliAgent, "CLI Agents"),
    (ToolCategory::Autonomous, "Autonomous Agents"),
    (ToolCategory::Copilot, "Copilots"),
    (ToolCategory::Other, "Project Tools"),
];

/// Run the tools command
pub fn run_tools(config: &WatcherConfig, filter: Option<ToolCategory>, json: bool) -> Result<()> {
    let registry = config.build_registry()?;

    if json {
        let bindings: Vec<_> = registry
            .iter()
            .filter(|b| filter.is_none_or(|f| b.category == f))
            .collect();
        println!("{}", serde_json::to_string_pretty(&bindings)?);
        return Ok(());
    }

    println!("{}", "Registered Tools".bold());
    println!();

    for (category, label) in CATEGORIES {
        if filter.is_some_and(|f| f != category) {
            continue;
        }
        let slugs = registry.by_category(category);
        if slugs.is_empty() {
            continue;
        }

        println!("{}:", label.cyan().bold());
        for slug in slugs {
            let Some(binding) = registry.get(slug) else {
                continue;
            };
            println!("  {:<14} {}", slug.green(), binding.name);
            for mirror in &binding.mirrors {
                let suffix = match mirror.kind {
                    MirrorKind::Directory => "/",
                    MirrorKind::File => "",
                };
                println!(
                    "  {:<14} {}{} {} {}{}",
                    "",
                    mirror.canonical.dimmed(),
                    suffix.dimmed(),
                    "->".dimmed(),
                    mirror.derived,
                    suffix
                );
            }
        }
        println!();
    }

    println!("{}:", "Canonical Sources".cyan().bold());
    for (path, kind) in registry.canonical_paths() {
        let suffix = if kind.is_directory() { "/" } else { "" };
        println!("  {}{}", path, suffix);
    }
    println!();

    println!("{} {} tools registered.", "Total:".dimmed(), registry.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_tools_runs_with_builtins() {
        let temp_dir = TempDir::new().unwrap();
        let config = WatcherConfig::for_root(temp_dir.path());
        assert!(run_tools(&config, None, false).is_ok());
        assert!(run_tools(&config, Some(ToolCategory::Ide), true).is_ok());
    }

    #[test]
    fn test_tools_reports_bad_registry() {
        let temp_dir = TempDir::new().unwrap();
        let config = WatcherConfig {
            registry_path: Some("missing.toml".into()),
            ..WatcherConfig::for_root(temp_dir.path())
        };
        assert!(run_tools(&config, None, false).is_err());
    }
}
