//! ai-context-sync CLI
//!
//! Lists tool bindings, checks for drift, and runs the watcher.

mod cli;
mod commands;
mod error;

use std::path::Path;

use clap::Parser;
use colored::Colorize;
use ctx_fs::NormalizedPath;
use ctx_sync::WatcherConfig;

use cli::{Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let directive = if cli.verbose { "debug" } else { "warn" };
    if let Err(e) = ctx_sync::logging::init(directive) {
        eprintln!("{} logging unavailable: {}", "warning:".yellow().bold(), e);
    }
    tracing::debug!("Verbose mode enabled");

    let root = match &cli.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };

    match cli.command {
        Some(cmd) => execute_command(cmd, &root, cli.root.is_some(), cli.config.as_deref()),
        None => {
            println!("{} AI context sync", "ctx-sync".green().bold());
            println!();
            println!("Run {} for available commands.", "ctx-sync --help".cyan());
            Ok(())
        }
    }
}

fn execute_command(
    cmd: Commands,
    root: &Path,
    explicit_root: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = || load_config(root, explicit_root, config_path);
    match cmd {
        Commands::Init { interval_ms, force } => {
            commands::run_init(root, config_path, interval_ms, force)
        }
        Commands::Tools { category, json } => {
            commands::run_tools(&config()?, category.map(Into::into), json)
        }
        Commands::Check { json } => commands::run_check(&config()?, json),
        Commands::Watch {
            tools,
            interval_ms,
            cycles,
            on_conflict,
        } => commands::run_watch(
            config()?,
            commands::WatchArgs {
                tools,
                interval_ms,
                cycles,
                resolution: on_conflict.into(),
            },
        ),
    }
}

/// An explicit config file wins; otherwise `.ai-context/sync.toml` under
/// the root is used when present.
///
/// A relative `project_root` in an explicit file is resolved against the
/// root, and `-C` replaces whatever root the file names.
fn load_config(root: &Path, explicit_root: bool, config_path: Option<&Path>) -> Result<WatcherConfig> {
    let root = NormalizedPath::new(root);
    let config = match config_path {
        Some(path) => {
            let path = NormalizedPath::new(path);
            if !path.is_file() {
                return Err(error::CliError::user(format!("Config file not found: {}", path)));
            }
            let mut config = WatcherConfig::load(&path, &root)?;
            if explicit_root {
                config.project_root = root.to_native();
            }
            config
        }
        None => WatcherConfig::discover(&root)?,
    };
    Ok(config)
}
