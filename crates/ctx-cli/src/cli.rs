//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use ctx_sync::Resolution;
use ctx_tools::ToolCategory;

/// Keep AI tool context files in sync with their canonical sources
#[derive(Parser, Debug)]
#[command(name = "ctx-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project root (defaults to the current directory)
    #[arg(short = 'C', long, global = true, env = "CTX_SYNC_ROOT")]
    pub root: Option<PathBuf>,

    /// Watcher config file (defaults to <root>/.ai-context/sync.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Write a default watcher config to .ai-context/sync.toml
    Init {
        /// Poll interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// List the tools and the artifacts they mirror
    Tools {
        /// Only show tools of this category
        #[arg(short, long, value_enum)]
        category: Option<CategoryArg>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Compare every derived artifact with its canonical source
    ///
    /// Exits non-zero when anything is missing or has drifted.
    Check {
        /// Output as JSON for CI/CD integration
        #[arg(long)]
        json: bool,
    },

    /// Watch canonical and derived artifacts and keep them in sync
    ///
    /// Examples:
    ///   ctx-sync watch                      # every registered tool
    ///   ctx-sync watch -t claude -t cursor  # selected tools only
    ///   ctx-sync watch --cycles 1           # one sweep, then exit
    Watch {
        /// Tools to watch (all registered tools when omitted)
        #[arg(short, long = "tool")]
        tools: Vec<String>,

        /// Poll interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Stop after this many poll cycles
        #[arg(long)]
        cycles: Option<u32>,

        /// How to settle conflicts as they are reported
        #[arg(long, value_enum, default_value = "defer")]
        on_conflict: ConflictArg,
    },
}

/// Tool category filter
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryArg {
    Ide,
    CliAgent,
    Autonomous,
    Copilot,
    Other,
}

impl From<CategoryArg> for ToolCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Ide => ToolCategory::Ide,
            CategoryArg::CliAgent => ToolCategory::CliAgent,
            CategoryArg::Autonomous => ToolCategory::Autonomous,
            CategoryArg::Copilot => ToolCategory::Copilot,
            CategoryArg::Other => ToolCategory::Other,
        }
    }
}

/// Conflict policy for `watch`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictArg {
    /// Report and leave both sides alone
    Defer,
    /// Overwrite the derived artifact
    Canonical,
    /// Overwrite the canonical source
    Derived,
}

impl From<ConflictArg> for Resolution {
    fn from(arg: ConflictArg) -> Self {
        match arg {
            ConflictArg::Defer => Resolution::Defer,
            ConflictArg::Canonical => Resolution::CanonicalWins,
            ConflictArg::Derived => Resolution::DerivedWins,
        }
    }
}
