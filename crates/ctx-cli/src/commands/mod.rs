//! Command implementations for ctx-cli

pub mod check;
pub mod init;
pub mod tools;
pub mod watch;

pub use check::run_check;
pub use init::run_init;
pub use tools::run_tools;
pub use watch::{WatchArgs, run_watch};
