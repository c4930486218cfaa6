//! Change detection and synchronization for AI tool context artifacts.
//!
//! A [`Watcher`] polls a set of tracked paths (files or directory trees),
//! classifies what changed since the previous cycle, and feeds each change
//! through the [`DecisionEngine`] and the [`Executor`]: canonical edits are
//! propagated to every tool's derived artifact, direct edits of a derived
//! artifact are pulled back into the canonical source, and independent
//! edits on both sides surface as [`Conflict`]s for an external decision.
//!
//! ```no_run
//! use ctx_sync::{Watcher, WatcherConfig};
//!
//! # fn main() -> ctx_sync::Result<()> {
//! let mut watcher = Watcher::new(WatcherConfig::for_root("."))?;
//! watcher.watch_registry(".")?;
//! let events = watcher.subscribe();
//! watcher.start()?;
//! for event in events.iter().take(10) {
//!     println!("{}", event);
//! }
//! watcher.stop();
//! # Ok(())
//! # }
//! ```
//!
//! Nothing is persisted: after a restart the first sweep is the baseline,
//! so a change made while the process was down is not reported.

pub mod check;
pub mod config;
pub mod decision;
pub mod error;
pub mod event;
pub mod executor;
pub mod ledger;
pub mod logging;
pub mod session;
pub mod state;
pub mod tracked;
pub mod watcher;

pub use check::{CheckReport, CheckStatus, DriftItem, check};
pub use config::{CONFIG_FILE, WatcherConfig};
pub use decision::{Conflict, ConflictReason, DecisionEngine, SyncAction, SyncTarget};
pub use error::{Error, Result};
pub use event::{ChangeEvent, ChangeKind, WatchEvent};
pub use executor::{Executor, Resolution, SyncDirection, SyncOutcome};
pub use ledger::{SyncLedger, SyncPoint};
pub use session::SyncSession;
pub use state::{Observation, PathState, StateStore};
pub use tracked::{TrackedPath, WatchOptions};
pub use watcher::Watcher;
