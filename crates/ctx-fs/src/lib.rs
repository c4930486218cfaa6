//! Filesystem layer for ai-context-sync
//!
//! Provides normalized path identities, content digests for files and
//! directory trees, and atomic writes used when materializing synced
//! artifacts.

pub mod checksum;
pub mod config;
pub mod error;
pub mod io;
pub mod path;

pub use checksum::{ContentIdentity, Digest, identify};
pub use config::{ConfigFormat, ConfigStore};
pub use error::{Error, Result};
pub use io::RobustnessConfig;
pub use path::NormalizedPath;
