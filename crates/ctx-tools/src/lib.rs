//! Tool registry for ai-context-sync.
//!
//! Each supported assistant (Claude, Copilot, Cursor, ...) consumes its own
//! context artifact. This crate is the only place that knows which artifact
//! belongs to which tool and which canonical source it mirrors; the watcher
//! and the decision engine stay tool-agnostic and ask the registry.
//!
//! The registry is built once, validated, and then treated as immutable for
//! the lifetime of a sync session.

pub mod error;
pub mod registry;

pub use error::{Error, Result};
pub use registry::{
    BUILTIN_COUNT, BindingInfo, BindingRole, Mirror, MirrorKind, PathRole, RegistryConfig,
    ToolBinding, ToolCategory, ToolEntry, ToolRegistry, builtin_bindings,
};
