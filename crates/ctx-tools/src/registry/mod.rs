//! Tool registry - single source of truth for tool path knowledge

mod builtins;
mod config;
mod store;
mod types;

pub use builtins::{BUILTIN_COUNT, CANONICAL_CONTEXT, CANONICAL_RULES, builtin_bindings};
pub use config::{RegistryConfig, ToolEntry};
pub use store::ToolRegistry;
pub use types::{BindingInfo, BindingRole, Mirror, MirrorKind, PathRole, ToolBinding, ToolCategory};
