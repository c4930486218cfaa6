//! Registry configuration file
//!
//! Projects may add tools, override built-ins, or disable tools through a
//! registry file (TOML, JSON or YAML):
//!
//! ```toml
//! include_builtins = true
//! disabled = ["aider"]
//!
//! [tools.zed]
//! name = "Zed"
//! category = "ide"
//!
//! [[tools.zed.mirrors]]
//! canonical = "AI_CONTEXT.md"
//! derived = ".zed/context.md"
//! ```

use super::{Mirror, ToolBinding, ToolCategory, ToolRegistry, builtin_bindings};
use crate::Result;
use ctx_fs::{ConfigStore, NormalizedPath};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

fn default_true() -> bool {
    true
}

/// One tool declared in a registry file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolEntry {
    /// Display name; defaults to the slug
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: ToolCategory,
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default)]
    pub mirrors: Vec<Mirror>,
}

impl ToolEntry {
    fn into_binding(self, slug: &str) -> ToolBinding {
        let mut binding = ToolBinding::new(
            slug,
            self.name.unwrap_or_else(|| slug.to_string()),
            self.category,
        );
        if let Some(priority) = self.priority {
            binding = binding.with_priority(priority);
        }
        binding.mirrors = self.mirrors;
        binding
    }
}

/// Contents of a registry file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Start from the built-in tool set
    #[serde(default = "default_true")]
    pub include_builtins: bool,
    /// Declared tools; an entry replaces a built-in with the same slug
    #[serde(default)]
    pub tools: BTreeMap<String, ToolEntry>,
    /// Slugs left out of the registry
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            include_builtins: true,
            tools: BTreeMap::new(),
            disabled: Vec::new(),
        }
    }
}

impl RegistryConfig {
    /// Load a registry file, format chosen by extension.
    pub fn load(path: &NormalizedPath) -> Result<Self> {
        Ok(ConfigStore::new().load(path)?)
    }

    /// Resolve into the final binding list: built-ins (if enabled), replaced
    /// by declared tools of the same slug, minus disabled slugs.
    pub fn bindings(&self) -> Vec<ToolBinding> {
        let mut bindings: BTreeMap<String, ToolBinding> = BTreeMap::new();
        if self.include_builtins {
            for binding in builtin_bindings() {
                bindings.insert(binding.slug.clone(), binding);
            }
        }
        for (slug, entry) in &self.tools {
            if bindings.contains_key(slug) {
                debug!(tool = %slug, "Registry file overrides built-in tool");
            }
            bindings.insert(slug.clone(), entry.clone().into_binding(slug));
        }
        for slug in &self.disabled {
            bindings.remove(slug);
        }
        bindings.into_values().collect()
    }
}

impl ToolRegistry {
    /// Build a registry from a parsed registry file.
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        Self::from_bindings(config.bindings())
    }

    /// Load and validate a registry file.
    pub fn load(path: &NormalizedPath) -> Result<Self> {
        Self::from_config(&RegistryConfig::load(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_builtins() {
        let config = RegistryConfig::default();
        assert_eq!(config.bindings().len(), crate::BUILTIN_COUNT);
    }

    #[test]
    fn entry_replaces_builtin_with_same_slug() {
        let mut config = RegistryConfig::default();
        config.tools.insert(
            "claude".into(),
            ToolEntry {
                mirrors: vec![Mirror::file("AI_CONTEXT.md", ".claude/CLAUDE.md")],
                ..Default::default()
            },
        );

        let bindings = config.bindings();
        let claude = bindings.iter().find(|b| b.slug == "claude").unwrap();
        assert_eq!(claude.name, "claude");
        assert_eq!(claude.derived_paths().collect::<Vec<_>>(), vec![".claude/CLAUDE.md"]);
    }

    #[test]
    fn disabled_tools_are_dropped() {
        let config = RegistryConfig {
            disabled: vec!["aider".into(), "codex".into()],
            ..Default::default()
        };
        let bindings = config.bindings();
        assert_eq!(bindings.len(), crate::BUILTIN_COUNT - 2);
        assert!(bindings.iter().all(|b| b.slug != "aider" && b.slug != "codex"));
    }
}
