//! Core types for the tool registry

use serde::{Deserialize, Serialize};

/// Tool category for filtering and organization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    /// IDE-based tools (Cursor, Windsurf, Antigravity)
    Ide,
    /// CLI-based agents (Claude, Aider, Gemini, Codex)
    CliAgent,
    /// Autonomous coding agents (Cline)
    Autonomous,
    /// Copilot-style assistants (GitHub Copilot)
    Copilot,
    /// Tools declared in a project registry file without a category
    #[default]
    Other,
}

/// Whether a mirror relates two files or two directory trees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorKind {
    #[default]
    File,
    Directory,
}

impl MirrorKind {
    pub fn is_directory(self) -> bool {
        matches!(self, Self::Directory)
    }
}

/// One canonical → derived relationship, both relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mirror {
    pub canonical: String,
    pub derived: String,
    #[serde(default)]
    pub kind: MirrorKind,
}

impl Mirror {
    pub fn file(canonical: impl Into<String>, derived: impl Into<String>) -> Self {
        Self {
            canonical: canonical.into(),
            derived: derived.into(),
            kind: MirrorKind::File,
        }
    }

    pub fn directory(canonical: impl Into<String>, derived: impl Into<String>) -> Self {
        Self {
            canonical: canonical.into(),
            derived: derived.into(),
            kind: MirrorKind::Directory,
        }
    }
}

/// A tool and the artifacts it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolBinding {
    /// Machine identifier (e.g., "copilot", "cursor")
    pub slug: String,
    /// Display name (e.g., "GitHub Copilot")
    pub name: String,
    pub category: ToolCategory,
    /// Priority for ordering (lower = higher priority)
    pub priority: u8,
    pub mirrors: Vec<Mirror>,
}

impl ToolBinding {
    /// Create a binding with default priority and no mirrors.
    pub fn new(slug: impl Into<String>, name: impl Into<String>, category: ToolCategory) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            category,
            priority: 50,
            mirrors: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_mirror(mut self, mirror: Mirror) -> Self {
        self.mirrors.push(mirror);
        self
    }

    /// Derived artifact paths owned by this tool.
    pub fn derived_paths(&self) -> impl Iterator<Item = &str> {
        self.mirrors.iter().map(|m| m.derived.as_str())
    }
}

/// Which side of a mirror a path sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingRole {
    Canonical,
    Derived,
}

/// Owned description of one binding a path participates in, attached to
/// change notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingInfo {
    pub tool: String,
    pub role: BindingRole,
    pub canonical: String,
    pub derived: String,
    pub kind: MirrorKind,
}

impl BindingInfo {
    pub(crate) fn new(binding: &ToolBinding, mirror: &Mirror, role: BindingRole) -> Self {
        Self {
            tool: binding.slug.clone(),
            role,
            canonical: mirror.canonical.clone(),
            derived: mirror.derived.clone(),
            kind: mirror.kind,
        }
    }
}

/// The role of a project-relative path according to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathRole<'a> {
    /// Source mirrored by one or more tools
    Canonical(Vec<(&'a ToolBinding, &'a Mirror)>),
    /// Artifact owned by exactly one tool
    Derived(&'a ToolBinding, &'a Mirror),
    /// Not known to any tool
    Unbound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_new() {
        let binding = ToolBinding::new("test", "Test Tool", ToolCategory::Ide);
        assert_eq!(binding.slug, "test");
        assert_eq!(binding.name, "Test Tool");
        assert_eq!(binding.priority, 50);
        assert!(binding.mirrors.is_empty());
    }

    #[test]
    fn test_builder() {
        let binding = ToolBinding::new("test", "Test", ToolCategory::Ide)
            .with_priority(10)
            .with_mirror(Mirror::file("AI_CONTEXT.md", "TEST.md"))
            .with_mirror(Mirror::directory("rules", ".test/rules"));
        assert_eq!(binding.priority, 10);
        assert_eq!(
            binding.derived_paths().collect::<Vec<_>>(),
            vec!["TEST.md", ".test/rules"]
        );
        assert!(binding.mirrors[1].kind.is_directory());
    }

    #[test]
    fn test_mirror_kind_defaults_to_file() {
        let mirror: Mirror =
            serde_json::from_str(r#"{"canonical": "a.md", "derived": "b.md"}"#).unwrap();
        assert_eq!(mirror.kind, MirrorKind::File);
    }
}
