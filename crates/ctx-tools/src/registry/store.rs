//! Tool registry storage and validation

use super::{BindingInfo, BindingRole, Mirror, MirrorKind, PathRole, ToolBinding, ToolCategory};
use crate::{Error, Result};
use ctx_fs::NormalizedPath;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Index entry: tool slug and position of the mirror in its binding.
type MirrorRef = (String, usize);

/// Central registry of tool bindings.
///
/// Every binding is validated on [`ToolRegistry::register`]; a registry that
/// exists is therefore consistent: derived paths are pairwise disjoint, no
/// path is both canonical and derived, and no artifact is nested inside
/// another tool's artifact.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolBinding>,
    /// identity key of a derived path -> owner
    derived_index: HashMap<String, MirrorRef>,
    /// identity key of a canonical path -> mirrors reading it
    canonical_index: HashMap<String, Vec<MirrorRef>>,
}

/// Project-relative identity key for a registry path.
fn path_key(path: &str) -> String {
    NormalizedPath::new(path).identity_key()
}

/// `a` and `b` are the same path or one contains the other.
fn overlaps(a: &str, b: &str) -> bool {
    a == b || a.starts_with(&format!("{}/", b)) || b.starts_with(&format!("{}/", a))
}

fn validate_relative(slug: &str, path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(Error::configuration(format!(
            "tool '{}' declares an empty path",
            slug
        )));
    }
    let normalized = NormalizedPath::new(path);
    if normalized.is_absolute() {
        return Err(Error::configuration(format!(
            "tool '{}' path '{}' must be relative to the project root",
            slug, path
        )));
    }
    if normalized.as_str() == "." || normalized.as_str().split('/').any(|part| part == "..") {
        return Err(Error::configuration(format!(
            "tool '{}' path '{}' escapes the project root",
            slug, path
        )));
    }
    Ok(())
}

fn validate_slug(slug: &str) -> Result<()> {
    let valid = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(Error::configuration(format!(
            "invalid tool slug '{}': use lowercase letters, digits, '-' or '_'",
            slug
        )))
    }
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with all built-in tools.
    pub fn with_builtins() -> Result<Self> {
        Self::from_bindings(super::builtins::builtin_bindings())
    }

    /// Build a registry from a list of bindings, validating each.
    pub fn from_bindings(bindings: impl IntoIterator<Item = ToolBinding>) -> Result<Self> {
        let mut registry = Self::new();
        for binding in bindings {
            registry.register(binding)?;
        }
        Ok(registry)
    }

    /// Register a tool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the binding conflicts with itself
    /// or with an already registered binding. The registry is unchanged on
    /// error.
    pub fn register(&mut self, mut binding: ToolBinding) -> Result<()> {
        validate_slug(&binding.slug)?;
        if self.tools.contains_key(&binding.slug) {
            return Err(Error::configuration(format!(
                "tool '{}' registered twice",
                binding.slug
            )));
        }
        if binding.mirrors.is_empty() {
            return Err(Error::configuration(format!(
                "tool '{}' declares no artifacts",
                binding.slug
            )));
        }

        for mirror in &mut binding.mirrors {
            validate_relative(&binding.slug, &mirror.canonical)?;
            validate_relative(&binding.slug, &mirror.derived)?;
            mirror.canonical = NormalizedPath::new(&mirror.canonical).as_str().to_string();
            mirror.derived = NormalizedPath::new(&mirror.derived).as_str().to_string();
        }

        self.check_conflicts(&binding)?;

        for (index, mirror) in binding.mirrors.iter().enumerate() {
            let entry = (binding.slug.clone(), index);
            self.derived_index
                .insert(path_key(&mirror.derived), entry.clone());
            self.canonical_index
                .entry(path_key(&mirror.canonical))
                .or_default()
                .push(entry);
        }
        debug!(tool = %binding.slug, mirrors = binding.mirrors.len(), "Registered tool");
        self.tools.insert(binding.slug.clone(), binding);
        Ok(())
    }

    fn check_conflicts(&self, binding: &ToolBinding) -> Result<()> {
        let slug = &binding.slug;
        let existing_derived: Vec<String> = self.derived_index.keys().cloned().collect();
        let existing_canonical: Vec<String> = self.canonical_index.keys().cloned().collect();

        for (index, mirror) in binding.mirrors.iter().enumerate() {
            let derived = path_key(&mirror.derived);
            let canonical = path_key(&mirror.canonical);

            if overlaps(&derived, &canonical) {
                return Err(Error::configuration(format!(
                    "tool '{}' derives '{}' from an overlapping canonical '{}'",
                    slug, mirror.derived, mirror.canonical
                )));
            }

            let own_derived = binding
                .mirrors
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != index)
                .map(|(_, m)| path_key(&m.derived));
            let own_canonical = binding.mirrors.iter().map(|m| path_key(&m.canonical));

            for other in existing_derived.iter().cloned().chain(own_derived) {
                if overlaps(&derived, &other) {
                    return Err(Error::configuration(format!(
                        "derived path '{}' of tool '{}' overlaps an artifact owned by another binding",
                        mirror.derived, slug
                    )));
                }
                if overlaps(&canonical, &other) {
                    return Err(Error::configuration(format!(
                        "canonical path '{}' of tool '{}' overlaps a derived artifact",
                        mirror.canonical, slug
                    )));
                }
            }
            for other in existing_canonical.iter().cloned().chain(own_canonical) {
                if overlaps(&derived, &other) {
                    return Err(Error::configuration(format!(
                        "derived path '{}' of tool '{}' overlaps a canonical path",
                        mirror.derived, slug
                    )));
                }
            }

            let registered = self
                .mirrors_of_canonical(&mirror.canonical)
                .into_iter()
                .map(|(owner, other)| (owner.slug.as_str(), other));
            let own = binding.mirrors.iter().map(|other| (slug.as_str(), other));
            for (owner, other) in registered.chain(own) {
                if path_key(&other.canonical) == canonical && other.kind != mirror.kind {
                    return Err(Error::configuration(format!(
                        "canonical '{}' is mirrored as a {:?} by '{}' but as a {:?} by '{}'",
                        mirror.canonical, other.kind, owner, mirror.kind, slug
                    )));
                }
            }
        }
        Ok(())
    }

    fn resolve(&self, entry: &MirrorRef) -> Option<(&ToolBinding, &Mirror)> {
        let binding = self.tools.get(&entry.0)?;
        let mirror = binding.mirrors.get(entry.1)?;
        Some((binding, mirror))
    }

    /// Get a binding by slug.
    pub fn get(&self, slug: &str) -> Option<&ToolBinding> {
        self.tools.get(slug)
    }

    /// Get a binding by slug or fail with [`Error::UnknownTool`].
    pub fn require(&self, slug: &str) -> Result<&ToolBinding> {
        self.get(slug).ok_or_else(|| Error::UnknownTool {
            slug: slug.to_string(),
        })
    }

    /// Check if a tool is registered.
    pub fn contains(&self, slug: &str) -> bool {
        self.tools.contains_key(slug)
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// List all registered tool slugs (sorted).
    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// List tools by category (sorted).
    pub fn by_category(&self, cat: ToolCategory) -> Vec<&str> {
        self.tools
            .iter()
            .filter(|(_, b)| b.category == cat)
            .map(|(s, _)| s.as_str())
            .collect()
    }

    /// Get all bindings sorted by priority (lower = higher priority).
    pub fn by_priority(&self) -> Vec<&ToolBinding> {
        let mut tools: Vec<_> = self.tools.values().collect();
        tools.sort_by_key(|t| t.priority);
        tools
    }

    /// Iterate over all bindings in slug order.
    pub fn iter(&self) -> impl Iterator<Item = &ToolBinding> {
        self.tools.values()
    }

    /// Derived artifact paths owned by `slug`; empty for unknown tools.
    pub fn derived_paths_of(&self, slug: &str) -> Vec<&str> {
        self.get(slug)
            .map(|b| b.derived_paths().collect())
            .unwrap_or_default()
    }

    /// Tools mirroring the canonical `path`.
    pub fn canonical_mirrors_of(&self, path: &str) -> Vec<&ToolBinding> {
        self.mirrors_of_canonical(path)
            .into_iter()
            .map(|(binding, _)| binding)
            .collect()
    }

    /// Every (tool, mirror) pair reading the canonical `path`, in slug order.
    pub fn mirrors_of_canonical(&self, path: &str) -> Vec<(&ToolBinding, &Mirror)> {
        let mut found: Vec<_> = self
            .canonical_index
            .get(&path_key(path))
            .into_iter()
            .flatten()
            .filter_map(|entry| self.resolve(entry))
            .collect();
        found.sort_by(|a, b| a.0.slug.cmp(&b.0.slug));
        found
    }

    /// The tool owning the derived artifact at `path`.
    pub fn owner_of_derived(&self, path: &str) -> Option<(&ToolBinding, &Mirror)> {
        self.derived_index
            .get(&path_key(path))
            .and_then(|entry| self.resolve(entry))
    }

    /// Classify a project-relative path.
    pub fn role_of(&self, path: &str) -> PathRole<'_> {
        if let Some((binding, mirror)) = self.owner_of_derived(path) {
            return PathRole::Derived(binding, mirror);
        }
        let canonical = self.mirrors_of_canonical(path);
        if canonical.is_empty() {
            PathRole::Unbound
        } else {
            PathRole::Canonical(canonical)
        }
    }

    /// Owned binding descriptions for `path`, suitable for notifications.
    pub fn bindings_for(&self, path: &str) -> Vec<BindingInfo> {
        match self.role_of(path) {
            PathRole::Derived(binding, mirror) => {
                vec![BindingInfo::new(binding, mirror, BindingRole::Derived)]
            }
            PathRole::Canonical(pairs) => pairs
                .into_iter()
                .map(|(binding, mirror)| BindingInfo::new(binding, mirror, BindingRole::Canonical))
                .collect(),
            PathRole::Unbound => Vec::new(),
        }
    }

    /// Distinct canonical paths with their kind, sorted.
    pub fn canonical_paths(&self) -> Vec<(&str, MirrorKind)> {
        let mut paths: Vec<(&str, MirrorKind)> = self
            .tools
            .values()
            .flat_map(|b| b.mirrors.iter())
            .map(|m| (m.canonical.as_str(), m.kind))
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_binding(slug: &str, derived: &str) -> ToolBinding {
        ToolBinding::new(slug, slug.to_uppercase(), ToolCategory::Ide)
            .with_mirror(Mirror::file("context.md", derived))
    }

    #[test]
    fn test_empty_registry() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ToolRegistry::new();
        registry.register(make_binding("test", "TEST.md")).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.contains("test"));
        assert!(registry.get("test").is_some());
        assert!(registry.require("unknown").is_err());
    }

    #[test]
    fn test_list_sorted() {
        let registry = ToolRegistry::from_bindings([
            make_binding("zed", "ZED.md"),
            make_binding("aider", "AIDER.md"),
            make_binding("claude", "CLAUDE.md"),
        ])
        .unwrap();
        assert_eq!(registry.list(), vec!["aider", "claude", "zed"]);
    }

    #[test]
    fn test_by_priority() {
        let registry = ToolRegistry::from_bindings([
            make_binding("low", "LOW.md").with_priority(100),
            make_binding("high", "HIGH.md").with_priority(10),
            make_binding("mid", "MID.md").with_priority(50),
        ])
        .unwrap();

        let ordered = registry.by_priority();
        assert_eq!(ordered[0].slug, "high");
        assert_eq!(ordered[1].slug, "mid");
        assert_eq!(ordered[2].slug, "low");
    }

    #[test]
    fn test_paths_are_normalized_on_register() {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                ToolBinding::new("copilot", "Copilot", ToolCategory::Copilot)
                    .with_mirror(Mirror::file("./context.md", ".github\\copilot-instructions.md")),
            )
            .unwrap();

        let (binding, mirror) = registry
            .owner_of_derived(".github/copilot-instructions.md")
            .unwrap();
        assert_eq!(binding.slug, "copilot");
        assert_eq!(mirror.canonical, "context.md");
    }

    #[test]
    fn test_with_builtins() {
        let registry = ToolRegistry::with_builtins().unwrap();
        assert_eq!(registry.len(), crate::registry::BUILTIN_COUNT);
        assert!(registry.contains("claude"));
        assert!(registry.contains("copilot"));
    }
}
