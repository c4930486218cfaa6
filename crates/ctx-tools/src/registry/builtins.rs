//! Built-in tool bindings
//!
//! Every supported assistant mirrors the shared `AI_CONTEXT.md`; tools that
//! read a rules directory additionally mirror `.ai-context/rules/`.

use super::{Mirror, ToolBinding, ToolCategory};

/// Canonical project context consumed by every built-in tool.
pub const CANONICAL_CONTEXT: &str = "AI_CONTEXT.md";

/// Canonical rules directory for tools that read a rules tree.
pub const CANONICAL_RULES: &str = ".ai-context/rules";

/// Number of built-in tools.
pub const BUILTIN_COUNT: usize = 9;

/// Returns all built-in tool bindings.
pub fn builtin_bindings() -> Vec<ToolBinding> {
    vec![
        // IDEs
        ToolBinding::new("cursor", "Cursor", ToolCategory::Ide)
            .with_priority(20)
            .with_mirror(Mirror::file(CANONICAL_CONTEXT, ".cursorrules")),
        ToolBinding::new("windsurf", "Windsurf", ToolCategory::Ide)
            .with_mirror(Mirror::file(CANONICAL_CONTEXT, ".windsurfrules")),
        ToolBinding::new("antigravity", "Antigravity", ToolCategory::Ide)
            .with_mirror(Mirror::file(CANONICAL_CONTEXT, ".agent/context.md"))
            .with_mirror(Mirror::directory(CANONICAL_RULES, ".agent/rules")),
        // CLI agents
        ToolBinding::new("claude", "Claude Code", ToolCategory::CliAgent)
            .with_priority(10)
            .with_mirror(Mirror::file(CANONICAL_CONTEXT, "CLAUDE.md")),
        ToolBinding::new("gemini", "Gemini CLI", ToolCategory::CliAgent)
            .with_mirror(Mirror::file(CANONICAL_CONTEXT, "GEMINI.md")),
        ToolBinding::new("aider", "Aider", ToolCategory::CliAgent)
            .with_mirror(Mirror::file(CANONICAL_CONTEXT, "CONVENTIONS.md")),
        ToolBinding::new("codex", "Codex", ToolCategory::CliAgent)
            .with_mirror(Mirror::file(CANONICAL_CONTEXT, "AGENTS.md")),
        // Autonomous agents
        ToolBinding::new("cline", "Cline", ToolCategory::Autonomous)
            .with_mirror(Mirror::file(CANONICAL_CONTEXT, ".clinerules")),
        // Copilots
        ToolBinding::new("copilot", "GitHub Copilot", ToolCategory::Copilot)
            .with_priority(10)
            .with_mirror(Mirror::file(
                CANONICAL_CONTEXT,
                ".github/copilot-instructions.md",
            )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_count() {
        assert_eq!(builtin_bindings().len(), BUILTIN_COUNT);
    }

    #[test]
    fn test_no_duplicate_slugs() {
        let bindings = builtin_bindings();
        let slugs: HashSet<_> = bindings.iter().map(|b| &b.slug).collect();
        assert_eq!(slugs.len(), BUILTIN_COUNT, "Duplicate slugs found");
    }

    #[test]
    fn test_derived_paths_are_disjoint() {
        let bindings = builtin_bindings();
        let mut seen = HashSet::new();
        for binding in &bindings {
            for derived in binding.derived_paths() {
                assert!(seen.insert(derived), "{} owned twice", derived);
            }
        }
    }

    #[test]
    fn test_every_tool_mirrors_context() {
        for binding in builtin_bindings() {
            assert!(
                binding.mirrors.iter().any(|m| m.canonical == CANONICAL_CONTEXT),
                "{} does not mirror {}",
                binding.slug,
                CANONICAL_CONTEXT
            );
        }
    }
}
