//! One-shot drift check
//!
//! Compares every registered mirror on disk without touching the watcher's
//! state, for CI and for a quick look before starting the watcher.

use ctx_fs::{ContentIdentity, NormalizedPath, identify};
use ctx_tools::{MirrorKind, ToolRegistry};
use serde::{Deserialize, Serialize};

/// Worst state found across all mirrors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// Every derived artifact matches its canonical
    InSync,
    /// Some artifacts (or their canonical) are missing from disk
    Missing,
    /// Some artifacts differ from their canonical
    Drifted,
}

/// A mirror whose two sides differ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftItem {
    /// The tool that owns the derived artifact
    pub tool: String,
    pub canonical: String,
    pub derived: String,
    pub kind: MirrorKind,
    /// What differs, for display
    pub description: String,
}

/// Per-mirror outcome of [`check`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    pub status: CheckStatus,
    pub drifted: Vec<DriftItem>,
    pub missing: Vec<DriftItem>,
    /// Mirrors found in sync
    pub in_sync: usize,
}

impl CheckReport {
    /// Create a report with no issues
    pub fn in_sync(count: usize) -> Self {
        Self {
            status: CheckStatus::InSync,
            drifted: Vec::new(),
            missing: Vec::new(),
            in_sync: count,
        }
    }

    pub fn is_in_sync(&self) -> bool {
        self.status == CheckStatus::InSync
    }

    /// Combine two reports; drift outranks missing, which outranks in sync.
    pub fn merge(mut self, other: CheckReport) -> Self {
        self.drifted.extend(other.drifted);
        self.missing.extend(other.missing);
        self.in_sync += other.in_sync;

        self.status = match (self.status, other.status) {
            (CheckStatus::Drifted, _) | (_, CheckStatus::Drifted) => CheckStatus::Drifted,
            (CheckStatus::Missing, _) | (_, CheckStatus::Missing) => CheckStatus::Missing,
            (CheckStatus::InSync, CheckStatus::InSync) => CheckStatus::InSync,
        };

        self
    }

    fn with_missing(item: DriftItem) -> Self {
        Self {
            status: CheckStatus::Missing,
            drifted: Vec::new(),
            missing: vec![item],
            in_sync: 0,
        }
    }

    fn with_drifted(item: DriftItem) -> Self {
        Self {
            status: CheckStatus::Drifted,
            drifted: vec![item],
            missing: Vec::new(),
            in_sync: 0,
        }
    }
}

/// Compare every mirror of `registry` under `root`.
pub fn check(registry: &ToolRegistry, root: &NormalizedPath) -> CheckReport {
    let mut report = CheckReport::in_sync(0);

    for binding in registry.iter() {
        for mirror in &binding.mirrors {
            let canonical = root.join(&mirror.canonical);
            let derived = root.join(&mirror.derived);
            let item = |description: String| DriftItem {
                tool: binding.slug.clone(),
                canonical: mirror.canonical.clone(),
                derived: mirror.derived.clone(),
                kind: mirror.kind,
                description,
            };

            let result = match (identify(&canonical.to_native()), identify(&derived.to_native())) {
                (Err(e), _) | (_, Err(e)) => {
                    CheckReport::with_missing(item(format!("Failed to read: {}", e)))
                }
                (Ok(ContentIdentity::Absent), _) => {
                    CheckReport::with_missing(item("Canonical not found".to_string()))
                }
                (_, Ok(ContentIdentity::Absent)) => {
                    CheckReport::with_missing(item("Derived artifact not found".to_string()))
                }
                (Ok(c), Ok(d)) if c == d => CheckReport::in_sync(1),
                (Ok(c), Ok(d)) => CheckReport::with_drifted(item(format!(
                    "Digest mismatch: canonical {}, derived {}",
                    c.digest().map(|d| d.short()).unwrap_or("-"),
                    d.digest().map(|d| d.short()).unwrap_or("-"),
                ))),
            };
            report = report.merge(result);
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctx_tools::{Mirror, ToolBinding, ToolCategory};
    use std::fs;
    use tempfile::tempdir;

    fn registry() -> ToolRegistry {
        ToolRegistry::from_bindings([
            ToolBinding::new("a", "A", ToolCategory::Other).with_mirror(Mirror::file("ctx.md", "A.md")),
            ToolBinding::new("b", "B", ToolCategory::Other).with_mirror(Mirror::file("ctx.md", "B.md")),
        ])
        .unwrap()
    }

    #[test]
    fn all_mirrors_equal_is_in_sync() {
        let dir = tempdir().unwrap();
        for name in ["ctx.md", "A.md", "B.md"] {
            fs::write(dir.path().join(name), "same").unwrap();
        }
        let report = check(&registry(), &NormalizedPath::new(dir.path()));
        assert!(report.is_in_sync());
        assert_eq!(report.in_sync, 2);
    }

    #[test]
    fn drifted_outranks_missing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("ctx.md"), "same").unwrap();
        fs::write(dir.path().join("A.md"), "other").unwrap();

        let report = check(&registry(), &NormalizedPath::new(dir.path()));
        assert_eq!(report.status, CheckStatus::Drifted);
        assert_eq!(report.drifted[0].tool, "a");
        assert_eq!(report.missing[0].tool, "b");
    }

    #[test]
    fn merge_keeps_worst_status() {
        let merged = CheckReport::in_sync(1).merge(CheckReport::with_missing(DriftItem {
            tool: "a".into(),
            canonical: "ctx.md".into(),
            derived: "A.md".into(),
            kind: MirrorKind::File,
            description: "Missing".into(),
        }));
        assert_eq!(merged.status, CheckStatus::Missing);
        assert_eq!(merged.in_sync, 1);
    }
}
