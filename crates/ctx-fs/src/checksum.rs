//! SHA-256 content identities
//!
//! Provides a single canonical digest format (`sha256:<hex>`) for files and
//! whole directory trees. Content is treated as opaque bytes.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

use crate::io::list_files_sorted;

/// Prefix for all checksums produced by this module
const PREFIX: &str = "sha256:";

/// Fixed-length content identity in the canonical `sha256:<hex>` format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    fn from_hasher(hasher: Sha256) -> Self {
        Self(format!("{}{:x}", PREFIX, hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        let hex = &self.0[PREFIX.len()..];
        &hex[..hex.len().min(12)]
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a path currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "digest")]
pub enum ContentIdentity {
    /// Nothing exists at the path
    Absent,
    /// The path exists and its content hashes to this digest
    Present(Digest),
}

impl ContentIdentity {
    pub fn exists(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    pub fn digest(&self) -> Option<&Digest> {
        match self {
            Self::Present(digest) => Some(digest),
            Self::Absent => None,
        }
    }
}

/// Compute the SHA-256 checksum of in-memory content.
pub fn compute_content_checksum(content: impl AsRef<[u8]>) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(content.as_ref());
    Digest::from_hasher(hasher)
}

/// Compute the SHA-256 checksum of a file's contents.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn compute_file_checksum(path: &Path) -> io::Result<Digest> {
    let content = fs::read(path)?;
    Ok(compute_content_checksum(content))
}

/// Compute an aggregate checksum over every file beneath `root`.
///
/// Files are visited sorted by their path relative to `root`, so the result
/// does not depend on traversal order. Each file contributes its relative
/// path, its length and its bytes; two trees with the same files at the same
/// relative locations hash identically wherever they live. Entries that
/// cannot be read are skipped.
///
/// # Errors
///
/// Returns an error only if `root` itself cannot be listed.
pub fn compute_directory_checksum(root: &Path) -> io::Result<Digest> {
    let _ = fs::read_dir(root)?;

    let mut hasher = Sha256::new();
    for (relative, path) in list_files_sorted(root) {
        match fs::read(&path) {
            Ok(bytes) => {
                hasher.update(relative.as_bytes());
                hasher.update([0u8]);
                hasher.update((bytes.len() as u64).to_le_bytes());
                hasher.update(&bytes);
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Skipping unreadable entry");
            }
        }
    }
    Ok(Digest::from_hasher(hasher))
}

/// Identify the content at `path`, file or directory.
///
/// A missing path yields [`ContentIdentity::Absent`], including when the
/// path disappears while it is being read.
///
/// # Errors
///
/// Returns an error when the path exists but cannot be read.
pub fn identify(path: &Path) -> io::Result<ContentIdentity> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ContentIdentity::Absent),
        Err(e) => return Err(e),
    };

    let result = if metadata.is_dir() {
        compute_directory_checksum(path)
    } else {
        compute_file_checksum(path)
    };

    match result {
        Ok(digest) => Ok(ContentIdentity::Present(digest)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ContentIdentity::Absent),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_checksum_has_prefix() {
        let checksum = compute_content_checksum("hello world");
        assert!(checksum.as_str().starts_with("sha256:"));
    }

    #[test]
    fn content_checksum_known_value() {
        let checksum = compute_content_checksum("hello world");
        assert_eq!(
            checksum.as_str(),
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(checksum.short(), "b94d27b9934d");
    }

    #[test]
    fn file_checksum_matches_content_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.txt");
        std::fs::write(&path, "hello world").unwrap();

        let file_cs = compute_file_checksum(&path).unwrap();
        assert_eq!(file_cs, compute_content_checksum("hello world"));
    }

    #[test]
    fn identify_missing_path_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let identity = identify(&dir.path().join("nope.md")).unwrap();
        assert_eq!(identity, ContentIdentity::Absent);
        assert!(!identity.exists());
        assert!(identity.digest().is_none());
    }

    #[test]
    fn identical_trees_hash_identically() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        for root in [a.path(), b.path()] {
            std::fs::create_dir_all(root.join("nested")).unwrap();
            std::fs::write(root.join("one.md"), "one").unwrap();
            std::fs::write(root.join("nested/two.md"), "two").unwrap();
        }

        assert_eq!(
            compute_directory_checksum(a.path()).unwrap(),
            compute_directory_checksum(b.path()).unwrap()
        );
    }

    #[test]
    fn moving_content_between_files_changes_tree_digest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "ab").unwrap();
        std::fs::write(dir.path().join("b.md"), "").unwrap();
        let before = compute_directory_checksum(dir.path()).unwrap();

        std::fs::write(dir.path().join("a.md"), "a").unwrap();
        std::fs::write(dir.path().join("b.md"), "b").unwrap();
        let after = compute_directory_checksum(dir.path()).unwrap();

        assert_ne!(before, after);
    }
}
