//! Path identities for tracked artifacts
//!
//! Every path the watcher, registry and executor exchange goes through
//! [`NormalizedPath`], so two spellings of the same location compare equal.

use std::path::{Path, PathBuf};

/// A forward-slash path, lexically cleaned.
///
/// Construction cleans the path lexically: backslashes become forward
/// slashes, empty and `.` segments are dropped and `..` segments consume
/// their parent where one exists. The filesystem is never consulted, so
/// paths that do not exist yet normalize the same way as existing ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedPath {
    inner: String,
}

impl NormalizedPath {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let raw = path.as_ref().to_string_lossy().replace('\\', "/");
        Self { inner: clean(&raw) }
    }

    /// The cleaned, forward-slash form.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Path for `std::fs` calls.
    pub fn to_native(&self) -> PathBuf {
        self.inner.clone().into()
    }

    /// Key used to compare path identities.
    ///
    /// Case-insensitive platforms (Windows, macOS) fold ASCII case so that
    /// `Context.md` and `context.md` register as the same tracked path.
    pub fn identity_key(&self) -> String {
        if cfg!(any(windows, target_os = "macos")) {
            self.inner.to_ascii_lowercase()
        } else {
            self.inner.clone()
        }
    }

    /// Append `segment` (which may hold several components) and clean.
    pub fn join(&self, segment: &str) -> Self {
        if self.inner.is_empty() {
            return Self::new(segment);
        }
        let separator = if self.inner.ends_with('/') { "" } else { "/" };
        let joined = [self.inner.as_str(), separator, &segment.replace('\\', "/")].concat();
        Self { inner: clean(&joined) }
    }

    /// Whether the path is rooted (`/x`, `//server/x` or `C:/x`).
    pub fn is_absolute(&self) -> bool {
        let bytes = self.inner.as_bytes();
        self.inner.starts_with('/')
            || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
    }

    /// Resolve a possibly relative path against `root`.
    pub fn resolve_against(&self, root: &NormalizedPath) -> Self {
        if self.is_absolute() {
            self.clone()
        } else {
            root.join(&self.inner)
        }
    }

    /// The part of this path below `root`, using identity-key comparison.
    ///
    /// Returns `Some("")` when both paths are the same and `None` when this
    /// path is not inside `root`.
    pub fn relative_to(&self, root: &NormalizedPath) -> Option<String> {
        let key = self.identity_key();
        let root_key = root.identity_key();
        let root_key = root_key.trim_end_matches('/');

        if key == root_key {
            return Some(String::new());
        }
        let prefix_len = root_key.len() + 1;
        if key.len() > prefix_len
            && key.starts_with(root_key)
            && key.as_bytes()[root_key.len()] == b'/'
        {
            return Some(self.inner[prefix_len..].to_string());
        }
        None
    }

    /// Whether `self` is `root` or lies beneath it.
    pub fn starts_with(&self, root: &NormalizedPath) -> bool {
        self.relative_to(root).is_some()
    }

    /// Containing directory; `None` for a bare name or the root itself.
    pub fn parent(&self) -> Option<Self> {
        let body = self.inner.trim_end_matches('/');
        let split = body.rfind('/')?;
        let inner = if split == 0 { "/" } else { &body[..split] };
        Some(Self {
            inner: inner.to_string(),
        })
    }

    pub fn file_name(&self) -> Option<&str> {
        self.inner
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
    }

    // Disk probes, evaluated at call time.

    pub fn exists(&self) -> bool {
        Path::new(&self.inner).exists()
    }

    pub fn is_dir(&self) -> bool {
        Path::new(&self.inner).is_dir()
    }

    pub fn is_file(&self) -> bool {
        Path::new(&self.inner).is_file()
    }

    /// Text after the last `.` of the file name. Dotfiles such as
    /// `.cursorrules` have no extension.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name()?;
        match name.rfind('.') {
            Some(0) | None => None,
            Some(dot) => Some(&name[dot + 1..]),
        }
    }
}

/// Lexically clean a forward-slash path.
fn clean(raw: &str) -> String {
    let (prefix, rest) = if raw.starts_with("//") && !raw.starts_with("///") {
        ("//", &raw[2..])
    } else if raw.starts_with('/') {
        ("/", raw.trim_start_matches('/'))
    } else {
        ("", raw)
    };

    let mut parts: Vec<&str> = Vec::new();
    for part in rest.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                // `..` above the root of an absolute path stays at the root
                _ if !prefix.is_empty() => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return match (prefix, raw.is_empty()) {
            ("", true) => String::new(),
            ("", false) => ".".to_string(),
            (rooted, _) => rooted.to_string(),
        };
    }
    format!("{}{}", prefix, parts.join("/"))
}

impl AsRef<Path> for NormalizedPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.inner)
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.inner)
    }
}

impl From<&Path> for NormalizedPath {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<PathBuf> for NormalizedPath {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&str> for NormalizedPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}
