//! Atomic I/O operations with file locking

use backoff::ExponentialBackoffBuilder;
use fs2::FileExt;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;
use walkdir::WalkDir;

use crate::checksum::compute_content_checksum;
use crate::{Error, NormalizedPath, Result};

/// Distinguishes temp files written concurrently by threads of one process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Tuning knobs for [`write_atomic`].
#[derive(Debug, Clone, Copy)]
pub struct RobustnessConfig {
    /// How long to keep retrying the per-path advisory lock
    pub lock_timeout: Duration,
    /// Flush file contents to disk before the rename
    pub enable_fsync: bool,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            enable_fsync: true,
        }
    }
}

/// Lock file guarding writes to `path`.
///
/// Kept outside the project tree so that watched directories never see it.
pub fn lock_path_for(path: &Path) -> PathBuf {
    let digest = compute_content_checksum(path.to_string_lossy().as_bytes());
    std::env::temp_dir()
        .join("ai-context-sync-locks")
        .join(format!("{}.lock", digest.short()))
}

fn acquire_lock(path: &Path, config: RobustnessConfig) -> Result<File> {
    let lock_path = lock_path_for(path);
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| Error::io(&lock_path, e))?;

    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(10))
        .with_max_interval(Duration::from_millis(250))
        .with_max_elapsed_time(Some(config.lock_timeout))
        .build();

    backoff::retry(policy, || {
        FileExt::try_lock_exclusive(&lock_file).map_err(backoff::Error::transient)
    })
    .map_err(|_| Error::LockFailed {
        path: path.to_path_buf(),
    })?;

    Ok(lock_file)
}

/// Write content atomically to a file with locking.
///
/// Uses write-to-temp-then-rename so readers observe either the old or the
/// new content, never a partial write. On failure the original file is left
/// untouched and the temp file is removed.
pub fn write_atomic(path: &NormalizedPath, content: &[u8], config: RobustnessConfig) -> Result<()> {
    let native_path = path.to_native();

    if let Some(parent) = native_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let lock_file = acquire_lock(&native_path, config)?;

    let temp_path = temp_path_for(&native_path);
    let result = write_temp(&temp_path, content, config)
        .and_then(|()| fs::rename(&temp_path, &native_path).map_err(|e| Error::io(&native_path, e)));
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    let _ = FileExt::unlock(&lock_file);
    result
}

/// Temp file next to `native_path` so the rename stays on one filesystem.
fn temp_path_for(native_path: &Path) -> PathBuf {
    let temp_name = format!(
        ".{}.{}.{}.tmp",
        native_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    );
    native_path.with_file_name(temp_name)
}

fn write_temp(temp_path: &Path, content: &[u8], config: RobustnessConfig) -> Result<()> {
    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(temp_path)
        .map_err(|e| Error::io(temp_path, e))?;

    temp_file
        .write_all(content)
        .map_err(|e| Error::io(temp_path, e))?;

    if config.enable_fsync {
        temp_file.sync_all().map_err(|e| Error::io(temp_path, e))?;
    }
    Ok(())
}

/// Read raw bytes from a file.
pub fn read_bytes(path: &NormalizedPath) -> Result<Vec<u8>> {
    let native_path = path.to_native();
    fs::read(&native_path).map_err(|e| Error::io(&native_path, e))
}

/// Read text content from a file.
pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native_path = path.to_native();
    fs::read_to_string(&native_path).map_err(|e| Error::io(&native_path, e))
}

/// Write text content to a file atomically with default settings.
pub fn write_text(path: &NormalizedPath, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes(), RobustnessConfig::default())
}

/// Remove a file or a whole directory tree. Missing paths are not an error.
pub fn remove_path(path: &NormalizedPath) -> Result<()> {
    let native_path = path.to_native();
    let result = match fs::symlink_metadata(&native_path) {
        Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(&native_path),
        Ok(_) => fs::remove_file(&native_path),
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(&native_path, e)),
    }
}

/// Every regular file beneath `root` as `(relative path, absolute path)`,
/// sorted by relative path. Relative paths use forward slashes. Entries the
/// walk cannot read are skipped.
pub fn list_files_sorted(root: &Path) -> Vec<(String, PathBuf)> {
    let mut files: Vec<(String, PathBuf)> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(root = %root.display(), error = %e, "Skipping entry during walk");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(root).ok()?;
            let relative = relative.to_string_lossy().replace('\\', "/");
            Some((relative, entry.into_path()))
        })
        .collect();
    files.sort();
    files
}

/// Make the file set under `dst` identical to the one under `src`.
///
/// Source files are written to the same relative location and target files
/// with no source counterpart are removed. A source file that cannot be
/// read is skipped and its target counterpart, if any, is left as it is.
/// Returns the number of files written.
///
/// Every target lock is taken and every file staged before the first
/// rename, so a lock timeout or a failed staging write leaves `dst`
/// untouched.
pub fn copy_tree(src: &NormalizedPath, dst: &NormalizedPath, config: RobustnessConfig) -> Result<usize> {
    let src_native = src.to_native();
    let dst_native = dst.to_native();

    let _ = fs::read_dir(&src_native).map_err(|e| Error::io(&src_native, e))?;

    let mut contents: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    let mut skipped = BTreeSet::new();
    for (relative, path) in list_files_sorted(&src_native) {
        match fs::read(&path) {
            Ok(bytes) => {
                contents.insert(relative, bytes);
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Skipping unreadable file in mirrored tree");
                skipped.insert(relative);
            }
        }
    }

    let stale: Vec<PathBuf> = list_files_sorted(&dst_native)
        .into_iter()
        .filter(|(relative, _)| !contents.contains_key(relative) && !skipped.contains(relative))
        .map(|(_, path)| path)
        .collect();

    let targets: Vec<(PathBuf, &[u8])> = contents
        .iter()
        .map(|(relative, bytes)| (dst.join(relative).to_native(), bytes.as_slice()))
        .collect();

    // Locks are released when the handles drop.
    let mut locks = Vec::with_capacity(targets.len() + stale.len());
    for path in targets.iter().map(|(path, _)| path).chain(stale.iter()) {
        locks.push(acquire_lock(path, config)?);
    }

    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(targets.len());
    let result = stage_and_commit(&targets, &stale, &mut staged, config);
    if result.is_err() {
        for (temp_path, _) in &staged {
            let _ = fs::remove_file(temp_path);
        }
    }
    result?;

    debug!(src = %src, dst = %dst, written = targets.len(), removed = stale.len(), "Mirrored tree");
    Ok(targets.len())
}

/// Write every target to a temp file, then rename them all into place and
/// drop stale files. Temp files still pending on error are left in
/// `staged` for the caller to clean up.
fn stage_and_commit(
    targets: &[(PathBuf, &[u8])],
    stale: &[PathBuf],
    staged: &mut Vec<(PathBuf, PathBuf)>,
    config: RobustnessConfig,
) -> Result<()> {
    for (target, content) in targets {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let temp_path = temp_path_for(target);
        let written = write_temp(&temp_path, content, config);
        staged.push((temp_path, target.clone()));
        written?;
    }

    while let Some((temp_path, target)) = staged.pop() {
        if let Err(e) = fs::rename(&temp_path, &target) {
            staged.push((temp_path, target.clone()));
            return Err(Error::io(&target, e));
        }
    }

    for path in stale {
        debug!(path = %path.display(), "Removing stale file from mirrored tree");
        fs::remove_file(path).map_err(|e| Error::io(path, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lock_path_is_outside_target_directory() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("CLAUDE.md");
        let lock = lock_path_for(&target);
        assert!(!lock.starts_with(dir.path()));
    }

    #[test]
    fn list_files_sorted_uses_relative_forward_slash_paths() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/nested")).unwrap();
        fs::write(dir.path().join("b/nested/z.md"), "z").unwrap();
        fs::write(dir.path().join("a.md"), "a").unwrap();

        let files: Vec<String> = list_files_sorted(dir.path())
            .into_iter()
            .map(|(relative, _)| relative)
            .collect();
        assert_eq!(files, vec!["a.md".to_string(), "b/nested/z.md".to_string()]);
    }
}
