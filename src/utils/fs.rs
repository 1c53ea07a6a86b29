//! File system helpers used by identity canonicalization and the shallow-clone
//! fallback.
//!
//! # Key Features
//!
//! - **Path resolution**: real paths for existing locations, lexical normalization
//!   for locations that do not exist yet
//! - **Copy-over**: replace a destination tree with a copy of a source tree,
//!   preserving symbolic links
//! - **Idempotent deletion**: removing a missing path is not an error

use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Ensures a directory exists, creating it and all parent directories if necessary.
///
/// # Errors
///
/// Returns an error if the path exists but is not a directory, or creation fails.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!(
            "Path exists but is not a directory: {}",
            path.display()
        ));
    }
    Ok(())
}

/// Removes a file, symlink or directory tree. Missing paths are ignored.
///
/// A symlink is removed itself; its target is never followed.
pub fn delete_path(path: &Path) -> Result<()> {
    let Ok(meta) = fs::symlink_metadata(path) else {
        return Ok(());
    };

    if meta.file_type().is_symlink() || meta.is_file() {
        fs::remove_file(path)
            .with_context(|| format!("Failed to remove file: {}", path.display()))?;
    } else {
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Recursively copies a directory tree.
///
/// Symbolic links are recreated as links rather than followed, so a copy of a
/// working copy keeps the same shape as the original.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    ensure_dir(dst)?;

    for entry in
        fs::read_dir(src).with_context(|| format!("Failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if file_type.is_symlink() {
            copy_symlink(&src_path, &dst_path)?;
        } else if file_type.is_dir() {
            copy_dir(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            fs::copy(&src_path, &dst_path).with_context(|| {
                format!(
                    "Failed to copy file from {} to {}",
                    src_path.display(),
                    dst_path.display()
                )
            })?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target = fs::read_link(src)
        .with_context(|| format!("Failed to read symlink: {}", src.display()))?;
    std::os::unix::fs::symlink(&target, dst)
        .with_context(|| format!("Failed to create symlink: {}", dst.display()))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    // Without portable symlink creation the link target is copied instead.
    if src.is_dir() {
        copy_dir(src, dst)
    } else {
        fs::copy(src, dst)
            .map(|_| ())
            .with_context(|| format!("Failed to copy {}", src.display()))
    }
}

/// Replaces `dst` with a fresh copy of `src`.
pub fn copy_over_path(src: &Path, dst: &Path) -> Result<()> {
    delete_path(dst)?;
    copy_dir(src, dst)
        .with_context(|| format!("Failed to copy {} over {}", src.display(), dst.display()))
}

/// Lexically normalizes a path, dropping `.` and folding `..` components.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                components.pop();
            }
            c => components.push(c),
        }
    }

    components.iter().collect()
}

/// Resolves a path to an absolute real path.
///
/// Existing paths are canonicalized (symlinks resolved). Paths that do not
/// exist are made absolute against the current directory and normalized
/// lexically, so that identity derivation never depends on the location
/// already being on disk.
#[must_use]
pub fn real_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };
    normalize_path(&absolute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_path(Path::new("a/b/./")), PathBuf::from("a/b"));
    }

    #[test]
    fn test_real_path_of_missing_location_is_absolute() {
        let resolved = real_path(Path::new("./definitely-not-here/../pkg"));
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("pkg"));
        assert!(!resolved.to_string_lossy().contains(".."));
    }

    #[test]
    fn test_real_path_resolves_existing_dir() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("repo");
        fs::create_dir(&dir).unwrap();
        let resolved = real_path(&temp.path().join("repo/../repo"));
        assert_eq!(resolved, fs::canonicalize(&dir).unwrap());
    }

    #[test]
    fn test_delete_path_missing_is_ok() {
        let temp = TempDir::new().unwrap();
        delete_path(&temp.path().join("nothing")).unwrap();
    }

    #[test]
    fn test_copy_over_path_replaces_destination() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("nested/file.txt"), "hello").unwrap();
        fs::create_dir_all(&dst).unwrap();
        fs::write(dst.join("stale.txt"), "old").unwrap();

        copy_over_path(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("nested/file.txt")).unwrap(), "hello");
        assert!(!dst.join("stale.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_dir_preserves_symlinks() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("target.txt"), "x").unwrap();
        std::os::unix::fs::symlink("target.txt", src.join("link.txt")).unwrap();

        let dst = temp.path().join("dst");
        copy_dir(&src, &dst).unwrap();

        let meta = fs::symlink_metadata(dst.join("link.txt")).unwrap();
        assert!(meta.file_type().is_symlink());
        assert_eq!(fs::read_link(dst.join("link.txt")).unwrap(), PathBuf::from("target.txt"));
    }
}
