//! Per-repository exclusive locks.
//!
//! Every backend operation on a working copy holds the repository's lock, so
//! two tasks (or two processes) never run Git commands against the same
//! checkout at once. Locks live next to the repositories they guard:
//!
//! ```text
//! {clone_parent}/.locks/{repo_dir_name}.lock
//! ```
//!
//! The lock is released when the [`RepoLock`] is dropped.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Name of the directory holding lock files.
pub const LOCKS_DIR: &str = ".locks";

/// An exclusive lock on one repository path.
pub struct RepoLock {
    file: File,
    path: PathBuf,
}

impl RepoLock {
    /// Returns where the lock file for `repo_path` lives.
    #[must_use]
    pub fn lock_path(repo_path: &Path) -> PathBuf {
        let parent = repo_path.parent().unwrap_or_else(|| Path::new("."));
        let name = repo_path
            .file_name()
            .map_or_else(|| "root".to_string(), |n| n.to_string_lossy().into_owned());
        parent.join(LOCKS_DIR).join(format!("{name}.lock"))
    }

    /// Acquires the lock for `repo_path`, waiting for any current holder.
    ///
    /// The blocking wait runs on the blocking thread pool so the async
    /// runtime stays responsive.
    pub async fn acquire(repo_path: &Path) -> Result<Self> {
        let lock_path = Self::lock_path(repo_path);
        if let Some(locks_dir) = lock_path.parent() {
            tokio::fs::create_dir_all(locks_dir).await.with_context(|| {
                format!("Failed to create locks directory {}", locks_dir.display())
            })?;
        }

        let open_path = lock_path.clone();
        let repo_display = repo_path.display().to_string();

        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&open_path)
                .with_context(|| format!("Failed to open lock file: {}", open_path.display()))?;

            file.lock_exclusive()
                .with_context(|| format!("Failed to acquire lock for: {repo_display}"))?;

            Ok(file)
        })
        .await
        .context("Failed to spawn blocking task for lock acquisition")??;

        tracing::trace!(target: "git::lock", "Acquired {}", lock_path.display());

        Ok(Self {
            file,
            path: lock_path,
        })
    }

    /// Path of the held lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        #[allow(unstable_name_collisions)]
        if let Err(e) = self.file.unlock() {
            tracing::warn!(target: "git::lock", "Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;
    use tokio::sync::Barrier;

    #[test]
    fn test_lock_path_is_beside_repository() {
        let path = RepoLock::lock_path(Path::new("/var/zkg/clones/package/foo"));
        assert_eq!(path, PathBuf::from("/var/zkg/clones/package/.locks/foo.lock"));
    }

    #[tokio::test]
    async fn test_acquire_creates_lock_file() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("clones").join("foo");

        let lock = RepoLock::acquire(&repo).await.unwrap();
        assert!(lock.path().exists());
        assert!(temp.path().join("clones").join(LOCKS_DIR).is_dir());

        let path = lock.path().to_path_buf();
        drop(lock);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_same_repository_is_exclusive() {
        let temp = TempDir::new().unwrap();
        let repo = Arc::new(temp.path().join("foo"));
        let barrier = Arc::new(Barrier::new(2));

        let repo1 = repo.clone();
        let barrier1 = barrier.clone();
        let holder = tokio::spawn(async move {
            let _lock = RepoLock::acquire(&repo1).await.unwrap();
            barrier1.wait().await;
            tokio::time::sleep(Duration::from_millis(100)).await;
        });

        let repo2 = repo.clone();
        let waiter = tokio::spawn(async move {
            barrier.wait().await;
            let start = Instant::now();
            let _lock = RepoLock::acquire(&repo2).await.unwrap();
            assert!(start.elapsed() >= Duration::from_millis(50));
        });

        holder.await.unwrap();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_repositories_do_not_block() {
        let temp = TempDir::new().unwrap();
        let _foo = RepoLock::acquire(&temp.path().join("foo")).await.unwrap();

        let start = Instant::now();
        let _bar = RepoLock::acquire(&temp.path().join("bar")).await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
