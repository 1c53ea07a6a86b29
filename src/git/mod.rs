//! Version-control operations on package repositories
//!
//! Package versions live in Git: releases are tags, development happens on
//! branches, and a package can be pinned to a single commit. This module is
//! the only part of the crate that talks to the version-control backend.
//!
//! # Layers
//!
//! - [`GitBackend`] - primitive commands (clone, checkout, tag listing, ...).
//!   [`GitCli`] implements them with the system `git` binary; the test
//!   utilities provide an in-memory implementation.
//! - [`VersionControl`] - the operations the rest of the crate uses. It adds
//!   per-repository locking, submodule synchronization after checkout and
//!   pull, the shallow clone fallback for local repositories, remote
//!   re-pointing and default branch discovery on top of a backend.
//!
//! # Errors
//!
//! Backend failures are never swallowed. They surface as [`ZkgError`]
//! variants carrying the operation, the repository and Git's own message,
//! wrapped in `anyhow` context. Retrying is the caller's decision.
//!
//! # Concurrency
//!
//! All operations on one repository path are serialized through a
//! [`RepoLock`]. Operations on different repositories run independently.
//!
//! ```rust,no_run
//! use zkg_core::config::EngineConfig;
//! use zkg_core::git::VersionControl;
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let vcs = VersionControl::system(&EngineConfig::default())?;
//! let clone = Path::new("/var/lib/zkg/clones/package/foo");
//!
//! vcs.clone_repo("https://github.com/zeek/foo", clone, true).await?;
//! let versions = vcs.version_tags(clone).await?;
//! let branch = vcs.default_branch(clone).await?;
//! vcs.checkout(clone, versions.last().unwrap_or(&branch)).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod command_builder;
pub mod lock;


use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;

use crate::config::EngineConfig;
use crate::constants::ORIGIN_REMOTE;
use crate::core::ZkgError;
use crate::utils::fs::delete_path;
use crate::utils::platform::ensure_git_available;
use crate::version::sorted_version_tags;

pub use cli::{GitCli, ensure_valid_git_repo, is_valid_git_repo};
pub use lock::RepoLock;

/// Primitive commands a version-control backend must provide.
///
/// Implementations run exactly the command asked for. Ordering, locking and
/// fallbacks are handled by [`VersionControl`].
#[async_trait]
pub trait GitBackend: Send + Sync {
    /// Clones `url` into `dest`, recursing into submodules.
    ///
    /// A shallow clone fetches depth 1 of every branch.
    async fn clone(&self, url: &str, dest: &Path, shallow: bool) -> Result<()>;

    /// Replaces `dest` with a plain copy of the working copy at `src`.
    async fn copy_working_copy(&self, src: &Path, dest: &Path) -> Result<()>;

    /// Checks out a branch, tag or commit.
    async fn checkout(&self, repo: &Path, reference: &str) -> Result<()>;

    /// Synchronizes submodule URLs recursively.
    async fn submodule_sync(&self, repo: &Path) -> Result<()>;

    /// Initializes and updates submodules recursively.
    async fn submodule_update(&self, repo: &Path) -> Result<()>;

    /// Pulls the current branch.
    async fn pull(&self, repo: &Path) -> Result<()>;

    /// Fetches branches and tags from origin.
    async fn fetch(&self, repo: &Path) -> Result<()>;

    /// Resets the working tree and index to `HEAD`.
    async fn reset_hard(&self, repo: &Path) -> Result<()>;

    /// Removes untracked and ignored files.
    async fn clean(&self, repo: &Path) -> Result<()>;

    /// Points the origin remote at `url`.
    async fn set_remote_url(&self, repo: &Path, url: &str) -> Result<()>;

    /// Names of the configured remotes.
    async fn remotes(&self, repo: &Path) -> Result<Vec<String>>;

    /// The ref origin's HEAD points at (e.g. `origin/main`), if any.
    async fn remote_head(&self, repo: &Path) -> Result<Option<String>>;

    /// Local branch names.
    async fn local_branches(&self, repo: &Path) -> Result<Vec<String>>;

    /// The checked out branch, or `None` when `HEAD` is detached.
    async fn current_branch(&self, repo: &Path) -> Result<Option<String>>;

    /// Commit hash of `HEAD`.
    async fn head_commit(&self, repo: &Path) -> Result<String>;

    /// Commit hash a reference points at.
    async fn resolve_commit(&self, repo: &Path, reference: &str) -> Result<String>;

    /// Raw tag names, in backend order.
    async fn tags(&self, repo: &Path) -> Result<Vec<String>>;

    /// Whether the repository has truncated history.
    async fn is_shallow(&self, repo: &Path) -> Result<bool>;
}

/// Whether a repository location refers to the local filesystem.
#[must_use]
pub fn is_local_location(location: &str) -> bool {
    location.starts_with('.') || location.starts_with('/')
}

/// Whether the local repository at `location` has truncated history.
fn has_shallow_marker(location: &str) -> bool {
    Path::new(location).join(".git").join("shallow").exists()
}

/// Version-control adapter used by the package layer.
///
/// Every method locks the repository it operates on for its whole duration.
#[derive(Debug, Clone, Default)]
pub struct VersionControl<B = GitCli> {
    backend: B,
}

impl VersionControl<GitCli> {
    /// Adapter over the system `git`, configured from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ZkgError::GitNotFound`] when no `git` executable is on the `PATH`.
    pub fn system(config: &EngineConfig) -> Result<Self> {
        ensure_git_available()?;
        Ok(Self::new(GitCli::from_config(config)))
    }
}

impl<B: GitBackend> VersionControl<B> {
    /// Wraps a backend.
    pub const fn new(backend: B) -> Self {
        Self {
            backend,
        }
    }

    /// The wrapped backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Clones `url` into `dest` and points the clone's origin at `url`.
    ///
    /// Some Git versions refuse a shallow clone of a local repository that is
    /// itself shallow. In that case (and only then) the source working copy
    /// is copied to `dest`, and the copy is hard-reset and cleaned to a
    /// pristine state. The source is never modified.
    ///
    /// Origin is re-pointed at `url` after every clone: a clone of a local
    /// repository with submodules can otherwise inherit the source's own
    /// origin.
    pub async fn clone_repo(&self, url: &str, dest: &Path, shallow: bool) -> Result<()> {
        let _lock = RepoLock::acquire(dest).await?;
        self.clone_locked(url, dest, shallow).await
    }

    /// Like [`clone_repo`](Self::clone_repo), but first removes whatever is at
    /// `dest`. The removal and the clone happen under one hold of the lock.
    pub async fn fresh_clone(&self, url: &str, dest: &Path, shallow: bool) -> Result<()> {
        let _lock = RepoLock::acquire(dest).await?;
        delete_path(dest)?;
        self.clone_locked(url, dest, shallow).await
    }

    async fn clone_locked(&self, url: &str, dest: &Path, shallow: bool) -> Result<()> {
        tracing::debug!(target: "git", "Cloning {} into {} (shallow: {})", url, dest.display(), shallow);

        if let Err(err) = self.backend.clone(url, dest, shallow).await {
            if !shallow || !is_local_location(url) || !has_shallow_marker(url) {
                return Err(err);
            }

            tracing::warn!(
                target: "git",
                "Shallow clone of shallow local repository {} failed, copying it instead: {}",
                url,
                err
            );

            self.backend
                .copy_working_copy(Path::new(url), dest)
                .await
                .with_context(|| format!("Failed to copy {url} to {}", dest.display()))?;
            self.backend.reset_hard(dest).await?;
            self.backend.clean(dest).await?;
        }

        self.backend
            .set_remote_url(dest, url)
            .await
            .with_context(|| format!("Failed to point origin of {} at {url}", dest.display()))
    }

    /// Checks out a branch, tag or commit, then syncs and updates submodules.
    ///
    /// # Errors
    ///
    /// Returns [`ZkgError::GitCheckoutFailed`] when `reference` does not exist.
    pub async fn checkout(&self, repo: &Path, reference: &str) -> Result<()> {
        let _lock = RepoLock::acquire(repo).await?;
        self.backend.checkout(repo, reference).await?;
        self.update_submodules(repo).await
    }

    /// Pulls the current branch, then syncs and updates submodules.
    ///
    /// Packages that track a commit must never be pulled; see
    /// [`crate::package::info::apply_upgrade`].
    pub async fn pull(&self, repo: &Path) -> Result<()> {
        let _lock = RepoLock::acquire(repo).await?;
        self.backend.pull(repo).await?;
        self.update_submodules(repo).await
    }

    async fn update_submodules(&self, repo: &Path) -> Result<()> {
        self.backend.submodule_sync(repo).await?;
        self.backend.submodule_update(repo).await
    }

    /// Fetches branches and tags from origin.
    pub async fn fetch(&self, repo: &Path) -> Result<()> {
        let _lock = RepoLock::acquire(repo).await?;
        self.backend.fetch(repo).await
    }

    /// Determines the default branch of a clone.
    ///
    /// In order of preference:
    /// 1. the branch origin's HEAD points at, without its `origin/` prefix
    /// 2. `main`, then `master`, if such a local branch exists
    /// 3. the checked out branch
    /// 4. the detached `HEAD` commit
    ///
    /// # Errors
    ///
    /// Returns [`ZkgError::NoDefaultBranch`] when not even a commit resolves.
    pub async fn default_branch(&self, repo: &Path) -> Result<String> {
        let _lock = RepoLock::acquire(repo).await?;

        let remotes = self.backend.remotes(repo).await?;
        if remotes.iter().any(|r| r == ORIGIN_REMOTE)
            && let Some(head) = self.backend.remote_head(repo).await?
        {
            let prefix = format!("{ORIGIN_REMOTE}/");
            return Ok(head.strip_prefix(&prefix).unwrap_or(&head).to_string());
        }

        let branches = self.backend.local_branches(repo).await?;
        for preferred in ["main", "master"] {
            if branches.iter().any(|b| b == preferred) {
                return Ok(preferred.to_string());
            }
        }

        if let Some(branch) = self.backend.current_branch(repo).await? {
            return Ok(branch);
        }

        self.backend.head_commit(repo).await.map_err(|e| {
            tracing::debug!(target: "git", "No commit to fall back on in {}: {}", repo.display(), e);
            ZkgError::NoDefaultBranch {
                repository: repo.display().to_string(),
            }
            .into()
        })
    }

    /// Raw tag names, unsorted.
    pub async fn tag_list(&self, repo: &Path) -> Result<Vec<String>> {
        let _lock = RepoLock::acquire(repo).await?;
        self.backend.tags(repo).await
    }

    /// Tags that are versions, in ascending semantic-version order.
    pub async fn version_tags(&self, repo: &Path) -> Result<Vec<String>> {
        Ok(sorted_version_tags(&self.tag_list(repo).await?))
    }

    /// Local branch names.
    pub async fn branch_list(&self, repo: &Path) -> Result<Vec<String>> {
        let _lock = RepoLock::acquire(repo).await?;
        self.backend.local_branches(repo).await
    }

    /// Commit hash of `HEAD`.
    pub async fn head_commit(&self, repo: &Path) -> Result<String> {
        let _lock = RepoLock::acquire(repo).await?;
        self.backend.head_commit(repo).await
    }

    /// Commit hash a branch, tag or commit reference points at.
    pub async fn resolve_commit(&self, repo: &Path, reference: &str) -> Result<String> {
        let _lock = RepoLock::acquire(repo).await?;
        self.backend.resolve_commit(repo, reference).await
    }

    /// Whether the clone has truncated history.
    pub async fn is_shallow(&self, repo: &Path) -> Result<bool> {
        let _lock = RepoLock::acquire(repo).await?;
        self.backend.is_shallow(repo).await
    }
}
