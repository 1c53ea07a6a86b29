//! Production [`GitBackend`] that shells out to the system `git` binary.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use super::GitBackend;
use super::command_builder::GitCommand;
use crate::config::EngineConfig;
use crate::core::ZkgError;
use crate::utils::fs::copy_over_path;

/// Git backend built on the system `git` command.
///
/// Like Cargo's `git-fetch-with-cli`, this relies on the installed Git so that
/// SSH agents, credential helpers and user configuration all keep working.
/// Each command runs with the timeouts from [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct GitCli {
    git_timeout: Option<Duration>,
    clone_timeout: Option<Duration>,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl GitCli {
    /// Creates a backend using the timeouts of `config`.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            git_timeout: config.git_timeout(),
            clone_timeout: config.clone_timeout(),
        }
    }

    /// Prepares a command to run inside `repo`.
    fn in_repo(&self, cmd: GitCommand, repo: &Path) -> Result<GitCommand> {
        ensure_valid_git_repo(repo)?;
        Ok(cmd.current_dir(repo).with_timeout(self.git_timeout).with_context(log_label(repo)))
    }
}

/// Log context for commands on the working copy at `path`: its directory name.
fn log_label(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

/// Whether `path` holds a Git working copy.
#[must_use]
pub fn is_valid_git_repo(path: &Path) -> bool {
    path.join(".git").exists()
}

/// Fails with [`ZkgError::GitRepoInvalid`] unless `path` holds a working copy.
pub fn ensure_valid_git_repo(path: &Path) -> Result<()> {
    if !is_valid_git_repo(path) {
        return Err(ZkgError::GitRepoInvalid {
            path: path.display().to_string(),
        }
        .into());
    }
    Ok(())
}

#[async_trait]
impl GitBackend for GitCli {
    async fn clone(&self, url: &str, dest: &Path, shallow: bool) -> Result<()> {
        GitCommand::clone(url, dest, shallow)
            .with_timeout(self.clone_timeout)
            .with_context(log_label(dest))
            .execute_success()
            .await
    }

    async fn copy_working_copy(&self, src: &Path, dest: &Path) -> Result<()> {
        let src = src.to_path_buf();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || copy_over_path(&src, &dest))
            .await
            .context("Failed to spawn blocking task for repository copy")?
    }

    async fn checkout(&self, repo: &Path, reference: &str) -> Result<()> {
        self.in_repo(GitCommand::checkout(reference), repo)?.execute_success().await
    }

    async fn submodule_sync(&self, repo: &Path) -> Result<()> {
        self.in_repo(GitCommand::submodule_sync(), repo)?.execute_success().await
    }

    async fn submodule_update(&self, repo: &Path) -> Result<()> {
        self.in_repo(GitCommand::submodule_update(), repo)?
            .with_timeout(self.clone_timeout)
            .execute_success()
            .await
    }

    async fn pull(&self, repo: &Path) -> Result<()> {
        self.in_repo(GitCommand::pull(), repo)?.execute_success().await
    }

    async fn fetch(&self, repo: &Path) -> Result<()> {
        self.in_repo(GitCommand::fetch(), repo)?.execute_success().await
    }

    async fn reset_hard(&self, repo: &Path) -> Result<()> {
        self.in_repo(GitCommand::reset_hard(), repo)?.execute_success().await
    }

    async fn clean(&self, repo: &Path) -> Result<()> {
        self.in_repo(GitCommand::clean_all(), repo)?.execute_success().await
    }

    async fn set_remote_url(&self, repo: &Path, url: &str) -> Result<()> {
        self.in_repo(GitCommand::set_remote_url(url), repo)?.execute_success().await
    }

    async fn remotes(&self, repo: &Path) -> Result<Vec<String>> {
        self.in_repo(GitCommand::list_remotes(), repo)?.execute_lines().await
    }

    async fn remote_head(&self, repo: &Path) -> Result<Option<String>> {
        // symbolic-ref --quiet exits non-zero when origin/HEAD is not set.
        match self.in_repo(GitCommand::remote_head(), repo)?.execute_stdout().await {
            Ok(head) if !head.is_empty() => Ok(Some(head)),
            Ok(_) => Ok(None),
            Err(e) => {
                tracing::trace!(target: "git", "No remote HEAD in {}: {}", repo.display(), e);
                Ok(None)
            }
        }
    }

    async fn local_branches(&self, repo: &Path) -> Result<Vec<String>> {
        self.in_repo(GitCommand::list_branches(), repo)?.execute_lines().await
    }

    async fn current_branch(&self, repo: &Path) -> Result<Option<String>> {
        let branch = self.in_repo(GitCommand::current_branch(), repo)?.execute_stdout().await?;
        Ok(if branch.is_empty() { None } else { Some(branch) })
    }

    async fn head_commit(&self, repo: &Path) -> Result<String> {
        self.in_repo(GitCommand::current_commit(), repo)?
            .execute_stdout()
            .await
            .context("Failed to get current commit")
    }

    async fn resolve_commit(&self, repo: &Path, reference: &str) -> Result<String> {
        self.in_repo(GitCommand::rev_parse(reference), repo)?
            .execute_stdout()
            .await
            .with_context(|| format!("Failed to resolve '{reference}' to a commit"))
    }

    async fn tags(&self, repo: &Path) -> Result<Vec<String>> {
        self.in_repo(GitCommand::list_tags(), repo)?
            .execute_lines()
            .await
            .with_context(|| format!("Failed to list git tags in {}", repo.display()))
    }

    async fn is_shallow(&self, repo: &Path) -> Result<bool> {
        let out = self.in_repo(GitCommand::is_shallow(), repo)?.execute_stdout().await?;
        Ok(out == "true")
    }
}
