//! Git test helper utilities
//!
//! Builds real package repositories for tests that exercise the system `git`.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::constants::METADATA_FILENAME;

/// Git command runner for tests
///
/// Wraps the `git` binary with error handling so tests never assemble raw
/// `std::process::Command`s. Repositories created through
/// [`TestGit::init_package`] always start on `main`, whatever the local
/// `init.defaultBranch` is.
pub struct TestGit {
    repo_path: PathBuf,
}

impl TestGit {
    fn run_git_command(&self, args: &[&str], action: &str) -> Result<std::process::Output> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .with_context(|| action.to_string())?;

        if !output.status.success() {
            bail!("{} failed: {}", action, String::from_utf8_lossy(&output.stderr));
        }

        Ok(output)
    }

    fn stdout(&self, args: &[&str], action: &str) -> Result<String> {
        let output = self.run_git_command(args, action)?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Create a new TestGit instance for the given repository path
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    /// Return the repository path
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// The repository path as a package location.
    pub fn url(&self) -> String {
        self.repo_path.display().to_string()
    }

    /// Initialize a new git repository
    pub fn init(&self) -> Result<()> {
        std::fs::create_dir_all(&self.repo_path)
            .with_context(|| format!("Failed to create {}", self.repo_path.display()))?;
        self.run_git_command(&["init", "--quiet"], "Failed to initialize git repository")?;
        Ok(())
    }

    /// Configure git user for tests
    pub fn config_user(&self) -> Result<()> {
        self.run_git_command(
            &["config", "user.email", "test@zkg.example"],
            "Failed to configure git user email",
        )?;
        self.run_git_command(
            &["config", "user.name", "Test User"],
            "Failed to configure git user name",
        )?;
        self.run_git_command(
            &["config", "commit.gpgsign", "false"],
            "Failed to disable commit signing",
        )?;
        Ok(())
    }

    /// Initialize a repository on `main` with a configured user and no commits.
    pub fn init_package(&self) -> Result<()> {
        self.init()?;
        self.config_user()?;
        self.set_head("main")
    }

    /// Write a file relative to the repository root.
    pub fn write_file(&self, rel: &str, content: &str) -> Result<()> {
        let path = self.repo_path.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Write `zkg.meta` with a description mentioning `version` and commit it.
    ///
    /// Returns the new commit hash.
    pub fn commit_metadata(&self, version: &str) -> Result<String> {
        self.write_file(
            METADATA_FILENAME,
            &format!(
                "[package]\ndescription = Test package {version}. Used by tests.\n\
                 depends =\n    zeek >=4.0.0\n"
            ),
        )?;
        self.add_all()?;
        self.commit(&format!("Release {version}"))?;
        self.get_commit_hash()
    }

    /// Add all files to staging
    pub fn add_all(&self) -> Result<()> {
        self.run_git_command(&["add", "."], "Failed to add files to git")?;
        Ok(())
    }

    /// Create a commit with the given message
    pub fn commit(&self, message: &str) -> Result<()> {
        self.run_git_command(&["commit", "--quiet", "-m", message], "Failed to create git commit")?;
        Ok(())
    }

    /// Create a tag
    pub fn tag(&self, tag_name: &str) -> Result<()> {
        self.run_git_command(&["tag", tag_name], &format!("Failed to create tag: {tag_name}"))?;
        Ok(())
    }

    /// Checkout a branch or commit
    pub fn checkout(&self, ref_name: &str) -> Result<()> {
        self.run_git_command(
            &["checkout", "--quiet", ref_name],
            &format!("Failed to checkout: {ref_name}"),
        )?;
        Ok(())
    }

    /// Create and checkout a branch
    pub fn create_branch(&self, branch_name: &str) -> Result<()> {
        self.run_git_command(
            &["checkout", "--quiet", "-b", branch_name],
            &format!("Failed to create branch: {branch_name}"),
        )?;
        Ok(())
    }

    /// Get current commit hash
    pub fn get_commit_hash(&self) -> Result<String> {
        self.stdout(&["rev-parse", "HEAD"], "Failed to get commit hash")
    }

    /// Commit a reference resolves to.
    pub fn rev_parse(&self, reference: &str) -> Result<String> {
        self.stdout(
            &["rev-parse", &format!("{reference}^{{commit}}")],
            &format!("Failed to resolve {reference}"),
        )
    }

    /// Get the current branch name
    pub fn get_current_branch(&self) -> Result<String> {
        self.stdout(&["branch", "--show-current"], "Failed to get current branch name")
    }

    /// URL the origin remote points at.
    pub fn origin_url(&self) -> Result<String> {
        self.stdout(&["remote", "get-url", "origin"], "Failed to get origin URL")
    }

    /// Get porcelain status output
    pub fn status_porcelain(&self) -> Result<String> {
        let output =
            self.run_git_command(&["status", "--porcelain"], "Failed to get git status")?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Set HEAD to point to a branch (making it default branch)
    pub fn set_head(&self, branch_name: &str) -> Result<()> {
        self.run_git_command(
            &["symbolic-ref", "HEAD", &format!("refs/heads/{branch_name}")],
            &format!("Failed to set HEAD to branch: {branch_name}"),
        )?;
        Ok(())
    }

    /// Make a depth-1 clone of this repository at `dest`.
    ///
    /// The result carries `.git/shallow`, like a package source that was
    /// itself installed shallow.
    pub fn shallow_clone_to(&self, dest: &Path) -> Result<TestGit> {
        let url = format!("file://{}", self.repo_path.display());
        let output = Command::new("git")
            .args(["clone", "--quiet", "--no-single-branch", "--depth", "1", &url])
            .arg(dest)
            .output()
            .context("Failed to run git clone")?;

        if !output.status.success() {
            bail!("Shallow clone failed: {}", String::from_utf8_lossy(&output.stderr));
        }

        let clone = TestGit::new(dest);
        clone.config_user()?;
        Ok(clone)
    }

    /// Whether this repository has truncated history.
    pub fn is_shallow(&self) -> bool {
        self.repo_path.join(".git").join("shallow").exists()
    }
}
