//! Type-safe Git command builder for consistent command execution
//!
//! This module provides a fluent API for building and executing Git commands,
//! so that every backend call shares the same timeout handling, logging and
//! error mapping.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::{GIT_COMMAND_TIMEOUT, ORIGIN_REMOTE};
use crate::core::ZkgError;
use crate::utils::platform::get_git_command;

/// Builder for constructing and executing Git commands with consistent error handling.
///
/// Commands run with `git -C <dir>` when a working directory is set, so they
/// never depend on the process's current directory. Failures are mapped to
/// [`ZkgError`] variants that carry the attempted operation, the repository
/// and Git's own stderr.
///
/// # Examples
///
/// ```rust,no_run
/// use zkg_core::git::command_builder::GitCommand;
/// use std::path::Path;
///
/// # async fn example() -> anyhow::Result<()> {
/// let tags = GitCommand::list_tags()
///     .current_dir(Path::new("/var/lib/zkg/clones/package/foo"))
///     .execute_stdout()
///     .await?;
///
/// GitCommand::checkout("v1.2.0")
///     .current_dir(Path::new("/var/lib/zkg/clones/package/foo"))
///     .with_timeout(Some(std::time::Duration::from_secs(60)))
///     .execute_success()
///     .await?;
/// # Ok(())
/// # }
/// ```
///
/// # Default Configuration
///
/// - **Timeout**: 5 minutes ([`GIT_COMMAND_TIMEOUT`])
/// - **Working directory**: current process directory
/// - **Environment**: inherited, with `GIT_TERMINAL_PROMPT=0` so credential
///   prompts fail instead of hanging
#[derive(Debug)]
pub struct GitCommand {
    /// Command arguments to pass to Git (e.g., ["clone", "url", "path"])
    args: Vec<String>,

    /// Working directory for command execution (defaults to current directory)
    current_dir: Option<PathBuf>,

    /// Environment variables to set for the Git process
    env_vars: Vec<(String, String)>,

    /// Maximum duration to wait for command completion (None = no timeout)
    timeout_duration: Option<Duration>,

    /// Optional context string for log messages
    context: Option<String>,

    /// For clone commands, store the URL for better error messages
    clone_url: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            env_vars: vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())],
            timeout_duration: Some(GIT_COMMAND_TIMEOUT),
            context: None,
            clone_url: None,
        }
    }
}

impl GitCommand {
    /// Creates a new Git command builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the working directory for Git command execution.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Adds a single argument to the Git command.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds multiple arguments to the Git command.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set a custom timeout for the command (None for no timeout)
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Set a context for logging (e.g., the package name)
    ///
    /// The context prefixes debug log lines so that concurrent operations on
    /// different packages can be told apart. [`GitCli`](super::cli::GitCli)
    /// uses the working copy's directory name, which is the package name:
    ///
    /// ```text
    /// (foo) Executing command: git -C /clones/foo checkout v1.2.0
    /// ```
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The Git subcommand, ignoring any `-C` prefix.
    fn operation(&self) -> String {
        self.args.first().cloned().unwrap_or_else(|| "unknown".to_string())
    }

    fn repository(&self) -> String {
        self.current_dir
            .as_ref()
            .map_or_else(|| "-".to_string(), |dir| dir.display().to_string())
    }

    pub(crate) fn log_prefix(&self) -> String {
        self.context.as_ref().map(|ctx| format!("({ctx}) ")).unwrap_or_default()
    }

    /// Execute the command and return the output
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let start = std::time::Instant::now();
        let git_command = get_git_command();
        let mut cmd = Command::new(git_command);
        let prefix = self.log_prefix();

        let mut full_args = Vec::new();
        if let Some(ref dir) = self.current_dir {
            // Use the path as-is to avoid symlink resolution issues on macOS
            // (e.g., /var vs /private/var)
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());

        cmd.args(&full_args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!(
            target: "git",
            "{}Executing command: {} {}",
            prefix,
            git_command,
            full_args.join(" ")
        );

        for (key, value) in &self.env_vars {
            tracing::trace!(target: "git", "Setting env var: {}={}", key, value);
            cmd.env(key, value);
        }

        let output_future = cmd.output();

        let output = if let Some(duration) = self.timeout_duration {
            if let Ok(result) = timeout(duration, output_future).await {
                result.with_context(|| format!("Failed to execute git {}", full_args.join(" ")))?
            } else {
                tracing::warn!(
                    target: "git",
                    "{}Command timed out after {} seconds: git {}",
                    prefix,
                    duration.as_secs(),
                    full_args.join(" ")
                );
                return Err(ZkgError::GitCommandError {
                    operation: self.operation(),
                    repository: self.repository(),
                    stderr: format!(
                        "Git command timed out after {} seconds. This may indicate:\n\
                        - Network connectivity issues\n\
                        - Authentication prompts waiting for input\n\
                        - Large repository operations taking too long\n\
                        Try running the command manually: git {}",
                        duration.as_secs(),
                        full_args.join(" ")
                    ),
                }
                .into());
            }
        } else {
            tracing::trace!(target: "git", "Executing command without timeout");
            output_future
                .await
                .with_context(|| format!("Failed to execute git {}", full_args.join(" ")))?
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();

            tracing::debug!(
                target: "git",
                "{}Command failed with exit code: {:?}",
                prefix,
                output.status.code()
            );
            if !stderr.is_empty() {
                tracing::debug!(target: "git", "{}Error: {}", prefix, stderr);
            }

            let reason = if stderr.is_empty() { stdout } else { stderr };

            let error = match self.args.first().map(String::as_str) {
                Some("clone") => ZkgError::GitCloneFailed {
                    url: self.clone_url.clone().unwrap_or_else(|| "unknown".to_string()),
                    reason,
                },
                Some("checkout") => ZkgError::GitCheckoutFailed {
                    reference: self.args.last().cloned().unwrap_or_default(),
                    repository: self.repository(),
                    reason,
                },
                Some("submodule") => ZkgError::GitCommandError {
                    operation: format!(
                        "submodule {}",
                        self.args.get(1).map_or("", String::as_str)
                    ),
                    repository: self.repository(),
                    stderr: reason,
                },
                _ => ZkgError::GitCommandError {
                    operation: self.operation(),
                    repository: self.repository(),
                    stderr: reason,
                },
            };

            return Err(error.into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !stdout.is_empty() {
            tracing::trace!(target: "git", "{}{}", prefix, stdout.trim());
        }
        if !stderr.is_empty() {
            tracing::trace!(target: "git", "{}{}", prefix, stderr.trim());
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(
                target: "git::perf",
                "{}Git {} took {:.2}s",
                prefix,
                self.operation(),
                elapsed.as_secs_f64()
            );
        } else if elapsed.as_millis() > 100 {
            tracing::debug!(
                target: "git::perf",
                "{}Git {} took {}ms",
                prefix,
                self.operation(),
                elapsed.as_millis()
            );
        }

        Ok(GitCommandOutput {
            stdout,
            stderr,
        })
    }

    /// Execute the command and return only stdout as a trimmed string
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Execute the command and check for success, discarding output
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }

    /// Execute the command and return its stdout lines, trimmed and without blanks
    pub async fn execute_lines(self) -> Result<Vec<String>> {
        let output = self.execute().await?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Output from a Git command
#[derive(Debug)]
pub struct GitCommandOutput {
    /// Standard output from the Git command
    pub stdout: String,
    /// Standard error output from the Git command
    pub stderr: String,
}

// Convenience builders for the operations the version-control adapter needs

impl GitCommand {
    /// Create a clone command.
    ///
    /// A shallow clone fetches depth 1 from every branch. Both forms recurse
    /// into submodules.
    pub fn clone(url: &str, target: impl AsRef<Path>, shallow: bool) -> Self {
        let mut cmd = Self::new().arg("clone");
        if shallow {
            cmd = cmd.args(["--no-single-branch", "--depth", "1"]);
        }
        cmd = cmd.args([
            "--recurse-submodules".to_string(),
            url.to_string(),
            target.as_ref().display().to_string(),
        ]);
        cmd.clone_url = Some(url.to_string());
        cmd
    }

    /// Create a checkout command
    pub fn checkout(ref_name: &str) -> Self {
        Self::new().args(["checkout", ref_name])
    }

    /// Create a command that syncs submodule URLs recursively
    pub fn submodule_sync() -> Self {
        Self::new().args(["submodule", "sync", "--recursive"])
    }

    /// Create a command that initializes and updates submodules recursively
    pub fn submodule_update() -> Self {
        Self::new().args(["submodule", "update", "--recursive", "--init"])
    }

    /// Create a pull command for the current branch
    pub fn pull() -> Self {
        Self::new().arg("pull")
    }

    /// Create a fetch command
    pub fn fetch() -> Self {
        Self::new().args(["fetch", "--tags", "--force", ORIGIN_REMOTE])
    }

    /// Create a reset command
    pub fn reset_hard() -> Self {
        Self::new().args(["reset", "--hard"])
    }

    /// Create a command that removes untracked and ignored files, nested repositories included
    pub fn clean_all() -> Self {
        Self::new().args(["clean", "-ffdx"])
    }

    /// Create a command to set the origin URL
    pub fn set_remote_url(url: &str) -> Self {
        Self::new().args(["remote", "set-url", ORIGIN_REMOTE, url])
    }

    /// Create a command listing configured remotes
    pub fn list_remotes() -> Self {
        Self::new().arg("remote")
    }

    /// Create a command resolving the branch origin's HEAD points at (e.g. `origin/main`)
    pub fn remote_head() -> Self {
        Self::new().args([
            "symbolic-ref".to_string(),
            "--quiet".to_string(),
            "--short".to_string(),
            format!("refs/remotes/{ORIGIN_REMOTE}/HEAD"),
        ])
    }

    /// Create a tag list command
    pub fn list_tags() -> Self {
        Self::new().args(["tag", "-l"])
    }

    /// Create a command listing local branch names
    pub fn list_branches() -> Self {
        Self::new().args(["for-each-ref", "--format=%(refname:short)", "refs/heads"])
    }

    /// Create a command resolving a reference to the commit it names
    pub fn rev_parse(ref_name: &str) -> Self {
        Self::new().args([
            "rev-parse".to_string(),
            "--verify".to_string(),
            "--quiet".to_string(),
            format!("{ref_name}^{{commit}}"),
        ])
    }

    /// Create a command to get the current commit hash
    pub fn current_commit() -> Self {
        Self::new().args(["rev-parse", "HEAD"])
    }

    /// Create a command to get the current branch (empty output when detached)
    pub fn current_branch() -> Self {
        Self::new().args(["branch", "--show-current"])
    }

    /// Create a command reporting whether the repository is shallow
    pub fn is_shallow() -> Self {
        Self::new().args(["rev-parse", "--is-shallow-repository"])
    }
}
