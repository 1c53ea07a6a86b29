//! Platform helpers for locating the Git executable.

use crate::core::ZkgError;
use anyhow::Result;

/// Checks if the current platform is Windows.
#[must_use]
pub const fn is_windows() -> bool {
    cfg!(windows)
}

/// Gets the platform-specific Git command name.
///
/// This returns the command name, not the full path; the executable must be
/// on `PATH`.
#[must_use]
pub const fn get_git_command() -> &'static str {
    if is_windows() {
        "git.exe"
    } else {
        "git"
    }
}

/// Checks whether a command is available on `PATH`.
#[must_use]
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Fails with [`ZkgError::GitNotFound`] unless Git can be found on `PATH`.
pub fn ensure_git_available() -> Result<()> {
    if command_exists(get_git_command()) {
        Ok(())
    } else {
        Err(ZkgError::GitNotFound.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_command_name() {
        if cfg!(windows) {
            assert_eq!(get_git_command(), "git.exe");
        } else {
            assert_eq!(get_git_command(), "git");
        }
    }

    #[test]
    fn test_missing_command() {
        assert!(!command_exists("zkg-core-no-such-binary-xyz"));
    }
}
