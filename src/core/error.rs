//! Error handling for zkg-core
//!
//! The error system separates two kinds of failure:
//! 1. **Typed failures** ([`ZkgError`]) that callers may want to match on, such as a
//!    missing Git reference or an invalid package name
//! 2. **Parse outcomes** of metadata fields, which are not errors at all and are
//!    modelled by [`crate::metadata::FieldParse`]
//!
//! Fallible operations return [`anyhow::Result`] and attach context with
//! `.context()`, while the underlying cause stays a [`ZkgError`] that can be
//! recovered through `downcast_ref`:
//!
//! ```rust,no_run
//! use zkg_core::core::ZkgError;
//!
//! fn is_missing_ref(err: &anyhow::Error) -> bool {
//!     matches!(
//!         err.downcast_ref::<ZkgError>(),
//!         Some(ZkgError::GitCheckoutFailed { .. })
//!     )
//! }
//! ```
//!
//! # Error Categories
//!
//! - **Version control**: [`ZkgError::GitCommandError`], [`ZkgError::GitCloneFailed`],
//!   [`ZkgError::GitCheckoutFailed`], [`ZkgError::GitNotFound`], [`ZkgError::GitRepoInvalid`]
//! - **Invalid references**: [`ZkgError::NoDefaultBranch`]
//! - **Identity**: [`ZkgError::InvalidPackageName`]
//! - **Metadata**: [`ZkgError::MalformedField`], [`ZkgError::MetadataFileNotFound`],
//!   [`ZkgError::MetadataParseError`]
//! - **Tracking**: [`ZkgError::CommitTrackingNotUpgradable`], [`ZkgError::InvalidTrackingMethod`]
//! - **Configuration**: [`ZkgError::ConfigError`]

use thiserror::Error;

/// The main error type for zkg-core operations
///
/// Version-control variants always carry the attempted operation and the
/// repository (or URL) it targeted, together with the backend's own message.
/// Retry and abort policy belongs to the caller.
#[derive(Error, Debug)]
pub enum ZkgError {
    /// A git command returned a non-zero exit code.
    #[error("Git operation '{operation}' failed in {repository}: {stderr}")]
    GitCommandError {
        /// The git operation that failed (e.g., "pull", "submodule", "tag")
        operation: String,
        /// Repository path the command ran in, or "-" when it ran outside any repository
        repository: String,
        /// The error output from the git command
        stderr: String,
    },

    /// Git executable not found in PATH
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// A directory that should hold a working copy does not.
    #[error("Not a valid git repository: {path}")]
    GitRepoInvalid {
        /// The path that was expected to contain a git repository
        path: String,
    },

    /// Git repository clone failed
    #[error("Failed to clone repository {url}: {reason}")]
    GitCloneFailed {
        /// The repository URL that failed to clone
        url: String,
        /// The reason for the clone failure
        reason: String,
    },

    /// Git checkout failed, usually because the reference does not exist
    #[error("Failed to checkout reference '{reference}' in {repository}: {reason}")]
    GitCheckoutFailed {
        /// The git reference (branch, tag, or commit) that failed to checkout
        reference: String,
        /// The repository path
        repository: String,
        /// The reason for the checkout failure
        reason: String,
    },

    /// Neither a remote HEAD, a well-known branch, a checked out branch nor a
    /// commit could be resolved.
    #[error("Unable to determine the default branch of {repository}")]
    NoDefaultBranch {
        /// The repository path
        repository: String,
    },

    /// Package name rejected before any version-control work is attempted.
    #[error("Invalid package name: '{name}'")]
    InvalidPackageName {
        /// The rejected name
        name: String,
    },

    /// A metadata field is present but cannot be interpreted.
    #[error("Malformed '{field}' metadata field: {reason}")]
    MalformedField {
        /// Metadata field name (e.g., "depends", "user_vars")
        field: String,
        /// Why the field could not be parsed
        reason: String,
    },

    /// Neither `zkg.meta` nor `bro-pkg.meta` exists in a package checkout.
    #[error("No metadata file found in {path}")]
    MetadataFileNotFound {
        /// Directory that was searched
        path: String,
    },

    /// The metadata file is not valid key/value text.
    #[error("Invalid metadata syntax in {file} at line {line}: {reason}")]
    MetadataParseError {
        /// Metadata file path
        file: String,
        /// 1-based line number
        line: usize,
        /// What was wrong with the line
        reason: String,
    },

    /// An upgrade was requested for a package pinned to a commit.
    #[error("Package '{package}' tracks a specific commit and cannot be upgraded")]
    CommitTrackingNotUpgradable {
        /// Qualified name of the package
        package: String,
    },

    /// Unknown tracking method name.
    #[error("Invalid tracking method: '{method}' (expected version, branch or commit)")]
    InvalidTrackingMethod {
        /// The rejected name
        method: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    /// Semver parsing error
    #[error("Semver parsing error: {0}")]
    SemverError(#[from] semver::Error),
}

impl ZkgError {
    /// Whether this error came from the version-control backend.
    #[must_use]
    pub const fn is_git_error(&self) -> bool {
        matches!(
            self,
            Self::GitCommandError { .. }
                | Self::GitCloneFailed { .. }
                | Self::GitCheckoutFailed { .. }
                | Self::GitNotFound
                | Self::GitRepoInvalid { .. }
        )
    }
}
