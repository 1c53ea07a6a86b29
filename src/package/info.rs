//! Package information assembly and version tracking
//!
//! [`gather_info`] clones a package, enumerates its versions and reads its
//! metadata at a chosen version. The resulting [`PackageInfo`] is a snapshot:
//! refreshing it means gathering it again.
//!
//! The tracking method of an installed package decides what "outdated" and
//! "upgrade" mean:
//!
//! | Method    | Outdated when                          | Upgrade                   |
//! |-----------|----------------------------------------|---------------------------|
//! | `version` | hash differs from the highest tag's    | check out the highest tag |
//! | `branch`  | hash differs from the remote branch tip | check out and pull       |
//! | `commit`  | never                                  | never                     |

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::{Package, PackageStatus, TrackingMethod};
use crate::constants::ORIGIN_REMOTE;
use crate::core::ZkgError;
use crate::git::{GitBackend, VersionControl};
use crate::metadata::file::load_package_metadata;
use crate::metadata::{self, Dependencies, FieldParse, Metadata, UserVar};
use crate::version::{is_sha1, sorted_version_tags};

/// Kind of reference package information was taken from.
pub type VersionType = TrackingMethod;

/// Everything known about a package at one point in time.
///
/// When `invalid_reason` is set, gathering failed part way and the other
/// fields hold whatever was collected before the failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageInfo {
    pub package: Package,
    /// Set for installed packages.
    pub status: Option<PackageStatus>,
    /// Contents of the metadata file at `metadata_version`.
    pub metadata: Metadata,
    versions: Vec<String>,
    /// Tag, branch or commit the metadata was read from.
    pub metadata_version: String,
    pub version_type: Option<VersionType>,
    pub invalid_reason: Option<String>,
    /// Absolute path of the metadata file that was read.
    pub metadata_file: Option<PathBuf>,
    pub default_branch: Option<String>,
}

impl PackageInfo {
    /// Info with identity and status only.
    #[must_use]
    pub fn new(package: Package, status: Option<PackageStatus>) -> Self {
        Self {
            package,
            status,
            metadata: Metadata::new(),
            versions: Vec::new(),
            metadata_version: String::new(),
            version_type: None,
            invalid_reason: None,
            metadata_file: None,
            default_branch: None,
        }
    }

    /// Version tags in ascending semantic-version order.
    pub fn versions(&self) -> &[String] {
        &self.versions
    }

    /// Replaces the available versions with the version tags among `tags`.
    ///
    /// Tags that are not versions are dropped and the rest are sorted.
    pub fn set_versions<S: AsRef<str>>(&mut self, tags: &[S]) {
        self.versions = sorted_version_tags(tags);
    }

    /// Highest version tag, else the default branch.
    #[must_use]
    pub fn best_version(&self) -> Option<&str> {
        self.versions.last().or(self.default_branch.as_ref()).map(String::as_str)
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.invalid_reason.is_none()
    }

    /// Aliases, canonical one first.
    pub fn aliases(&self) -> Vec<String> {
        metadata::aliases(&self.metadata)
    }

    pub fn tags(&self) -> Vec<String> {
        metadata::tags(&self.metadata)
    }

    pub fn short_description(&self) -> String {
        metadata::short_description(&self.metadata)
    }

    pub fn dependencies(&self, field: &str) -> FieldParse<Dependencies> {
        metadata::dependencies(&self.metadata, field)
    }

    pub fn user_vars(&self) -> FieldParse<Vec<UserVar>> {
        metadata::user_vars(&self.metadata)
    }
}

/// The version an installed package is on, as recorded in its status.
fn installed_version(status: &PackageStatus) -> &str {
    match status.tracking_method {
        TrackingMethod::Commit => &status.current_hash,
        TrackingMethod::Version | TrackingMethod::Branch => &status.current_version,
    }
}

/// Classifies the reference `version` against the available version tags.
fn classify(version: &str, versions: &[String]) -> VersionType {
    if versions.iter().any(|v| v == version) {
        VersionType::Version
    } else if is_sha1(version) {
        VersionType::Commit
    } else {
        VersionType::Branch
    }
}

/// Gathers information about `package` using a fresh clone in `clone_dir`.
///
/// The version inspected is `version` if given, else the installed version
/// from `status`, else the package's best version. A specific commit needs
/// full history; everything else is cloned shallow.
///
/// Each Git step holds the lock of `clone_dir`, but the sequence as a whole
/// does not: concurrent calls must use distinct clone directories.
///
/// # Errors
///
/// Only an invalid package name is an error, and it is reported before the
/// backend is touched. Failures while cloning, checking out or reading
/// metadata are recorded in [`PackageInfo::invalid_reason`].
pub async fn gather_info<B: GitBackend>(
    vcs: &VersionControl<B>,
    package: &Package,
    clone_dir: &Path,
    status: Option<&PackageStatus>,
    version: Option<&str>,
) -> Result<PackageInfo> {
    package.validate()?;

    let mut info = PackageInfo::new(package.clone(), status.cloned());
    let requested = version.or_else(|| status.map(installed_version)).map(str::to_string);

    if let Err(e) = populate(vcs, &mut info, clone_dir, requested).await {
        tracing::warn!("Failed to gather info for {}: {:#}", package, e);
        info.invalid_reason = Some(format!("{e:#}"));
    }

    Ok(info)
}

async fn populate<B: GitBackend>(
    vcs: &VersionControl<B>,
    info: &mut PackageInfo,
    clone_dir: &Path,
    requested: Option<String>,
) -> Result<()> {
    let url = info.package.git_url().to_string();
    let shallow = !requested.as_deref().is_some_and(is_sha1);

    vcs.fresh_clone(&url, clone_dir, shallow)
        .await
        .with_context(|| format!("Failed to clone {url}"))?;

    info.set_versions(&vcs.tag_list(clone_dir).await?);
    info.default_branch = Some(vcs.default_branch(clone_dir).await?);

    let version = match requested {
        Some(v) => v,
        None => info.best_version().map(str::to_string).ok_or_else(|| ZkgError::NoDefaultBranch {
            repository: clone_dir.display().to_string(),
        })?,
    };
    let version_type = classify(&version, &info.versions);
    tracing::debug!("Reading {} metadata at {} ({})", info.package, version, version_type);

    vcs.checkout(clone_dir, &version).await?;
    info.metadata_version = version;
    info.version_type = Some(version_type);

    let (file, metadata) = load_package_metadata(clone_dir)?;
    info.metadata_file = Some(file);
    info.metadata = metadata;
    Ok(())
}

/// One package for [`gather_many`].
#[derive(Debug, Clone)]
pub struct InfoRequest {
    pub package: Package,
    pub clone_dir: PathBuf,
    pub status: Option<PackageStatus>,
    pub version: Option<String>,
}

/// Gathers information for several packages concurrently.
///
/// At most `parallelism` packages are processed at once. Results are in
/// request order.
pub async fn gather_many<B: GitBackend>(
    vcs: &VersionControl<B>,
    requests: Vec<InfoRequest>,
    parallelism: usize,
) -> Vec<Result<PackageInfo>> {
    stream::iter(requests)
        .map(|req| async move {
            gather_info(vcs, &req.package, &req.clone_dir, req.status.as_ref(), req.version.as_deref())
                .await
        })
        .buffered(parallelism.max(1))
        .collect()
        .await
}

/// Status of the checkout in `repo` after installing `info`'s metadata version.
pub async fn installed_status<B: GitBackend>(
    vcs: &VersionControl<B>,
    repo: &Path,
    info: &PackageInfo,
) -> Result<PackageStatus> {
    let hash = vcs.head_commit(repo).await?;
    let version = info.metadata_version.clone();

    Ok(match info.version_type.unwrap_or_else(|| classify(&version, &info.versions)) {
        TrackingMethod::Version => PackageStatus::tracking_version(version, hash),
        TrackingMethod::Branch => PackageStatus::tracking_branch(version, hash),
        TrackingMethod::Commit => PackageStatus::tracking_commit(hash),
    })
}

/// Whether an installed package in `repo` has a newer commit to move to.
///
/// Fetches from origin first. Packages tracking a commit are never outdated.
pub async fn evaluate_outdated<B: GitBackend>(
    vcs: &VersionControl<B>,
    repo: &Path,
    status: &PackageStatus,
) -> Result<bool> {
    let target = match status.tracking_method {
        TrackingMethod::Commit => return Ok(false),
        TrackingMethod::Version => {
            vcs.fetch(repo).await?;
            match vcs.version_tags(repo).await?.pop() {
                Some(latest) => latest,
                None => return Ok(false),
            }
        }
        TrackingMethod::Branch => {
            vcs.fetch(repo).await?;
            format!("{ORIGIN_REMOTE}/{}", status.current_version)
        }
    };

    let tip = vcs.resolve_commit(repo, &target).await?;
    tracing::trace!("{} is at {}, {} is at {}", repo.display(), status.current_hash, target, tip);
    Ok(tip != status.current_hash)
}

/// The version an upgrade would move to.
///
/// `None` for pinned packages and packages tracking a commit.
#[must_use]
pub fn upgrade_target(status: &PackageStatus, info: &PackageInfo) -> Option<String> {
    if !status.is_upgradable() {
        return None;
    }

    match status.tracking_method {
        TrackingMethod::Version => info.versions().last().cloned(),
        TrackingMethod::Branch => Some(status.current_version.clone()),
        TrackingMethod::Commit => None,
    }
}

/// Upgrades the installed package in `repo` and returns its new status.
///
/// Pinned packages are returned unchanged.
///
/// # Errors
///
/// Returns [`ZkgError::CommitTrackingNotUpgradable`] for packages tracking a
/// commit; such a checkout is detached and must never be pulled.
pub async fn apply_upgrade<B: GitBackend>(
    vcs: &VersionControl<B>,
    package: &Package,
    repo: &Path,
    status: &PackageStatus,
) -> Result<PackageStatus> {
    let mut upgraded = status.clone();
    match status.tracking_method {
        TrackingMethod::Commit => {
            return Err(ZkgError::CommitTrackingNotUpgradable {
                package: package.qualified_name(),
            }
            .into());
        }
        _ if status.is_pinned => {
            tracing::debug!("{} is pinned, not upgrading", package);
            return Ok(upgraded);
        }
        TrackingMethod::Version => {
            vcs.fetch(repo).await?;
            if let Some(latest) = vcs.version_tags(repo).await?.pop() {
                vcs.checkout(repo, &latest).await?;
                upgraded.current_version = latest;
            }
        }
        TrackingMethod::Branch => {
            vcs.checkout(repo, &status.current_version).await?;
            vcs.pull(repo).await?;
        }
    }

    upgraded.current_hash = vcs.head_commit(repo).await?;
    upgraded.is_outdated = false;
    tracing::info!("Upgraded {} to {} ({})", package, upgraded.current_version, upgraded.current_hash);
    Ok(upgraded)
}
