//! Package identity and installed state
//!
//! A package is identified by the location of its Git repository. When it was
//! found through a package source, it also carries the source name and the
//! directory inside the source index where it is declared. Together these form
//! the *qualified name* users refer to packages by:
//!
//! ```text
//! zeek/alice/foo      source "zeek", directory "alice", name "foo"
//! zeek/foo            source "zeek", top-level
//! /home/bob/src/foo   no source: the canonical repository location
//! ```
//!
//! Locations are canonicalized on construction: trailing slashes are removed
//! and local paths (those starting with `.` or `/`) become absolute real
//! paths. The name is always derived from the location.
//!
//! [`PackageStatus`] records how an installed package is tracked, and
//! [`info`] assembles the full view of a package from its repository.
//!
//! ```rust
//! use zkg_core::metadata::Metadata;
//! use zkg_core::package::Package;
//!
//! let pkg = Package::new("https://github.com/alice/foo", "zeek", "alice", Metadata::new());
//! assert_eq!(pkg.name(), "foo");
//! assert_eq!(pkg.qualified_name(), "zeek/alice/foo");
//! assert!(pkg.matches_path("alice/foo"));
//! assert!(!pkg.matches_path("bob/foo"));
//! ```

pub mod info;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::constants::RESERVED_PACKAGE_NAMES;
use crate::core::ZkgError;
use crate::git::is_local_location;
use crate::metadata::{self, Dependencies, FieldParse, Metadata, UserVar};
use crate::utils::fs::real_path;

pub use info::{PackageInfo, VersionType};

/// Returns the canonical form of a repository location.
///
/// Trailing slashes are stripped. Local locations are resolved to an
/// absolute real path; anything else is returned as given.
#[must_use]
pub fn canonical_url(location: &str) -> String {
    let url = location.trim_end_matches('/');

    if is_local_location(url) {
        real_path(Path::new(url)).display().to_string()
    } else {
        url.to_string()
    }
}

/// Returns the package name for a repository location: its last path segment.
#[must_use]
pub fn name_from_path(location: &str) -> String {
    let url = canonical_url(location);
    url.rsplit_once('/').map_or(url.as_str(), |(_, name)| name).to_string()
}

/// Whether `name` may be used as a package name.
///
/// Names with surrounding whitespace and the reserved names `package` and
/// `packages` are rejected.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    name == name.trim() && !RESERVED_PACKAGE_NAMES.contains(&name)
}

/// Identity of a package plus its last known metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    git_url: String,
    name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    source: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    directory: String,
    #[serde(skip_serializing_if = "Metadata::is_empty")]
    metadata: Metadata,
}

impl Package {
    /// Creates a package from a repository location, canonicalizing it.
    ///
    /// A location without a source that exists on disk is resolved to its
    /// real path even when it is relative without a leading `.`.
    pub fn new(
        location: &str,
        source: impl Into<String>,
        directory: impl Into<String>,
        metadata: Metadata,
    ) -> Self {
        let source = source.into();
        let mut git_url = canonical_url(location);

        if source.is_empty() && Path::new(location).exists() {
            git_url = real_path(Path::new(&git_url)).display().to_string();
        }

        Self {
            git_url,
            name: name_from_path(location),
            source,
            directory: directory.into(),
            metadata,
        }
    }

    /// Creates a package from a location that is already canonical.
    ///
    /// Neither the location nor the name is touched.
    pub fn canonical(
        git_url: impl Into<String>,
        name: impl Into<String>,
        source: impl Into<String>,
        directory: impl Into<String>,
        metadata: Metadata,
    ) -> Self {
        Self {
            git_url: git_url.into(),
            name: name.into(),
            source: source.into(),
            directory: directory.into(),
            metadata,
        }
    }

    /// Replaces the metadata, keeping the identity.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Canonical repository location.
    pub fn git_url(&self) -> &str {
        &self.git_url
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Package source this package was found through, empty if none.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Directory within the source index, empty if top-level.
    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// The name prefixed by the source directory, if any.
    #[must_use]
    pub fn name_with_source_directory(&self) -> String {
        if self.directory.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.directory, self.name)
        }
    }

    /// `source/directory/name` for packages from a source, else the canonical location.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        if self.source.is_empty() {
            self.git_url.clone()
        } else {
            format!("{}/{}", self.source, self.name_with_source_directory())
        }
    }

    /// Whether a user-supplied path refers to this package.
    ///
    /// For packages from a source, `path` matches when its segments equal the
    /// trailing segments of the qualified name, so `zeek/alice/foo` is matched
    /// by `foo`, `alice/foo` and `zeek/alice/foo`. Other packages match their
    /// bare name or their full location.
    #[must_use]
    pub fn matches_path(&self, path: &str) -> bool {
        if self.source.is_empty() {
            return path == self.name || path == self.git_url;
        }

        let qualified = self.qualified_name();
        let pkg_parts: Vec<&str> = qualified.split('/').collect();
        let path_parts: Vec<&str> = path.split('/').collect();

        path_parts.len() <= pkg_parts.len()
            && path_parts.iter().rev().zip(pkg_parts.iter().rev()).all(|(a, b)| a == b)
    }

    /// Rejects packages whose name is not valid.
    ///
    /// Must be checked before any version-control work on the package.
    pub fn validate(&self) -> Result<(), ZkgError> {
        if is_valid_name(&self.name) {
            Ok(())
        } else {
            Err(ZkgError::InvalidPackageName {
                name: self.name.clone(),
            })
        }
    }

    pub fn aliases(&self) -> Vec<String> {
        metadata::aliases(&self.metadata)
    }

    pub fn tags(&self) -> Vec<String> {
        metadata::tags(&self.metadata)
    }

    /// First sentence of the description.
    pub fn short_description(&self) -> String {
        metadata::short_description(&self.metadata)
    }

    /// Dependencies declared in `field` (usually `depends`).
    pub fn dependencies(&self, field: &str) -> FieldParse<Dependencies> {
        metadata::dependencies(&self.metadata, field)
    }

    pub fn user_vars(&self) -> FieldParse<Vec<UserVar>> {
        metadata::user_vars(&self.metadata)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

impl PartialOrd for Package {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Package {
    fn cmp(&self, other: &Self) -> Ordering {
        self.qualified_name()
            .cmp(&other.qualified_name())
            .then_with(|| self.git_url.cmp(&other.git_url))
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.source.cmp(&other.source))
            .then_with(|| self.directory.cmp(&other.directory))
            .then_with(|| self.metadata.cmp(&other.metadata))
    }
}

/// How upgrades of an installed package are decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMethod {
    /// Follow release tags; upgrades move to the highest version.
    Version,
    /// Follow a branch; upgrades pull its tip.
    Branch,
    /// Stay on one commit forever.
    Commit,
}

impl TrackingMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::Branch => "branch",
            Self::Commit => "commit",
        }
    }
}

impl fmt::Display for TrackingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackingMethod {
    type Err = ZkgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "version" => Ok(Self::Version),
            "branch" => Ok(Self::Branch),
            "commit" => Ok(Self::Commit),
            _ => Err(ZkgError::InvalidTrackingMethod {
                method: s.to_string(),
            }),
        }
    }
}

/// State of an installed package.
///
/// For [`TrackingMethod::Commit`] the `current_version` is informational
/// only; such packages are never upgraded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackageStatus {
    #[serde(default)]
    pub is_loaded: bool,
    /// Pinned packages are skipped by upgrades.
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_outdated: bool,
    pub tracking_method: TrackingMethod,
    /// Installed tag or branch name.
    pub current_version: String,
    /// Commit the installed version resolved to.
    pub current_hash: String,
}

impl PackageStatus {
    /// Status of a package installed from a release tag.
    pub fn tracking_version(tag: impl Into<String>, hash: impl Into<String>) -> Self {
        Self::new(TrackingMethod::Version, tag.into(), hash.into())
    }

    /// Status of a package installed from a branch.
    pub fn tracking_branch(branch: impl Into<String>, hash: impl Into<String>) -> Self {
        Self::new(TrackingMethod::Branch, branch.into(), hash.into())
    }

    /// Status of a package pinned to a commit.
    pub fn tracking_commit(hash: impl Into<String>) -> Self {
        let hash = hash.into();
        Self::new(TrackingMethod::Commit, hash.clone(), hash)
    }

    fn new(tracking_method: TrackingMethod, current_version: String, current_hash: String) -> Self {
        Self {
            is_loaded: false,
            is_pinned: false,
            is_outdated: false,
            tracking_method,
            current_version,
            current_hash,
        }
    }

    /// Whether an upgrade may ever move this package.
    #[must_use]
    pub fn is_upgradable(&self) -> bool {
        !self.is_pinned && self.tracking_method != TrackingMethod::Commit
    }
}

/// An installed package and its status, ordered by qualified name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct InstalledPackage {
    pub package: Package,
    pub status: PackageStatus,
}

impl InstalledPackage {
    #[must_use]
    pub const fn new(package: Package, status: PackageStatus) -> Self {
        Self {
            package,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sourced(source: &str, directory: &str, name: &str) -> Package {
        Package::new(&format!("https://github.com/x/{name}"), source, directory, Metadata::new())
    }

    #[test]
    fn test_canonical_url_of_remote() {
        assert_eq!(canonical_url("https://github.com/zeek/foo/"), "https://github.com/zeek/foo");
        assert_eq!(canonical_url("https://github.com/zeek/foo"), "https://github.com/zeek/foo");
        assert_eq!(canonical_url("git@github.com:zeek/foo.git"), "git@github.com:zeek/foo.git");
    }

    #[test]
    fn test_canonical_url_of_relative_path() {
        let cwd = std::fs::canonicalize(std::env::current_dir().unwrap()).unwrap();
        assert_eq!(canonical_url("."), cwd.display().to_string());
        assert_eq!(canonical_url("./"), cwd.display().to_string());
    }

    #[test]
    fn test_name_from_path() {
        assert_eq!(name_from_path("https://github.com/zeek/foo"), "foo");
        assert_eq!(name_from_path("https://github.com/zeek/foo/"), "foo");
        assert_eq!(name_from_path("/srv/git/bar"), "bar");
        assert_eq!(name_from_path("bare"), "bare");
    }

    #[test]
    fn test_trailing_slash_gives_same_package() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("foo");
        std::fs::create_dir_all(&repo).unwrap();
        let location = repo.display().to_string();

        let plain = Package::new(&location, "", "", Metadata::new());
        let slashed = Package::new(&format!("{location}/"), "", "", Metadata::new());

        assert_eq!(plain, slashed);
        assert_eq!(plain.name(), "foo");
        assert!(Path::new(plain.git_url()).is_absolute());
        assert!(!plain.git_url().ends_with('/'));
    }

    #[test]
    fn test_canonical_constructor_keeps_location() {
        let pkg = Package::canonical("./not/resolved/", "pkg", "", "", Metadata::new());
        assert_eq!(pkg.git_url(), "./not/resolved/");
        assert_eq!(pkg.name(), "pkg");
    }

    #[test]
    fn test_qualified_name() {
        assert_eq!(sourced("zeek", "alice", "foo").qualified_name(), "zeek/alice/foo");
        assert_eq!(sourced("zeek", "", "foo").qualified_name(), "zeek/foo");
        assert_eq!(sourced("", "", "foo").qualified_name(), "https://github.com/x/foo");
        assert_eq!(sourced("zeek", "alice", "foo").to_string(), "zeek/alice/foo");
        assert_eq!(sourced("zeek", "alice", "foo").name_with_source_directory(), "alice/foo");
    }

    #[test]
    fn test_matches_path_with_source() {
        let pkg = sourced("zeek", "alice", "foo");
        assert!(pkg.matches_path("foo"));
        assert!(pkg.matches_path("alice/foo"));
        assert!(pkg.matches_path("zeek/alice/foo"));
        assert!(!pkg.matches_path("bob/foo"));
        assert!(!pkg.matches_path("bar"));
        assert!(!pkg.matches_path("extra/zeek/alice/foo"));
    }

    #[test]
    fn test_matches_path_without_source() {
        let pkg = sourced("", "", "foo");
        assert!(pkg.matches_path("foo"));
        assert!(pkg.matches_path("https://github.com/x/foo"));
        assert!(!pkg.matches_path("x/foo"));
    }

    #[test]
    fn test_is_valid_name() {
        assert!(is_valid_name("foo"));
        assert!(is_valid_name("zeek-af_packet"));
        assert!(!is_valid_name("package"));
        assert!(!is_valid_name("packages"));
        assert!(!is_valid_name(" foo"));
        assert!(!is_valid_name("foo "));
    }

    #[test]
    fn test_validate() {
        assert!(sourced("zeek", "", "foo").validate().is_ok());
        let err = sourced("zeek", "", "packages").validate().unwrap_err();
        assert!(matches!(err, ZkgError::InvalidPackageName { name } if name == "packages"));
    }

    #[test]
    fn test_metadata_accessors() {
        let mut meta = Metadata::new();
        meta.insert("description".into(), "Parses foo. Also bar.".into());
        meta.insert("depends".into(), "zeek >=4.0.0 bar *".into());
        meta.insert("tags".into(), "dns, protocol analyzer".into());
        let pkg = sourced("zeek", "", "foo").with_metadata(meta);

        assert_eq!(pkg.short_description(), "Parses foo.");
        assert_eq!(pkg.tags(), vec!["dns", "protocol analyzer"]);
        assert_eq!(pkg.dependencies("depends").present().unwrap()["bar"], "*");
        assert!(pkg.user_vars().is_absent());
    }

    #[test]
    fn test_tracking_method_names() {
        for method in [TrackingMethod::Version, TrackingMethod::Branch, TrackingMethod::Commit] {
            assert_eq!(method.to_string().parse::<TrackingMethod>().unwrap(), method);
        }
        assert_eq!("BRANCH".parse::<TrackingMethod>().unwrap(), TrackingMethod::Branch);
        assert!(matches!(
            "tag".parse::<TrackingMethod>(),
            Err(ZkgError::InvalidTrackingMethod { .. })
        ));
        assert_eq!(serde_json::to_string(&TrackingMethod::Commit).unwrap(), "\"commit\"");
    }

    #[test]
    fn test_status_serde() {
        let status = PackageStatus::tracking_branch("main", "abc");
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"tracking_method\":\"branch\""));
        let back: PackageStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }

    #[test]
    fn test_status_upgradable() {
        assert!(PackageStatus::tracking_version("v1.0.0", "a").is_upgradable());
        assert!(!PackageStatus::tracking_commit("a").is_upgradable());

        let mut pinned = PackageStatus::tracking_branch("main", "a");
        pinned.is_pinned = true;
        assert!(!pinned.is_upgradable());
    }

    #[test]
    fn test_installed_packages_sort_by_qualified_name() {
        let status = PackageStatus::tracking_version("1.0.0", "abc");
        let mut installed = vec![
            InstalledPackage::new(sourced("zeek", "zed", "a"), status.clone()),
            InstalledPackage::new(sourced("zeek", "alice", "foo"), status.clone()),
            InstalledPackage::new(sourced("other", "", "z"), status),
        ];
        installed.sort();

        let names: Vec<String> = installed.iter().map(|p| p.package.to_string()).collect();
        assert_eq!(names, vec!["other/z", "zeek/alice/foo", "zeek/zed/a"]);
    }
}
