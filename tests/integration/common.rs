//! Package repository fixtures shared by the integration tests.

use std::path::PathBuf;
use tempfile::TempDir;
use zkg_core::git::VersionControl;
use zkg_core::metadata::Metadata;
use zkg_core::package::Package;
use zkg_core::test_utils::{TestGit, init_test_logging};

/// A scratch area holding one upstream package repository.
pub struct PackageFixture {
    pub temp: TempDir,
    pub upstream: TestGit,
}

impl PackageFixture {
    /// Upstream repository `name` with one tagged release per entry of
    /// `releases`, plus an untagged development commit on `main`.
    pub fn with_releases(name: &str, releases: &[&str]) -> Self {
        init_test_logging(None);
        let temp = TempDir::new().unwrap();
        let upstream = TestGit::new(temp.path().join(name));
        upstream.init_package().unwrap();

        for release in releases {
            upstream.commit_metadata(release.trim_start_matches('v')).unwrap();
            upstream.tag(release).unwrap();
        }
        upstream.commit_metadata("dev").unwrap();

        Self {
            temp,
            upstream,
        }
    }

    /// Package referring to the upstream by its local path.
    pub fn package(&self) -> Package {
        Package::new(&self.upstream.url(), "", "", Metadata::new())
    }

    /// Where clones of the package go.
    pub fn clone_dir(&self) -> PathBuf {
        self.temp.path().join("clones").join(self.package().name())
    }
}

pub fn vcs() -> VersionControl {
    VersionControl::default()
}
