//! Gathering package information from real repositories.

use crate::common::{PackageFixture, vcs};
use zkg_core::config::EngineConfig;
use zkg_core::metadata::{FieldParse, Metadata};
use zkg_core::package::info::{InfoRequest, gather_info, gather_many};
use zkg_core::package::{Package, PackageStatus, VersionType};

#[tokio::test]
async fn test_gather_info_picks_highest_release() {
    let fx = PackageFixture::with_releases("foo", &["v0.9.0", "v1.10.0", "v1.2.0"]);
    let pkg = fx.package();

    let info = gather_info(&vcs(), &pkg, &fx.clone_dir(), None, None).await.unwrap();

    assert!(info.is_valid(), "{:?}", info.invalid_reason);
    assert_eq!(info.versions(), &["v0.9.0", "v1.2.0", "v1.10.0"]);
    assert_eq!(info.best_version(), Some("v1.10.0"));
    assert_eq!(info.default_branch.as_deref(), Some("main"));
    assert_eq!(info.metadata_version, "v1.10.0");
    assert_eq!(info.version_type, Some(VersionType::Version));
    assert_eq!(info.short_description(), "Test package 1.10.0.");

    let deps = info.dependencies("depends").present().unwrap();
    assert_eq!(deps.get("zeek").map(String::as_str), Some(">=4.0.0"));
}

#[tokio::test]
async fn test_gather_info_of_unreleased_package_uses_default_branch() {
    let fx = PackageFixture::with_releases("foo", &[]);

    let info = gather_info(&vcs(), &fx.package(), &fx.clone_dir(), None, None).await.unwrap();

    assert!(info.versions().is_empty());
    assert_eq!(info.best_version(), Some("main"));
    assert_eq!(info.version_type, Some(VersionType::Branch));
    assert_eq!(info.short_description(), "Test package dev.");
}

#[tokio::test]
async fn test_gather_info_at_commit() {
    let fx = PackageFixture::with_releases("foo", &["v1.0.0"]);
    let commit = fx.upstream.rev_parse("v1.0.0").unwrap();

    let info = gather_info(&vcs(), &fx.package(), &fx.clone_dir(), None, Some(&commit))
        .await
        .unwrap();

    assert!(info.is_valid(), "{:?}", info.invalid_reason);
    assert_eq!(info.version_type, Some(VersionType::Commit));
    assert_eq!(info.metadata_version, commit);
    assert_eq!(info.short_description(), "Test package 1.0.0.");
}

#[tokio::test]
async fn test_gather_info_for_installed_branch() {
    let fx = PackageFixture::with_releases("foo", &["v1.0.0"]);
    fx.upstream.create_branch("develop").unwrap();
    fx.upstream.commit_metadata("develop").unwrap();
    fx.upstream.checkout("main").unwrap();
    let status = PackageStatus::tracking_branch("develop", "0".repeat(40));

    let info = gather_info(&vcs(), &fx.package(), &fx.clone_dir(), Some(&status), None)
        .await
        .unwrap();

    assert_eq!(info.metadata_version, "develop");
    assert_eq!(info.version_type, Some(VersionType::Branch));
    assert_eq!(info.short_description(), "Test package develop.");
}

#[tokio::test]
async fn test_gather_info_reads_legacy_metadata_file() {
    let fx = PackageFixture::with_releases("foo", &[]);
    std::fs::remove_file(fx.upstream.repo_path().join("zkg.meta")).unwrap();
    fx.upstream
        .write_file("bro-pkg.meta", "[package]\ndescription = Legacy package. Old.\n")
        .unwrap();
    fx.upstream.add_all().unwrap();
    fx.upstream.commit("Switch to legacy metadata").unwrap();

    let info = gather_info(&vcs(), &fx.package(), &fx.clone_dir(), None, None).await.unwrap();

    assert!(info.metadata_file.as_ref().unwrap().ends_with("bro-pkg.meta"));
    assert_eq!(info.short_description(), "Legacy package.");
}

#[tokio::test]
async fn test_malformed_fields_do_not_invalidate_info() {
    let fx = PackageFixture::with_releases("foo", &[]);
    fx.upstream
        .write_file(
            "zkg.meta",
            "[package]\ndescription = Broken.\ndepends = zeek\nuser_vars = ROOT [/usr]\n",
        )
        .unwrap();
    fx.upstream.add_all().unwrap();
    fx.upstream.commit("Break fields").unwrap();

    let info = gather_info(&vcs(), &fx.package(), &fx.clone_dir(), None, None).await.unwrap();

    assert!(info.is_valid());
    assert!(info.dependencies("depends").is_malformed());
    assert!(matches!(info.user_vars(), FieldParse::Malformed(_)));
    assert!(info.dependencies("external_depends").is_absent());
}

#[tokio::test]
async fn test_gather_info_of_missing_repository() {
    let fx = PackageFixture::with_releases("foo", &[]);
    let missing = fx.temp.path().join("does-not-exist").display().to_string();
    let pkg = Package::new(&missing, "", "", Metadata::new());

    let info = gather_info(&vcs(), &pkg, &fx.clone_dir(), None, None).await.unwrap();

    assert!(!info.is_valid());
    assert!(info.versions().is_empty());
}

#[tokio::test]
async fn test_regather_replaces_previous_clone() {
    let fx = PackageFixture::with_releases("foo", &["v1.0.0"]);
    let vcs = vcs();

    gather_info(&vcs, &fx.package(), &fx.clone_dir(), None, None).await.unwrap();
    std::fs::write(fx.clone_dir().join("stale.txt"), "left over").unwrap();
    fx.upstream.commit_metadata("1.1.0").unwrap();
    fx.upstream.tag("v1.1.0").unwrap();

    let info = gather_info(&vcs, &fx.package(), &fx.clone_dir(), None, None).await.unwrap();

    assert_eq!(info.best_version(), Some("v1.1.0"));
    assert!(!fx.clone_dir().join("stale.txt").exists());
}

#[tokio::test]
async fn test_gather_many_with_configured_parallelism() {
    let fixtures: Vec<PackageFixture> = ["alpha", "beta", "gamma"]
        .iter()
        .map(|name| PackageFixture::with_releases(name, &["v1.0.0"]))
        .collect();
    let config = EngineConfig {
        max_parallel: Some(2),
        ..Default::default()
    };

    let requests = fixtures
        .iter()
        .map(|fx| InfoRequest {
            package: fx.package(),
            clone_dir: fx.clone_dir(),
            status: None,
            version: None,
        })
        .collect();

    let results = gather_many(&vcs(), requests, config.parallelism()).await;

    let names: Vec<String> =
        results.into_iter().map(|r| r.unwrap().package.name().to_string()).collect();
    assert_eq!(names, vec!["alpha", "beta", "gamma"]);
}
