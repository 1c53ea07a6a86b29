//! Outdated evaluation and upgrades against real repositories.

use crate::common::{PackageFixture, vcs};
use zkg_core::core::ZkgError;
use zkg_core::package::TrackingMethod;
use zkg_core::package::info::{
    apply_upgrade, evaluate_outdated, gather_info, installed_status, upgrade_target,
};

#[tokio::test]
async fn test_version_tracking_lifecycle() {
    let fx = PackageFixture::with_releases("foo", &["v1.0.0", "v1.1.0"]);
    let pkg = fx.package();
    let clone = fx.clone_dir();
    let vcs = vcs();

    let info = gather_info(&vcs, &pkg, &clone, None, Some("v1.0.0")).await.unwrap();
    let status = installed_status(&vcs, &clone, &info).await.unwrap();
    assert_eq!(status.tracking_method, TrackingMethod::Version);
    assert_eq!(status.current_hash, fx.upstream.rev_parse("v1.0.0").unwrap());

    assert!(evaluate_outdated(&vcs, &clone, &status).await.unwrap());
    assert_eq!(upgrade_target(&status, &info).as_deref(), Some("v1.1.0"));

    let status = apply_upgrade(&vcs, &pkg, &clone, &status).await.unwrap();
    assert_eq!(status.current_version, "v1.1.0");
    assert_eq!(status.current_hash, fx.upstream.rev_parse("v1.1.0").unwrap());
    assert!(!evaluate_outdated(&vcs, &clone, &status).await.unwrap());

    // New commits on main are not releases.
    fx.upstream.commit_metadata("unreleased").unwrap();
    assert!(!evaluate_outdated(&vcs, &clone, &status).await.unwrap());

    fx.upstream.tag("v1.2.0").unwrap();
    assert!(evaluate_outdated(&vcs, &clone, &status).await.unwrap());
}

#[tokio::test]
async fn test_branch_tracking_lifecycle() {
    let fx = PackageFixture::with_releases("foo", &["v1.0.0"]);
    let pkg = fx.package();
    let clone = fx.clone_dir();
    let vcs = vcs();

    let info = gather_info(&vcs, &pkg, &clone, None, Some("main")).await.unwrap();
    let status = installed_status(&vcs, &clone, &info).await.unwrap();
    assert_eq!(status.tracking_method, TrackingMethod::Branch);
    assert_eq!(status.current_version, "main");
    assert!(!evaluate_outdated(&vcs, &clone, &status).await.unwrap());

    let tip = fx.upstream.commit_metadata("next").unwrap();
    assert!(evaluate_outdated(&vcs, &clone, &status).await.unwrap());
    assert_eq!(upgrade_target(&status, &info).as_deref(), Some("main"));

    let status = apply_upgrade(&vcs, &pkg, &clone, &status).await.unwrap();
    assert_eq!(status.current_hash, tip);
    assert!(!evaluate_outdated(&vcs, &clone, &status).await.unwrap());

    let meta = std::fs::read_to_string(clone.join("zkg.meta")).unwrap();
    assert!(meta.contains("Test package next."));
}

#[tokio::test]
async fn test_commit_tracking_never_moves() {
    let fx = PackageFixture::with_releases("foo", &["v1.0.0"]);
    let pkg = fx.package();
    let clone = fx.clone_dir();
    let vcs = vcs();
    let commit = fx.upstream.rev_parse("v1.0.0").unwrap();

    let info = gather_info(&vcs, &pkg, &clone, None, Some(&commit)).await.unwrap();
    let status = installed_status(&vcs, &clone, &info).await.unwrap();
    assert_eq!(status.tracking_method, TrackingMethod::Commit);
    assert_eq!(status.current_hash, commit);

    fx.upstream.commit_metadata("2.0.0").unwrap();
    fx.upstream.tag("v2.0.0").unwrap();

    assert!(!evaluate_outdated(&vcs, &clone, &status).await.unwrap());
    assert_eq!(upgrade_target(&status, &info), None);

    let err = apply_upgrade(&vcs, &pkg, &clone, &status).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ZkgError>(),
        Some(ZkgError::CommitTrackingNotUpgradable { .. })
    ));
    assert_eq!(vcs.head_commit(&clone).await.unwrap(), commit);
}

#[tokio::test]
async fn test_pinned_version_is_not_upgraded() {
    let fx = PackageFixture::with_releases("foo", &["v1.0.0", "v1.1.0"]);
    let pkg = fx.package();
    let clone = fx.clone_dir();
    let vcs = vcs();

    let info = gather_info(&vcs, &pkg, &clone, None, Some("v1.0.0")).await.unwrap();
    let mut status = installed_status(&vcs, &clone, &info).await.unwrap();
    status.is_pinned = true;

    // Pinning does not hide that a newer release exists.
    assert!(evaluate_outdated(&vcs, &clone, &status).await.unwrap());
    assert_eq!(upgrade_target(&status, &info), None);

    let after = apply_upgrade(&vcs, &pkg, &clone, &status).await.unwrap();
    assert_eq!(after, status);
    assert_eq!(vcs.head_commit(&clone).await.unwrap(), status.current_hash);
}
