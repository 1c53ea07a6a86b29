//! Test utilities for zkg-core
//!
//! Two ways of standing in for package repositories:
//! - [`TestGit`] creates real repositories with the system `git`
//! - [`FakeVcs`] is an in-memory [`crate::git::GitBackend`] for deterministic
//!   tests of command sequences and failure paths
//!
//! # Example
//!
//! ```rust,no_run
//! use zkg_core::git::VersionControl;
//! use zkg_core::test_utils::{FakeRepo, FakeVcs};
//!
//! let fake = FakeVcs::new();
//! fake.add_upstream(
//!     "https://example.com/foo",
//!     FakeRepo::new("main").with_file("zkg.meta", "[package]\n").with_tag("v1.0.0"),
//! );
//! let vcs = VersionControl::new(fake);
//! ```

pub mod fake_vcs;
pub mod git_helper;

pub use fake_vcs::{FakeHead, FakeRepo, FakeTree, FakeVcs};
pub use git_helper::TestGit;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. With `level` set, that level is used;
/// otherwise logging is enabled only when `RUST_LOG` is set.
///
/// ```bash
/// RUST_LOG=git=debug,git::perf=info cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
