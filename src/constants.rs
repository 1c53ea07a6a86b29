//! Global constants used throughout the zkg-core codebase.
//!
//! File names, timeout durations and parallelism knobs shared by several
//! modules are defined here so that magic values stay discoverable.

use std::time::Duration;

/// Name of the file in which packages store their metadata.
pub const METADATA_FILENAME: &str = "zkg.meta";

/// Legacy metadata file name, consulted when [`METADATA_FILENAME`] is absent.
pub const LEGACY_METADATA_FILENAME: &str = "bro-pkg.meta";

/// Section header under which package metadata fields are declared.
pub const METADATA_SECTION: &str = "package";

/// Name of the remote every clone is pointed at.
pub const ORIGIN_REMOTE: &str = "origin";

/// Package names that would collide with the package manager's own layout.
pub const RESERVED_PACKAGE_NAMES: &[&str] = &["package", "packages"];

/// Default timeout for Git operations (5 minutes).
pub const GIT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout for Git clone operations (120 seconds).
///
/// Clone operations may take longer than other commands, especially
/// for large repositories with submodules.
pub const GIT_CLONE_TIMEOUT: Duration = Duration::from_secs(120);

/// Minimum number of parallel operations regardless of CPU count.
///
/// This ensures reasonable parallelism even on single-core machines.
/// The value of 10 provides good throughput for I/O-bound Git operations.
pub const MIN_PARALLELISM: usize = 10;

/// Multiplier applied to CPU core count for default parallelism.
pub const PARALLELISM_CORE_MULTIPLIER: usize = 2;

/// Default CPU core count when detection fails.
///
/// Used as a fallback when `std::thread::available_parallelism()` returns an error.
pub const FALLBACK_CORE_COUNT: usize = 4;

/// Default bound on concurrent per-package operations.
#[must_use]
pub fn default_parallelism() -> usize {
    let cores = std::thread::available_parallelism().map_or(FALLBACK_CORE_COUNT, usize::from);
    (cores * PARALLELISM_CORE_MULTIPLIER).max(MIN_PARALLELISM)
}
