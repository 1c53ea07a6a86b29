//! zkg-core - package resolution and version tracking for the Zeek package manager
//!
//! Zeek packages are Git repositories that describe themselves in a `zkg.meta`
//! file. This crate answers the questions the package manager asks about a
//! package reference: what is its identity, which versions exist, what does it
//! depend on, and where does an installed copy stand relative to upstream.
//!
//! # Architecture Overview
//!
//! Data flows leaves first:
//!
//! 1. A repository location becomes a [`package::Package`] with a canonical URL,
//!    a name and, for packages found through a source, a qualified name.
//! 2. [`git::VersionControl`] clones the repository, lists tags and branches and
//!    checks out the chosen version.
//! 3. [`version`] keeps only tags that read as semantic versions and sorts them.
//! 4. [`metadata`] parses the metadata file at that version into aliases, tags,
//!    a description, dependency constraints and user variables.
//! 5. [`package::info`] assembles a [`package::PackageInfo`] and decides, per
//!    tracking method, whether an installed package is outdated and what an
//!    upgrade moves it to.
//!
//! The command-line interface, package-source aggregation and install layout
//! are left to the caller.
//!
//! # Core Modules
//!
//! - [`config`] - Engine settings from `~/.zkg/config.toml`
//! - [`constants`] - File names, timeouts and parallelism defaults
//! - [`core`] - The [`core::ZkgError`] taxonomy
//! - [`git`] - Version-control backend trait, the `git` CLI backend and the adapter
//! - [`metadata`] - Metadata file codec and field parsers
//! - [`package`] - Package identity, installed status and info assembly
//! - [`utils`] - Filesystem and platform helpers
//! - [`version`] - Tag normalization and semantic-version ordering
//!
//! # Example
//!
//! ```rust,no_run
//! use zkg_core::config::EngineConfig;
//! use zkg_core::git::VersionControl;
//! use zkg_core::metadata::Metadata;
//! use zkg_core::package::{info, Package};
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = EngineConfig::load().await?;
//! let vcs = VersionControl::system(&config)?;
//! let pkg = Package::new("https://github.com/zeek/zeek-af_packet-plugin", "", "", Metadata::new());
//!
//! let info = info::gather_info(&vcs, &pkg, Path::new("/tmp/zkg/clone"), None, None).await?;
//! if let Some(reason) = &info.invalid_reason {
//!     eprintln!("{pkg}: {reason}");
//! } else {
//!     println!("{pkg} {}: {}", info.metadata_version, info.short_description());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//!
//! The crate logs through `tracing` and never installs a subscriber. Git
//! commands log under the `git` target, slow ones under `git::perf` and lock
//! contention under `git::lock`.

pub mod config;
pub mod constants;
pub mod core;
pub mod git;
pub mod metadata;
pub mod package;
pub mod utils;
pub mod version;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
