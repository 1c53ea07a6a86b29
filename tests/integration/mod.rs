//! Integration test suite for zkg-core
//!
//! End-to-end tests over real Git repositories created with the system `git`.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **common**: Package repository fixtures
//! - **package_info**: Gathering package information from repositories
//! - **tracking**: Outdated evaluation and upgrades per tracking method

mod common;
mod package_info;
mod tracking;
