//! Core types for zkg-core
//!
//! This module holds the crate-wide error type. The domain types live in
//! [`crate::package`], [`crate::metadata`] and [`crate::version`]; every one of
//! them reports typed failures through [`ZkgError`].

pub mod error;

pub use error::ZkgError;
