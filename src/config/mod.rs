//! Configuration management for zkg-core
//!
//! The engine reads a single, optional TOML file. There is no global
//! configuration state: callers load an [`EngineConfig`] once and pass it to
//! the operations that need it.
//!
//! **Location:**
//! - `$ZKG_CONFIG_PATH` when set
//! - otherwise `~/.zkg/config.toml`
//!
//! A missing file is not an error; every setting has a default.

mod engine;

pub use engine::{CONFIG_PATH_ENV, EngineConfig};
