//! Engine configuration stored in `~/.zkg/config.toml`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::constants::{GIT_CLONE_TIMEOUT, GIT_COMMAND_TIMEOUT, default_parallelism};
use crate::core::ZkgError;

/// Environment variable that overrides the configuration file location.
pub const CONFIG_PATH_ENV: &str = "ZKG_CONFIG_PATH";

/// Settings for the version-tracking engine.
///
/// Every field is optional in the file; missing fields fall back to the
/// built-in defaults through the accessor methods.
///
/// ```toml
/// git_timeout_secs = 600
/// clone_timeout_secs = 300
/// max_parallel = 8
///
/// [user_vars]
/// LIBRDKAFKA_ROOT = "/opt/librdkafka"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Timeout in seconds for Git commands. `0` disables the timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_timeout_secs: Option<u64>,

    /// Timeout in seconds for clones. `0` disables the timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_timeout_secs: Option<u64>,

    /// Upper bound on concurrent per-package operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,

    /// Saved values of package user variables.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub user_vars: BTreeMap<String, String>,
}

fn timeout_from_secs(secs: Option<u64>, default: Duration) -> Option<Duration> {
    match secs {
        None => Some(default),
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
    }
}

impl EngineConfig {
    /// Load the configuration from [`EngineConfig::default_path`].
    ///
    /// A missing file yields the default configuration.
    pub async fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No engine config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load the configuration from a specific file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read engine config from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse engine config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration, creating parent directories as needed.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize engine config")?;

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write engine config to {}", path.display()))
    }

    /// Location of the configuration file.
    ///
    /// `ZKG_CONFIG_PATH` takes precedence over `~/.zkg/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
            && !path.is_empty()
        {
            return Ok(PathBuf::from(path));
        }

        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?;
        Ok(home.join(".zkg").join("config.toml"))
    }

    /// Rejects settings that cannot be honoured.
    pub fn validate(&self) -> Result<(), ZkgError> {
        if self.max_parallel == Some(0) {
            return Err(ZkgError::ConfigError {
                message: "max_parallel must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Timeout applied to Git commands other than clone.
    #[must_use]
    pub fn git_timeout(&self) -> Option<Duration> {
        timeout_from_secs(self.git_timeout_secs, GIT_COMMAND_TIMEOUT)
    }

    /// Timeout applied to clones.
    #[must_use]
    pub fn clone_timeout(&self) -> Option<Duration> {
        timeout_from_secs(self.clone_timeout_secs, GIT_CLONE_TIMEOUT)
    }

    /// Bound on concurrent per-package operations.
    #[must_use]
    pub fn parallelism(&self) -> usize {
        self.max_parallel.unwrap_or_else(default_parallelism).max(1)
    }
}
