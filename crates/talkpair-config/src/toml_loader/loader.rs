//! Core TOML config loading: read from path or platform default.

use crate::schema::RelayConfig;
use crate::validation;
use std::path::Path;
use talkpair_common::ConfigError;
use tracing::{info, warn};

use super::paths::default_config_path;

/// Load config from a specific TOML file path.
///
/// Missing fields take serde defaults. If the parsed config fails
/// validation, a warning is logged and the default config is returned.
pub fn load_from_path(path: &Path) -> Result<RelayConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("failed to read {}: {e}", path.display())))?;

    let config: RelayConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    if let Err(e) = validation::validate(&config) {
        warn!("config validation warning: {e}");
        warn!("falling back to default config");
        return Ok(RelayConfig::default());
    }

    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Load config from the platform-specific default path.
///
/// A relay is usually deployed without a config file, so a missing file
/// yields the defaults rather than an error.
pub fn load_default() -> Result<RelayConfig, ConfigError> {
    let path = default_config_path()?;

    match load_from_path(&path) {
        Ok(config) => Ok(config),
        Err(ConfigError::FileNotFound(_)) => {
            info!("no config found at {}, using defaults", path.display());
            Ok(RelayConfig::default())
        }
        Err(e) => Err(e),
    }
}
