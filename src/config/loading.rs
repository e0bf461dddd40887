//! Configuration loading from files and environment variables
//!
//! This module handles loading configuration from TOML files and environment variables,
//! with environment variables taking precedence for container deployments.

use anyhow::Result;
use std::path::{Path, PathBuf};

use super::types::Config;

/// Master switch override (`true`/`false`/`1`/`0`)
pub const ENV_ENABLED: &str = "GOVERNOR_ENABLED";
/// Persistence directory override
pub const ENV_DATA_DIR: &str = "GOVERNOR_DATA_DIR";
/// Global per-minute cap override
pub const ENV_GLOBAL_PER_MINUTE: &str = "GOVERNOR_GLOBAL_PER_MINUTE";
/// Global per-hour cap override
pub const ENV_GLOBAL_PER_HOUR: &str = "GOVERNOR_GLOBAL_PER_HOUR";

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from a TOML file
    File(PathBuf),
    /// File was missing; built-in defaults were used
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Defaults => f.write_str("built-in defaults"),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Apply environment variable overrides on top of a parsed configuration
///
/// Unparseable values are ignored with a warning so that a typo in the
/// environment never silently turns governance off.
pub fn apply_env_overrides(config: &mut Config) {
    if let Ok(value) = std::env::var(ENV_ENABLED) {
        match parse_bool(&value) {
            Some(enabled) => {
                tracing::info!(enabled, "Governance switch overridden from {}", ENV_ENABLED);
                config.enabled = enabled;
            }
            None => tracing::warn!(value = %value, "Ignoring invalid {}", ENV_ENABLED),
        }
    }

    if let Ok(dir) = std::env::var(ENV_DATA_DIR)
        && !dir.trim().is_empty()
    {
        config.storage.data_dir = Some(PathBuf::from(dir));
    }

    for (key, slot) in [
        (ENV_GLOBAL_PER_MINUTE, &mut config.global.per_minute),
        (ENV_GLOBAL_PER_HOUR, &mut config.global.per_hour),
    ] {
        if let Ok(value) = std::env::var(key) {
            match value.trim().parse::<u32>() {
                Ok(parsed) => *slot = parsed,
                Err(e) => tracing::warn!(value = %value, error = %e, "Ignoring invalid {}", key),
            }
        }
    }
}

/// Parse configuration text without touching the environment
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a TOML file, with environment variable overrides
///
/// The result is validated after overrides are applied; any invalid limit
/// fails here, at startup.
pub fn load_config(config_path: impl AsRef<Path>) -> Result<Config> {
    let path = config_path.as_ref();
    let config_content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;

    let mut config: Config = toml::from_str(&config_content)
        .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;

    apply_env_overrides(&mut config);

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid config file '{}': {}", path.display(), e))?;

    Ok(config)
}

/// Load configuration from a file if it exists, otherwise from defaults
///
/// Environment overrides apply in both cases.
pub fn load_config_with_fallback(config_path: impl AsRef<Path>) -> Result<(Config, ConfigSource)> {
    let path = config_path.as_ref();
    if path.exists() {
        let config = load_config(path)?;
        return Ok((config, ConfigSource::File(path.to_path_buf())));
    }

    let mut config = create_default_config();
    apply_env_overrides(&mut config);
    config.validate()?;
    Ok((config, ConfigSource::Defaults))
}

/// Create a default configuration
#[must_use]
pub fn create_default_config() -> Config {
    Config::default()
}
