//! Gateway configuration: loading, validation, and the on-disk layout
//! (mirrors `machi-bot`'s config module).

mod schema;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use schema::{
    AgentConfig, ChatConfig, ConfigIssue, DeliveryConfig, GatewayConfig, IssueLevel,
    ObjectStoreConfig, QueueConfig, RetryPolicyConfig, ServerConfig, NO_TARGET_CONFIGURED,
};

/// Errors encountered while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Filesystem I/O failure.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The config file's TOML could not be parsed.
    #[error("failed to parse config: {0}")]
    TomlParse(#[from] toml::de::Error),
    /// The config could not be serialized back to TOML.
    #[error("failed to serialize config: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    /// No home directory could be determined for the default config path.
    #[error("could not determine a default config directory")]
    NoConfigDir,
}

/// The default config directory, `$XDG_CONFIG_HOME/revops-gateway` or
/// `~/.config/revops-gateway`.
///
/// # Errors
/// Returns [`ConfigError::NoConfigDir`] if no home directory is set.
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join("revops-gateway"));
    }
    let home = std::env::var("HOME").map_err(|_| ConfigError::NoConfigDir)?;
    Ok(PathBuf::from(home).join(".config").join("revops-gateway"))
}

/// The default config file path: `<default_config_dir>/config.toml`.
///
/// # Errors
/// Returns [`ConfigError::NoConfigDir`] if no home directory is set.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(default_config_dir()?.join("config.toml"))
}

/// Load configuration from the default path, then overlay environment
/// variables.
///
/// # Errors
/// Returns [`ConfigError`] if the file cannot be read or parsed.
pub fn load_config() -> Result<GatewayConfig, ConfigError> {
    load_config_from(&config_path()?)
}

/// Load configuration from an explicit path, then overlay environment
/// variables.
///
/// # Errors
/// Returns [`ConfigError`] if the file cannot be read or parsed.
pub fn load_config_from(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&contents)?;
    Ok(config.with_env())
}

/// Save configuration to the default path, creating parent directories
/// as needed.
///
/// # Errors
/// Returns [`ConfigError`] if the directory cannot be created, the file
/// cannot be written, or the config cannot be serialized.
pub fn save_config(config: &GatewayConfig) -> Result<(), ConfigError> {
    save_config_to(config, &config_path()?)
}

/// Save configuration to an explicit path, creating parent directories
/// as needed.
///
/// # Errors
/// Returns [`ConfigError`] if the directory cannot be created, the file
/// cannot be written, or the config cannot be serialized.
pub fn save_config_to(config: &GatewayConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(config)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Write out a default configuration file at the default path, unless
/// one already exists.
///
/// # Errors
/// Returns [`ConfigError`] if the directory cannot be created or the
/// file cannot be written.
pub fn init_config() -> Result<PathBuf, ConfigError> {
    let path = config_path()?;
    if !path.exists() {
        save_config_to(&GatewayConfig::default(), &path)?;
    }
    Ok(path)
}
