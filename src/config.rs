//! Server and client configuration.
//!
//! Both configurations can be loaded from a TOML file. Missing sections and fields fall back to
//! their defaults, and every loaded configuration is validated once before use.

use serde::Deserialize;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error as ThisError;
use tracing::debug;

pub const DEFAULT_ADDRESS: &str = "127.0.0.1:3223";
pub const DEFAULT_MAX_CONNECTIONS: usize = 100;
pub const DEFAULT_MAX_MESSAGE_SIZE_KB: usize = 4;
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
/// Upper bound for `max_message_size_kb` (64 MiB).
pub const MAX_MESSAGE_SIZE_KB: usize = 64 * 1024;

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub network: ServerNetworkConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerNetworkConfig {
    /// Address the listener binds to.
    pub address: String,
    /// Maximum number of connections served at once. Excess connections are closed on accept.
    pub max_connections: usize,
    /// Size of the per-connection read buffer, in KiB. A request must fit in a single read.
    pub max_message_size_kb: usize,
    /// How long a connection may wait for its next request, in seconds.
    #[serde(with = "seconds")]
    pub idle_timeout: Duration,
}

impl Default for ServerNetworkConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_message_size_kb: DEFAULT_MAX_MESSAGE_SIZE_KB,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log filter, used when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = load(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_address(&self.network.address)?;
        if self.network.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be positive".to_string(),
            ));
        }
        validate_message_size(self.network.max_message_size_kb)?;
        validate_idle_timeout(self.network.idle_timeout)
    }

    pub fn buffer_size(&self) -> usize {
        self.network.max_message_size_kb.saturating_mul(1024)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    pub network: ClientNetworkConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientNetworkConfig {
    /// Address of the server. Kept so the client can redial after a connection failure.
    pub address: String,
    /// Size of the response buffer, in KiB.
    pub max_message_size_kb: usize,
    /// Deadline applied to each write and each read, in seconds.
    #[serde(with = "seconds")]
    pub idle_timeout: Duration,
}

impl Default for ClientNetworkConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            max_message_size_kb: DEFAULT_MAX_MESSAGE_SIZE_KB,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = load(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_address(&self.network.address)?;
        validate_message_size(self.network.max_message_size_kb)?;
        validate_idle_timeout(self.network.idle_timeout)
    }

    pub fn buffer_size(&self) -> usize {
        self.network.max_message_size_kb.saturating_mul(1024)
    }
}

/// Reads a TOML file. A file that is not found yields the default configuration.
fn load<T>(path: &Path) -> Result<T, ConfigError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    for candidate in candidates(path)? {
        match std::fs::read_to_string(&candidate) {
            Ok(content) => {
                debug!("Loading config from {}", candidate.display());
                return Ok(toml::from_str(&content)?);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        }
    }

    debug!("Config file {} not found, using defaults", path.display());
    Ok(T::default())
}

/// Locations tried for a config file, in order. Absolute paths are used as given. Relative paths
/// are looked up in the current directory, the user config directory and the home directory, and
/// may not step outside them.
fn candidates(path: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    if path.is_absolute() {
        return Ok(vec![path.to_path_buf()]);
    }

    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid(format!(
            "invalid config filename: {}",
            path.display()
        )));
    }

    Ok([std::env::current_dir().ok(), dirs::config_dir(), dirs::home_dir()]
        .into_iter()
        .flatten()
        .map(|dir| dir.join(path))
        .collect())
}

fn validate_address(address: &str) -> Result<(), ConfigError> {
    if address.is_empty() {
        return Err(ConfigError::Invalid(
            "network address cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_message_size(size_kb: usize) -> Result<(), ConfigError> {
    if size_kb == 0 {
        return Err(ConfigError::Invalid(
            "max_message_size_kb must be positive".to_string(),
        ));
    }
    if size_kb > MAX_MESSAGE_SIZE_KB || size_kb.checked_mul(1024).is_none() {
        return Err(ConfigError::Invalid(format!(
            "max_message_size_kb must not exceed {}",
            MAX_MESSAGE_SIZE_KB
        )));
    }
    Ok(())
}

fn validate_idle_timeout(timeout: Duration) -> Result<(), ConfigError> {
    if timeout.is_zero() {
        return Err(ConfigError::Invalid(
            "idle_timeout must be positive".to_string(),
        ));
    }
    Ok(())
}

mod seconds {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
