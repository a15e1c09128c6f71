use crate::messages::wire::{DEFAULT_WRITE_TIMEOUT, MAX_MESSAGE_SIZE};
use crate::network::rooms::{RoomConfig, DEFAULT_MAX_CLIENTS_PER_ROOM, DEFAULT_MAX_ROOMS};
use crate::network::server::ServerConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const CONFIG_FILE_NAME: &str = "relay.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Relay settings; every field may be omitted from the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub bind_addr: String,
    pub max_rooms: usize,
    pub max_clients_per_room: usize,
    pub room_timeout_secs: u64,
    pub max_message_size: usize,
    pub rate_limit_max: usize,
    pub rate_limit_window_secs: u64,
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_rooms: DEFAULT_MAX_ROOMS,
            max_clients_per_room: DEFAULT_MAX_CLIENTS_PER_ROOM,
            room_timeout_secs: 3600,
            max_message_size: MAX_MESSAGE_SIZE,
            rate_limit_max: 60,
            rate_limit_window_secs: 60,
            log_level: "info".to_string(),
        }
    }
}

impl RelayConfig {
    /// Get the default config directory
    pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
        ProjectDirs::from("dev", "broadside", "broadside")
            .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Get the default config file path
    pub fn default_config_file() -> Result<PathBuf, ConfigError> {
        Ok(Self::default_config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `path` if given, else from the default location if present,
    /// else defaults. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_config_file() {
                Ok(default_path) if default_path.exists() => Self::from_file(&default_path)?,
                Ok(_) | Err(ConfigError::NoConfigDir) => Self::default(),
                Err(e) => return Err(e),
            },
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PORT`, `BIND_ADDR`, `MAX_ROOMS`, `MAX_CLIENTS_PER_ROOM`,
    /// `ROOM_TIMEOUT_MS` and `LOG_LEVEL` from `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind_addr) = lookup("BIND_ADDR") {
            self.bind_addr = bind_addr;
        }
        if let Some(port) = lookup("PORT") {
            let port: u16 = parse_env("PORT", &port)?;
            let host = self
                .bind_addr
                .rsplit_once(':')
                .map_or(self.bind_addr.as_str(), |(host, _)| host);
            self.bind_addr = format!("{}:{}", host, port);
        }
        if let Some(value) = lookup("MAX_ROOMS") {
            self.max_rooms = parse_env("MAX_ROOMS", &value)?;
        }
        if let Some(value) = lookup("MAX_CLIENTS_PER_ROOM") {
            self.max_clients_per_room = parse_env("MAX_CLIENTS_PER_ROOM", &value)?;
        }
        if let Some(value) = lookup("ROOM_TIMEOUT_MS") {
            let millis: u64 = parse_env("ROOM_TIMEOUT_MS", &value)?;
            self.room_timeout_secs = millis.div_ceil(1000);
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level;
        }
        debug!(bind_addr = %self.bind_addr, "Applied environment overrides");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rooms == 0 {
            return Err(ConfigError::Invalid("max_rooms must be at least 1".into()));
        }
        if self.max_clients_per_room == 0 {
            return Err(ConfigError::Invalid(
                "max_clients_per_room must be at least 1".into(),
            ));
        }
        if self.room_timeout_secs == 0 {
            return Err(ConfigError::Invalid("room_timeout_secs must be positive".into()));
        }
        if self.max_message_size == 0 || self.max_message_size > u32::MAX as usize {
            return Err(ConfigError::Invalid(
                "max_message_size must fit a u32 length prefix".into(),
            ));
        }
        if self.rate_limit_max == 0 || self.rate_limit_window_secs == 0 {
            return Err(ConfigError::Invalid("rate limit must be positive".into()));
        }
        Ok(())
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            rooms: RoomConfig {
                max_rooms: self.max_rooms,
                max_clients_per_room: self.max_clients_per_room,
                room_timeout: Duration::from_secs(self.room_timeout_secs),
            },
            max_message_size: self.max_message_size,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            rate_limit_max: self.rate_limit_max,
            rate_limit_window: Duration::from_secs(self.rate_limit_window_secs),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name,
        value: value.to_string(),
    })
}
