// Configuration Management
//
// This crate handles all configuration loading for the tutor relay.
// It provides:
// - Configuration structs and deserialization
// - Environment and YAML file loading
// - Default values (server address, sampling parameters, logging)
//
// Configuration is read once at startup and never mutated afterwards.

use std::path::Path;
use thiserror::Error;

pub mod types;

// Re-export all configuration types
pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {source}")]
    ParseError {
        #[from]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<String> for ConfigError {
    fn from(message: String) -> Self {
        ConfigError::Invalid(message)
    }
}

/// Main configuration loading interface
impl ApiConfig {
    /// Load configuration from YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ApiConfig = serde_yaml::from_str(&content)?;
        config.llm.validate()?;
        Ok(config)
    }

    /// Load from `CONFIG_PATH` when it is set, otherwise from environment variables
    pub fn load_from_env_or_file() -> Result<Self, ConfigError> {
        match std::env::var("CONFIG_PATH") {
            Ok(path) => Self::load_from_file(path),
            Err(_) => Ok(Self::from_env()?),
        }
    }
}
