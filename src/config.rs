//! Configuration management for the ledger service

use serde::Deserialize;
use thiserror::Error;

use std::fs;
use std::io;
use std::path::Path;

use crate::blockchain::crypto::SHA256_HEX_LEN;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "LEDGER_CONFIG";

/// Configuration file read when the environment variable is unset
pub const DEFAULT_CONFIG_PATH: &str = "ledger.toml";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Parameters of the ledger itself
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Leading zeros required in a mined block hash
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,

    /// Amount paid to the miner of each block
    #[serde(default = "default_mining_reward")]
    pub mining_reward: f64,

    /// Give up mining a block after this many hashes
    #[serde(default)]
    pub max_mining_iterations: Option<u64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            mining_reward: default_mining_reward(),
            max_mining_iterations: None,
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty > SHA256_HEX_LEN {
            return Err(ConfigError::Invalid(format!(
                "ledger.difficulty must be at most {}, got {}",
                SHA256_HEX_LEN, self.difficulty
            )));
        }

        if !self.mining_reward.is_finite() || self.mining_reward < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "ledger.mining_reward must be a non-negative number, got {}",
                self.mining_reward
            )));
        }

        if self.max_mining_iterations == Some(0) {
            return Err(ConfigError::Invalid(
                "ledger.max_mining_iterations must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Address credited when the demo data is mined
    #[serde(default = "default_miner_address")]
    pub miner_address: String,
    /// Mine the sample shipment transactions on startup
    #[serde(default)]
    pub seed_demo: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            miner_address: default_miner_address(),
            seed_demo: false,
        }
    }
}

fn default_difficulty() -> usize {
    2
}

fn default_mining_reward() -> f64 {
    100.0
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_miner_address() -> String {
    "andrew".to_string()
}

/// Loads configuration from `path`, falling back to defaults when the file
/// does not exist
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let config = match fs::read_to_string(path.as_ref()) {
        Ok(config_str) => toml::from_str(&config_str)?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => Config::default(),
        Err(err) => return Err(err.into()),
    };

    config.ledger.validate()?;

    if config.server.port == 0 {
        return Err(ConfigError::Invalid("server.port must be set".to_string()));
    }

    if config.server.miner_address.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "server.miner_address must not be empty".to_string(),
        ));
    }

    Ok(config)
}

/// Loads configuration from the path in `LEDGER_CONFIG`, or `ledger.toml`
pub fn load_from_env() -> Result<Config, ConfigError> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config(path)
}
