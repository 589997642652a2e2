//! Configuration management for ArtChain

use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Token ids carry an 8-digit index; larger supplies would break id ordering.
pub const MAX_SUPPLY_LIMIT: u64 = 100_000_000;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default)]
    pub genesis_path: Option<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            genesis_path: None,
        }
    }
}

/// How `tokenName` is treated when listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenNamePolicy {
    /// Descriptive tag, never checked
    #[default]
    Tag,
    UniquePerMerchant,
    UniqueGlobal,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessorConfig {
    /// Number of lock stripes; 1 serialises every transaction
    #[serde(default = "default_lock_stripes")]
    pub lock_stripes: usize,
    #[serde(default)]
    pub token_name_policy: TokenNamePolicy,
    /// SendTokens must be submitted by its `from` holder
    #[serde(default = "default_require_sender_identity")]
    pub require_sender_identity: bool,
    #[serde(default = "default_max_tokens_per_listing")]
    pub max_tokens_per_listing: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            lock_stripes: default_lock_stripes(),
            token_name_policy: TokenNamePolicy::default(),
            require_sender_identity: default_require_sender_identity(),
            max_tokens_per_listing: default_max_tokens_per_listing(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventsConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Wait for the consumer instead of dropping events when the channel is full
    #[serde(default)]
    pub block_when_full: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            block_when_full: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn from_toml(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    // Validate critical values
    pub fn validate(&self) -> Result<()> {
        if self.ledger.database_path.trim().is_empty() {
            return Err(LedgerError::Config(
                "ledger.database_path must be set".to_string(),
            ));
        }
        if self.processor.lock_stripes == 0 {
            return Err(LedgerError::Config(
                "processor.lock_stripes must be at least 1".to_string(),
            ));
        }
        if self.processor.max_tokens_per_listing == 0
            || self.processor.max_tokens_per_listing > MAX_SUPPLY_LIMIT
        {
            return Err(LedgerError::Config(format!(
                "processor.max_tokens_per_listing must be between 1 and {}",
                MAX_SUPPLY_LIMIT
            )));
        }
        if self.events.channel_capacity == 0 {
            return Err(LedgerError::Config(
                "events.channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from `path`; a missing file yields defaults.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let config_str = fs::read_to_string(path)?;
    if config_str.trim().is_empty() {
        return Ok(Config::default());
    }
    Config::from_toml(&config_str)
}

pub fn load_config() -> Result<Config> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

fn default_database_path() -> String {
    "./data/artchain.db".to_string()
}

fn default_lock_stripes() -> usize {
    64
}

fn default_require_sender_identity() -> bool {
    true
}

fn default_max_tokens_per_listing() -> u64 {
    1_000_000
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_missing() {
        let config = load_config_from("/nonexistent/artchain/config.toml").unwrap();
        assert_eq!(config.processor.lock_stripes, 64);
        assert_eq!(config.processor.token_name_policy, TokenNamePolicy::Tag);
        assert!(config.processor.require_sender_identity);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = Config::from_toml(
            r#"
            [processor]
            lock_stripes = 1
            token_name_policy = "unique_per_merchant"
            "#,
        )
        .unwrap();
        assert_eq!(config.processor.lock_stripes, 1);
        assert_eq!(
            config.processor.token_name_policy,
            TokenNamePolicy::UniquePerMerchant
        );
        assert!(config.processor.require_sender_identity);
        assert_eq!(config.events.channel_capacity, 1024);
        assert!(!config.events.block_when_full);
        assert_eq!(config.ledger.database_path, "./data/artchain.db");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Config::from_toml("[processor]\nlock_stripes = 0").is_err());
        assert!(Config::from_toml("[processor]\nmax_tokens_per_listing = 0").is_err());
        assert!(Config::from_toml("[events]\nchannel_capacity = 0").is_err());
        assert!(Config::from_toml("[ledger]\ndatabase_path = \"\"").is_err());
        assert!(Config::from_toml("[processor]\ntoken_name_policy = \"strict\"").is_err());
    }
}
