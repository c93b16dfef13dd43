//! Configuration management for powledger

use crate::blockchain::{DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD, MAX_DIFFICULTY};
use crate::error::ChainError;
use crate::transaction::Amount;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub miner: MinerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
    #[serde(default = "default_mining_reward")]
    pub mining_reward: Amount,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            mining_reward: default_mining_reward(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinerConfig {
    /// Reward recipient; the demo falls back to its own wallet when unset.
    #[serde(default)]
    pub beneficiary_address: Option<String>,
    /// Attempts between progress reports from the mining worker.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            beneficiary_address: None,
            progress_interval: default_progress_interval(),
        }
    }
}

fn default_difficulty() -> u32 {
    DEFAULT_DIFFICULTY
}

fn default_mining_reward() -> Amount {
    DEFAULT_MINING_REWARD
}

fn default_progress_interval() -> u64 {
    10_000
}

impl Config {
    pub fn from_toml(config_str: &str) -> Result<Self, ChainError> {
        let config: Config = toml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.ledger.difficulty > MAX_DIFFICULTY {
            return Err(ChainError::ConfigError(format!(
                "ledger.difficulty must be at most {}, got {}",
                MAX_DIFFICULTY, self.ledger.difficulty
            )));
        }
        if self.ledger.mining_reward <= 0 {
            return Err(ChainError::ConfigError(
                "ledger.mining_reward must be greater than 0".to_string(),
            ));
        }
        if self.miner.progress_interval == 0 {
            return Err(ChainError::ConfigError(
                "miner.progress_interval must be greater than 0".to_string(),
            ));
        }
        if let Some(address) = &self.miner.beneficiary_address {
            if address.trim().is_empty() {
                return Err(ChainError::ConfigError(
                    "miner.beneficiary_address must not be blank".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Loads `path`, falling back to defaults when the file does not exist.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(config_str) => Config::from_toml(&config_str),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("{} not found, using default configuration", path.display());
            Ok(Config::default())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.ledger.difficulty, DEFAULT_DIFFICULTY);
        assert_eq!(config.ledger.mining_reward, DEFAULT_MINING_REWARD);
        assert_eq!(config.miner.beneficiary_address, None);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ledger]\ndifficulty = 2\n\n[miner]\nbeneficiary_address = \"miner-1\"").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.ledger.difficulty, 2);
        assert_eq!(config.ledger.mining_reward, DEFAULT_MINING_REWARD);
        assert_eq!(config.miner.beneficiary_address.as_deref(), Some("miner-1"));
        assert_eq!(config.miner.progress_interval, 10_000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            Config::from_toml("[ledger]\ndifficulty = 65"),
            Err(ChainError::ConfigError(_))
        ));
        assert!(matches!(
            Config::from_toml("[ledger]\nmining_reward = 0"),
            Err(ChainError::ConfigError(_))
        ));
        assert!(matches!(
            Config::from_toml("[ledger\n"),
            Err(ChainError::ConfigError(_))
        ));
    }
}
