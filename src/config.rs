//! Configuration management for PowChain

use crate::blockchain::ChainParams;
use crate::crypto::HASH_HEX_LEN;
use crate::error::{ChainError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE: &str = "powchain.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chain: ChainParams,
    pub database: DatabaseConfig,
    pub miner: MinerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_backend")]
    pub backend: Backend,
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerConfig {
    #[serde(default = "default_beneficiary")]
    pub beneficiary_address: String,
    /// Coinbase value paid for every mined block, in base units.
    #[serde(default = "default_reward")]
    pub reward: u64,
    #[serde(default = "default_threads")]
    pub threads: usize,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            beneficiary_address: default_beneficiary(),
            reward: default_reward(),
            threads: default_threads(),
        }
    }
}

fn default_backend() -> Backend {
    Backend::Sqlite
}

fn default_db_path() -> String {
    "powchain.db".to_string()
}

fn default_beneficiary() -> String {
    "miner".to_string()
}

fn default_reward() -> u64 {
    5_000_000_000
}

fn default_threads() -> usize {
    1
}

impl Config {
    /// Chain parameters with the miner's thread count applied.
    pub fn chain_params(&self) -> ChainParams {
        ChainParams {
            mining_threads: self.miner.threads,
            ..self.chain.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.path.is_empty() {
            return Err(ChainError::Config(format!(
                "database.path must be set in {}",
                CONFIG_FILE
            )));
        }
        if self.miner.beneficiary_address.is_empty() {
            return Err(ChainError::Config(format!(
                "miner.beneficiary_address must be set in {}",
                CONFIG_FILE
            )));
        }
        if self.miner.reward == 0 {
            return Err(ChainError::Config("miner.reward must be positive".to_string()));
        }
        if self.miner.threads == 0 {
            return Err(ChainError::Config("miner.threads must be at least 1".to_string()));
        }
        let difficulty = self.chain.initial_difficulty;
        if difficulty == 0 || difficulty > HASH_HEX_LEN as u32 {
            return Err(ChainError::Config(format!(
                "chain.initial_difficulty must be between 1 and {}, got {}",
                HASH_HEX_LEN, difficulty
            )));
        }
        if self.chain.fast_block_secs > self.chain.slow_block_secs {
            return Err(ChainError::Config(
                "chain.fast_block_secs must not exceed chain.slow_block_secs".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn parse_config(source: &str) -> Result<Config> {
    let config: Config = toml::from_str(source)?;
    config.validate()?;
    Ok(config)
}

/// Load `path`, falling back to defaults when the file does not exist.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let source = fs::read_to_string(path)?;
    parse_config(&source)
}

pub fn load_config() -> Result<Config> {
    load_config_from(CONFIG_FILE)
}
