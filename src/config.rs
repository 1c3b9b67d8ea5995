//! Configuration for the ledger
//!
//! Settings can come from serde (any format the caller prefers), environment
//! variables, or be built programmatically. Every field has a default, so a
//! partial document is enough.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{LedgerError, Result};
use crate::types::{Integer, Natural};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Leading hex zeros every new block hash must carry
    /// Default: 3
    #[serde(default = "default_difficulty")]
    pub difficulty: Natural,

    /// Value issued by each coinbase
    /// Default: 50
    #[serde(default = "default_block_reward")]
    pub block_reward: Integer,

    /// Address credited by the genesis coinbase
    /// Default: "alice"
    #[serde(default = "default_genesis_address")]
    pub genesis_address: String,

    /// Require non-decreasing block timestamps during chain replay
    /// Default: false
    #[serde(default)]
    pub enforce_timestamp_order: bool,
}

fn default_difficulty() -> Natural {
    DEFAULT_DIFFICULTY
}

fn default_block_reward() -> Integer {
    DEFAULT_BLOCK_REWARD
}

fn default_genesis_address() -> String {
    DEFAULT_GENESIS_ADDRESS.to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            block_reward: DEFAULT_BLOCK_REWARD,
            genesis_address: DEFAULT_GENESIS_ADDRESS.to_string(),
            enforce_timestamp_order: false,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables
    ///
    /// - `LEDGER_DIFFICULTY=4`
    /// - `LEDGER_BLOCK_REWARD=25`
    /// - `LEDGER_GENESIS_ADDRESS=satoshi`
    /// - `LEDGER_ENFORCE_TIMESTAMP_ORDER=true`
    ///
    /// Values that fail to parse leave the default in place.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("LEDGER_DIFFICULTY") {
            if let Ok(difficulty) = val.parse::<Natural>() {
                config.difficulty = difficulty;
            }
        }

        if let Ok(val) = std::env::var("LEDGER_BLOCK_REWARD") {
            if let Ok(reward) = val.parse::<Integer>() {
                config.block_reward = reward;
            }
        }

        if let Ok(val) = std::env::var("LEDGER_GENESIS_ADDRESS") {
            if !val.is_empty() {
                config.genesis_address = val;
            }
        }

        if let Ok(val) = std::env::var("LEDGER_ENFORCE_TIMESTAMP_ORDER") {
            if let Ok(enabled) = val.parse::<bool>() {
                config.enforce_timestamp_order = enabled;
            }
        }

        config
    }

    pub fn with_difficulty(mut self, difficulty: Natural) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_block_reward(mut self, reward: Integer) -> Self {
        self.block_reward = reward;
        self
    }

    pub fn with_genesis_address(mut self, address: impl Into<String>) -> Self {
        self.genesis_address = address.into();
        self
    }

    pub fn with_timestamp_order(mut self, enforce: bool) -> Self {
        self.enforce_timestamp_order = enforce;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::Config(format!(
                "difficulty {} exceeds {}",
                self.difficulty, MAX_DIFFICULTY
            )));
        }
        if self.block_reward <= 0 {
            return Err(LedgerError::Config(format!(
                "block reward must be positive, got {}",
                self.block_reward
            )));
        }
        if self.genesis_address.is_empty() {
            return Err(LedgerError::Config("genesis address is empty".to_string()));
        }
        Ok(())
    }
}
