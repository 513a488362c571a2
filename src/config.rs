//! Runtime configuration for the ledger and its command-line surface.

use crate::error::ConfigError;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Leading zero hex characters a sealed hash must carry by default.
pub const DEFAULT_DIFFICULTY: usize = 6;

/// File the console persists the ledger into by default.
pub const DEFAULT_STORE_PATH: &str = "BlockChainDB.json";

/// How mining workers walk the nonce space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum NonceStrategy {
    /// Worker 0 counts up from zero; every other worker jumps by random
    /// draws scaled by its id.
    #[default]
    Jump,
    /// Worker `w` of `W` tries `w, w + W, w + 2W, ...`.
    Stride,
}

/// Ledger settings shared by every parallel operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Required count of leading `'0'` hex characters in a sealed hash
    pub difficulty: usize,
    /// Number of OS threads started for each parallel pass
    pub workers: usize,
    /// Nonce search pattern used while sealing
    pub strategy: NonceStrategy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            workers: num_cpus::get().max(1),
            strategy: NonceStrategy::default(),
        }
    }
}

impl LedgerConfig {
    /// Config with a fixed worker count and the default difficulty.
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Default::default()
        }
    }

    pub fn difficulty(mut self, difficulty: usize) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn strategy(mut self, strategy: NonceStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Reject values no parallel pass can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.difficulty > 64 {
            return Err(ConfigError::DifficultyTooHigh(self.difficulty));
        }
        Ok(())
    }
}

/// Command-line arguments of the `product-ledger` console.
#[derive(Debug, Parser)]
#[command(name = "product-ledger", about = "Product revision ledger sealed by parallel proof of work")]
pub struct Args {
    /// Number of worker threads per operation (0 = one per available core)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,

    /// Leading zero hex characters required of a sealed hash
    #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
    pub difficulty: usize,

    /// Nonce search pattern used by the miners
    #[arg(long, value_enum, default_value_t = NonceStrategy::Jump)]
    pub strategy: NonceStrategy,

    /// JSON file the ledger is loaded from and saved to
    #[arg(long, default_value = DEFAULT_STORE_PATH)]
    pub store: PathBuf,
}

impl Args {
    /// Resolve the arguments into a validated ledger config.
    pub fn ledger_config(&self) -> Result<LedgerConfig, ConfigError> {
        let workers = if self.threads == 0 {
            num_cpus::get().max(1)
        } else {
            self.threads
        };
        let config = LedgerConfig {
            difficulty: self.difficulty,
            workers,
            strategy: self.strategy,
        };
        config.validate()?;
        Ok(config)
    }
}
