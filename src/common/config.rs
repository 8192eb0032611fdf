//! Configuration for orion components
//!
//! Sources, lowest priority first: built-in defaults, an optional TOML file,
//! then `ORION_*` environment variables (`__` separates sections, e.g.
//! `ORION_SCHEDULER__THREADS=4`).

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Node ID (unique identifier)
    pub node_id: String,

    /// Logging level, used when RUST_LOG is unset
    pub log_level: String,

    pub store: StoreConfig,

    pub scheduler: SchedulerConfig,

    pub session: SessionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: "orion-1".to_string(),
            log_level: "info".to_string(),
            store: StoreConfig::default(),
            scheduler: SchedulerConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Underlying KV store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// RocksDB directory
    pub data_dir: PathBuf,

    pub create_if_missing: bool,

    /// LZ4 block compression
    pub compression: bool,

    /// Memtable size in MB, 0 keeps the RocksDB default
    pub write_buffer_size_mb: usize,

    /// Block size in KB, 0 keeps the RocksDB default
    pub block_size_kb: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./orion-data"),
            create_if_missing: true,
            compression: true,
            write_buffer_size_mb: 0,
            block_size_kb: 0,
        }
    }
}

/// Task scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of worker threads
    pub threads: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { threads: 10 }
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session lifetime without keep-alive
    pub ttl_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl_ms: 10_000 }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

impl Config {
    /// Load configuration from an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config: Config = builder
            .add_source(
                config::Environment::with_prefix("ORION")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheduler.threads == 0 {
            return Err(Error::InvalidConfig(
                "scheduler.threads must be at least 1".into(),
            ));
        }
        if self.session.ttl_ms == 0 {
            return Err(Error::InvalidConfig("session.ttl_ms must be positive".into()));
        }
        Ok(())
    }
}
