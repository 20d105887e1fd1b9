//! Node configuration loaded from `config.toml`

use serde::Deserialize;
use thiserror::Error;

use std::fs;
use std::io::ErrorKind;
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;

use crate::blockchain::pow::MAX_DIFFICULTY;
use crate::blockchain::{MiningParams, MINING_DIFFICULTY, MINING_REWARD};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub mining: MiningConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
    pub peer_port_range: (u16, u16),
    pub peer_ip_offset_range: (u8, u8),
    pub neighbour_sync_interval_secs: u64,
    pub probe_timeout_ms: u64,
    pub propagation_timeout_ms: u64,
    /// When set, used instead of scanning
    pub static_peers: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            host: "127.0.0.1".to_string(),
            port: 5000,
            peer_port_range: (5000, 5003),
            peer_ip_offset_range: (0, 1),
            neighbour_sync_interval_secs: 20,
            probe_timeout_ms: 1000,
            propagation_timeout_ms: 3000,
            static_peers: Vec::new(),
        }
    }
}

impl NetworkConfig {
    pub fn peer_ports(&self) -> RangeInclusive<u16> {
        self.peer_port_range.0..=self.peer_port_range.1
    }

    pub fn peer_ip_offsets(&self) -> RangeInclusive<u8> {
        self.peer_ip_offset_range.0..=self.peer_ip_offset_range.1
    }

    pub fn neighbour_sync_interval(&self) -> Duration {
        Duration::from_secs(self.neighbour_sync_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn propagation_timeout(&self) -> Duration {
        Duration::from_millis(self.propagation_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    pub difficulty: usize,
    pub reward: f64,
    pub interval_secs: u64,
    pub max_iterations: Option<u64>,
    pub auto_start: bool,
}

impl Default for MiningConfig {
    fn default() -> Self {
        MiningConfig {
            difficulty: MINING_DIFFICULTY,
            reward: MINING_REWARD,
            interval_secs: 20,
            max_iterations: None,
            auto_start: false,
        }
    }
}

impl MiningConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn params(&self) -> MiningParams {
        MiningParams {
            difficulty: self.difficulty,
            reward: self.reward,
            max_iterations: self.max_iterations,
        }
    }
}

impl Config {
    /// Parses a TOML document; missing keys take their defaults
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mining.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Invalid(format!(
                "mining.difficulty must be at most {}",
                MAX_DIFFICULTY
            )));
        }
        if !self.mining.reward.is_finite() || self.mining.reward < 0.0 {
            return Err(ConfigError::Invalid("mining.reward must be a non-negative number".to_string()));
        }
        if self.mining.interval_secs == 0 || self.network.neighbour_sync_interval_secs == 0 {
            return Err(ConfigError::Invalid("intervals must be at least one second".to_string()));
        }
        if self.network.peer_port_range.0 > self.network.peer_port_range.1
            || self.network.peer_ip_offset_range.0 > self.network.peer_ip_offset_range.1
        {
            return Err(ConfigError::Invalid("peer ranges must be ordered start <= end".to_string()));
        }
        Ok(())
    }
}

/// Loads the config file, using defaults when it does not exist
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    match fs::read_to_string(path) {
        Ok(contents) => Config::from_toml(&contents),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(Config::default()),
        Err(err) => Err(err.into()),
    }
}
