//! Layered node configuration, loaded from an optional TOML file and
//! overridable by CLI flags, following the same `Config::from_file` /
//! `to_file` / `create_default_config` shape the rest of this crate's
//! ancestry uses.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub listen_addr: SocketAddr,
    /// Ports tried in order if `listen_addr`'s port is already bound.
    pub fallback_ports: Vec<u16>,
    pub seed_addresses: Vec<String>,
    pub max_peers: usize,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub bulk_read_timeout_secs: u64,
    pub peer_discovery_interval_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8333".parse().unwrap(),
            fallback_ports: vec![8334, 8335, 8336],
            seed_addresses: Vec::new(),
            max_peers: 8,
            connect_timeout_secs: 15,
            read_timeout_secs: 10,
            bulk_read_timeout_secs: 30,
            peer_discovery_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningConfig {
    pub enabled: bool,
    pub miner_address: Option<String>,
    pub initial_reward: u64,
    pub halving_interval: u64,
    pub difficulty: u32,
    pub max_transactions_per_block: usize,
    pub progress_checkpoint_nonces: u64,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            miner_address: None,
            initial_reward: 50_0000_0000,
            halving_interval: 210_000,
            difficulty: 4,
            max_transactions_per_block: 10,
            progress_checkpoint_nonces: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    pub default_wallet: Option<String>,
    pub kdf_iterations: u32,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            default_wallet: Some("default".to_string()),
            kdf_iterations: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data_dir: PathBuf,
    pub network: NetworkConfig,
    pub mining: MiningConfig,
    pub wallet: WalletConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("./data"))
            .join("gsc-node");

        Self {
            data_dir,
            network: NetworkConfig::default(),
            mining: MiningConfig::default(),
            wallet: WalletConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    pub fn to_file(&self, path: &PathBuf) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }

    pub fn chain_file(&self) -> PathBuf {
        self.data_dir.join("chain.json")
    }

    pub fn wallets_dir(&self) -> PathBuf {
        self.data_dir.join("wallets")
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    Serialize(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "parse error: {}", msg),
            ConfigError::Serialize(msg) => write!(f, "serialize error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Creates the data directory, wallets subdirectory, and a default config
/// file if none exists yet.
pub fn create_default_config(data_dir: Option<PathBuf>) -> Result<Config, ConfigError> {
    let mut config = Config::default();
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }

    std::fs::create_dir_all(&config.data_dir).map_err(|e| ConfigError::Io(e.to_string()))?;
    std::fs::create_dir_all(config.wallets_dir()).map_err(|e| ConfigError::Io(e.to_string()))?;

    let config_path = config.config_file();
    if !config_path.exists() {
        config.to_file(&config_path)?;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.network.listen_addr.port(), 8333);
        assert_eq!(config.mining.initial_reward, 50_0000_0000);
        assert_eq!(config.mining.halving_interval, 210_000);
    }

    #[test]
    fn test_config_round_trip() -> Result<(), ConfigError> {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let config = Config::default();
        config.to_file(&config_path)?;

        let loaded = Config::from_file(&config_path)?;
        assert_eq!(config.network.listen_addr, loaded.network.listen_addr);
        assert_eq!(config.mining.difficulty, loaded.mining.difficulty);

        Ok(())
    }
}
