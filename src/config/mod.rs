//! # Configuration
//!
//! TOML configuration for the trade world server. Every section has defaults, so an
//! empty file (or a file with only some sections) is valid.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:9601"
//! name = "tradeworld"
//! max_connections = 64
//! tick_ms = 1000
//!
//! [storage]
//! data_dir = "./data"
//! item_seed = "data/seeds/items.json"
//!
//! [logging]
//! level = "info"
//! file = "tradeworld.log"
//! audit_file = "trade-audit.log"
//!
//! [inventory]
//! capacity = 50
//! starting_money = 0
//!
//! [trade]
//! max_offer_entries = 50
//! idle_timeout_secs = 300
//! max_distance = 10
//!
//! [gm]
//! names = ["admin"]
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::errors::WorldError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub name: String,
    pub max_connections: usize,
    /// Housekeeping interval: idle trade expiry and metrics logging.
    pub tick_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:9601".to_string(),
            name: "tradeworld".to_string(),
            max_connections: 64,
            tick_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
    /// JSON list of item classes. The built-in catalog is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_seed: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            item_seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Extra copy of `trade` target lines (settlements, cancellations, GM commands).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("tradeworld.log".to_string()),
            audit_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub capacity: usize,
    pub starting_money: u32,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            starting_money: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeConfig {
    pub max_offer_entries: usize,
    /// Seconds without activity before a session is cancelled. 0 disables expiry.
    pub idle_timeout_secs: u64,
    /// Chebyshev distance in tiles within which a trade may be requested.
    pub max_distance: u32,
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            max_offer_entries: 50,
            idle_timeout_secs: 300,
            max_distance: 10,
        }
    }
}

impl TradeConfig {
    pub fn idle_timeout(&self) -> Option<chrono::Duration> {
        match self.idle_timeout_secs {
            0 => None,
            secs => i64::try_from(secs).ok().and_then(chrono::Duration::try_seconds),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GmConfig {
    pub names: Vec<String>,
}

impl GmConfig {
    pub fn is_gm(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub inventory: InventoryConfig,
    pub trade: TradeConfig,
    pub gm: GmConfig,
}

/// Offer lists travel as a one-byte count on some clients.
pub const MAX_OFFER_ENTRIES_LIMIT: usize = 255;

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config = Self::from_toml(&content)
            .map_err(|e| anyhow!("Failed to load config file {}: {}", path, e))?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| anyhow!("parse error: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Write a default configuration file.
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<(), WorldError> {
        if self.inventory.capacity == 0 {
            return Err(WorldError::Config("inventory.capacity must be at least 1".into()));
        }
        if self.trade.max_offer_entries == 0 {
            return Err(WorldError::Config(
                "trade.max_offer_entries must be at least 1".into(),
            ));
        }
        if self.trade.max_offer_entries > MAX_OFFER_ENTRIES_LIMIT {
            return Err(WorldError::Config(format!(
                "trade.max_offer_entries must not exceed {}",
                MAX_OFFER_ENTRIES_LIMIT
            )));
        }
        if self.server.tick_ms == 0 {
            return Err(WorldError::Config("server.tick_ms must be at least 1".into()));
        }
        Ok(())
    }
}
