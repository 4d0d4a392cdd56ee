//! TOML configuration loading and validation.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{BrokerError, Result};

/// Top-level configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub orders: OrderConfig,
    #[serde(default)]
    pub time_sync: TimeSyncConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: i32,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client_id: default_client_id(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    4002
}
fn default_client_id() -> i32 {
    1
}
fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderConfig {
    /// Give up acquiring the order-id lock after this long. Unset waits forever.
    pub lock_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeSyncConfig {
    /// Poll the broker clock this often. Unset disables polling.
    pub interval_ms: Option<u64>,
}

impl BrokerConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| BrokerError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate config from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: BrokerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    pub fn validate(&self) -> Result<()> {
        if self.connection.host.trim().is_empty() {
            return Err(BrokerError::Config("host must not be empty".into()));
        }
        if self.connection.port == 0 {
            return Err(BrokerError::Config("port must be > 0".into()));
        }
        if self.orders.lock_timeout_ms == Some(0) {
            return Err(BrokerError::Config("lock_timeout_ms must be > 0".into()));
        }
        if self.time_sync.interval_ms == Some(0) {
            return Err(BrokerError::Config("time_sync interval_ms must be > 0".into()));
        }
        Ok(())
    }

    /// Backend address string.
    pub fn address(&self) -> String {
        format!("{}:{}", self.connection.host, self.connection.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connection.timeout_secs)
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.orders.lock_timeout_ms.map(Duration::from_millis)
    }

    pub fn time_sync_interval(&self) -> Option<Duration> {
        self.time_sync.interval_ms.map(Duration::from_millis)
    }
}
