//! Server configuration

use anyhow::{Context, Result};
use pitwall_analytics::EngineConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the JSON config file
pub const CONFIG_ENV: &str = "PITWALL_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address
    pub bind: SocketAddr,

    /// Engine tick period
    pub tick_interval_ms: u64,

    /// How often sources are polled for detection
    pub detection_interval_ms: u64,

    /// Register the synthetic demo session as a source
    pub demo: bool,

    /// NDJSON recordings offered as sources
    pub recordings: Vec<PathBuf>,

    /// Append every snapshot read to this NDJSON file
    pub record_to: Option<PathBuf>,

    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 9100)),
            tick_interval_ms: 200,
            detection_interval_ms: 1000,
            demo: true,
            recordings: Vec::new(),
            record_to: None,
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Config from the file named by `PITWALL_CONFIG`, or the defaults
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn detection_interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval_ms)
    }
}
