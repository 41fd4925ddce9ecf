//! Engine configuration

use pitwall_core::error::{AnalyticsError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tuning and data locations for the analytics engine
///
/// Every field has a default, so a config file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root of the track resources (`tracks/<key>/...`)
    pub data_dir: PathBuf,

    /// Fixed number of sectors per track; derived from the path length when unset
    pub sector_count: Option<usize>,

    /// Path points per sector when `sector_count` is unset
    pub default_sector_length: usize,

    /// Pace state for a car is dropped after this long without an observation
    pub stale_car_after_secs: f32,

    /// Largest tick gap the tyre model will integrate over
    pub max_wear_dt_secs: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            sector_count: None,
            default_sector_length: 50,
            stale_car_after_secs: 60.0,
            max_wear_dt_secs: 0.2,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("pitwall"))
        .unwrap_or_else(|| PathBuf::from("resources"))
}

impl EngineConfig {
    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let key = path.display().to_string();
        let data = std::fs::read_to_string(path).map_err(|source| AnalyticsError::Io {
            key: key.clone(),
            source,
        })?;
        Self::from_json_str(&data).map_err(|err| match err {
            AnalyticsError::Parse { reason, .. } => AnalyticsError::Parse { key, reason },
            other => other,
        })
    }

    pub fn from_json_str(data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(|e| AnalyticsError::Parse {
            key: "engine config".to_string(),
            reason: e.to_string(),
        })
    }
}
