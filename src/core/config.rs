//! Knowledge base configuration
//!
//! Read from `config.yaml` in the data directory. Every field has a default,
//! so a missing or partial file is fine.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::Result;
use super::topics::DEFAULT_TOP_N;
use crate::search::cooccurrence::DEFAULT_MAX_SUGGESTIONS;
use crate::search::distance::DistanceMetric;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KbConfig {
    /// Log filter used when `KB_LOG` is not set
    pub log_level: String,
    /// SQLite file name inside the data directory
    pub db_file: String,
    /// Distance metric of the vector index
    pub metric: DistanceMetric,
    pub search: SearchConfig,
    pub connections: ConnectionsConfig,
    pub topics: TopicsConfig,
}

impl Default for KbConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            db_file: "insights.db".to_string(),
            metric: DistanceMetric::L2,
            search: SearchConfig::default(),
            connections: ConnectionsConfig::default(),
            topics: TopicsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_top_k: usize,
    /// Connections attached to every search hit
    pub related_per_result: usize,
    /// Topic suggestions attached to every search hit
    pub suggestions_per_result: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: 10,
            related_per_result: 3,
            suggestions_per_result: DEFAULT_MAX_SUGGESTIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionsConfig {
    pub default_top_k: usize,
}

impl Default for ConnectionsConfig {
    fn default() -> Self {
        Self { default_top_k: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    pub default_top_n: usize,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            default_top_n: DEFAULT_TOP_N,
        }
    }
}

impl KbConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: KbConfig = serde_yaml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load from `path`, or defaults when there is no file.
    ///
    /// An unreadable or invalid file is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}
