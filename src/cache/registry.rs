//! Persisted registry of cache roots and entries

use crate::cache::entry::CacheEntry;
use crate::cache::root::CacheRoot;
use crate::cache::throughput::ThroughputTable;
use crate::config::ConfigManager;
use crate::error::{GameCacheError, GameCacheResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Everything the engine needs to come back after a restart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Registry {
    /// Configured cache roots
    pub roots: Vec<CacheRoot>,
    /// Cache entries
    pub entries: Vec<CacheEntry>,
    /// Throughput averages for ETA estimates
    pub throughput: ThroughputTable,
}

impl Registry {
    /// Default registry location
    pub fn default_path() -> PathBuf {
        ConfigManager::state_dir().join("registry.json")
    }

    /// Load a registry, returning an empty one when the file is missing
    pub async fn load(path: &Path) -> GameCacheResult<Self> {
        if !path.exists() {
            debug!("Registry {} not found, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            GameCacheError::io(format!("reading registry {}", path.display()), e)
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the registry, replacing the file atomically
    pub async fn save(&self, path: &Path) -> GameCacheResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| GameCacheError::io("creating registry directory", e))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, content).await.map_err(|e| {
            GameCacheError::io(format!("writing registry {}", temp.display()), e)
        })?;
        fs::rename(&temp, path).await.map_err(|e| {
            GameCacheError::io(format!("replacing registry {}", path.display()), e)
        })?;

        debug!(
            "Saved registry with {} roots, {} entries",
            self.roots.len(),
            self.entries.len()
        );
        Ok(())
    }
}
