//! Loaded configuration plus the registry location commands operate on

use crate::cache::registry::Registry;
use crate::cache::root::SystemSpaceProbe;
use crate::config::Config;
use crate::copier::{CommandCopyTool, Copier};
use crate::error::GameCacheResult;
use crate::manager::CacheManager;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// What every state-touching command needs
#[derive(Debug, Clone)]
pub struct Workspace {
    pub config: Config,
    pub config_path: PathBuf,
    pub registry_path: PathBuf,
}

impl Workspace {
    pub fn new(config: Config, config_path: PathBuf, registry_path: Option<PathBuf>) -> Self {
        Self {
            config,
            config_path,
            registry_path: registry_path.unwrap_or_else(Registry::default_path),
        }
    }

    /// Copier driving the configured tool against the real filesystem
    pub fn copier(&self) -> Copier {
        Copier::new(
            Arc::new(CommandCopyTool::new(self.config.copier.program.clone())),
            Arc::new(SystemSpaceProbe),
            self.config.copier.settings(),
        )
    }

    /// Load the registry into a manager
    pub async fn open(&self) -> GameCacheResult<CacheManager> {
        debug!("Using registry {}", self.registry_path.display());
        let registry = Registry::load(&self.registry_path).await?;
        CacheManager::from_registry(self.copier(), registry).await
    }

    /// Persist the manager's roots, entries and throughput table
    pub async fn save(&self, manager: &CacheManager) -> GameCacheResult<()> {
        manager.snapshot().save(&self.registry_path).await
    }
}
