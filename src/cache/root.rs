//! Cache roots and device capacity accounting

use crate::error::{GameCacheError, GameCacheResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Lowest accepted max fill level (percent)
pub const MIN_FILL_LEVEL: f64 = 50.0;
/// Highest accepted max fill level (percent)
pub const MAX_FILL_LEVEL: f64 = 100.0;

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Normalize a directory path: absolute, no trailing separator
pub fn normalize_dir(dir: &Path) -> GameCacheResult<PathBuf> {
    let absolute = std::path::absolute(dir).map_err(|e| {
        GameCacheError::io(format!("resolving {}", dir.display()), e)
    })?;
    Ok(absolute.components().collect())
}

/// A directory on a fast device that holds caches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRoot {
    /// Absolute directory, trailing separator trimmed
    pub directory: PathBuf,
    /// Maximum percentage of the device the caches may fill (50-100)
    pub max_fill_level: f64,
}

impl CacheRoot {
    /// Create a root, clamping the fill level into range
    pub fn new(directory: impl Into<PathBuf>, max_fill_level: f64) -> Self {
        let directory: PathBuf = directory.into();
        Self {
            directory: directory.components().collect(),
            max_fill_level: clamp_fill_level(max_fill_level),
        }
    }

    /// Bytes the caches may still consume on this root's device
    pub fn available_space_for_caches(&self, probe: &dyn SpaceProbe) -> GameCacheResult<u64> {
        let space = probe.device_space(&self.directory)?;
        Ok(available_space_for_caches(space, self.max_fill_level))
    }
}

/// Clamp a fill level to the accepted range
pub fn clamp_fill_level(level: f64) -> f64 {
    if level.is_nan() {
        return MAX_FILL_LEVEL;
    }
    level.clamp(MIN_FILL_LEVEL, MAX_FILL_LEVEL)
}

/// Free and total bytes of one device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSpace {
    pub free: u64,
    pub total: u64,
}

/// Bytes reserved on a device so caches never fill it past `max_fill_level`
pub fn reserved_space(total: u64, max_fill_level: f64) -> u64 {
    let level = clamp_fill_level(max_fill_level);
    (total as f64 * (MAX_FILL_LEVEL - level) / 100.0).round() as u64
}

/// `free - reserved`, floored at zero
pub fn available_space_for_caches(space: DeviceSpace, max_fill_level: f64) -> u64 {
    space
        .free
        .saturating_sub(reserved_space(space.total, max_fill_level))
}

/// Whether a cache still needing `install_size - on_disk` bytes fits in `available`
pub fn will_fit(available: u64, install_size: u64, cache_size_on_disk: u64) -> bool {
    available > install_size.saturating_sub(cache_size_on_disk)
}

/// Source of device capacity figures
pub trait SpaceProbe: Send + Sync {
    /// Free/total space of the device holding `path`
    fn device_space(&self, path: &Path) -> GameCacheResult<DeviceSpace>;
}

/// Queries the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSpaceProbe;

impl SpaceProbe for SystemSpaceProbe {
    fn device_space(&self, path: &Path) -> GameCacheResult<DeviceSpace> {
        // Roots may not exist yet; ask the nearest existing ancestor.
        let existing = path
            .ancestors()
            .find(|p| p.exists())
            .ok_or_else(|| GameCacheError::Inaccessible {
                path: path.to_path_buf(),
                reason: "no existing ancestor".to_string(),
            })?;

        let free = fs2::available_space(existing).map_err(|e| {
            GameCacheError::io(format!("querying free space of {}", existing.display()), e)
        })?;
        let total = fs2::total_space(existing).map_err(|e| {
            GameCacheError::io(format!("querying capacity of {}", existing.display()), e)
        })?;
        Ok(DeviceSpace { free, total })
    }
}
