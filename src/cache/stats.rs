//! Directory measurement

use crate::cache::state::is_marker_file;
use crate::error::{GameCacheError, GameCacheResult};
use std::path::Path;
use walkdir::WalkDir;

/// File and byte counts of a directory tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectoryStats {
    pub files: u64,
    pub bytes: u64,
}

impl DirectoryStats {
    /// Measure `dir`, skipping marker files. A missing directory measures as zero.
    pub fn measure(dir: &Path) -> GameCacheResult<Self> {
        let mut stats = Self::default();
        if !dir.exists() {
            return Ok(stats);
        }

        for entry in WalkDir::new(dir).follow_links(false) {
            let entry = entry.map_err(|e| GameCacheError::Walk {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if is_marker_file(&entry.file_name().to_string_lossy()) {
                continue;
            }
            let metadata = entry.metadata().map_err(|e| GameCacheError::Walk {
                path: entry.path().to_path_buf(),
                reason: e.to_string(),
            })?;
            stats.files += 1;
            stats.bytes += metadata.len();
        }

        Ok(stats)
    }

    /// Measure on a blocking thread so async callers don't stall the runtime
    pub async fn measure_async(dir: &Path) -> GameCacheResult<Self> {
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || Self::measure(&dir))
            .await
            .map_err(|e| GameCacheError::Internal(format!("directory walk panicked: {}", e)))?
    }

    /// Whether `dir` is absent or holds nothing besides markers
    pub fn is_empty_dir(dir: &Path) -> GameCacheResult<bool> {
        if !dir.exists() {
            return Ok(true);
        }
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| GameCacheError::Walk {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;
            if !is_marker_file(&entry.file_name().to_string_lossy()) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
