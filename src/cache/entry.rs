//! Cache entry records

use crate::cache::state::GameCacheState;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Characters that are not portable in a directory name
const UNSAFE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Turn a title into a filesystem-safe directory name
///
/// Unsafe and control characters become `_`, runs of whitespace collapse
/// to one space, and trailing dots/spaces are dropped.
pub fn safe_dir_name(title: &str) -> String {
    let mapped: String = title
        .chars()
        .map(|c| {
            if UNSAFE_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let collapsed = mapped.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_end_matches(['.', ' ']);

    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Whether `name` is one plain directory name, so that joining it to a
/// cache root stays inside that root
pub fn is_plain_dir_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// One source install directory and the cache that mirrors it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Unique entry id
    pub id: String,
    /// Display title; names the cache subdirectory unless one is set
    pub title: String,
    /// Authoritative install directory
    pub install_dir: PathBuf,
    /// Executable path used by the host when running from the cache
    pub exe_path: String,
    /// Extra launch arguments
    pub extra_args: String,
    /// Cache root holding this entry
    pub cache_root: PathBuf,
    /// Explicit subdirectory under the root
    pub cache_sub_dir: Option<String>,
    /// Files in the install directory
    pub install_files: u64,
    /// Bytes in the install directory
    pub install_size: u64,
    /// Bytes fully copied into the cache
    pub cache_size: u64,
    /// Bytes actually present in the cache, including a partially copied file
    #[serde(skip)]
    pub cache_size_on_disk: u64,
    /// Lifecycle state
    pub state: GameCacheState,
}

impl CacheEntry {
    /// Create an empty entry
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        install_dir: impl Into<PathBuf>,
        cache_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            install_dir: install_dir.into(),
            exe_path: String::new(),
            extra_args: String::new(),
            cache_root: cache_root.into(),
            cache_sub_dir: None,
            install_files: 0,
            install_size: 0,
            cache_size: 0,
            cache_size_on_disk: 0,
            state: GameCacheState::Empty,
        }
    }

    /// Subdirectory name under the cache root
    pub fn sub_dir_name(&self) -> String {
        match &self.cache_sub_dir {
            Some(sub) => sub.clone(),
            None => safe_dir_name(&self.title),
        }
    }

    /// Derived cache directory: `cache_root / (cache_sub_dir ?? safe(title))`
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_root.join(self.sub_dir_name())
    }

    /// Whether this entry's cache lives in `dir`
    pub fn uses_cache_dir(&self, dir: &Path) -> bool {
        self.cache_dir() == dir
    }

    /// Bytes still to copy before the cache is complete
    pub fn bytes_remaining(&self) -> u64 {
        self.install_size.saturating_sub(self.cache_size_on_disk)
    }

    /// Bytes held in a partially copied file, if any
    pub fn partial_file_bytes(&self) -> u64 {
        self.cache_size_on_disk.saturating_sub(self.cache_size)
    }

    /// Full path of the cached executable
    pub fn cached_exe_path(&self) -> Option<PathBuf> {
        if self.exe_path.is_empty() {
            return None;
        }
        let exe = Path::new(&self.exe_path);
        let relative = exe.strip_prefix(&self.install_dir).unwrap_or(exe);
        Some(self.cache_dir().join(relative))
    }
}
