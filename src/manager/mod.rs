//! Cache manager: root and entry registry plus job admission
//!
//! All mutable state sits behind one mutex owned by the manager. Jobs run
//! on their own tasks and only touch the shared state through short
//! critical sections; no lock is held across an await.

mod jobs;

pub use jobs::JobHandle;

use crate::cache::entry::{is_plain_dir_name, safe_dir_name, CacheEntry};
use crate::cache::registry::Registry;
use crate::cache::root::{normalize_dir, will_fit, CacheRoot};
use crate::cache::state::{quick_state, write_marker, GameCacheState};
use crate::cache::stats::DirectoryStats;
use crate::cache::throughput::ThroughputTable;
use crate::copier::driver::Copier;
use crate::error::{GameCacheError, GameCacheResult};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Parameters of a new cache entry
#[derive(Debug, Clone, Default)]
pub struct NewEntry {
    pub id: String,
    pub title: String,
    pub install_dir: PathBuf,
    pub exe_path: String,
    pub extra_args: String,
    pub cache_root: PathBuf,
    /// Explicit subdirectory; derived from the title when absent
    pub cache_sub_dir: Option<String>,
}

#[derive(Default)]
struct ManagerState {
    roots: BTreeMap<PathBuf, CacheRoot>,
    entries: BTreeMap<String, CacheEntry>,
    populate_jobs: HashMap<String, CancellationToken>,
    evict_jobs: HashMap<String, CancellationToken>,
    throughput: ThroughputTable,
}

impl ManagerState {
    fn entry(&self, id: &str) -> GameCacheResult<&CacheEntry> {
        self.entries
            .get(id)
            .ok_or_else(|| GameCacheError::EntryNotFound(id.to_string()))
    }

    fn entry_mut(&mut self, id: &str) -> GameCacheResult<&mut CacheEntry> {
        self.entries
            .get_mut(id)
            .ok_or_else(|| GameCacheError::EntryNotFound(id.to_string()))
    }

    fn root(&self, dir: &Path) -> GameCacheResult<&CacheRoot> {
        self.roots
            .get(dir)
            .ok_or_else(|| GameCacheError::RootNotFound(dir.to_path_buf()))
    }

    /// Id of another entry whose cache lives in `dir`
    fn cache_dir_owner(&self, dir: &Path, except: &str) -> Option<&str> {
        self.entries
            .values()
            .find(|e| e.id != except && e.uses_cache_dir(dir))
            .map(|e| e.id.as_str())
    }

    fn ensure_unique_dir(&self, entry: &CacheEntry) -> GameCacheResult<()> {
        let dir = entry.cache_dir();
        match self.cache_dir_owner(&dir, &entry.id) {
            Some(other) => Err(GameCacheError::CacheDirCollision {
                dir,
                other: other.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn ensure_idle(&self, id: &str) -> GameCacheResult<()> {
        if self.populate_jobs.contains_key(id) {
            return Err(GameCacheError::JobActive {
                kind: "populate",
                id: id.to_string(),
            });
        }
        if self.evict_jobs.contains_key(id) {
            return Err(GameCacheError::JobActive {
                kind: "evict",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

struct Inner {
    copier: Copier,
    state: Mutex<ManagerState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registry of cache roots and entries, and the jobs running on them
#[derive(Clone)]
pub struct CacheManager {
    inner: Arc<Inner>,
}

impl CacheManager {
    /// Create an empty manager
    pub fn new(copier: Copier) -> Self {
        Self {
            inner: Arc::new(Inner {
                copier,
                state: Mutex::new(ManagerState::default()),
            }),
        }
    }

    /// Rebuild a manager from a persisted registry
    ///
    /// Every entry's state is re-read from its cache directory, since the
    /// marker file is authoritative after a restart.
    pub async fn from_registry(copier: Copier, registry: Registry) -> GameCacheResult<Self> {
        let manager = Self::new(copier);
        let mut entries = BTreeMap::new();

        for mut entry in registry.entries {
            if let Some(sub_dir) = &entry.cache_sub_dir {
                if !is_plain_dir_name(sub_dir) {
                    return Err(GameCacheError::InvalidSubDir(sub_dir.clone()));
                }
            }
            recover_entry(&mut entry).await?;
            entries.insert(entry.id.clone(), entry);
        }

        {
            let mut state = manager.inner.lock();
            state.roots = registry
                .roots
                .into_iter()
                .map(|root| (root.directory.clone(), root))
                .collect();
            state.entries = entries;
            state.throughput = registry.throughput;
        }

        debug!("Loaded {} entries from registry", manager.inner.lock().entries.len());
        Ok(manager)
    }

    /// Everything worth persisting
    pub fn snapshot(&self) -> Registry {
        let state = self.inner.lock();
        Registry {
            roots: state.roots.values().cloned().collect(),
            entries: state.entries.values().cloned().collect(),
            throughput: state.throughput.clone(),
        }
    }

    pub fn copier(&self) -> &Copier {
        &self.inner.copier
    }

    /// Register a cache root, creating its directory if needed
    pub async fn add_cache_root(&self, dir: &Path, max_fill_level: f64) -> GameCacheResult<CacheRoot> {
        let root = CacheRoot::new(normalize_dir(dir)?, max_fill_level);
        if self.inner.lock().roots.contains_key(&root.directory) {
            return Err(GameCacheError::RootExists(root.directory));
        }

        tokio::fs::create_dir_all(&root.directory)
            .await
            .map_err(|e| GameCacheError::Inaccessible {
                path: root.directory.clone(),
                reason: e.to_string(),
            })?;

        let mut state = self.inner.lock();
        if state.roots.contains_key(&root.directory) {
            return Err(GameCacheError::RootExists(root.directory));
        }
        state.roots.insert(root.directory.clone(), root.clone());
        info!(
            "Added cache root {} (max fill {}%)",
            root.directory.display(),
            root.max_fill_level
        );
        Ok(root)
    }

    /// Unregister a cache root that holds no entries
    pub fn remove_cache_root(&self, dir: &Path) -> GameCacheResult<CacheRoot> {
        let dir = normalize_dir(dir)?;
        let mut state = self.inner.lock();
        state.root(&dir)?;
        if state.entries.values().any(|e| e.cache_root == dir) {
            return Err(GameCacheError::RootNotEmpty(dir));
        }
        let root = state
            .roots
            .remove(&dir)
            .ok_or_else(|| GameCacheError::RootNotFound(dir.clone()))?;
        info!("Removed cache root {}", dir.display());
        Ok(root)
    }

    pub fn list_roots(&self) -> Vec<CacheRoot> {
        self.inner.lock().roots.values().cloned().collect()
    }

    /// Bytes the caches may still use on `root`'s device
    pub fn available_space_for_caches(&self, root: &Path) -> GameCacheResult<u64> {
        let root = self.inner.lock().root(&normalize_dir(root)?)?.clone();
        root.available_space_for_caches(self.inner.copier.space_probe().as_ref())
    }

    /// Create an entry and classify its cache directory
    ///
    /// A title-derived directory that another entry already uses is
    /// disambiguated by prefixing the id; an explicit subdirectory that
    /// collides is an error.
    pub async fn add_cache_entry(&self, new: NewEntry) -> GameCacheResult<CacheEntry> {
        let cache_root = normalize_dir(&new.cache_root)?;
        let install_dir = normalize_dir(&new.install_dir)?;

        let mut entry = CacheEntry::new(&new.id, &new.title, install_dir, cache_root);
        entry.exe_path = new.exe_path;
        entry.extra_args = new.extra_args;
        entry.cache_sub_dir = new.cache_sub_dir;
        self.place_entry(&mut entry)?;

        if !entry.install_dir.is_dir() {
            return Err(GameCacheError::Inaccessible {
                path: entry.install_dir.clone(),
                reason: "install directory not found".to_string(),
            });
        }
        let install = DirectoryStats::measure_async(&entry.install_dir).await?;
        entry.install_files = install.files;
        entry.install_size = install.bytes;

        entry.state = quick_state(&entry.cache_dir())?;
        let on_disk = DirectoryStats::measure_async(&entry.cache_dir()).await?;
        entry.cache_size_on_disk = on_disk.bytes;
        entry.cache_size = match entry.state {
            GameCacheState::Empty => 0,
            _ => on_disk.bytes,
        };

        let mut state = self.inner.lock();
        if state.entries.contains_key(&entry.id) {
            return Err(GameCacheError::EntryExists(entry.id));
        }
        state.ensure_unique_dir(&entry)?;
        state.entries.insert(entry.id.clone(), entry.clone());
        info!(
            "Added cache entry {} ({}) at {} as {}",
            entry.id,
            entry.title,
            entry.cache_dir().display(),
            entry.state
        );
        Ok(entry)
    }

    /// Validate the id and root, and settle the cache subdirectory
    fn place_entry(&self, entry: &mut CacheEntry) -> GameCacheResult<()> {
        let state = self.inner.lock();
        if state.entries.contains_key(&entry.id) {
            return Err(GameCacheError::EntryExists(entry.id.clone()));
        }
        state.root(&entry.cache_root)?;

        if let Some(sub_dir) = &entry.cache_sub_dir {
            if !is_plain_dir_name(sub_dir) {
                return Err(GameCacheError::InvalidSubDir(sub_dir.clone()));
            }
        }
        if entry.cache_sub_dir.is_none() && state.cache_dir_owner(&entry.cache_dir(), &entry.id).is_some() {
            let sub_dir = format!("{} {}", entry.id, safe_dir_name(&entry.title));
            debug!("{}: cache dir taken, using {}", entry.id, sub_dir);
            entry.cache_sub_dir = Some(sub_dir);
        }
        state.ensure_unique_dir(entry)
    }

    /// Forget an entry; its cache directory is left alone
    pub fn remove_entry(&self, id: &str) -> GameCacheResult<CacheEntry> {
        let mut state = self.inner.lock();
        state.entry(id)?;
        state.ensure_idle(id)?;
        let entry = state
            .entries
            .remove(id)
            .ok_or_else(|| GameCacheError::EntryNotFound(id.to_string()))?;
        info!("Removed cache entry {}", id);
        Ok(entry)
    }

    pub fn list_entries(&self) -> Vec<CacheEntry> {
        self.inner.lock().entries.values().cloned().collect()
    }

    pub fn get_entry(&self, id: &str) -> GameCacheResult<CacheEntry> {
        self.inner.lock().entry(id).cloned()
    }

    /// Override an entry's state and record it on disk
    pub fn set_entry_state(&self, id: &str, new_state: GameCacheState) -> GameCacheResult<()> {
        let mut state = self.inner.lock();
        state.ensure_idle(id)?;
        let entry = state.entry_mut(id)?;
        write_marker(&entry.cache_dir(), new_state)?;
        info!("{}: state {} -> {}", id, entry.state, new_state);
        entry.state = new_state;
        Ok(())
    }

    /// Move an empty entry to another cache root
    pub fn change_entry_cache_root(&self, id: &str, root: &Path) -> GameCacheResult<()> {
        let root = normalize_dir(root)?;
        self.update_location(id, "change cache root", |entry| entry.cache_root = root)
    }

    /// Retitle an entry; moves its cache directory unless a subdirectory is pinned
    pub fn rename_entry(&self, id: &str, title: &str) -> GameCacheResult<()> {
        let title = title.to_string();
        self.update_location(id, "rename", |entry| entry.title = title)
    }

    fn update_location(
        &self,
        id: &str,
        operation: &'static str,
        change: impl FnOnce(&mut CacheEntry),
    ) -> GameCacheResult<()> {
        let mut state = self.inner.lock();
        state.ensure_idle(id)?;
        let current = state.entry(id)?;

        let mut updated = current.clone();
        change(&mut updated);
        state.root(&updated.cache_root)?;

        if updated.cache_dir() != current.cache_dir() {
            if current.state != GameCacheState::Empty {
                return Err(GameCacheError::invalid_state(id, current.state, operation));
            }
            state.ensure_unique_dir(&updated)?;
            debug!("{}: cache dir now {}", id, updated.cache_dir().display());
        }

        state.entries.insert(id.to_string(), updated);
        Ok(())
    }

    /// Re-measure an idle entry's install and cache directories
    pub async fn refresh_entry_sizes(&self, id: &str) -> GameCacheResult<CacheEntry> {
        let entry = {
            let state = self.inner.lock();
            state.ensure_idle(id)?;
            state.entry(id)?.clone()
        };

        let install = DirectoryStats::measure_async(&entry.install_dir).await?;
        let cache = DirectoryStats::measure_async(&entry.cache_dir()).await?;

        let mut state = self.inner.lock();
        let stored = state.entry_mut(id)?;
        stored.install_files = install.files;
        stored.install_size = install.bytes;
        stored.cache_size_on_disk = cache.bytes;
        if stored.state.is_complete() {
            stored.cache_size = cache.bytes;
        }
        Ok(stored.clone())
    }

    /// Whether the rest of an entry's install fits under its root's fill level
    pub fn entry_will_fit(&self, id: &str) -> GameCacheResult<bool> {
        let (entry, root) = {
            let state = self.inner.lock();
            let entry = state.entry(id)?.clone();
            let root = state.root(&entry.cache_root)?.clone();
            (entry, root)
        };
        let available = root.available_space_for_caches(self.inner.copier.space_probe().as_ref())?;
        Ok(will_fit(available, entry.install_size, entry.cache_size_on_disk))
    }

    pub fn is_populate_active(&self, id: &str) -> bool {
        self.inner.lock().populate_jobs.contains_key(id)
    }

    pub fn is_evict_active(&self, id: &str) -> bool {
        self.inner.lock().evict_jobs.contains_key(id)
    }
}

/// Re-derive an entry's state and on-disk size from its cache directory
async fn recover_entry(entry: &mut CacheEntry) -> GameCacheResult<()> {
    let cache_dir = entry.cache_dir();
    let recorded = entry.state;
    entry.state = match quick_state(&cache_dir) {
        Ok(state) => state,
        Err(e) => {
            warn!("{}: {}", entry.id, e);
            GameCacheState::Unknown
        }
    };
    if entry.state != recorded {
        info!("{}: registry said {}, cache dir says {}", entry.id, recorded, entry.state);
    }

    match entry.state {
        GameCacheState::Empty => {
            entry.cache_size = 0;
            entry.cache_size_on_disk = 0;
        }
        GameCacheState::Populated | GameCacheState::Played => {
            entry.cache_size_on_disk = entry.cache_size;
        }
        GameCacheState::InProgress | GameCacheState::Unknown | GameCacheState::Invalid => {
            entry.cache_size_on_disk = DirectoryStats::measure_async(&cache_dir).await?.bytes;
        }
    }
    Ok(())
}
