//! gamecache - size-bounded local disk cache for game installs
//!
//! Mirrors slow install directories onto fast cache roots with an external
//! robocopy-style tool, tracks each cache's lifecycle with on-disk markers,
//! and resumes, analyzes and evicts caches safely.

pub mod cache;
pub mod cli;
pub mod config;
pub mod copier;
pub mod error;
pub mod manager;
pub mod ui;

pub use cache::{CacheEntry, CacheRoot, GameCacheState, Registry};
pub use copier::{Copier, GameCacheJob, JobEvent, JobOptions};
pub use error::{GameCacheError, GameCacheResult};
pub use manager::{CacheManager, JobHandle, NewEntry};
