//! Cache data model
//!
//! Cache roots are directories on fast devices; cache entries mirror one
//! slow install directory into a subdirectory of a root.
//!
//! # Cache States
//!
//! | State | Marker | Description |
//! |-------|--------|-------------|
//! | Empty | none | Cache directory absent or empty |
//! | InProgress | yes | Partially copied, resumable |
//! | Populated | yes | Complete and equivalent to the source |
//! | Played | yes | Used as the working copy, may hold new files |
//! | Unknown | none | Content without a marker, needs analysis |
//! | Invalid | yes | Diverges from the source, unsafe to reconcile |

pub mod entry;
pub mod registry;
pub mod root;
pub mod state;
pub mod stats;
pub mod throughput;

pub use entry::{safe_dir_name, CacheEntry};
pub use registry::Registry;
pub use root::{
    available_space_for_caches, format_bytes, will_fit, CacheRoot, DeviceSpace, SpaceProbe,
    SystemSpaceProbe,
};
pub use state::{quick_state, GameCacheState};
pub use stats::DirectoryStats;
pub use throughput::{DensityBin, ThroughputTable};
