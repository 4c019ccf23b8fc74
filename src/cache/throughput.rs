//! Rolling copy throughput estimates used for ETA display
//!
//! Averages are keyed by cache root, a coarse file-density bin, the
//! throttle setting and partial-file-resume mode, since each of those
//! changes how fast the copy tool moves bytes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

const MB: u64 = 1024 * 1024;

/// Average file size bucket of an install
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DensityBin {
    /// Many small files (< 1 MB average)
    Dense,
    /// Mixed sizes (< 64 MB average)
    Mixed,
    /// Few large files
    Sparse,
}

impl DensityBin {
    /// Bin for an install of `files` files totalling `bytes`
    pub fn of(files: u64, bytes: u64) -> Self {
        let average = if files == 0 { 0 } else { bytes / files };
        if average < MB {
            Self::Dense
        } else if average < 64 * MB {
            Self::Mixed
        } else {
            Self::Sparse
        }
    }
}

impl fmt::Display for DensityBin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dense => write!(f, "dense"),
            Self::Mixed => write!(f, "mixed"),
            Self::Sparse => write!(f, "sparse"),
        }
    }
}

/// Build the table key for one kind of transfer
pub fn throughput_key(root: &Path, bin: DensityBin, throttle: u32, pfr: bool) -> String {
    format!(
        "{}|{}|ipg{}|{}",
        root.display(),
        bin,
        throttle,
        if pfr { "pfr" } else { "std" }
    )
}

/// Weighted rolling averages of bytes per second
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThroughputTable {
    averages: BTreeMap<String, u64>,
}

impl ThroughputTable {
    /// Current estimate for `key`
    pub fn get(&self, key: &str) -> Option<u64> {
        self.averages.get(key).copied()
    }

    /// Fold a new sample in with 3:1 weight toward history; returns the new average
    pub fn record(&mut self, key: &str, bytes_per_sec: u64) -> u64 {
        if bytes_per_sec == 0 {
            return self.get(key).unwrap_or(0);
        }
        let updated = match self.averages.get(key) {
            Some(&old) => (3 * old + bytes_per_sec) / 4,
            None => bytes_per_sec,
        };
        self.averages.insert(key.to_string(), updated);
        updated
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.averages.len()
    }

    /// Whether nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.averages.is_empty()
    }
}
