//! Jobs, live job statistics and job events

use crate::cache::entry::CacheEntry;
use crate::error::GameCacheError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// How partially copied files are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PfrMode {
    /// Interrupted files restart from scratch
    #[default]
    Disabled,
    /// Interrupted files are resumed in place
    Enabled,
    /// Resume in place only for files at or above the size threshold
    Threshold,
}

/// Partial-file-resume options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialFileResumeOpts {
    pub mode: PfrMode,
    /// Size at which `Threshold` mode resumes in place (bytes)
    pub file_size_threshold: u64,
    /// Restart the tool in the other mode when a file crosses the threshold
    pub switch_on_the_fly: bool,
}

impl Default for PartialFileResumeOpts {
    fn default() -> Self {
        Self {
            mode: PfrMode::Disabled,
            file_size_threshold: 512 * 1024 * 1024,
            switch_on_the_fly: true,
        }
    }
}

impl PartialFileResumeOpts {
    /// Whether a file of `size` bytes should be copied in resume mode
    pub fn wants_pfr(&self, size: u64) -> bool {
        match self.mode {
            PfrMode::Disabled => false,
            PfrMode::Enabled => true,
            PfrMode::Threshold => size >= self.file_size_threshold,
        }
    }

    /// Whether the mode may flip between files
    pub fn switches_mid_copy(&self) -> bool {
        self.mode == PfrMode::Threshold && self.switch_on_the_fly
    }
}

/// Options a caller picks per populate job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobOptions {
    /// Inter-packet gap in milliseconds passed to the tool; 0 is unthrottled
    pub throttle: u32,
    pub pfr: PartialFileResumeOpts,
}

/// Real-time counters of one job
///
/// Written only by the job's monitor loop; observers get snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobStats {
    pub files_to_copy: u64,
    pub files_copied: u64,
    pub bytes_to_copy: u64,
    /// Bytes of files copied completely
    pub bytes_copied: u64,
    pub curr_file_name: String,
    pub curr_file_size: u64,
    pub curr_file_pct: f64,
    /// The tool has started on the current file
    pub curr_file_active: bool,
    pub start_time: Option<DateTime<Utc>>,
    /// Tool currently runs in partial-file-resume mode
    pub partial_file_resume: bool,
    /// Bytes already present in the first file being resumed
    pub resume_bytes: u64,
    /// Throughput estimate for ETA, bytes/sec (0 when unknown)
    pub avg_bytes_per_sec: u64,
}

impl JobStats {
    /// Reset counters for a copy of `files` files totalling `bytes`
    pub fn reset(&mut self, files: u64, bytes: u64) {
        *self = Self {
            files_to_copy: files,
            bytes_to_copy: bytes,
            start_time: self.start_time,
            avg_bytes_per_sec: self.avg_bytes_per_sec,
            ..Self::default()
        };
    }

    /// The tool reported a new file; the previous one, if active, is done
    pub fn start_file(&mut self, name: &str, size: u64) {
        let resuming = !self.curr_file_active && self.curr_file_name == name;
        self.finish_file();
        if !resuming {
            self.curr_file_pct = 0.0;
        }
        self.curr_file_name = name.to_string();
        self.curr_file_size = size;
        self.curr_file_active = true;
    }

    /// Record a file the tool is about to (re)start, without counting it as begun
    pub fn set_pending_file(&mut self, name: &str, size: u64, pct: f64) {
        self.curr_file_name = name.to_string();
        self.curr_file_size = size;
        self.curr_file_pct = pct;
        self.curr_file_active = false;
    }

    /// Count the active file as copied
    pub fn finish_file(&mut self) {
        if self.curr_file_active {
            self.files_copied += 1;
            self.bytes_copied += self.curr_file_size;
            self.curr_file_active = false;
            self.curr_file_name.clear();
            self.curr_file_size = 0;
            self.curr_file_pct = 0.0;
        }
    }

    /// Update progress within the current file
    pub fn set_file_pct(&mut self, pct: f64) {
        self.curr_file_pct = pct.clamp(0.0, 100.0);
    }

    /// Force counters to complete
    pub fn force_complete(&mut self) {
        self.files_copied = self.files_to_copy;
        self.bytes_copied = self.bytes_to_copy;
        self.curr_file_active = false;
        self.curr_file_name.clear();
        self.curr_file_size = 0;
        self.curr_file_pct = 0.0;
    }

    /// Name of the file the tool was copying, if it had started one
    pub fn active_file(&self) -> Option<&str> {
        (self.curr_file_active && !self.curr_file_name.is_empty())
            .then_some(self.curr_file_name.as_str())
    }

    /// Bytes of the current file that are already in the cache
    pub fn in_flight_bytes(&self) -> u64 {
        if self.curr_file_name.is_empty() {
            return 0;
        }
        (self.curr_file_size as f64 * self.curr_file_pct / 100.0) as u64
    }

    /// Completed bytes plus the current file's share
    pub fn total_bytes_copied(&self) -> u64 {
        (self.bytes_copied + self.in_flight_bytes()).min(self.bytes_to_copy.max(self.bytes_copied))
    }

    /// Percent of the job's bytes in the cache
    pub fn percent_done(&self) -> f64 {
        if self.bytes_to_copy == 0 {
            return if self.files_copied >= self.files_to_copy { 100.0 } else { 0.0 };
        }
        (self.total_bytes_copied() as f64 / self.bytes_to_copy as f64 * 100.0).min(100.0)
    }

    /// Time since the job started
    pub fn elapsed(&self) -> Duration {
        self.start_time
            .map(|t| (Utc::now() - t).to_std().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Estimated time left, from the throughput estimate
    pub fn eta(&self) -> Option<Duration> {
        if self.avg_bytes_per_sec == 0 {
            return None;
        }
        let remaining = self.bytes_to_copy.saturating_sub(self.total_bytes_copied());
        Some(Duration::from_secs(remaining / self.avg_bytes_per_sec))
    }
}

/// Kind of work a job performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Populate,
    Evict,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Populate => "populate",
            Self::Evict => "evict",
        }
    }
}

/// One unit of work on a cache entry
#[derive(Debug, Clone)]
pub struct GameCacheJob {
    pub id: Uuid,
    pub kind: JobKind,
    /// Working copy of the entry; written back to the registry as the job runs
    pub entry: CacheEntry,
    pub stats: JobStats,
    pub options: JobOptions,
    pub token: CancellationToken,
    pub cancelled_on_disk_full: bool,
    pub cancelled_on_max_fill: bool,
    pub cancelled_on_error: bool,
    pub error_log: Vec<String>,
}

impl GameCacheJob {
    /// Create a job for `entry`
    pub fn new(kind: JobKind, entry: CacheEntry, options: JobOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            entry,
            stats: JobStats::default(),
            options,
            token: CancellationToken::new(),
            cancelled_on_disk_full: false,
            cancelled_on_max_fill: false,
            cancelled_on_error: false,
            error_log: Vec::new(),
        }
    }

    /// Record a runtime failure
    pub fn fail(&mut self, err: &GameCacheError) {
        self.cancelled_on_error = true;
        self.error_log.push(err.to_string());
    }

    /// Short description of why the job stopped
    pub fn cancel_reason(&self) -> &'static str {
        if self.cancelled_on_disk_full {
            "disk full"
        } else if self.cancelled_on_max_fill {
            "max fill level reached"
        } else if self.cancelled_on_error {
            "error"
        } else {
            "cancelled"
        }
    }
}

/// Events delivered on a job's channel
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// Progress snapshot; never follows a terminal event
    StatsUpdated(JobStats),
    /// The tool was restarted in the other partial-file-resume mode
    ModeChanged { partial_file_resume: bool },
    /// Terminal: the job finished
    Done(Box<GameCacheJob>),
    /// Terminal: the job stopped early; flags and error log say why
    Cancelled(Box<GameCacheJob>),
}

impl JobEvent {
    /// Whether this is the job's last event
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Cancelled(_))
    }
}
