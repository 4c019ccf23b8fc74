//! Configuration schema for gamecache
//!
//! Configuration is stored at `~/.config/gamecache/config.toml`

use crate::cache::root::{clamp_fill_level, MAX_FILL_LEVEL, MIN_FILL_LEVEL};
use crate::copier::driver::CopierSettings;
use crate::copier::job::{JobOptions, PartialFileResumeOpts, PfrMode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MB: u64 = 1024 * 1024;

/// Exit codes from 8 up always mean the copy tool failed
const HIGHEST_SUCCESS_EXIT: i32 = 7;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Copy tool settings
    pub copier: CopierConfig,

    /// Partial-file-resume settings
    pub partial_file_resume: PartialFileResumeConfig,

    /// Defaults for new roots and jobs
    pub cache: CacheConfig,
}

impl Config {
    /// Options for a populate job, with an optional throttle override
    pub fn job_options(&self, throttle: Option<u32>) -> JobOptions {
        JobOptions {
            throttle: throttle.unwrap_or(self.cache.throttle),
            pfr: self.partial_file_resume.to_opts(),
        }
    }

    /// Check values that parse but cannot drive the copy tool
    pub fn validate(&self) -> Result<(), String> {
        if !matches!(self.general.log_format.as_str(), "text" | "json") {
            return Err(format!(
                "general.log_format must be \"text\" or \"json\", got \"{}\"",
                self.general.log_format
            ));
        }
        if self.copier.program.trim().is_empty() {
            return Err("copier.program must name the copy tool".to_string());
        }
        if !(0..=HIGHEST_SUCCESS_EXIT).contains(&self.copier.success_exit_max) {
            return Err(format!(
                "copier.success_exit_max must be between 0 and {}, got {}",
                HIGHEST_SUCCESS_EXIT, self.copier.success_exit_max
            ));
        }
        if self.partial_file_resume.mode == PfrMode::Threshold && self.partial_file_resume.threshold_mb == 0 {
            return Err("partial_file_resume.threshold_mb must be above 0 in threshold mode".to_string());
        }
        let fill = self.cache.default_max_fill_level;
        if !(MIN_FILL_LEVEL..=MAX_FILL_LEVEL).contains(&fill) {
            return Err(format!(
                "cache.default_max_fill_level must be between {} and {}, got {}",
                MIN_FILL_LEVEL, MAX_FILL_LEVEL, fill
            ));
        }
        Ok(())
    }
}

/// General application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Copy tool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopierConfig {
    /// Program to run (robocopy-compatible command line)
    pub program: String,

    /// Highest exit code that means success
    pub success_exit_max: i32,

    /// Kill the tool after this many seconds without output (0 = never)
    pub watchdog_secs: u64,

    /// Minimum milliseconds between progress updates within one file
    pub stats_interval_ms: u64,
}

impl Default for CopierConfig {
    fn default() -> Self {
        Self {
            program: "robocopy".to_string(),
            success_exit_max: 3,
            watchdog_secs: 300,
            stats_interval_ms: 500,
        }
    }
}

impl CopierConfig {
    pub fn settings(&self) -> CopierSettings {
        CopierSettings {
            success_exit_max: self.success_exit_max,
            watchdog: (self.watchdog_secs > 0).then(|| Duration::from_secs(self.watchdog_secs)),
            stats_interval: Duration::from_millis(self.stats_interval_ms),
        }
    }
}

/// Partial-file-resume configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialFileResumeConfig {
    /// "disabled", "enabled" or "threshold"
    pub mode: PfrMode,

    /// Files at or above this size resume in place in threshold mode
    pub threshold_mb: u64,

    /// Restart the tool when a file crosses the threshold
    pub switch_on_the_fly: bool,
}

impl Default for PartialFileResumeConfig {
    fn default() -> Self {
        let opts = PartialFileResumeOpts::default();
        Self {
            mode: opts.mode,
            threshold_mb: opts.file_size_threshold / MB,
            switch_on_the_fly: opts.switch_on_the_fly,
        }
    }
}

impl PartialFileResumeConfig {
    pub fn to_opts(&self) -> PartialFileResumeOpts {
        PartialFileResumeOpts {
            mode: self.mode,
            file_size_threshold: self.threshold_mb.saturating_mul(MB),
            switch_on_the_fly: self.switch_on_the_fly,
        }
    }
}

/// Cache defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Max fill level for roots added without one (50-100)
    pub default_max_fill_level: f64,

    /// Inter-packet gap in ms for populate jobs (0 = unthrottled)
    pub throttle: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_max_fill_level: 90.0,
            throttle: 0,
        }
    }
}

impl CacheConfig {
    pub fn max_fill_level(&self) -> f64 {
        clamp_fill_level(self.default_max_fill_level)
    }
}
