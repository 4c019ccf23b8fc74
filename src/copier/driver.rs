//! Drives the copy tool through populate, resume, diff and evict
//!
//! One `Copier` call owns one job's tool processes from spawn to exit.
//! Progress and failures are written into the job itself; callers get an
//! [`Outcome`] only after the processes are reaped and the entry's state,
//! sizes and marker file are settled.
//!
//! Cancellation is immediate: the monitor loop races each output read
//! against the job's token and kills the tool as soon as it fires. A tool
//! that goes silent for longer than the watchdog limit is killed and the
//! job stops with [`GameCacheError::ToolStalled`].

use crate::cache::entry::CacheEntry;
use crate::cache::root::{format_bytes, SpaceProbe};
use crate::cache::state::{clear_markers, write_marker, GameCacheState};
use crate::cache::stats::DirectoryStats;
use crate::copier::classify::{classify_copy_line, classify_diff_line, CopyLine, DiffLine, FileReport};
use crate::copier::job::{GameCacheJob, PfrMode};
use crate::copier::tool::{CopyTool, ToolProcess, ToolRequest};
use crate::error::{GameCacheError, GameCacheResult};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Verdict of a job observer on a stats update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Continue,
    /// The cache root has no room left under its fill level
    OutOfSpace,
}

/// Receives progress from an active job
pub trait JobObserver: Send + Sync {
    /// Called on file boundaries and at most once per stats interval otherwise
    fn stats_updated(&self, job: &GameCacheJob) -> Admission;

    /// Called after the tool was restarted in the other partial-file-resume mode
    fn mode_changed(&self, job: &mut GameCacheJob);
}

/// Observer that ignores everything
pub struct NoopObserver;

impl JobObserver for NoopObserver {
    fn stats_updated(&self, _job: &GameCacheJob) -> Admission {
        Admission::Continue
    }

    fn mode_changed(&self, _job: &mut GameCacheJob) {}
}

/// How a job ended; details are in the job's flags and error log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Cancelled,
}

/// Tunables for tool invocations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopierSettings {
    /// Highest exit code that still means success
    pub success_exit_max: i32,
    /// Kill the tool after this long without output
    pub watchdog: Option<Duration>,
    /// Minimum time between progress updates within one file
    pub stats_interval: Duration,
}

impl Default for CopierSettings {
    fn default() -> Self {
        Self {
            success_exit_max: 3,
            watchdog: Some(Duration::from_secs(300)),
            stats_interval: Duration::from_millis(500),
        }
    }
}

/// Files reported by an analyze pass, by class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffReport {
    /// Only in the destination
    pub extra: Vec<FileReport>,
    /// Only in the source
    pub new: Vec<FileReport>,
    /// Source copy is newer
    pub newer: Vec<FileReport>,
    /// Source copy is older
    pub older: Vec<FileReport>,
}

impl DiffReport {
    /// Whether the two trees are equivalent
    pub fn is_clean(&self) -> bool {
        self.extra.is_empty() && self.new.is_empty() && self.newer.is_empty() && self.older.is_empty()
    }

    /// Bytes the source holds that the destination lacks or has stale
    pub fn missing_bytes(&self) -> u64 {
        self.new.iter().chain(&self.newer).map(|f| f.size).sum()
    }
}

/// Cached files that an eviction without write-back would lose
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirtyReport {
    pub files: Vec<FileReport>,
}

impl DirtyReport {
    pub fn is_dirty(&self) -> bool {
        !self.files.is_empty()
    }

    pub fn bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Why a copy run stopped early
enum Halt {
    /// User cancel, disk full, max fill or stall; the cache stays resumable
    Interrupted,
    /// The tool misbehaved; the cache needs analysis before reuse
    Failed(GameCacheError),
}

/// End of one tool process within a copy
enum Step {
    /// Output exhausted; exit code decides
    Finished,
    /// Restart in the given partial-file-resume mode
    Restart(bool),
    Halt(Halt),
}

/// External copy tool driver
#[derive(Clone)]
pub struct Copier {
    tool: Arc<dyn CopyTool>,
    space: Arc<dyn SpaceProbe>,
    settings: CopierSettings,
}

impl Copier {
    pub fn new(tool: Arc<dyn CopyTool>, space: Arc<dyn SpaceProbe>, settings: CopierSettings) -> Self {
        Self {
            tool,
            space,
            settings,
        }
    }

    pub fn settings(&self) -> &CopierSettings {
        &self.settings
    }

    pub fn space_probe(&self) -> &Arc<dyn SpaceProbe> {
        &self.space
    }

    fn is_success(&self, code: i32) -> bool {
        (0..=self.settings.success_exit_max).contains(&code)
    }

    /// Copy an empty cache from scratch
    pub async fn populate(&self, job: &mut GameCacheJob, observer: &dyn JobObserver) -> Outcome {
        job.stats
            .reset(job.entry.install_files, job.entry.install_size);
        job.stats.partial_file_resume = job.options.pfr.mode == PfrMode::Enabled;
        info!(
            "Populating {} ({} files, {}) into {}",
            job.entry.id,
            job.entry.install_files,
            format_bytes(job.entry.install_size),
            job.entry.cache_dir().display()
        );
        self.copy(job, observer).await
    }

    /// Continue a partially copied cache
    ///
    /// Lists the files still missing, winds the stats back from "all
    /// copied" to the real resume point, then continues as a fresh copy.
    pub async fn resume(&self, job: &mut GameCacheJob, observer: &dyn JobObserver) -> Outcome {
        info!("Resuming {} into {}", job.entry.id, job.entry.cache_dir().display());
        match self.plan_resume(job).await {
            Ok(()) => {}
            Err(GameCacheError::Cancelled) => {
                info!("{}: resume cancelled", job.entry.id);
                return Outcome::Cancelled;
            }
            Err(e) => {
                warn!("Cannot resume {}: {}", job.entry.id, e);
                job.fail(&e);
                return Outcome::Cancelled;
            }
        }

        debug!(
            "Resume point for {}: {}/{} files, {} bytes, in flight {:?} at {:.1}%",
            job.entry.id,
            job.stats.files_copied,
            job.stats.files_to_copy,
            job.stats.bytes_copied,
            job.stats.curr_file_name,
            job.stats.curr_file_pct
        );
        if observer.stats_updated(job) == Admission::OutOfSpace {
            job.cancelled_on_max_fill = true;
            return Outcome::Cancelled;
        }
        self.copy(job, observer).await
    }

    async fn plan_resume(&self, job: &mut GameCacheJob) -> GameCacheResult<()> {
        let entry = &job.entry;
        let request = ToolRequest::list(&entry.install_dir, &entry.cache_dir());

        job.stats.reset(entry.install_files, entry.install_size);
        job.stats.force_complete();

        let mut missing: Vec<FileReport> = Vec::new();
        self.run_to_end(&request, &job.token, &mut |line| match classify_copy_line(line) {
            CopyLine::Empty | CopyLine::MarkerFile => Ok(()),
            CopyLine::Progress(_) | CopyLine::Progress100 => Ok(()),
            CopyLine::SizeName { size, name } => {
                missing.push(FileReport { size, name });
                Ok(())
            }
            CopyLine::DiskFull | CopyLine::Other => {
                Err(GameCacheError::UnexpectedOutput(line.to_string()))
            }
        })
        .await?;

        let stats = &mut job.stats;
        for file in &missing {
            stats.files_copied = stats.files_copied.saturating_sub(1);
            stats.bytes_copied = stats.bytes_copied.saturating_sub(file.size);
        }

        let pfr_opts = &job.options.pfr;
        let Some(in_flight) = missing.first() else {
            stats.partial_file_resume = pfr_opts.mode == PfrMode::Enabled;
            return Ok(());
        };

        let pfr = pfr_opts.wants_pfr(in_flight.size);
        stats.partial_file_resume = pfr;
        if !pfr {
            stats.set_pending_file(&in_flight.name, in_flight.size, 0.0);
            return Ok(());
        }

        let partial = job.entry.partial_file_bytes();
        if partial > in_flight.size {
            return Err(GameCacheError::ResumeMismatch {
                file: in_flight.name.clone(),
                on_disk: partial,
                size: in_flight.size,
            });
        }
        let pct = if in_flight.size == 0 {
            0.0
        } else {
            partial as f64 / in_flight.size as f64 * 100.0
        };
        stats.set_pending_file(&in_flight.name, in_flight.size, pct);
        stats.resume_bytes = partial;
        Ok(())
    }

    fn check_space(&self, entry: &CacheEntry) -> GameCacheResult<()> {
        let needed = entry.bytes_remaining();
        let space = self.space.device_space(&entry.cache_root)?;
        if space.free < needed {
            return Err(GameCacheError::InsufficientSpace {
                dir: entry.cache_root.clone(),
                needed,
                available: space.free,
            });
        }
        Ok(())
    }

    /// Copy loop shared by fresh copy and resume
    ///
    /// A partial-file-resume mode flip kills the tool and goes round the
    /// loop again with the accumulated stats.
    async fn copy(&self, job: &mut GameCacheJob, observer: &dyn JobObserver) -> Outcome {
        if let Err(e) = self.check_space(&job.entry) {
            warn!("Not starting {}: {}", job.entry.id, e);
            job.fail(&e);
            return Outcome::Cancelled;
        }
        if job.stats.start_time.is_none() {
            job.stats.start_time = Some(Utc::now());
        }

        let cache_dir = job.entry.cache_dir();
        let mut started = false;
        let mut marked = false;

        loop {
            let request = ToolRequest::copy(
                &job.entry.install_dir,
                &cache_dir,
                job.options.throttle,
                job.stats.partial_file_resume,
            );
            let mut process = match self.tool.spawn(&request).await {
                Ok(process) => process,
                Err(e) if started => return self.settle_failed(job, e).await,
                Err(e) => {
                    error!("Failed to start copy for {}: {}", job.entry.id, e);
                    job.fail(&e);
                    return Outcome::Cancelled;
                }
            };
            started = true;

            match self.monitor_copy(job, observer, process.as_mut(), &mut marked).await {
                Step::Finished => {
                    let code = match process.wait().await {
                        Ok(code) => code,
                        Err(e) => return self.settle_failed(job, e).await,
                    };
                    if self.is_success(code) {
                        return self.settle_done(job).await;
                    }
                    return self
                        .settle_failed(job, GameCacheError::ToolExitCode { code })
                        .await;
                }
                Step::Restart(pfr) => {
                    if let Err(e) = process.kill().await {
                        return self.settle_failed(job, e).await;
                    }
                    if !job.stats.partial_file_resume {
                        // Without resume the tool preallocates; the stub is useless.
                        let name = job.stats.curr_file_name.clone();
                        remove_cached_file(&job.entry, &name);
                    }
                    info!(
                        "{}: switching partial-file-resume {} for {}",
                        job.entry.id,
                        if pfr { "on" } else { "off" },
                        job.stats.curr_file_name
                    );
                    job.stats.partial_file_resume = pfr;
                    observer.mode_changed(job);
                }
                Step::Halt(Halt::Interrupted) => {
                    if let Err(e) = process.kill().await {
                        warn!("Failed to kill copy tool for {}: {}", job.entry.id, e);
                    }
                    return self.settle_interrupted(job, marked).await;
                }
                Step::Halt(Halt::Failed(e)) => {
                    if let Err(kill_err) = process.kill().await {
                        warn!("Failed to kill copy tool for {}: {}", job.entry.id, kill_err);
                    }
                    return self.settle_failed(job, e).await;
                }
            }
        }
    }

    async fn monitor_copy(
        &self,
        job: &mut GameCacheJob,
        observer: &dyn JobObserver,
        process: &mut dyn ToolProcess,
        marked: &mut bool,
    ) -> Step {
        let cache_dir = job.entry.cache_dir();
        let token = job.token.clone();
        let mut last_update = Instant::now();

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                line = self.next_line_watched(&mut *process) => Some(line),
            };

            let line = match next {
                None => {
                    info!("{}: copy cancelled", job.entry.id);
                    return Step::Halt(Halt::Interrupted);
                }
                Some(Err(e @ GameCacheError::ToolStalled { .. })) => {
                    warn!("{}: {}", job.entry.id, e);
                    job.fail(&e);
                    return Step::Halt(Halt::Interrupted);
                }
                Some(Err(e)) => return Step::Halt(Halt::Failed(e)),
                Some(Ok(None)) => return Step::Finished,
                Some(Ok(Some(line))) => line,
            };

            if !*marked {
                if let Err(e) = write_marker(&cache_dir, GameCacheState::InProgress) {
                    return Step::Halt(Halt::Failed(e));
                }
                job.entry.state = GameCacheState::InProgress;
                *marked = true;
            }

            let boundary = match classify_copy_line(&line) {
                CopyLine::Empty | CopyLine::MarkerFile => false,
                CopyLine::SizeName { size, name } => {
                    let wants = job.options.pfr.wants_pfr(size);
                    if job.options.pfr.switches_mid_copy() && wants != job.stats.partial_file_resume {
                        job.stats.finish_file();
                        job.stats.set_pending_file(&name, size, 0.0);
                        return Step::Restart(wants);
                    }
                    job.stats.start_file(&name, size);
                    true
                }
                CopyLine::Progress(pct) => {
                    job.stats.set_file_pct(pct);
                    false
                }
                CopyLine::Progress100 => {
                    job.stats.set_file_pct(100.0);
                    job.stats.finish_file();
                    true
                }
                CopyLine::DiskFull => {
                    warn!("{}: destination disk full", job.entry.id);
                    job.cancelled_on_disk_full = true;
                    job.error_log.push(GameCacheError::DiskFull.to_string());
                    return Step::Halt(Halt::Interrupted);
                }
                CopyLine::Other => {
                    return Step::Halt(Halt::Failed(GameCacheError::UnexpectedOutput(line)));
                }
            };

            if boundary || last_update.elapsed() >= self.settings.stats_interval {
                last_update = Instant::now();
                if observer.stats_updated(job) == Admission::OutOfSpace {
                    warn!("{}: cache root is full, stopping", job.entry.id);
                    job.cancelled_on_max_fill = true;
                    return Step::Halt(Halt::Interrupted);
                }
            }
        }
    }

    async fn next_line_watched(&self, process: &mut dyn ToolProcess) -> GameCacheResult<Option<String>> {
        match self.settings.watchdog {
            Some(limit) => tokio::time::timeout(limit, process.next_line())
                .await
                .map_err(|_| GameCacheError::ToolStalled {
                    secs: limit.as_secs(),
                })?,
            None => process.next_line().await,
        }
    }

    async fn settle_done(&self, job: &mut GameCacheJob) -> Outcome {
        let cache_dir = job.entry.cache_dir();
        job.stats.force_complete();

        if let Err(e) = write_marker(&cache_dir, GameCacheState::Populated) {
            return self.settle_failed(job, e).await;
        }
        job.entry.state = GameCacheState::Populated;

        match DirectoryStats::measure_async(&cache_dir).await {
            Ok(measured) => {
                job.entry.cache_size = measured.bytes;
                job.entry.cache_size_on_disk = measured.bytes;
                if measured.bytes != job.entry.install_size {
                    warn!(
                        "{}: cache holds {} bytes but install was measured at {}; re-measuring source",
                        job.entry.id, measured.bytes, job.entry.install_size
                    );
                    match DirectoryStats::measure_async(&job.entry.install_dir).await {
                        Ok(source) => {
                            job.entry.install_files = source.files;
                            job.entry.install_size = source.bytes;
                        }
                        Err(e) => warn!("{}: {}", job.entry.id, e),
                    }
                }
            }
            Err(e) => {
                warn!("{}: could not measure cache: {}", job.entry.id, e);
                job.entry.cache_size = job.entry.install_size;
                job.entry.cache_size_on_disk = job.entry.install_size;
            }
        }

        info!(
            "{}: populated {} files in {:.1}s",
            job.entry.id,
            job.stats.files_copied,
            job.stats.elapsed().as_secs_f64()
        );
        Outcome::Done
    }

    async fn settle_interrupted(&self, job: &mut GameCacheJob, marked: bool) -> Outcome {
        if !job.stats.partial_file_resume {
            if let Some(name) = job.stats.active_file().map(str::to_owned) {
                remove_cached_file(&job.entry, &name);
                job.stats.curr_file_pct = 0.0;
            }
        }

        job.entry.cache_size = job.stats.bytes_copied;
        match DirectoryStats::measure_async(&job.entry.cache_dir()).await {
            Ok(measured) => job.entry.cache_size_on_disk = measured.bytes,
            Err(e) => warn!("{}: could not measure cache: {}", job.entry.id, e),
        }
        if marked {
            job.entry.state = GameCacheState::InProgress;
        }

        info!(
            "{}: stopped ({}) with {} of {} bytes cached",
            job.entry.id,
            job.cancel_reason(),
            job.entry.cache_size_on_disk,
            job.entry.install_size
        );
        Outcome::Cancelled
    }

    async fn settle_failed(&self, job: &mut GameCacheJob, err: GameCacheError) -> Outcome {
        error!("{}: copy failed: {}", job.entry.id, err);
        job.fail(&err);

        let cache_dir = job.entry.cache_dir();
        if let Err(e) = clear_markers(&cache_dir) {
            warn!("{}: could not clear marker: {}", job.entry.id, e);
        }
        job.entry.state = GameCacheState::Unknown;
        job.entry.cache_size = job.stats.bytes_copied;
        match DirectoryStats::measure_async(&cache_dir).await {
            Ok(measured) => job.entry.cache_size_on_disk = measured.bytes,
            Err(e) => warn!("{}: could not measure cache: {}", job.entry.id, e),
        }
        Outcome::Cancelled
    }

    /// Run one tool invocation to completion, feeding each line to `on_line`
    async fn run_to_end(
        &self,
        request: &ToolRequest,
        token: &CancellationToken,
        on_line: &mut (dyn FnMut(&str) -> GameCacheResult<()> + Send),
    ) -> GameCacheResult<()> {
        let mut process = self.tool.spawn(request).await?;

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                line = self.next_line_watched(process.as_mut()) => Some(line),
            };

            let result = match next {
                None => Err(GameCacheError::Cancelled),
                Some(Ok(None)) => break,
                Some(Ok(Some(line))) => on_line(&line),
                Some(Err(e)) => Err(e),
            };
            if let Err(e) = result {
                if let Err(kill_err) = process.kill().await {
                    warn!("Failed to kill copy tool: {}", kill_err);
                }
                return Err(e);
            }
        }

        let code = process.wait().await?;
        if !self.is_success(code) {
            return Err(GameCacheError::ToolExitCode { code });
        }
        Ok(())
    }

    /// Compare `source` against `dest` and classify every difference
    pub async fn diff(
        &self,
        source: &Path,
        dest: &Path,
        token: &CancellationToken,
    ) -> GameCacheResult<DiffReport> {
        let request = ToolRequest::analyze(source, dest);
        let mut report = DiffReport::default();

        self.run_to_end(&request, token, &mut |line| {
            match classify_diff_line(line) {
                DiffLine::Empty | DiffLine::MarkerFile => {}
                DiffLine::ExtraFile(file) => report.extra.push(file),
                DiffLine::NewFile(file) => report.new.push(file),
                DiffLine::Newer(file) => report.newer.push(file),
                DiffLine::Older(file) => report.older.push(file),
                DiffLine::Other => return Err(GameCacheError::UnexpectedOutput(line.to_string())),
            }
            Ok(())
        })
        .await?;

        debug!(
            "Diff {} -> {}: {} extra, {} new, {} newer, {} older",
            source.display(),
            dest.display(),
            report.extra.len(),
            report.new.len(),
            report.newer.len(),
            report.older.len()
        );
        Ok(report)
    }

    /// Classify a cache directory by diffing it against its install
    ///
    /// Extra or older files make the cache `Invalid`; nothing missing
    /// makes it `Populated`; otherwise it is `InProgress`. The marker and
    /// the entry's sizes are updated to match.
    pub async fn analyze_cache(
        &self,
        entry: &mut CacheEntry,
        token: &CancellationToken,
    ) -> GameCacheResult<GameCacheState> {
        let cache_dir = entry.cache_dir();
        let report = self.diff(&entry.install_dir, &cache_dir, token).await?;

        let state = if !report.extra.is_empty() || !report.older.is_empty() {
            GameCacheState::Invalid
        } else if report.new.is_empty() && report.newer.is_empty() {
            GameCacheState::Populated
        } else {
            GameCacheState::InProgress
        };

        write_marker(&cache_dir, state)?;
        entry.state = state;
        entry.cache_size = entry.install_size.saturating_sub(report.missing_bytes());
        entry.cache_size_on_disk = DirectoryStats::measure_async(&cache_dir).await?.bytes;

        info!("{}: analyzed cache as {}", entry.id, state);
        Ok(state)
    }

    /// Files in the cache that are new or newer than the install
    pub async fn check_dirty(
        &self,
        entry: &CacheEntry,
        token: &CancellationToken,
    ) -> GameCacheResult<DirtyReport> {
        let report = self
            .diff(&entry.cache_dir(), &entry.install_dir, token)
            .await?;
        let files: Vec<FileReport> = report.new.into_iter().chain(report.newer).collect();
        debug!("{}: {} dirty files", entry.id, files.len());
        Ok(DirtyReport { files })
    }

    /// Delete a cache, optionally copying dirty files back first
    pub async fn evict(&self, job: &mut GameCacheJob, write_back: bool) -> Outcome {
        match self.evict_inner(job, write_back).await {
            Ok(()) => {
                info!("{}: evicted", job.entry.id);
                Outcome::Done
            }
            Err(GameCacheError::Cancelled) => {
                info!("{}: eviction cancelled", job.entry.id);
                Outcome::Cancelled
            }
            Err(e) => {
                error!("{}: eviction failed: {}", job.entry.id, e);
                job.fail(&e);
                Outcome::Cancelled
            }
        }
    }

    async fn evict_inner(&self, job: &mut GameCacheJob, write_back: bool) -> GameCacheResult<()> {
        let cache_dir = job.entry.cache_dir();
        let previous = job.entry.state;

        if write_back && previous.is_complete() {
            let written = self.write_back(job).await;
            if let Err(e) = written {
                if let Err(marker_err) = write_marker(&cache_dir, previous) {
                    warn!("{}: could not restore marker: {}", job.entry.id, marker_err);
                }
                job.entry.state = previous;
                return Err(e);
            }
        }

        remove_dir(&cache_dir).await?;
        job.entry.state = GameCacheState::Empty;
        job.entry.cache_size = 0;
        job.entry.cache_size_on_disk = 0;
        Ok(())
    }

    async fn write_back(&self, job: &mut GameCacheJob) -> GameCacheResult<()> {
        let dirty = self.check_dirty(&job.entry, &job.token).await?;
        if !dirty.is_dirty() {
            return Ok(());
        }

        info!(
            "{}: writing back {} files ({} bytes)",
            job.entry.id,
            dirty.files.len(),
            dirty.bytes()
        );
        job.stats.reset(dirty.files.len() as u64, dirty.bytes());
        job.stats.start_time = Some(Utc::now());

        let request = ToolRequest::write_back(&job.entry.cache_dir(), &job.entry.install_dir);
        let stats = &mut job.stats;
        self.run_to_end(&request, &job.token, &mut |line| match classify_copy_line(line) {
            CopyLine::Empty | CopyLine::MarkerFile => Ok(()),
            CopyLine::SizeName { size, name } => {
                stats.start_file(&name, size);
                Ok(())
            }
            CopyLine::Progress(pct) => {
                stats.set_file_pct(pct);
                Ok(())
            }
            CopyLine::Progress100 => {
                stats.finish_file();
                Ok(())
            }
            CopyLine::DiskFull => Err(GameCacheError::DiskFull),
            CopyLine::Other => Err(GameCacheError::UnexpectedOutput(line.to_string())),
        })
        .await?;
        job.stats.force_complete();

        let source = DirectoryStats::measure_async(&job.entry.install_dir).await?;
        job.entry.install_files = source.files;
        job.entry.install_size = source.bytes;
        Ok(())
    }
}

/// Path of a tool-reported file inside the entry's cache
///
/// The tool may report full source or destination paths, or paths
/// relative to the copy root.
fn cached_file_path(entry: &CacheEntry, name: &str) -> PathBuf {
    let cache_dir = entry.cache_dir();
    let reported = Path::new(name);
    if let Ok(relative) = reported.strip_prefix(&entry.install_dir) {
        return cache_dir.join(relative);
    }
    if reported.starts_with(&cache_dir) {
        return reported.to_path_buf();
    }
    cache_dir.join(reported)
}

fn remove_cached_file(entry: &CacheEntry, name: &str) {
    if name.is_empty() {
        return;
    }
    let path = cached_file_path(entry, name);
    match std::fs::remove_file(&path) {
        Ok(()) => debug!("{}: removed partial file {}", entry.id, path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("{}: could not remove {}: {}", entry.id, path.display(), e),
    }
}

async fn remove_dir(dir: &Path) -> GameCacheResult<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(GameCacheError::io(format!("removing {}", dir.display()), e)),
    }
}
