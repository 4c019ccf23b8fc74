//! Job admission, per-job event channels and the manager's job observer

use super::{CacheManager, Inner};
use crate::cache::root::will_fit;
use crate::cache::state::GameCacheState;
use crate::cache::stats::DirectoryStats;
use crate::cache::throughput::{throughput_key, DensityBin};
use crate::copier::driver::{Admission, DirtyReport, JobObserver, Outcome};
use crate::copier::job::{GameCacheJob, JobEvent, JobKind, JobOptions, JobStats, PfrMode};
use crate::error::{GameCacheError, GameCacheResult};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Caller's end of one running job
///
/// Receives every event of the job in order. The terminal `Done` or
/// `Cancelled` event is the last one; by then the job is deregistered
/// and the entry is updated in the manager.
pub struct JobHandle {
    pub entry_id: String,
    pub job_id: Uuid,
    pub kind: JobKind,
    token: CancellationToken,
    events: mpsc::UnboundedReceiver<JobEvent>,
}

impl JobHandle {
    /// Next event, `None` after the terminal event
    pub async fn next_event(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    /// Request cooperative cancellation
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Token that cancels this job
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Drain events up to and including the terminal one
    pub async fn wait(mut self) -> GameCacheResult<JobEvent> {
        while let Some(event) = self.events.recv().await {
            if event.is_terminal() {
                return Ok(event);
            }
        }
        Err(GameCacheError::Internal(format!(
            "{} job for {} ended without a result",
            self.kind.as_str(),
            self.entry_id
        )))
    }
}

/// Throughput measurement window, restarted on each mode change
struct Segment {
    started: Instant,
    start_bytes: Option<u64>,
}

/// Publishes a job's progress into the manager and onto its channel
struct ManagerObserver {
    inner: Arc<Inner>,
    events: mpsc::UnboundedSender<JobEvent>,
    segment: Mutex<Segment>,
}

impl ManagerObserver {
    fn new(inner: Arc<Inner>, events: mpsc::UnboundedSender<JobEvent>) -> Self {
        Self {
            inner,
            events,
            segment: Mutex::new(Segment {
                started: Instant::now(),
                start_bytes: None,
            }),
        }
    }

    fn key(job: &GameCacheJob, partial_file_resume: bool) -> String {
        throughput_key(
            &job.entry.cache_root,
            DensityBin::of(job.entry.install_files, job.entry.install_size),
            job.options.throttle,
            partial_file_resume,
        )
    }

    /// Fold the current segment's speed into the throughput table
    fn record_segment(&self, job: &GameCacheJob, partial_file_resume: bool) -> Option<u64> {
        let mut segment = self.segment.lock().unwrap_or_else(PoisonError::into_inner);
        let copied = job.stats.total_bytes_copied();
        let start_bytes = segment.start_bytes.unwrap_or(copied);
        let secs = segment.started.elapsed().as_secs_f64();
        segment.started = Instant::now();
        segment.start_bytes = Some(copied);

        if secs < 1.0 || copied <= start_bytes {
            return None;
        }
        let sample = ((copied - start_bytes) as f64 / secs) as u64;
        let key = Self::key(job, partial_file_resume);
        let average = self.inner.lock().throughput.record(&key, sample);
        debug!("{}: throughput {} B/s, average {} for {}", job.entry.id, sample, average, key);
        Some(average)
    }
}

impl JobObserver for ManagerObserver {
    fn stats_updated(&self, job: &GameCacheJob) -> Admission {
        {
            let mut segment = self.segment.lock().unwrap_or_else(PoisonError::into_inner);
            if segment.start_bytes.is_none() {
                segment.start_bytes = Some(job.stats.total_bytes_copied());
                segment.started = Instant::now();
            }
        }

        let root = {
            let mut state = self.inner.lock();
            if let Some(entry) = state.entries.get_mut(&job.entry.id) {
                entry.state = job.entry.state;
                entry.cache_size = job.stats.bytes_copied;
                entry.cache_size_on_disk = job.stats.total_bytes_copied();
            }
            state.roots.get(&job.entry.cache_root).cloned()
        };

        let _ = self.events.send(JobEvent::StatsUpdated(job.stats.clone()));

        let Some(root) = root else {
            return Admission::Continue;
        };
        match root.available_space_for_caches(self.inner.copier.space_probe().as_ref()) {
            Ok(available) => {
                if will_fit(available, job.entry.install_size, job.stats.total_bytes_copied()) {
                    Admission::Continue
                } else {
                    info!(
                        "{}: {} bytes left for caches on {}, not enough to finish",
                        job.entry.id,
                        available,
                        root.directory.display()
                    );
                    Admission::OutOfSpace
                }
            }
            Err(e) => {
                warn!("{}: could not check free space: {}", job.entry.id, e);
                Admission::Continue
            }
        }
    }

    fn mode_changed(&self, job: &mut GameCacheJob) {
        let new_mode = job.stats.partial_file_resume;
        self.record_segment(job, !new_mode);

        let estimate = self.inner.lock().throughput.get(&Self::key(job, new_mode));
        if let Some(estimate) = estimate {
            job.stats.avg_bytes_per_sec = estimate;
        }
        let _ = self.events.send(JobEvent::ModeChanged {
            partial_file_resume: new_mode,
        });
    }
}

impl CacheManager {
    /// Start copying an entry's install into its cache
    ///
    /// Unknown ids and entries with a populate job already running are
    /// rejected here without starting anything. Everything else is
    /// reported on the returned handle: an entry already `Populated` or
    /// `Played` finishes at once, an `Unknown` one is analyzed first, an
    /// `Empty` one is copied fresh and an `InProgress` one is resumed.
    pub fn start_populate_job(&self, id: &str, options: JobOptions) -> GameCacheResult<JobHandle> {
        let (entry, token) = {
            let mut state = self.inner.lock();
            let entry = state.entry(id)?.clone();
            state.ensure_idle(id)?;
            let token = CancellationToken::new();
            state.populate_jobs.insert(id.to_string(), token.clone());
            (entry, token)
        };

        let mut job = GameCacheJob::new(JobKind::Populate, entry, options);
        job.token = token.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = JobHandle {
            entry_id: id.to_string(),
            job_id: job.id,
            kind: JobKind::Populate,
            token,
            events: rx,
        };

        info!("{}: starting populate job {}", id, job.id);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let observer = ManagerObserver::new(Arc::clone(&inner), tx.clone());
            let outcome = run_populate(&inner, &mut job, &observer).await;
            if outcome == Outcome::Done {
                observer.record_segment(&job, job.stats.partial_file_resume);
            }
            settle(&inner, job, outcome, &tx);
        });

        Ok(handle)
    }

    /// Signal the entry's populate job to stop; no-op when none is running
    pub fn cancel_populate_or_resume(&self, id: &str) -> bool {
        match self.inner.lock().populate_jobs.get(id) {
            Some(token) => {
                info!("{}: cancelling populate job", id);
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Start deleting an entry's cache, optionally writing dirty files back first
    pub fn start_evict_job(&self, id: &str, write_back: bool) -> GameCacheResult<JobHandle> {
        let (entry, token) = {
            let mut state = self.inner.lock();
            let entry = state.entry(id)?.clone();
            state.ensure_idle(id)?;
            let token = CancellationToken::new();
            state.evict_jobs.insert(id.to_string(), token.clone());
            (entry, token)
        };

        let mut job = GameCacheJob::new(JobKind::Evict, entry, JobOptions::default());
        job.token = token.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = JobHandle {
            entry_id: id.to_string(),
            job_id: job.id,
            kind: JobKind::Evict,
            token,
            events: rx,
        };

        info!("{}: starting evict job {} (write-back: {})", id, job.id, write_back);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = inner.copier.evict(&mut job, write_back).await;
            settle(&inner, job, outcome, &tx);
        });

        Ok(handle)
    }

    /// Files a no-write-back eviction would lose
    ///
    /// Only `Played` caches can be dirty; any other state reports clean.
    pub async fn check_dirty(&self, id: &str) -> GameCacheResult<DirtyReport> {
        let entry = self.get_entry(id)?;
        if entry.state != GameCacheState::Played {
            debug!("{}: {} caches are never dirty", id, entry.state);
            return Ok(DirtyReport::default());
        }
        self.inner
            .copier
            .check_dirty(&entry, &CancellationToken::new())
            .await
    }

    /// Classify an idle entry's cache by diffing it against the install
    pub async fn analyze_entry(&self, id: &str) -> GameCacheResult<GameCacheState> {
        let mut entry = {
            let state = self.inner.lock();
            state.ensure_idle(id)?;
            state.entry(id)?.clone()
        };

        let result = self
            .inner
            .copier
            .analyze_cache(&mut entry, &CancellationToken::new())
            .await?;

        let mut state = self.inner.lock();
        let stored = state.entry_mut(id)?;
        stored.state = entry.state;
        stored.cache_size = entry.cache_size;
        stored.cache_size_on_disk = entry.cache_size_on_disk;
        Ok(result)
    }
}

async fn run_populate(inner: &Inner, job: &mut GameCacheJob, observer: &ManagerObserver) -> Outcome {
    if let Err(e) = refresh_sizes(job).await {
        warn!("{}: could not measure directories: {}", job.entry.id, e);
        job.fail(&e);
        return Outcome::Cancelled;
    }

    if job.entry.state == GameCacheState::Unknown {
        match inner.copier.analyze_cache(&mut job.entry, &job.token).await {
            Ok(state) => debug!("{}: analysis says {}", job.entry.id, state),
            Err(GameCacheError::Cancelled) => return Outcome::Cancelled,
            Err(e) => {
                warn!("{}: analysis failed: {}", job.entry.id, e);
                job.fail(&e);
                return Outcome::Cancelled;
            }
        }
    }

    let key = ManagerObserver::key(job, job.options.pfr.mode == PfrMode::Enabled);
    let estimate = inner.lock().throughput.get(&key);
    if let Some(estimate) = estimate {
        job.stats.avg_bytes_per_sec = estimate;
    }

    match job.entry.state {
        GameCacheState::Populated | GameCacheState::Played => {
            debug!("{}: already {}, nothing to copy", job.entry.id, job.entry.state);
            job.stats = JobStats {
                files_to_copy: job.entry.install_files,
                bytes_to_copy: job.entry.install_size,
                ..JobStats::default()
            };
            job.stats.force_complete();
            Outcome::Done
        }
        GameCacheState::Empty => inner.copier.populate(job, observer).await,
        GameCacheState::InProgress => inner.copier.resume(job, observer).await,
        state @ (GameCacheState::Invalid | GameCacheState::Unknown) => {
            let err = GameCacheError::invalid_state(&job.entry.id, state, "populate");
            warn!("{}", err);
            job.fail(&err);
            Outcome::Cancelled
        }
    }
}

/// Re-measure install and cache before copying
async fn refresh_sizes(job: &mut GameCacheJob) -> GameCacheResult<()> {
    let install = DirectoryStats::measure_async(&job.entry.install_dir).await?;
    job.entry.install_files = install.files;
    job.entry.install_size = install.bytes;
    job.entry.cache_size_on_disk = DirectoryStats::measure_async(&job.entry.cache_dir())
        .await?
        .bytes;
    Ok(())
}

/// Store the job's entry, deregister the job, then emit its terminal event
fn settle(inner: &Inner, job: GameCacheJob, outcome: Outcome, events: &mpsc::UnboundedSender<JobEvent>) {
    {
        let mut state = inner.lock();
        if let Some(entry) = state.entries.get_mut(&job.entry.id) {
            *entry = job.entry.clone();
        }
        match job.kind {
            JobKind::Populate => state.populate_jobs.remove(&job.entry.id),
            JobKind::Evict => state.evict_jobs.remove(&job.entry.id),
        };
    }

    match outcome {
        Outcome::Done => info!("{}: {} job {} done", job.entry.id, job.kind.as_str(), job.id),
        Outcome::Cancelled => info!(
            "{}: {} job {} cancelled ({})",
            job.entry.id,
            job.kind.as_str(),
            job.id,
            job.cancel_reason()
        ),
    }

    let event = match outcome {
        Outcome::Done => JobEvent::Done(Box::new(job)),
        Outcome::Cancelled => JobEvent::Cancelled(Box::new(job)),
    };
    let _ = events.send(event);
}
