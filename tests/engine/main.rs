//! Engine tests: cache manager and copier against an in-process copy tool

mod fake_tool;

use fake_tool::{FakeTool, FixedSpace};
use gamecache::cache::{CacheEntry, DeviceSpace, GameCacheState, Registry};
use gamecache::copier::{
    Copier, CopierSettings, GameCacheJob, JobEvent, JobOptions, PartialFileResumeOpts, PfrMode,
    ToolMode,
};
use gamecache::error::GameCacheError;
use gamecache::manager::{CacheManager, JobHandle, NewEntry};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

const GB: u64 = 1024 * 1024 * 1024;
const LIMIT: Duration = Duration::from_secs(20);

fn settings() -> CopierSettings {
    CopierSettings {
        success_exit_max: 3,
        watchdog: None,
        stats_interval: Duration::ZERO,
    }
}

fn plenty() -> DeviceSpace {
    DeviceSpace {
        free: 500 * GB,
        total: 1000 * GB,
    }
}

/// Non-zero bytes, so a preallocated stub never matches real content
fn content(seed: usize, len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + seed) % 251) as u8 + 1).collect()
}

struct Rig {
    temp: TempDir,
    tool: Arc<FakeTool>,
    manager: CacheManager,
    root: PathBuf,
}

impl Rig {
    async fn new() -> Self {
        Self::with(settings(), plenty(), 90.0).await
    }

    async fn with(settings: CopierSettings, space: DeviceSpace, max_fill: f64) -> Self {
        let temp = TempDir::new().unwrap();
        let tool = FakeTool::new();
        let manager = manager(&tool, settings, space);
        let root = temp.path().join("fast");
        manager.add_cache_root(&root, max_fill).await.unwrap();
        Self {
            temp,
            tool,
            manager,
            root,
        }
    }

    fn install_dir(&self, id: &str) -> PathBuf {
        self.temp.path().join("nas").join(id)
    }

    /// Write an install tree and register it
    async fn add_game(&self, id: &str, files: &[(&str, usize)]) -> CacheEntry {
        let install = self.install_dir(id);
        for (seed, (name, len)) in files.iter().enumerate() {
            let path = install.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content(seed, *len)).unwrap();
        }
        self.manager
            .add_cache_entry(NewEntry {
                id: id.to_string(),
                title: format!("Game {}", id),
                install_dir: install,
                cache_root: self.root.clone(),
                ..NewEntry::default()
            })
            .await
            .unwrap()
    }

    fn cache_dir(&self, id: &str) -> PathBuf {
        self.manager.get_entry(id).unwrap().cache_dir()
    }

    fn assert_mirrored(&self, id: &str) {
        let install = self.install_dir(id);
        let cache = self.cache_dir(id);
        for entry in walkdir::WalkDir::new(&install) {
            let entry = entry.unwrap();
            if entry.file_type().is_file() {
                let rel = entry.path().strip_prefix(&install).unwrap();
                assert_eq!(
                    fs::read(entry.path()).unwrap(),
                    fs::read(cache.join(rel)).unwrap(),
                    "{} differs",
                    rel.display()
                );
            }
        }
    }

    async fn populate(&self, id: &str, options: JobOptions) -> (Vec<JobEvent>, JobEvent) {
        drain(self.manager.start_populate_job(id, options).unwrap()).await
    }

    /// Start a populate job that hangs after `lines` lines, then cancel it
    async fn populate_and_cancel_after(
        &self,
        id: &str,
        options: JobOptions,
        lines: usize,
    ) -> Box<GameCacheJob> {
        self.tool.script(|s| s.hang_after = Some(lines));
        let handle = self.manager.start_populate_job(id, options).unwrap();
        tokio::time::timeout(LIMIT, self.tool.wait_hung()).await.unwrap();
        handle.cancel();
        let (_, terminal) = drain(handle).await;
        self.tool.script(|s| s.hang_after = None);
        cancelled(terminal)
    }
}

fn manager(tool: &Arc<FakeTool>, settings: CopierSettings, space: DeviceSpace) -> CacheManager {
    CacheManager::new(Copier::new(
        tool.clone(),
        Arc::new(FixedSpace(space)),
        settings,
    ))
}

/// Collect a job's events up to its terminal one
async fn drain(mut handle: JobHandle) -> (Vec<JobEvent>, JobEvent) {
    tokio::time::timeout(LIMIT, async move {
        let mut seen = Vec::new();
        while let Some(event) = handle.next_event().await {
            if event.is_terminal() {
                return (seen, event);
            }
            seen.push(event);
        }
        panic!("job ended without a terminal event");
    })
    .await
    .expect("job did not finish in time")
}

fn done(event: JobEvent) -> Box<GameCacheJob> {
    match event {
        JobEvent::Done(job) => job,
        other => panic!("expected Done, got {:?}", other),
    }
}

fn cancelled(event: JobEvent) -> Box<GameCacheJob> {
    match event {
        JobEvent::Cancelled(job) => job,
        other => panic!("expected Cancelled, got {:?}", other),
    }
}

fn markers(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with(".gamecache."))
        .collect();
    names.sort();
    names
}

fn pfr(mode: PfrMode) -> JobOptions {
    JobOptions {
        throttle: 0,
        pfr: PartialFileResumeOpts {
            mode,
            ..PartialFileResumeOpts::default()
        },
    }
}

const THREE_FILES: &[(&str, usize)] = &[("a.bin", 4096), ("b.bin", 4096), ("c.bin", 4096)];

// Lines for a.bin (size, 25/50/75/100%) then b.bin's size, 25% and 50%
const MID_SECOND_FILE: usize = 8;

mod populate {
    use super::*;

    #[tokio::test]
    async fn fresh_copy_mirrors_install() {
        let rig = Rig::new().await;
        rig.add_game("1", &[("game.exe", 1000), ("base/data.pak", 9000)])
            .await;

        let (events, terminal) = rig.populate("1", JobOptions::default()).await;
        let job = done(terminal);

        assert_eq!(job.entry.state, GameCacheState::Populated);
        assert_eq!(job.stats.files_copied, 2);
        assert_eq!(job.entry.cache_size, 10_000);
        rig.assert_mirrored("1");
        assert_eq!(markers(&rig.cache_dir("1")), vec![".gamecache.Populated"]);

        let stats: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                JobEvent::StatsUpdated(stats) => Some(stats),
                _ => None,
            })
            .collect();
        assert!(!stats.is_empty());
        assert!(stats.windows(2).all(|w| w[0].total_bytes_copied() <= w[1].total_bytes_copied()));

        let stored = rig.manager.get_entry("1").unwrap();
        assert_eq!(stored.state, GameCacheState::Populated);
        assert!(!rig.manager.is_populate_active("1"));
    }

    #[tokio::test]
    async fn populated_entry_finishes_without_copying() {
        let rig = Rig::new().await;
        rig.add_game("1", &[("game.exe", 100)]).await;
        rig.manager
            .set_entry_state("1", GameCacheState::Populated)
            .unwrap();

        let (_, terminal) = rig.populate("1", JobOptions::default()).await;
        let job = done(terminal);
        assert_eq!(job.entry.state, GameCacheState::Populated);
        assert!(rig.tool.requests().is_empty());
    }

    #[tokio::test]
    async fn cancel_then_resume_restarts_partial_file() {
        let rig = Rig::new().await;
        rig.add_game("1", THREE_FILES).await;

        let job = rig
            .populate_and_cancel_after("1", JobOptions::default(), MID_SECOND_FILE)
            .await;
        assert!(!job.cancelled_on_error);
        assert_eq!(job.cancel_reason(), "cancelled");
        assert_eq!(job.entry.state, GameCacheState::InProgress);
        assert_eq!(job.entry.cache_size, 4096);

        let cache = rig.cache_dir("1");
        assert_eq!(markers(&cache), vec![".gamecache.InProgress"]);
        assert!(cache.join("a.bin").exists());
        assert!(!cache.join("b.bin").exists(), "preallocated file left behind");

        let (events, terminal) = rig.populate("1", JobOptions::default()).await;
        let job = done(terminal);
        assert_eq!(job.entry.state, GameCacheState::Populated);
        rig.assert_mirrored("1");

        match events.first() {
            Some(JobEvent::StatsUpdated(stats)) => {
                assert_eq!(stats.files_copied, 1);
                assert_eq!(stats.bytes_copied, 4096);
                assert_eq!(stats.curr_file_name, "b.bin");
                assert_eq!(stats.curr_file_pct, 0.0);
            }
            other => panic!("expected resume point, got {:?}", other),
        }

        let modes: Vec<ToolMode> = rig.tool.requests().iter().map(|r| r.mode).collect();
        assert_eq!(modes, vec![ToolMode::Copy, ToolMode::ListOnly, ToolMode::Copy]);
    }

    #[tokio::test]
    async fn cancel_then_resume_keeps_partial_file() {
        let rig = Rig::new().await;
        rig.add_game("1", THREE_FILES).await;
        let options = pfr(PfrMode::Enabled);

        let job = rig
            .populate_and_cancel_after("1", options.clone(), MID_SECOND_FILE)
            .await;
        assert_eq!(job.entry.state, GameCacheState::InProgress);
        assert_eq!(job.entry.cache_size, 4096);
        assert_eq!(job.entry.cache_size_on_disk, 4096 + 2048);
        let partial = rig.cache_dir("1").join("b.bin");
        assert_eq!(fs::metadata(&partial).unwrap().len(), 2048);

        let (events, terminal) = rig.populate("1", options).await;
        let job = done(terminal);
        assert_eq!(job.entry.state, GameCacheState::Populated);
        rig.assert_mirrored("1");

        match events.first() {
            Some(JobEvent::StatsUpdated(stats)) => {
                assert_eq!(stats.curr_file_name, "b.bin");
                assert_eq!(stats.curr_file_pct, 50.0);
                assert_eq!(stats.resume_bytes, 2048);
                assert!(stats.partial_file_resume);
            }
            other => panic!("expected resume point, got {:?}", other),
        }
        assert_eq!(rig.tool.copy_modes(), vec![true, true]);
    }

    #[tokio::test]
    async fn threshold_mode_switches_per_file() {
        let rig = Rig::new().await;
        rig.add_game("1", &[("a.bin", 1000), ("b.bin", 8000), ("c.bin", 1000)])
            .await;
        let options = JobOptions {
            throttle: 0,
            pfr: PartialFileResumeOpts {
                mode: PfrMode::Threshold,
                file_size_threshold: 4000,
                switch_on_the_fly: true,
            },
        };

        let (events, terminal) = rig.populate("1", options).await;
        let job = done(terminal);
        assert_eq!(job.stats.files_copied, 3);
        rig.assert_mirrored("1");

        let switches: Vec<bool> = events
            .iter()
            .filter_map(|e| match e {
                JobEvent::ModeChanged {
                    partial_file_resume,
                } => Some(*partial_file_resume),
                _ => None,
            })
            .collect();
        assert_eq!(switches, vec![true, false]);
        assert_eq!(rig.tool.copy_modes(), vec![false, true, false]);
    }

    #[tokio::test]
    async fn bad_exit_code_leaves_cache_unknown() {
        let rig = Rig::new().await;
        rig.add_game("1", THREE_FILES).await;
        rig.tool.script(|s| s.copy_exit = 8);

        let (_, terminal) = rig.populate("1", JobOptions::default()).await;
        let job = cancelled(terminal);

        assert!(job.cancelled_on_error);
        assert!(job.error_log.iter().any(|e| e.contains("exited with code 8")));
        assert_eq!(job.entry.state, GameCacheState::Unknown);
        assert!(markers(&rig.cache_dir("1")).is_empty());
        assert_eq!(
            rig.manager.get_entry("1").unwrap().state,
            GameCacheState::Unknown
        );
    }

    #[tokio::test]
    async fn unknown_cache_is_analyzed_then_resumed() {
        let rig = Rig::new().await;
        let install = rig.install_dir("1");
        fs::create_dir_all(&install).unwrap();
        for (seed, name) in ["a.bin", "b.bin", "c.bin"].iter().enumerate() {
            fs::write(install.join(name), content(seed, 4096)).unwrap();
        }
        let cache = rig.root.join("Game 1");
        fs::create_dir_all(&cache).unwrap();
        fs::copy(install.join("a.bin"), cache.join("a.bin")).unwrap();
        fs::copy(install.join("b.bin"), cache.join("b.bin")).unwrap();

        let entry = rig
            .manager
            .add_cache_entry(NewEntry {
                id: "1".to_string(),
                title: "Game 1".to_string(),
                install_dir: install,
                cache_root: rig.root.clone(),
                ..NewEntry::default()
            })
            .await
            .unwrap();
        assert_eq!(entry.state, GameCacheState::Unknown);

        let (_, terminal) = rig.populate("1", JobOptions::default()).await;
        let job = done(terminal);
        assert_eq!(job.entry.state, GameCacheState::Populated);
        rig.assert_mirrored("1");

        let modes: Vec<ToolMode> = rig.tool.requests().iter().map(|r| r.mode).collect();
        assert_eq!(modes, vec![ToolMode::Analyze, ToolMode::ListOnly, ToolMode::Copy]);
    }

    #[tokio::test]
    async fn second_job_is_rejected_while_active() {
        let rig = Rig::new().await;
        rig.add_game("1", THREE_FILES).await;
        rig.tool.script(|s| s.hang_after = Some(3));

        let handle = rig
            .manager
            .start_populate_job("1", JobOptions::default())
            .unwrap();
        tokio::time::timeout(LIMIT, rig.tool.wait_hung()).await.unwrap();

        assert!(rig.manager.is_populate_active("1"));
        assert!(matches!(
            rig.manager.start_populate_job("1", JobOptions::default()),
            Err(GameCacheError::JobActive { .. })
        ));
        assert!(matches!(
            rig.manager.start_evict_job("1", false),
            Err(GameCacheError::JobActive { .. })
        ));
        assert!(matches!(
            rig.manager.set_entry_state("1", GameCacheState::Played),
            Err(GameCacheError::JobActive { .. })
        ));

        assert!(rig.manager.cancel_populate_or_resume("1"));
        let (_, terminal) = drain(handle).await;
        cancelled(terminal);
        assert!(!rig.manager.is_populate_active("1"));
        assert!(!rig.manager.cancel_populate_or_resume("1"));
    }

    #[tokio::test]
    async fn unknown_entry_is_rejected() {
        let rig = Rig::new().await;
        assert!(matches!(
            rig.manager.start_populate_job("nope", JobOptions::default()),
            Err(GameCacheError::EntryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn max_fill_level_stops_copy() {
        let space = DeviceSpace {
            free: 15_000,
            total: 100_000,
        };
        // 95% of 100 000 leaves 10 000 bytes for caches, short of 12 288
        let rig = Rig::with(settings(), space, 95.0).await;
        rig.add_game("1", THREE_FILES).await;
        assert!(!rig.manager.entry_will_fit("1").unwrap());

        let (_, terminal) = rig.populate("1", JobOptions::default()).await;
        let job = cancelled(terminal);
        assert!(job.cancelled_on_max_fill);
        assert!(!job.cancelled_on_error);
        assert_eq!(job.cancel_reason(), "max fill level reached");
        assert_eq!(job.entry.state, GameCacheState::InProgress);
    }

    #[tokio::test]
    async fn disk_full_stops_copy() {
        let rig = Rig::new().await;
        rig.add_game("1", THREE_FILES).await;
        rig.tool.script(|s| s.disk_full_at = Some(6));

        let (_, terminal) = rig.populate("1", JobOptions::default()).await;
        let job = cancelled(terminal);
        assert!(job.cancelled_on_disk_full);
        assert!(!job.cancelled_on_error);
        assert_eq!(job.error_log.len(), 1);
        assert_eq!(job.entry.state, GameCacheState::InProgress);
        assert_eq!(job.entry.cache_size, 4096);
    }

    #[tokio::test]
    async fn silent_tool_is_stopped_by_watchdog() {
        let settings = CopierSettings {
            watchdog: Some(Duration::from_millis(100)),
            ..settings()
        };
        let rig = Rig::with(settings, plenty(), 90.0).await;
        rig.add_game("1", THREE_FILES).await;
        rig.tool.script(|s| s.hang_after = Some(2));

        let (_, terminal) = rig.populate("1", JobOptions::default()).await;
        let job = cancelled(terminal);
        assert!(job.cancelled_on_error);
        assert!(job.error_log.iter().any(|e| e.contains("no output")));
        assert_eq!(job.entry.state, GameCacheState::InProgress);
    }
}

mod recovery {
    use super::*;

    #[tokio::test]
    async fn registry_roundtrip_resumes_after_restart() {
        let rig = Rig::new().await;
        rig.add_game("1", THREE_FILES).await;
        rig.populate_and_cancel_after("1", JobOptions::default(), MID_SECOND_FILE)
            .await;

        let path = rig.temp.path().join("state/registry.json");
        rig.manager.snapshot().save(&path).await.unwrap();

        let registry = Registry::load(&path).await.unwrap();
        let restarted = CacheManager::from_registry(
            Copier::new(
                rig.tool.clone(),
                Arc::new(FixedSpace(plenty())),
                settings(),
            ),
            registry,
        )
        .await
        .unwrap();

        let entry = restarted.get_entry("1").unwrap();
        assert_eq!(entry.state, GameCacheState::InProgress);
        assert_eq!(entry.cache_size, 4096);
        assert_eq!(restarted.list_roots().len(), 1);

        let handle = restarted
            .start_populate_job("1", JobOptions::default())
            .unwrap();
        let (_, terminal) = drain(handle).await;
        assert_eq!(done(terminal).entry.state, GameCacheState::Populated);
        rig.assert_mirrored("1");
    }
}

mod evict {
    use super::*;

    /// Populate, mark played, then change one cached file and add a save
    async fn played_rig() -> Rig {
        let rig = Rig::new().await;
        rig.add_game("1", &[("game.exe", 1000), ("base/data.pak", 3000)])
            .await;
        let (_, terminal) = rig.populate("1", JobOptions::default()).await;
        done(terminal);
        rig.manager
            .set_entry_state("1", GameCacheState::Played)
            .unwrap();

        let cache = rig.cache_dir("1");
        let edited = cache.join("base/data.pak");
        fs::write(&edited, content(99, 3000)).unwrap();
        fs::File::options()
            .write(true)
            .open(&edited)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(3600))
            .unwrap();
        fs::write(cache.join("save.dat"), content(7, 64)).unwrap();
        rig
    }

    #[tokio::test]
    async fn dirty_check_reports_new_and_newer_files() {
        let rig = played_rig().await;

        let report = rig.manager.check_dirty("1").await.unwrap();
        let mut names: Vec<&str> = report.files.iter().map(|f| f.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["base/data.pak", "save.dat"]);
        assert_eq!(report.bytes(), 3064);
    }

    #[tokio::test]
    async fn populated_cache_is_never_dirty() {
        let rig = Rig::new().await;
        rig.add_game("1", &[("game.exe", 1000)]).await;
        let (_, terminal) = rig.populate("1", JobOptions::default()).await;
        done(terminal);

        let report = rig.manager.check_dirty("1").await.unwrap();
        assert!(!report.is_dirty());
    }

    #[tokio::test]
    async fn evict_with_write_back_keeps_changes() {
        let rig = played_rig().await;
        let cache = rig.cache_dir("1");

        let handle = rig.manager.start_evict_job("1", true).unwrap();
        let (_, terminal) = drain(handle).await;
        let job = done(terminal);

        assert_eq!(job.entry.state, GameCacheState::Empty);
        assert!(!cache.exists());
        let install = rig.install_dir("1");
        assert_eq!(
            fs::read(install.join("base/data.pak")).unwrap(),
            content(99, 3000)
        );
        assert!(install.join("save.dat").exists());
        assert_eq!(
            rig.manager.get_entry("1").unwrap().state,
            GameCacheState::Empty
        );
    }

    #[tokio::test]
    async fn evict_without_write_back_discards_changes() {
        let rig = played_rig().await;

        let handle = rig.manager.start_evict_job("1", false).unwrap();
        let (_, terminal) = drain(handle).await;
        done(terminal);

        let install = rig.install_dir("1");
        assert!(!install.join("save.dat").exists());
        assert_eq!(fs::read(install.join("base/data.pak")).unwrap(), content(1, 3000));
        assert!(!rig.cache_dir("1").exists());
    }
}
