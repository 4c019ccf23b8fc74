//! In-process copy tool that really mirrors directories
//!
//! Speaks the same line grammar as the command-line tool: `<size> <name>`
//! when a file starts, quarter-step percentages while it is written and
//! `100%` when it is done. Files go out in relative-path order. In
//! standard mode a file is preallocated to full size before any data
//! lands; in resume mode an existing partial file is continued.

use async_trait::async_trait;
use gamecache::cache::{DeviceSpace, SpaceProbe};
use gamecache::copier::{CopyTool, ToolMode, ToolProcess, ToolRequest};
use gamecache::error::{GameCacheError, GameCacheResult};
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use walkdir::WalkDir;

/// How the next copy processes misbehave
#[derive(Debug, Clone)]
pub struct Script {
    /// Stop producing output after this many lines
    pub hang_after: Option<usize>,
    /// Report a full disk as this line
    pub disk_full_at: Option<usize>,
    /// Exit code of copy processes
    pub copy_exit: i32,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            hang_after: None,
            disk_full_at: None,
            copy_exit: 1,
        }
    }
}

#[derive(Default)]
pub struct FakeTool {
    script: Mutex<Script>,
    requests: Mutex<Vec<ToolRequest>>,
    hung: Arc<Notify>,
}

impl FakeTool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, change: impl FnOnce(&mut Script)) {
        change(&mut self.script.lock().unwrap());
    }

    pub fn requests(&self) -> Vec<ToolRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Partial-file-resume flag of every copy request so far
    pub fn copy_modes(&self) -> Vec<bool> {
        self.requests()
            .iter()
            .filter(|r| r.mode == ToolMode::Copy)
            .map(|r| r.partial_file_resume)
            .collect()
    }

    /// Resolves once a process has stopped producing output
    pub async fn wait_hung(&self) {
        self.hung.notified().await;
    }
}

#[async_trait]
impl CopyTool for FakeTool {
    async fn spawn(&self, request: &ToolRequest) -> GameCacheResult<Box<dyn ToolProcess>> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self.script.lock().unwrap().clone();

        let planned = match request.mode {
            ToolMode::Copy => plan_copy(request),
            ToolMode::ListOnly => plan_list(request),
            ToolMode::Analyze => plan_analyze(request),
        };
        let steps = planned.map_err(|e| GameCacheError::io("planning fake copy", e))?;

        let copying = request.mode == ToolMode::Copy;
        Ok(Box::new(FakeProcess {
            hung: Arc::clone(&self.hung),
            exit_code: if copying { script.copy_exit } else { 1 },
            hang_after: if copying { script.hang_after } else { None },
            disk_full_at: if copying { script.disk_full_at } else { None },
            steps,
            emitted: 0,
        }))
    }
}

enum Action {
    Say,
    Preallocate { dest: PathBuf, size: u64 },
    Open { dest: PathBuf },
    Write {
        source: PathBuf,
        dest: PathBuf,
        from: u64,
        to: u64,
        finish: bool,
    },
}

struct Step {
    action: Action,
    line: String,
}

impl Step {
    fn say(line: String) -> Self {
        Self {
            action: Action::Say,
            line,
        }
    }
}

struct FakeProcess {
    hung: Arc<Notify>,
    steps: VecDeque<Step>,
    emitted: usize,
    hang_after: Option<usize>,
    disk_full_at: Option<usize>,
    exit_code: i32,
}

#[async_trait]
impl ToolProcess for FakeProcess {
    async fn next_line(&mut self) -> GameCacheResult<Option<String>> {
        if self.hang_after == Some(self.emitted) {
            self.hung.notify_one();
            std::future::pending::<()>().await;
        }

        if self.disk_full_at == Some(self.emitted) {
            self.emitted += 1;
            self.hang_after = Some(self.emitted);
            return Ok(Some(
                "ERROR 112 (0x00000070) Copying File. There is not enough space on the disk."
                    .to_string(),
            ));
        }

        let Some(step) = self.steps.pop_front() else {
            return Ok(None);
        };
        perform(&step.action).map_err(|e| GameCacheError::io("fake copy", e))?;
        self.emitted += 1;
        Ok(Some(step.line))
    }

    async fn kill(&mut self) -> GameCacheResult<()> {
        self.steps.clear();
        Ok(())
    }

    async fn wait(&mut self) -> GameCacheResult<i32> {
        Ok(self.exit_code)
    }
}

/// Fixed capacity figures for every path
pub struct FixedSpace(pub DeviceSpace);

impl SpaceProbe for FixedSpace {
    fn device_space(&self, _path: &Path) -> GameCacheResult<DeviceSpace> {
        Ok(self.0)
    }
}

fn is_marker(rel: &Path) -> bool {
    rel.file_name()
        .map(|n| n.to_string_lossy().starts_with(".gamecache."))
        .unwrap_or(false)
}

/// Relative paths of the files under `root`, sorted
fn files(root: &Path) -> io::Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(io::Error::other)?
            .to_path_buf();
        if !is_marker(&rel) {
            found.push(rel);
        }
    }
    found.sort();
    Ok(found)
}

fn same_content(a: &Path, b: &Path) -> io::Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }
    Ok(fs::read(a)? == fs::read(b)?)
}

fn needs_copy(source: &Path, dest: &Path, exclude_older: bool) -> io::Result<bool> {
    if !dest.exists() {
        return Ok(true);
    }
    if exclude_older && fs::metadata(dest)?.modified()? > fs::metadata(source)?.modified()? {
        return Ok(false);
    }
    Ok(!same_content(source, dest)?)
}

fn display(rel: &Path) -> String {
    rel.to_string_lossy().into_owned()
}

fn plan_copy(request: &ToolRequest) -> io::Result<VecDeque<Step>> {
    let mut steps = VecDeque::new();
    for rel in files(&request.source)? {
        let source = request.source.join(&rel);
        let dest = request.dest.join(&rel);
        if !needs_copy(&source, &dest, request.exclude_older)? {
            continue;
        }

        let size = fs::metadata(&source)?.len();
        let header = format!("{} {}", size, display(&rel));
        let mut from = if request.partial_file_resume {
            let have = fs::metadata(&dest).map(|m| m.len()).unwrap_or(0);
            steps.push_back(Step {
                action: Action::Open { dest: dest.clone() },
                line: header,
            });
            have.min(size)
        } else {
            steps.push_back(Step {
                action: Action::Preallocate {
                    dest: dest.clone(),
                    size,
                },
                line: header,
            });
            0
        };

        for quarter in 1..=3u64 {
            let to = size * quarter / 4;
            if to > from {
                steps.push_back(Step {
                    action: Action::Write {
                        source: source.clone(),
                        dest: dest.clone(),
                        from,
                        to,
                        finish: false,
                    },
                    line: format!("{}%", quarter * 25),
                });
                from = to;
            }
        }
        steps.push_back(Step {
            action: Action::Write {
                source,
                dest,
                from,
                to: size,
                finish: true,
            },
            line: "100%".to_string(),
        });
    }
    Ok(steps)
}

fn plan_list(request: &ToolRequest) -> io::Result<VecDeque<Step>> {
    let mut steps = VecDeque::new();
    for rel in files(&request.source)? {
        let source = request.source.join(&rel);
        if needs_copy(&source, &request.dest.join(&rel), false)? {
            let size = fs::metadata(&source)?.len();
            steps.push_back(Step::say(format!("{} {}", size, display(&rel))));
        }
    }
    Ok(steps)
}

fn plan_analyze(request: &ToolRequest) -> io::Result<VecDeque<Step>> {
    let mut steps = VecDeque::new();
    let source_files = files(&request.source)?;

    for rel in &source_files {
        let source = request.source.join(rel);
        let dest = request.dest.join(rel);
        let size = fs::metadata(&source)?.len();

        let class = if !dest.exists() {
            "New File"
        } else if same_content(&source, &dest)? {
            continue;
        } else {
            let source_time = fs::metadata(&source)?.modified()?;
            let dest_time = fs::metadata(&dest)?.modified()?;
            if source_time > dest_time {
                "Newer"
            } else if source_time < dest_time {
                "Older"
            } else {
                "Changed"
            }
        };
        steps.push_back(Step::say(format!("\t{}\t\t{}\t{}", class, size, display(rel))));
    }

    for rel in files(&request.dest)? {
        if !source_files.contains(&rel) {
            let size = fs::metadata(request.dest.join(&rel))?.len();
            steps.push_back(Step::say(format!("\t*EXTRA File\t\t{}\t{}", size, display(&rel))));
        }
    }
    Ok(steps)
}

fn perform(action: &Action) -> io::Result<()> {
    match action {
        Action::Say => Ok(()),
        Action::Preallocate { dest, size } => {
            create_parent(dest)?;
            File::create(dest)?.set_len(*size)
        }
        Action::Open { dest } => {
            create_parent(dest)?;
            File::options().create(true).write(true).truncate(false).open(dest)?;
            Ok(())
        }
        Action::Write {
            source,
            dest,
            from,
            to,
            finish,
        } => {
            let data = fs::read(source)?;
            let mut file = File::options().write(true).open(dest)?;
            file.seek(SeekFrom::Start(*from))?;
            file.write_all(&data[*from as usize..*to as usize])?;
            if *finish {
                file.set_modified(fs::metadata(source)?.modified()?)?;
            }
            Ok(())
        }
    }
}

fn create_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}
