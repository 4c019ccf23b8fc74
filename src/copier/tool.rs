//! External copy tool abstraction and the command-line implementation

use crate::cache::state::MARKER_NAMESPACE;
use crate::error::{GameCacheError, GameCacheResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

/// What the tool is asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMode {
    /// Copy missing and changed files
    Copy,
    /// Report the files a copy would transfer, without copying
    ListOnly,
    /// Report every difference with its class (extra/new/newer/older)
    Analyze,
}

/// One invocation of the copy tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequest {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub mode: ToolMode,
    /// Inter-packet gap in milliseconds; 0 disables throttling
    pub throttle: u32,
    /// Keep partially copied files and resume them in place
    pub partial_file_resume: bool,
    /// Skip files whose destination copy is newer
    pub exclude_older: bool,
}

impl ToolRequest {
    /// Copy `source` into `dest`
    pub fn copy(source: &Path, dest: &Path, throttle: u32, partial_file_resume: bool) -> Self {
        Self {
            source: source.to_path_buf(),
            dest: dest.to_path_buf(),
            mode: ToolMode::Copy,
            throttle,
            partial_file_resume,
            exclude_older: false,
        }
    }

    /// List what copying `source` into `dest` would transfer
    pub fn list(source: &Path, dest: &Path) -> Self {
        Self {
            mode: ToolMode::ListOnly,
            ..Self::copy(source, dest, 0, false)
        }
    }

    /// Compare `source` against `dest`
    pub fn analyze(source: &Path, dest: &Path) -> Self {
        Self {
            mode: ToolMode::Analyze,
            ..Self::copy(source, dest, 0, false)
        }
    }

    /// Copy back newer files only, never overwriting a newer destination
    pub fn write_back(source: &Path, dest: &Path) -> Self {
        Self {
            exclude_older: true,
            ..Self::copy(source, dest, 0, false)
        }
    }
}

/// A running tool process
#[async_trait]
pub trait ToolProcess: Send {
    /// Next line of output, `None` once output is exhausted
    ///
    /// Must be cancel-safe: dropping the future loses no output.
    async fn next_line(&mut self) -> GameCacheResult<Option<String>>;

    /// Terminate the process and reap it
    async fn kill(&mut self) -> GameCacheResult<()>;

    /// Wait for exit and return the exit code
    async fn wait(&mut self) -> GameCacheResult<i32>;
}

/// Something that can start copy tool processes
#[async_trait]
pub trait CopyTool: Send + Sync {
    async fn spawn(&self, request: &ToolRequest) -> GameCacheResult<Box<dyn ToolProcess>>;
}

/// Copy tool driven through a robocopy-compatible command line
#[derive(Debug, Clone)]
pub struct CommandCopyTool {
    program: String,
}

impl CommandCopyTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Command-line arguments for `request`
    pub fn args(request: &ToolRequest) -> Vec<String> {
        let mut args = vec![
            request.source.display().to_string(),
            request.dest.display().to_string(),
            "*.*".to_string(),
            "/E".to_string(),
            "/NDL".to_string(),
            "/NJH".to_string(),
            "/NJS".to_string(),
            "/BYTES".to_string(),
            "/FP".to_string(),
        ];

        match request.mode {
            ToolMode::Copy => {
                args.extend(["/NC", "/XX"].map(String::from));
                if request.throttle > 0 {
                    args.push(format!("/IPG:{}", request.throttle));
                }
                if request.partial_file_resume {
                    args.push("/Z".to_string());
                }
                if request.exclude_older {
                    args.push("/XO".to_string());
                }
            }
            ToolMode::ListOnly => args.extend(["/L", "/NC", "/NP", "/XX"].map(String::from)),
            ToolMode::Analyze => args.extend(["/L", "/NP"].map(String::from)),
        }

        args.push("/XF".to_string());
        args.push(format!(".{}.*", MARKER_NAMESPACE));
        args
    }
}

impl Default for CommandCopyTool {
    fn default() -> Self {
        Self::new("robocopy")
    }
}

#[async_trait]
impl CopyTool for CommandCopyTool {
    async fn spawn(&self, request: &ToolRequest) -> GameCacheResult<Box<dyn ToolProcess>> {
        let args = Self::args(request);
        debug!("Spawning {} {}", self.program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => GameCacheError::ToolNotFound(self.program.clone()),
                _ => GameCacheError::command_failed(&self.program, e),
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GameCacheError::Internal("copy tool stdout not piped".to_string()))?;

        // The tool reports on stdout; stderr is only worth a log line.
        if let Some(stderr) = child.stderr.take() {
            let program = self.program.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!("{}: {}", program, line);
                }
            });
        }

        Ok(Box::new(CommandProcess {
            child,
            stdout: BufReader::new(stdout),
            buffer: Vec::new(),
            after_cr: false,
        }))
    }
}

struct CommandProcess {
    child: Child,
    stdout: BufReader<ChildStdout>,
    /// Bytes of a line not yet terminated; kept across cancelled reads
    buffer: Vec<u8>,
    /// Last line ended in `\r`, so a following `\n` belongs to it
    after_cr: bool,
}

impl CommandProcess {
    fn take_line(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        line
    }
}

#[async_trait]
impl ToolProcess for CommandProcess {
    /// Lines end at `\n`, `\r` or `\r\n`. Progress ticks are separated by
    /// bare carriage returns and must surface while the file is still copying.
    async fn next_line(&mut self) -> GameCacheResult<Option<String>> {
        loop {
            let available = self
                .stdout
                .fill_buf()
                .await
                .map_err(|e| GameCacheError::io("reading copy tool output", e))?;
            if available.is_empty() {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.take_line()));
            }

            if self.after_cr && available[0] == b'\n' {
                self.after_cr = false;
                self.stdout.consume(1);
                continue;
            }
            self.after_cr = false;

            match available.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(end) => {
                    self.after_cr = available[end] == b'\r';
                    self.buffer.extend_from_slice(&available[..end]);
                    self.stdout.consume(end + 1);
                    return Ok(Some(self.take_line()));
                }
                None => {
                    let len = available.len();
                    self.buffer.extend_from_slice(available);
                    self.stdout.consume(len);
                }
            }
        }
    }

    async fn kill(&mut self) -> GameCacheResult<()> {
        match self.child.kill().await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(GameCacheError::io("killing copy tool", e)),
        }
    }

    async fn wait(&mut self) -> GameCacheResult<i32> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| GameCacheError::io("waiting for copy tool", e))?;
        Ok(status.code().unwrap_or(-1))
    }
}
