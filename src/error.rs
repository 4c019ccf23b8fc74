//! Error types for gamecache
//!
//! All modules use `GameCacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for gamecache operations
pub type GameCacheResult<T> = Result<T, GameCacheError>;

/// All errors that can occur in gamecache
#[derive(Error, Debug)]
pub enum GameCacheError {
    // Precondition errors
    #[error("Cache root already exists: {0}")]
    RootExists(PathBuf),

    #[error("Cache root not found: {0}")]
    RootNotFound(PathBuf),

    #[error("Cache root {0} still holds cache entries")]
    RootNotEmpty(PathBuf),

    #[error("Cache entry already exists: {0}")]
    EntryExists(String),

    #[error("Cache entry not found: {0}")]
    EntryNotFound(String),

    #[error("Cache directory {dir} is already used by entry {other}")]
    CacheDirCollision { dir: PathBuf, other: String },

    #[error("Cache subdirectory must be a single directory name: {0}")]
    InvalidSubDir(String),

    #[error("A {kind} job is already active for entry {id}")]
    JobActive { kind: &'static str, id: String },

    #[error("Entry {id} is {state}; {operation} is not allowed")]
    InvalidState {
        id: String,
        state: String,
        operation: &'static str,
    },

    // Environment errors
    #[error("Not enough space in {dir}: need {needed} bytes, {available} available")]
    InsufficientSpace {
        dir: PathBuf,
        needed: u64,
        available: u64,
    },

    #[error("Directory is not accessible: {path}: {reason}")]
    Inaccessible { path: PathBuf, reason: String },

    #[error("Copy tool not found: {0}")]
    ToolNotFound(String),

    // Tool execution errors
    #[error("Copy tool exited with code {code}")]
    ToolExitCode { code: i32 },

    #[error("Unexpected copy tool output: {0}")]
    UnexpectedOutput(String),

    #[error("Destination disk is full")]
    DiskFull,

    #[error("Copy tool produced no output for {secs}s and was terminated")]
    ToolStalled { secs: u64 },

    #[error("Job was cancelled")]
    Cancelled,

    #[error("{kind} job for {id} stopped: {reason}")]
    JobStopped {
        kind: &'static str,
        id: String,
        reason: String,
    },

    #[error("Cannot resume {file}: {on_disk} bytes recorded on disk exceed its size of {size} bytes")]
    ResumeMismatch { file: String, on_disk: u64, size: u64 },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk {path}: {reason}")]
    Walk { path: PathBuf, reason: String },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GameCacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(
        id: impl Into<String>,
        state: impl ToString,
        operation: &'static str,
    ) -> Self {
        Self::InvalidState {
            id: id.into(),
            state: state.to_string(),
            operation,
        }
    }

    /// Whether the error is a caller mistake rather than an environment or tool failure
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::RootExists(_)
                | Self::RootNotFound(_)
                | Self::RootNotEmpty(_)
                | Self::EntryExists(_)
                | Self::EntryNotFound(_)
                | Self::CacheDirCollision { .. }
                | Self::InvalidSubDir(_)
                | Self::JobActive { .. }
                | Self::InvalidState { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::RootNotEmpty(_) => Some("Remove or evict its entries first"),
            Self::InsufficientSpace { .. } => {
                Some("Free up space or raise the root's max fill level")
            }
            Self::ToolNotFound(_) => Some("Set copier.program in config.toml"),
            Self::InvalidSubDir(_) => Some("Pass a plain name; it is created inside the cache root"),
            Self::InvalidState { .. } => Some("Run: gamecache entry analyze <id>"),
            Self::ResumeMismatch { .. } => Some("Evict the cache and populate it again"),
            Self::JobStopped { kind: "populate", .. } => {
                Some("Run populate again to resume where it stopped")
            }
            _ => None,
        }
    }
}
