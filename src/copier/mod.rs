//! Copy tool driver
//!
//! - `classify`: stateless parsing of the tool's output lines
//! - `tool`: spawning the tool and reading its output
//! - `job`: jobs, options and live stats
//! - `driver`: populate/resume/diff/evict protocols

pub mod classify;
pub mod driver;
pub mod job;
pub mod tool;

pub use classify::{classify_copy_line, classify_diff_line, CopyLine, DiffLine, FileReport};
pub use driver::{
    Admission, Copier, CopierSettings, DiffReport, DirtyReport, JobObserver, NoopObserver, Outcome,
};
pub use job::{
    GameCacheJob, JobEvent, JobKind, JobOptions, JobStats, PartialFileResumeOpts, PfrMode,
};
pub use tool::{CommandCopyTool, CopyTool, ToolMode, ToolProcess, ToolRequest};
