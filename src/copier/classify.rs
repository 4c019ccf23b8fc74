//! Line classifier for the copy tool's output
//!
//! Stateless: every function looks at exactly one line. Anything that does
//! not match the grammar comes back as `Other`, and callers treat `Other`
//! as fatal so a tool whose output changed can never be mistaken for a
//! successful copy.
//!
//! Copy/list grammar (one line each):
//!
//! ```text
//! <blank>
//! <size> <name>           file started (or, in list mode, file missing)
//! <pct>%                  progress within the current file
//! 100%                    current file finished
//! ... ERROR 112 ...       destination disk full
//! ```
//!
//! Analyze grammar adds a class before the size: `*EXTRA File`,
//! `New File`, `Newer` (or `Changed`), `Older`.

use crate::cache::state::is_marker_file;
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::LazyLock;

static SIZE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s+(\S.*?)\s*$").expect("valid regex"));

static PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{1,3}(?:\.\d+)?)%\s*$").expect("valid regex"));

static DISK_FULL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)ERROR 112 \(0x00000070\)|not enough space on the disk|no space left on device")
        .expect("valid regex")
});

static DIFF_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\*EXTRA File|New File|Newer|Changed|Older)\s+(\d+)\s+(\S.*?)\s*$")
        .expect("valid regex")
});

/// A file named in tool output, with its size in bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub size: u64,
    pub name: String,
}

/// Classified line of copy or list-only output
#[derive(Debug, Clone, PartialEq)]
pub enum CopyLine {
    Empty,
    MarkerFile,
    SizeName { size: u64, name: String },
    Progress(f64),
    Progress100,
    DiskFull,
    Other,
}

/// Classified line of analyze output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    Empty,
    MarkerFile,
    /// Present in the destination only
    ExtraFile(FileReport),
    /// Present in the source only
    NewFile(FileReport),
    /// Source copy is newer (or differs) than the destination's
    Newer(FileReport),
    /// Source copy is older than the destination's
    Older(FileReport),
    Other,
}

/// Whether a reported name (possibly a full path) points at a marker file
fn names_marker(name: &str) -> bool {
    let file_name = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    is_marker_file(&file_name)
}

/// Classify one line of copy-mode or list-only output
pub fn classify_copy_line(line: &str) -> CopyLine {
    if line.trim().is_empty() {
        return CopyLine::Empty;
    }

    if let Some(caps) = PERCENT.captures(line) {
        let pct: f64 = caps[1].parse().unwrap_or(-1.0);
        return if pct >= 100.0 {
            CopyLine::Progress100
        } else if pct >= 0.0 {
            CopyLine::Progress(pct)
        } else {
            CopyLine::Other
        };
    }

    if DISK_FULL.is_match(line) {
        return CopyLine::DiskFull;
    }

    if let Some(caps) = SIZE_NAME.captures(line) {
        let name = caps[2].to_string();
        if names_marker(&name) {
            return CopyLine::MarkerFile;
        }
        return match caps[1].parse() {
            Ok(size) => CopyLine::SizeName { size, name },
            Err(_) => CopyLine::Other,
        };
    }

    if names_marker(line.trim()) {
        return CopyLine::MarkerFile;
    }

    CopyLine::Other
}

/// Classify one line of analyze-mode output
pub fn classify_diff_line(line: &str) -> DiffLine {
    if line.trim().is_empty() {
        return DiffLine::Empty;
    }

    let Some(caps) = DIFF_CLASS.captures(line) else {
        return if names_marker(line.trim()) {
            DiffLine::MarkerFile
        } else {
            DiffLine::Other
        };
    };

    let name = caps[3].to_string();
    if names_marker(&name) {
        return DiffLine::MarkerFile;
    }
    let Ok(size) = caps[2].parse() else {
        return DiffLine::Other;
    };
    let report = FileReport { size, name };

    match &caps[1] {
        "*EXTRA File" => DiffLine::ExtraFile(report),
        "New File" => DiffLine::NewFile(report),
        "Newer" | "Changed" => DiffLine::Newer(report),
        "Older" => DiffLine::Older(report),
        _ => DiffLine::Other,
    }
}
