//! Cache entry state and on-disk marker files
//!
//! The state of a cache directory survives restarts as a zero-byte marker
//! file named `.gamecache.<State>` inside the directory. At most one marker
//! is present at a time. `Empty` and `Unknown` carry no marker: a non-empty
//! directory without a recognized marker is what `Unknown` means.

use crate::error::{GameCacheError, GameCacheResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Namespace shared by every marker file name
pub const MARKER_NAMESPACE: &str = "gamecache";

/// Scratch name used while swapping markers
const MARKER_TEMP: &str = "tmp";

/// Lifecycle state of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameCacheState {
    /// Cache directory absent or empty
    Empty,
    /// Partially copied and resumable
    InProgress,
    /// Copy complete and equivalent to the source
    Populated,
    /// Populated and used as the working copy since (may be dirty)
    Played,
    /// Non-empty directory without a recognized marker
    Unknown,
    /// Content diverges from the source in ways that are unsafe to reconcile
    Invalid,
}

impl GameCacheState {
    /// All states, in lifecycle order
    pub const ALL: [Self; 6] = [
        Self::Empty,
        Self::InProgress,
        Self::Populated,
        Self::Played,
        Self::Unknown,
        Self::Invalid,
    ];

    /// Name used in marker files and user output
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "Empty",
            Self::InProgress => "InProgress",
            Self::Populated => "Populated",
            Self::Played => "Played",
            Self::Unknown => "Unknown",
            Self::Invalid => "Invalid",
        }
    }

    /// Parse a state name (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
    }

    /// Whether this state is recorded with a marker file
    pub fn has_marker(&self) -> bool {
        !matches!(self, Self::Empty | Self::Unknown)
    }

    /// Marker file name for this state, if it has one
    pub fn marker_name(&self) -> Option<String> {
        self.has_marker()
            .then(|| format!(".{}.{}", MARKER_NAMESPACE, self.as_str()))
    }

    /// Whether the copy is complete (Populated or Played)
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Populated | Self::Played)
    }
}

impl fmt::Display for GameCacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a file name belongs to the marker namespace
pub fn is_marker_file(name: &str) -> bool {
    name.starts_with(&format!(".{}.", MARKER_NAMESPACE))
}

/// Map a marker file name back to the state it records
fn state_from_marker(name: &str) -> Option<GameCacheState> {
    let suffix = name.strip_prefix(&format!(".{}.", MARKER_NAMESPACE))?;
    GameCacheState::parse(suffix).filter(|s| s.has_marker())
}

/// Collect the marker-namespace file names present in `dir`
fn marker_files(dir: &Path) -> GameCacheResult<Vec<String>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| GameCacheError::io(format!("reading {}", dir.display()), e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| GameCacheError::io("reading cache dir entry", e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_marker_file(&name) {
            names.push(name);
        }
    }
    Ok(names)
}

/// Read the state recorded by the marker in `dir`
///
/// Returns `None` when there is no marker, or when several markers are
/// present and the recorded state is ambiguous.
pub fn read_marker(dir: &Path) -> GameCacheResult<Option<GameCacheState>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let states: Vec<GameCacheState> = marker_files(dir)?
        .iter()
        .filter_map(|name| state_from_marker(name))
        .collect();

    match states.as_slice() {
        [state] => Ok(Some(*state)),
        _ => Ok(None),
    }
}

/// Record `state` in `dir`, replacing whatever marker was there
///
/// The new marker is created under a scratch name, old markers are
/// removed, then the scratch file is renamed into place. A crash in
/// between leaves no recognized marker, which reads back as `Unknown`.
pub fn write_marker(dir: &Path, state: GameCacheState) -> GameCacheResult<()> {
    fs::create_dir_all(dir)
        .map_err(|e| GameCacheError::io(format!("creating {}", dir.display()), e))?;

    let Some(marker) = state.marker_name() else {
        return clear_markers(dir);
    };

    let temp = dir.join(format!(".{}.{}", MARKER_NAMESPACE, MARKER_TEMP));
    fs::File::create(&temp)
        .map_err(|e| GameCacheError::io(format!("creating {}", temp.display()), e))?;

    for name in marker_files(dir)? {
        if name != marker && !name.ends_with(MARKER_TEMP) {
            remove_marker(&dir.join(&name))?;
        }
    }

    let target = dir.join(&marker);
    if target.exists() {
        return remove_marker(&temp);
    }
    fs::rename(&temp, &target)
        .map_err(|e| GameCacheError::io(format!("writing marker {}", target.display()), e))?;

    debug!("Marked {} as {}", dir.display(), state);
    Ok(())
}

/// Remove every marker from `dir`
pub fn clear_markers(dir: &Path) -> GameCacheResult<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for name in marker_files(dir)? {
        remove_marker(&dir.join(name))?;
    }
    Ok(())
}

fn remove_marker(path: &Path) -> GameCacheResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(GameCacheError::io(
            format!("removing marker {}", path.display()),
            e,
        )),
    }
}

/// Classify a cache directory without diffing it against its source
///
/// Absent or empty ⇒ `Empty`; a single marker ⇒ that state; anything
/// else ⇒ `Unknown`.
pub fn quick_state(dir: &Path) -> GameCacheResult<GameCacheState> {
    if !dir.exists() {
        return Ok(GameCacheState::Empty);
    }
    if !dir.is_dir() {
        return Err(GameCacheError::Inaccessible {
            path: dir.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }
    if let Some(state) = read_marker(dir)? {
        return Ok(state);
    }

    let mut entries = fs::read_dir(dir)
        .map_err(|e| GameCacheError::io(format!("reading {}", dir.display()), e))?;
    let has_content = entries.any(|entry| {
        entry
            .map(|e| !is_marker_file(&e.file_name().to_string_lossy()))
            .unwrap_or(true)
    });

    Ok(if has_content {
        GameCacheState::Unknown
    } else {
        GameCacheState::Empty
    })
}
