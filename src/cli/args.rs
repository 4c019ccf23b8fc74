//! CLI argument definitions using clap derive

use crate::cache::state::GameCacheState;
use crate::copier::job::PfrMode;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// gamecache - mirror slow game installs onto fast local disks
///
/// Keeps size-bounded copies of install directories on fast cache roots,
/// with resumable copies and dirty-checked eviction.
#[derive(Parser, Debug)]
#[command(name = "gamecache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "GAMECACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Registry file path
    #[arg(long, global = true, env = "GAMECACHE_REGISTRY")]
    pub registry: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage cache roots
    Root(RootArgs),

    /// Manage cache entries
    Entry(EntryArgs),

    /// Copy an entry's install into its cache (resumes partial copies)
    Populate(PopulateArgs),

    /// Delete an entry's cache
    Evict(EvictArgs),

    /// List cached files that are newer than the install
    Dirty(DirtyArgs),

    /// Show roots, free space and entry states
    Status,

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the root command
#[derive(Parser, Debug)]
pub struct RootArgs {
    #[command(subcommand)]
    pub action: RootAction,
}

/// Root subcommands
#[derive(Subcommand, Debug)]
pub enum RootAction {
    /// Register a cache root
    Add {
        /// Directory on the fast device
        dir: PathBuf,

        /// Maximum percent of the device caches may fill (50-100)
        #[arg(long)]
        max_fill: Option<f64>,
    },

    /// Unregister an empty cache root
    Remove {
        dir: PathBuf,
    },

    /// List cache roots
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

/// Arguments for the entry command
#[derive(Parser, Debug)]
pub struct EntryArgs {
    #[command(subcommand)]
    pub action: EntryAction,
}

/// Entry subcommands
#[derive(Subcommand, Debug)]
pub enum EntryAction {
    /// Register an install directory for caching
    Add(EntryAddArgs),

    /// Forget an entry (its cache directory is kept)
    Remove {
        id: String,
    },

    /// List entries
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Diff an entry's cache against its install and record the result
    Analyze {
        id: String,
    },

    /// Override an entry's state (e.g. played)
    SetState {
        id: String,

        /// empty, inprogress, populated, played, unknown or invalid
        #[arg(value_parser = parse_state)]
        state: GameCacheState,
    },
}

/// Arguments for entry add
#[derive(Parser, Debug)]
pub struct EntryAddArgs {
    /// Unique entry id
    pub id: String,

    /// Display title; names the cache directory
    #[arg(short, long)]
    pub title: String,

    /// Install directory to mirror
    #[arg(short, long)]
    pub install_dir: PathBuf,

    /// Cache root to hold the cache
    #[arg(short, long)]
    pub root: PathBuf,

    /// Executable path inside the install
    #[arg(long, default_value = "")]
    pub exe: String,

    /// Extra launch arguments
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub args: String,

    /// Explicit cache subdirectory name
    #[arg(long)]
    pub sub_dir: Option<String>,
}

/// Arguments for the populate command
#[derive(Parser, Debug)]
pub struct PopulateArgs {
    /// Entry id
    pub id: String,

    /// Inter-packet gap in ms (default: from config)
    #[arg(long)]
    pub throttle: Option<u32>,

    /// Partial-file-resume mode (default: from config)
    #[arg(long, value_enum)]
    pub pfr: Option<PfrArg>,
}

/// Partial-file-resume mode on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PfrArg {
    Disabled,
    Enabled,
    Threshold,
}

impl From<PfrArg> for PfrMode {
    fn from(arg: PfrArg) -> Self {
        match arg {
            PfrArg::Disabled => PfrMode::Disabled,
            PfrArg::Enabled => PfrMode::Enabled,
            PfrArg::Threshold => PfrMode::Threshold,
        }
    }
}

/// Arguments for the evict command
#[derive(Parser, Debug)]
pub struct EvictArgs {
    /// Entry id
    pub id: String,

    /// Copy new and newer cached files back to the install first
    #[arg(short, long)]
    pub write_back: bool,
}

/// Arguments for the dirty command
#[derive(Parser, Debug)]
pub struct DirtyArgs {
    /// Entry id
    pub id: String,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for list commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

fn parse_state(s: &str) -> Result<GameCacheState, String> {
    GameCacheState::parse(s).ok_or_else(|| {
        let names: Vec<&str> = GameCacheState::ALL.iter().map(|s| s.as_str()).collect();
        format!("unknown state '{s}', expected one of: {}", names.join(", "))
    })
}
