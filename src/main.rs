//! gamecache - size-bounded local mirrors of slow install directories
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use gamecache::cli::{commands, Cli, Commands, Workspace};
use gamecache::config::ConfigManager;
use gamecache::error::GameCacheResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> GameCacheResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    // Config command must work even when the file does not parse
    if let Commands::Config(args) = cli.command {
        init_logging(cli.verbose, "text");
        return commands::config(args, &config_manager).await;
    }

    let config = config_manager.load().await?;
    init_logging(cli.verbose, &config.general.log_format);
    debug!("Loaded config from {}", config_manager.path().display());

    let workspace = Workspace::new(config, config_manager.path().to_path_buf(), cli.registry);

    match cli.command {
        Commands::Config(_) => unreachable!("Config handled above"),
        Commands::Root(args) => commands::root(args, &workspace).await,
        Commands::Entry(args) => commands::entry(args, &workspace).await,
        Commands::Populate(args) => commands::populate(args, &workspace).await,
        Commands::Evict(args) => commands::evict(args, &workspace).await,
        Commands::Dirty(args) => commands::dirty(args, &workspace).await,
        Commands::Status => commands::status(&workspace).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug; `json` switches to one JSON object per line
fn init_logging(verbose: u8, format: &str) {
    let filter = match verbose {
        0 => EnvFilter::new("gamecache=warn"),
        1 => EnvFilter::new("gamecache=info"),
        _ => EnvFilter::new("gamecache=debug"),
    };

    if format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .init();
    }
}
