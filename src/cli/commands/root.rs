//! Root command - register, unregister and list cache roots

use crate::cache::root::{format_bytes, CacheRoot};
use crate::cli::args::{OutputFormat, RootAction, RootArgs};
use crate::cli::Workspace;
use crate::error::GameCacheResult;
use crate::manager::CacheManager;
use crate::ui::{self, UiContext};
use console::style;
use serde::Serialize;

/// Execute the root command
pub async fn execute(args: RootArgs, workspace: &Workspace) -> GameCacheResult<()> {
    let ctx = UiContext::detect();
    let manager = workspace.open().await?;

    match args.action {
        RootAction::Add { dir, max_fill } => {
            let level = max_fill.unwrap_or_else(|| workspace.config.cache.max_fill_level());
            let root = manager.add_cache_root(&dir, level).await?;
            workspace.save(&manager).await?;
            ui::step_ok_detail(
                &ctx,
                &format!("Added cache root {}", root.directory.display()),
                &format!("max fill {}%", root.max_fill_level),
            );
        }
        RootAction::Remove { dir } => {
            let root = manager.remove_cache_root(&dir)?;
            workspace.save(&manager).await?;
            ui::step_ok(&ctx, &format!("Removed cache root {}", root.directory.display()));
        }
        RootAction::List { format } => list(&ctx, &manager, format)?,
    }

    Ok(())
}

/// A root with its live capacity figures
#[derive(Debug, Serialize)]
struct RootRow {
    #[serde(flatten)]
    root: CacheRoot,
    entries: usize,
    available_for_caches: Option<u64>,
}

fn rows(manager: &CacheManager) -> Vec<RootRow> {
    let entries = manager.list_entries();
    manager
        .list_roots()
        .into_iter()
        .map(|root| RootRow {
            entries: entries.iter().filter(|e| e.cache_root == root.directory).count(),
            available_for_caches: manager.available_space_for_caches(&root.directory).ok(),
            root,
        })
        .collect()
}

fn list(ctx: &UiContext, manager: &CacheManager, format: OutputFormat) -> GameCacheResult<()> {
    let rows = rows(manager);

    if rows.is_empty() {
        match format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => ui::step_info(ctx, "No cache roots configured"),
        }
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_table(&rows),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Plain => {
            for row in &rows {
                println!("{}", row.root.directory.display());
            }
        }
    }
    Ok(())
}

fn print_table(rows: &[RootRow]) {
    println!(
        "{:<40} {:<10} {:<9} {:<12}",
        style("DIRECTORY").bold(),
        style("MAX FILL").bold(),
        style("ENTRIES").bold(),
        style("AVAILABLE").bold()
    );
    println!("{}", "-".repeat(74));

    for row in rows {
        let available = match row.available_for_caches {
            Some(bytes) => format_bytes(bytes),
            None => "?".to_string(),
        };
        println!(
            "{:<40} {:<10} {:<9} {:<12}",
            row.root.directory.display().to_string(),
            format!("{}%", row.root.max_fill_level),
            row.entries,
            available
        );
    }

    println!();
    println!("{} root(s)", rows.len());
}
