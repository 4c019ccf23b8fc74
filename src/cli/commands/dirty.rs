//! Dirty command - list cached files an eviction would lose

use crate::cache::root::format_bytes;
use crate::cli::args::{DirtyArgs, OutputFormat};
use crate::cli::Workspace;
use crate::error::GameCacheResult;
use crate::ui::{self, UiContext};
use console::style;

/// Execute the dirty command
pub async fn execute(args: DirtyArgs, workspace: &Workspace) -> GameCacheResult<()> {
    let ctx = UiContext::detect();
    let manager = workspace.open().await?;
    let report = manager.check_dirty(&args.id).await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Plain => {
            for file in &report.files {
                println!("{}", file.name);
            }
        }
        OutputFormat::Table if !report.is_dirty() => {
            ui::step_ok(&ctx, &format!("{} has no changes to write back", args.id));
        }
        OutputFormat::Table => {
            println!("{:<12} {:<60}", style("SIZE").bold(), style("FILE").bold());
            println!("{}", "-".repeat(73));
            for file in &report.files {
                println!("{:<12} {:<60}", format_bytes(file.size), file.name);
            }
            println!();
            println!(
                "{} file(s), {} newer than the install",
                report.files.len(),
                format_bytes(report.bytes())
            );
        }
    }

    Ok(())
}
