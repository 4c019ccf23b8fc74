//! Entry command - register, inspect and classify cache entries

use crate::cache::entry::CacheEntry;
use crate::cache::root::format_bytes;
use crate::cache::state::GameCacheState;
use crate::cli::args::{EntryAction, EntryAddArgs, EntryArgs, OutputFormat};
use crate::cli::Workspace;
use crate::error::GameCacheResult;
use crate::manager::{CacheManager, NewEntry};
use crate::ui::{self, UiContext};
use console::{style, StyledObject};

/// Execute the entry command
pub async fn execute(args: EntryArgs, workspace: &Workspace) -> GameCacheResult<()> {
    let ctx = UiContext::detect();
    let manager = workspace.open().await?;

    match args.action {
        EntryAction::Add(add) => {
            let entry = manager.add_cache_entry(new_entry(add)).await?;
            workspace.save(&manager).await?;
            ui::step_ok_detail(
                &ctx,
                &format!("Added {} ({})", entry.id, entry.title),
                &entry.state.to_string(),
            );
            ui::key_value(&ctx, "cache", &entry.cache_dir().display().to_string());
            ui::key_value(
                &ctx,
                "install",
                &format!("{} files, {}", entry.install_files, format_bytes(entry.install_size)),
            );
            if let Some(exe) = entry.cached_exe_path() {
                ui::key_value(&ctx, "launch", &exe.display().to_string());
            }
        }
        EntryAction::Remove { id } => {
            let entry = manager.remove_entry(&id)?;
            workspace.save(&manager).await?;
            ui::step_ok(&ctx, &format!("Removed {} ({})", entry.id, entry.title));
            ui::remark(
                &ctx,
                &format!("Cache directory left in place: {}", entry.cache_dir().display()),
            );
        }
        EntryAction::List { format } => list(&ctx, &manager, format)?,
        EntryAction::Analyze { id } => {
            let state = manager.analyze_entry(&id).await?;
            workspace.save(&manager).await?;
            let entry = manager.get_entry(&id)?;
            ui::key_value_status(&ctx, &id, state.as_str(), state != GameCacheState::Invalid);
            ui::key_value(
                &ctx,
                "cached",
                &format!(
                    "{} of {}",
                    format_bytes(entry.cache_size),
                    format_bytes(entry.install_size)
                ),
            );
        }
        EntryAction::SetState { id, state } => {
            manager.set_entry_state(&id, state)?;
            workspace.save(&manager).await?;
            ui::step_ok(&ctx, &format!("{} is now {}", id, state));
        }
    }

    Ok(())
}

fn new_entry(args: EntryAddArgs) -> NewEntry {
    NewEntry {
        id: args.id,
        title: args.title,
        install_dir: args.install_dir,
        exe_path: args.exe,
        extra_args: args.args,
        cache_root: args.root,
        cache_sub_dir: args.sub_dir,
    }
}

fn list(ctx: &UiContext, manager: &CacheManager, format: OutputFormat) -> GameCacheResult<()> {
    let entries = manager.list_entries();

    if entries.is_empty() {
        match format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => ui::step_info(ctx, "No cache entries"),
        }
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_table(&entries),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => {
            for entry in &entries {
                println!("{}\t{}", entry.id, entry.state);
            }
        }
    }
    Ok(())
}

pub(crate) fn styled_state(state: GameCacheState) -> StyledObject<&'static str> {
    let name = state.as_str();
    match state {
        GameCacheState::Populated => style(name).green(),
        GameCacheState::Played => style(name).cyan(),
        GameCacheState::InProgress => style(name).yellow(),
        GameCacheState::Unknown | GameCacheState::Invalid => style(name).red(),
        GameCacheState::Empty => style(name).dim(),
    }
}

fn print_table(entries: &[CacheEntry]) {
    println!(
        "{:<12} {:<24} {:<12} {:<22} {:<40}",
        style("ID").bold(),
        style("TITLE").bold(),
        style("STATE").bold(),
        style("CACHED").bold(),
        style("CACHE DIR").bold()
    );
    println!("{}", "-".repeat(112));

    for entry in entries {
        let cached = format!(
            "{} / {}",
            format_bytes(entry.cache_size),
            format_bytes(entry.install_size)
        );
        println!(
            "{:<12} {:<24} {:<12} {:<22} {:<40}",
            entry.id,
            entry.title,
            styled_state(entry.state),
            cached,
            entry.cache_dir().display().to_string()
        );
    }

    println!();
    println!("{} entry(ies)", entries.len());
}
