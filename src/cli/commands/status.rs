//! Status command - roots, free space and entry states at a glance

use super::entry::styled_state;
use crate::cache::root::format_bytes;
use crate::cache::state::GameCacheState;
use crate::cli::Workspace;
use crate::error::GameCacheResult;
use crate::ui::{self, UiContext};
use console::style;

/// Execute the status command
pub async fn execute(workspace: &Workspace) -> GameCacheResult<()> {
    let ctx = UiContext::detect();
    let manager = workspace.open().await?;

    println!("{}", style("gamecache status").bold().cyan());

    ui::section(&ctx, "Files:");
    ui::key_value(&ctx, "config", &workspace.config_path.display().to_string());
    ui::key_value(&ctx, "registry", &workspace.registry_path.display().to_string());
    ui::key_value(&ctx, "copy tool", &workspace.config.copier.program);

    let roots = manager.list_roots();
    let entries = manager.list_entries();

    if roots.is_empty() {
        ui::section(&ctx, "Roots:");
        ui::step_info(&ctx, "No cache roots configured");
        ui::remark(&ctx, "Add one with: gamecache root add <dir>");
        return Ok(());
    }

    for root in &roots {
        ui::section(&ctx, &format!("{}:", root.directory.display()));
        match manager.available_space_for_caches(&root.directory) {
            Ok(available) => ui::key_value_status(
                &ctx,
                "available for caches",
                &format!("{} (max fill {}%)", format_bytes(available), root.max_fill_level),
                available > 0,
            ),
            Err(e) => ui::step_error_detail(&ctx, "available for caches", &e.to_string()),
        }

        let mut any = false;
        for entry in entries.iter().filter(|e| e.cache_root == root.directory) {
            any = true;
            println!(
                "  {:<12} {:<12} {} / {}  {}",
                entry.id,
                styled_state(entry.state),
                format_bytes(entry.cache_size),
                format_bytes(entry.install_size),
                style(&entry.title).dim()
            );
        }
        if !any {
            ui::remark(&ctx, "no entries");
        }
    }

    let attention = entries
        .iter()
        .filter(|e| matches!(e.state, GameCacheState::Unknown | GameCacheState::Invalid))
        .count();
    println!();
    if attention == 0 {
        println!("{}", style(format!("{} entry(ies), all healthy", entries.len())).green().bold());
    } else {
        println!(
            "{}",
            style(format!(
                "{} entry(ies) need analysis or eviction - see above",
                attention
            ))
            .yellow()
            .bold()
        );
    }

    Ok(())
}
