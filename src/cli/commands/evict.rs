//! Evict command - delete an entry's cache

use super::populate::{follow, stopped};
use crate::cache::root::format_bytes;
use crate::cli::args::EvictArgs;
use crate::cli::Workspace;
use crate::copier::job::JobEvent;
use crate::error::{GameCacheError, GameCacheResult};
use crate::ui::{self, CopyProgress, UiContext};

/// Execute the evict command
pub async fn execute(args: EvictArgs, workspace: &Workspace) -> GameCacheResult<()> {
    let ctx = UiContext::detect();
    let manager = workspace.open().await?;

    if !args.write_back {
        let dirty = manager.check_dirty(&args.id).await?;
        if dirty.is_dirty() {
            ui::step_warn_hint(
                &ctx,
                &format!(
                    "Discarding {} file(s), {} not in the install",
                    dirty.files.len(),
                    format_bytes(dirty.bytes())
                ),
                "use --write-back to keep them",
            );
        }
    }

    let entry = manager.get_entry(&args.id)?;
    let handle = manager.start_evict_job(&args.id, args.write_back)?;
    let mut progress = CopyProgress::new(&ctx, &entry.title);
    let outcome = follow(handle, &mut progress).await;
    progress.finish();

    workspace.save(&manager).await?;

    match outcome? {
        JobEvent::Done(job) => {
            ui::step_ok(&ctx, &format!("{} is {}", job.entry.id, job.entry.state));
            Ok(())
        }
        JobEvent::Cancelled(job) => Err(stopped(&ctx, &job)),
        _ => Err(GameCacheError::Internal("job ended on a non-terminal event".to_string())),
    }
}
