//! Populate command - copy an install into its cache, resuming partial copies

use crate::cache::root::format_bytes;
use crate::cli::args::PopulateArgs;
use crate::cli::Workspace;
use crate::copier::job::{GameCacheJob, JobEvent};
use crate::error::{GameCacheError, GameCacheResult};
use crate::manager::JobHandle;
use crate::ui::{self, CopyProgress, UiContext};
use tracing::debug;

/// Execute the populate command
pub async fn execute(args: PopulateArgs, workspace: &Workspace) -> GameCacheResult<()> {
    let ctx = UiContext::detect();
    let manager = workspace.open().await?;

    let mut options = workspace.config.job_options(args.throttle);
    if let Some(mode) = args.pfr {
        options.pfr.mode = mode.into();
    }

    let entry = manager.get_entry(&args.id)?;
    let handle = manager.start_populate_job(&args.id, options)?;
    let mut progress = CopyProgress::new(&ctx, &entry.title);
    let outcome = follow(handle, &mut progress).await;
    progress.finish();

    workspace.save(&manager).await?;

    match outcome? {
        JobEvent::Done(job) => {
            ui::step_ok_detail(
                &ctx,
                &format!("{} is {}", job.entry.id, job.entry.state),
                &format!(
                    "{} files, {}",
                    job.entry.install_files,
                    format_bytes(job.entry.install_size)
                ),
            );
            Ok(())
        }
        JobEvent::Cancelled(job) => Err(stopped(&ctx, &job)),
        _ => Err(GameCacheError::Internal("job ended on a non-terminal event".to_string())),
    }
}

/// Render a job's events until its terminal one
///
/// The first Ctrl-C cancels the job; the job still gets to settle and
/// report before this returns.
pub(crate) async fn follow(
    mut handle: JobHandle,
    progress: &mut CopyProgress,
) -> GameCacheResult<JobEvent> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    let token = handle.token();
    let label = format!("{} job {}", handle.kind.as_str(), handle.job_id);

    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(JobEvent::StatsUpdated(stats)) => progress.on_stats(&stats),
                Some(JobEvent::ModeChanged { partial_file_resume }) => {
                    progress.on_mode_change(partial_file_resume)
                }
                Some(terminal) => return Ok(terminal),
                None => {
                    return Err(GameCacheError::Internal(format!(
                        "{} ended without a result",
                        label
                    )))
                }
            },
            _ = &mut ctrl_c, if !interrupted => {
                debug!("Interrupted, cancelling {}", label);
                interrupted = true;
                token.cancel();
            }
        }
    }
}

/// Report a cancelled job and turn it into the command's error
pub(crate) fn stopped(ctx: &UiContext, job: &GameCacheJob) -> GameCacheError {
    ui::step_warn(
        ctx,
        &format!(
            "{} stopped ({}), entry is {}",
            job.entry.id,
            job.cancel_reason(),
            job.entry.state
        ),
    );
    for line in &job.error_log {
        ui::remark(ctx, line);
    }
    GameCacheError::JobStopped {
        kind: job.kind.as_str(),
        id: job.entry.id.clone(),
        reason: job.cancel_reason().to_string(),
    }
}
