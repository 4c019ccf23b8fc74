//! Copy progress display with CI fallback

use super::context::UiContext;
use crate::cache::root::format_bytes;
use crate::copier::job::JobStats;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Progress bar for a populate or evict job.
///
/// Draws an indicatif bar over the job's bytes in interactive mode and
/// prints one line per finished file otherwise.
pub struct CopyProgress {
    bar: Option<ProgressBar>,
    last_files_copied: u64,
}

impl CopyProgress {
    pub fn new(ctx: &UiContext, label: &str) -> Self {
        let bar = if ctx.use_fancy_output() {
            let bar = ProgressBar::new(0);
            let style = ProgressStyle::default_bar()
                .template("  {spinner:.cyan} {prefix}  {bar:24.cyan/dim} {percent:>3}% {msg:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                .progress_chars("━╸─");
            bar.set_style(style);
            bar.set_prefix(label.to_string());
            bar.enable_steady_tick(Duration::from_millis(120));
            Some(bar)
        } else {
            println!("Copying {}...", label);
            None
        };
        Self {
            bar,
            last_files_copied: 0,
        }
    }

    /// Reflect a stats snapshot
    pub fn on_stats(&mut self, stats: &JobStats) {
        match self.bar {
            Some(ref bar) => {
                bar.set_length(stats.bytes_to_copy.max(1));
                bar.set_position(stats.total_bytes_copied());
                bar.set_message(status_message(stats));
            }
            None => {
                if stats.files_copied != self.last_files_copied {
                    println!(
                        "  {}/{} files, {} of {}",
                        stats.files_copied,
                        stats.files_to_copy,
                        format_bytes(stats.total_bytes_copied()),
                        format_bytes(stats.bytes_to_copy)
                    );
                }
            }
        }
        self.last_files_copied = stats.files_copied;
    }

    /// Note a partial-file-resume mode switch
    pub fn on_mode_change(&self, partial_file_resume: bool) {
        let text = if partial_file_resume {
            "resumable mode"
        } else {
            "standard mode"
        };
        match self.bar {
            Some(ref bar) => bar.println(format!("  switched to {}", text)),
            None => println!("  switched to {}", text),
        }
    }

    /// Finish and clear the bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}

/// Short "file · ETA" text for the bar
fn status_message(stats: &JobStats) -> String {
    let file = Path::new(&stats.curr_file_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file = if file.chars().count() > 32 {
        let head: String = file.chars().take(29).collect();
        format!("{}...", head)
    } else {
        file
    };

    match stats.eta() {
        Some(eta) => format!("{} · {} left", file, format_duration(eta)),
        None => file,
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}
