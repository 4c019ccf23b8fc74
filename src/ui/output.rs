//! Output helpers for consistent CLI formatting

use super::context::UiContext;
use console::{style, Style};

/// Bold section heading
pub fn section(_ctx: &UiContext, title: &str) {
    println!();
    println!("{}", style(title).bold());
}

/// A step that succeeded
pub fn step_ok(ctx: &UiContext, message: &str) {
    let marker = if ctx.use_fancy_output() { "✓" } else { "[OK]" };
    println!("  {} {}", style(marker).green(), message);
}

/// A step that succeeded, with detail
pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    let marker = if ctx.use_fancy_output() { "✓" } else { "[OK]" };
    println!("  {} {} ({})", style(marker).green(), message, style(detail).dim());
}

/// A warning step
pub fn step_warn(ctx: &UiContext, message: &str) {
    let marker = if ctx.use_fancy_output() { "!" } else { "[WARN]" };
    println!("  {} {}", style(marker).yellow(), message);
}

/// A warning step with a hint on what to do
pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    let marker = if ctx.use_fancy_output() { "!" } else { "[WARN]" };
    println!("  {} {} - {}", style(marker).yellow(), message, style(hint).dim());
}

/// A failed step with detail
pub fn step_error_detail(ctx: &UiContext, message: &str, detail: &str) {
    let marker = if ctx.use_fancy_output() { "✗" } else { "[FAIL]" };
    println!("  {} {}: {}", style(marker).red(), message, style(detail).red());
}

/// An informational step
pub fn step_info(ctx: &UiContext, message: &str) {
    let marker = if ctx.use_fancy_output() { "•" } else { "[INFO]" };
    println!("  {} {}", style(marker).cyan(), message);
}

/// Dim secondary text
pub fn remark(_ctx: &UiContext, message: &str) {
    println!("  {}", style(message).dim());
}

/// Key-value pair
pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.use_fancy_output() {
        println!("  {}: {}", style(key).dim(), value);
    } else {
        println!("  {}: {}", key, value);
    }
}

/// Key-value pair colored by status
pub fn key_value_status(ctx: &UiContext, key: &str, value: &str, ok: bool) {
    let value_style = if ok {
        Style::new().green()
    } else {
        Style::new().yellow()
    };

    if ctx.use_fancy_output() {
        println!("  {}: {}", style(key).dim(), value_style.apply_to(value));
    } else {
        let prefix = if ok { "[OK]" } else { "[WARN]" };
        println!("  {} {}: {}", prefix, key, value);
    }
}
