//! Terminal output
//!
//! Progress bars and styled markers in interactive terminals, plain
//! bracketed markers when piped or running under CI.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    key_value, key_value_status, remark, section, step_error_detail, step_info, step_ok,
    step_ok_detail, step_warn, step_warn_hint,
};
pub use progress::CopyProgress;
