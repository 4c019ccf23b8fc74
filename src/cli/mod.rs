//! Command-line interface

pub mod args;
pub mod commands;
mod workspace;

pub use args::{Cli, Commands};
pub use workspace::Workspace;
