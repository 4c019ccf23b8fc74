//! CLI command implementations

pub mod config;
pub mod dirty;
pub mod entry;
pub mod evict;
pub mod populate;
pub mod root;
pub mod status;

pub use config::execute as config;
pub use dirty::execute as dirty;
pub use entry::execute as entry;
pub use evict::execute as evict;
pub use populate::execute as populate;
pub use root::execute as root;
pub use status::execute as status;
