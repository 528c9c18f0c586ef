//! CLI subcommand implementations.

pub mod history;
pub mod live;
pub mod profile;
pub mod replay;
pub mod status;
mod summary;
pub mod util;
