//! Plogging tracker CLI library.
//!
//! This crate provides the `plog` command-line interface: configuration,
//! session log replay, live tracking from stdin and the history views.

mod cli;
pub mod commands;
mod config;
pub mod driver;
pub mod session_log;
pub mod surface;

pub use cli::{Cli, Commands, SessionOutput};
pub use config::Config;
