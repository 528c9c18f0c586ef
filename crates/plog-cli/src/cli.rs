//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use plog_core::Period;

/// Plogging session tracker.
///
/// Records jogging-while-picking-up-litter sessions: route, distance,
/// elapsed time and collected trash, with history and achievements.
#[derive(Debug, Parser)]
#[command(name = "plog", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replay a recorded session log (.jsonl) or GPX track.
    Replay {
        /// Session log or GPX file.
        file: PathBuf,

        #[command(flatten)]
        output: SessionOutput,

        /// Write the final map state as GeoJSON to this path.
        #[arg(long, value_name = "PATH")]
        geojson: Option<PathBuf>,
    },

    /// Track a session from events streamed on stdin.
    Live {
        #[command(flatten)]
        output: SessionOutput,
    },

    /// List stored sessions.
    History {
        /// Window to aggregate over.
        #[arg(long, default_value_t = Period::Week)]
        period: Period,

        /// Only list sessions started after this time
        /// (ISO 8601 or relative like "3 days ago").
        #[arg(long)]
        since: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show lifetime totals and achievements.
    Profile {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show database location and the latest session.
    Status,
}

/// Options shared by commands that finish a session.
#[derive(Debug, Clone, Args)]
pub struct SessionOutput {
    /// Title stored with the session.
    #[arg(long, default_value = "Plogging")]
    pub title: String,

    /// Free-form notes stored with the session.
    #[arg(long)]
    pub notes: Option<String>,

    /// Print the summary without storing the session.
    #[arg(long)]
    pub no_save: bool,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}
