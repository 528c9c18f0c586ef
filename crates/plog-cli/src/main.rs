use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use plog_cli::commands::{history, live, profile, replay, status};
use plog_cli::{Cli, Commands, Config};

/// Open the configured database, ensuring the parent directory exists.
fn open_database(config: &Config) -> Result<plog_db::Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    plog_db::Database::open(&config.database_path).context("failed to open database")
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // --verbose wins over RUST_LOG
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Some(Commands::Replay {
            file,
            output,
            geojson,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            let mut db = if output.no_save {
                None
            } else {
                Some(open_database(&config)?)
            };
            replay::run(
                &mut stdout,
                db.as_mut(),
                &config,
                file,
                output,
                geojson.as_deref(),
            )?;
        }
        Some(Commands::Live { output }) => {
            let config = load_config(cli.config.as_deref())?;
            let mut db = if output.no_save {
                None
            } else {
                Some(open_database(&config)?)
            };
            live::run(&mut stdout, db.as_mut(), &config, output)?;
        }
        Some(Commands::History {
            period,
            since,
            json,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            let db = open_database(&config)?;
            history::run(&mut stdout, &db, *period, since.as_deref(), *json)?;
        }
        Some(Commands::Profile { json }) => {
            let config = load_config(cli.config.as_deref())?;
            let db = open_database(&config)?;
            profile::run(&mut stdout, &db, *json)?;
        }
        Some(Commands::Status) => {
            let config = load_config(cli.config.as_deref())?;
            let db = open_database(&config)?;
            status::run(&mut stdout, &db, &config.database_path)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
