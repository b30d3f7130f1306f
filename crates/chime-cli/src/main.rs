//! # chime
//!
//! Demo command line for the chime alarm library.
//!
//! Usage:
//!   chime set --hour 7 --minute 30 --days mon,fri --title "Gym"
//!   chime list [--json]
//!   chime update 42 --hour 8 --renew
//!   chime cancel 42                    # disarm, keep the definition
//!   chime delete 42                    # remove entirely
//!   chime next --hour 9 --minute 0 --days weekdays
//!   chime run                          # daemon: boot sweep, then fire loop

use std::sync::Arc;

use anyhow::Result;
use chime_core::config::DEFAULT_LOG_FILTER;
use chime_core::ChimeConfig;
use chime_scheduler::{AlarmClient, AlarmEnvironment};
use chime_store::SqliteAlarmStore;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod daemon;

#[derive(Parser)]
#[command(
    name = "chime",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CHIME_GIT_SHA"), ")"),
    about = "Schedule one-shot and weekly repeating alarms"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file path (default: $CHIME_CONFIG or ~/.chime/chime.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// SQLite database path, overrides database.path
    #[arg(long, global = true)]
    db: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Create an alarm and arm it
    Set(commands::SetArgs),
    /// Show stored alarms
    List {
        /// Print the alarm list JSON document
        #[arg(long)]
        json: bool,
    },
    /// Change a stored alarm (does not re-arm unless --renew)
    Update(commands::UpdateArgs),
    /// Disarm an alarm but keep it stored as inactive
    Cancel { id: i32 },
    /// Remove an alarm entirely
    Delete { id: i32 },
    /// Open the content target of an alarm's notification
    Tap { id: i32 },
    /// Print when an alarm with these parameters would fire next
    Next(commands::TimeArgs),
    /// Run the alarm daemon until Ctrl-C
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = ChimeConfig::load(cli.config.as_deref());
    let level = loaded
        .as_ref()
        .map(|c| c.log.level.clone())
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with_writer(std::io::stderr)
        .init();

    let mut config = loaded.unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        ChimeConfig::default()
    });
    if let Some(db) = cli.db {
        config.database.path = db;
    }

    let db_path = config.database.path.clone();
    if let Err(e) = ensure_parent_dir(&db_path) {
        warn!(path = %db_path, "Could not create database directory ({}), opening anyway", e);
    }
    info!(path = %db_path, "opening SQLite database");
    let store = Arc::new(SqliteAlarmStore::open(&db_path)?);

    let (env, backend, fire_rx) = AlarmEnvironment::in_process(&config, store)?;
    let zone = config.clock.zone()?;
    let client = AlarmClient::new(env);

    match cli.command {
        Command::Set(args) => commands::set(&client, args, zone).await,
        Command::List { json } => commands::list(&client, json, zone).await,
        Command::Update(args) => commands::update(&client, args, zone).await,
        Command::Cancel { id } => commands::cancel(&client, id).await,
        Command::Delete { id } => commands::delete(&client, id).await,
        Command::Tap { id } => commands::tap(&client, id).await,
        Command::Next(args) => commands::next(&client, args, zone),
        Command::Run => {
            let resync = std::time::Duration::from_secs(config.scheduler.resync_interval_secs.max(1));
            daemon::run(client, backend, fire_rx, resync).await
        }
    }
}

fn ensure_parent_dir(path: &str) -> std::io::Result<()> {
    match std::path::Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
