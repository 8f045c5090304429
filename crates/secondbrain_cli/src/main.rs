//! CLI entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `secondbrain_core` linkage.
//! - Print graph statistics for a database file, or repair asymmetric links.
//!
//! Usage:
//! - `secondbrain_cli` prints ping/version.
//! - `secondbrain_cli stats <db-path>` prints `GraphStats` as JSON.
//! - `secondbrain_cli repair <db-path>` writes missing reciprocal edges.
//!
//! Both subcommands fall back to `SECONDBRAIN_DB_PATH` when no path is given.

use clap::{Parser, Subcommand};
use secondbrain_core::db::open_db;
use secondbrain_core::{analyze, load_snapshot, AnalyticsOptions, LinkService, SqliteStores};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "secondbrain_cli")]
#[command(about = "Inspect and repair a SecondBrain link graph")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print graph statistics as JSON
    Stats {
        /// SQLite database file
        #[arg(env = "SECONDBRAIN_DB_PATH")]
        db: PathBuf,
    },

    /// Write missing reciprocal edges
    Repair {
        /// SQLite database file
        #[arg(env = "SECONDBRAIN_DB_PATH")]
        db: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        None => {
            println!("secondbrain_core ping={}", secondbrain_core::ping());
            println!("secondbrain_core version={}", secondbrain_core::core_version());
            Ok(())
        }
        Some(Command::Stats { db }) => stats_json(&db).map(|json| println!("{json}")),
        Some(Command::Repair { db }) => repair(&db).map(|written| println!("repaired={written}")),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn stats_json(path: &Path) -> Result<String, String> {
    let conn = open_db(path)
        .map_err(|err| format!("failed to open `{}`: {err}", path.display()))?;
    let stores = SqliteStores::try_new(&conn).map_err(|err| err.to_string())?;
    let snapshot = load_snapshot(&stores).map_err(|err| err.to_string())?;
    let stats = analyze(&snapshot, &AnalyticsOptions::default());
    serde_json::to_string_pretty(&stats).map_err(|err| err.to_string())
}

fn repair(path: &Path) -> Result<usize, String> {
    let conn = open_db(path)
        .map_err(|err| format!("failed to open `{}`: {err}", path.display()))?;
    let stores = SqliteStores::try_new(&conn).map_err(|err| err.to_string())?;
    LinkService::new(&stores)
        .repair_asymmetric()
        .map_err(|err| err.to_string())
}
