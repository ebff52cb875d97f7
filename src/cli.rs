use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Gamified, file-backed task tracker CLI.
/// Storage defaults to ~/.questboard/board.json or a path passed via --db.
#[derive(Parser)]
#[command(name = "qb", version, about = "Gamified task tracking CLI")]
pub struct Cli {
    /// Path to the JSON database file.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Act as this user (username). Defaults to the configured or only user.
    #[arg(long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}
