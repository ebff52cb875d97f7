//! # QB - Gamified Task Tracking CLI
//!
//! A file-backed task tracker that turns finishing work into a game: tasks
//! carry subtask checklists, per-task timers and an append-only activity
//! log, and completing them earns XP and unlockable achievements.
//!
//! ## Key Features
//!
//! - **Audited Mutations**: every field change is diffed into the task's
//!   activity log with actor and timestamp
//! - **Derived Progress**: completion percentage follows the subtask
//!   checklist, recomputed on every save
//! - **Time Tracking**: start/stop timers per task with a fold-in-place
//!   heartbeat for long sessions
//! - **XP & Achievements**: completion awards scale with priority; a fixed
//!   achievement catalog is re-evaluated after every change
//! - **Local File Storage**: one JSON file per board, written atomically
//!
//! ## Quick Start
//!
//! ```bash
//! # Create a project and add a task
//! qb projects add "Apollo"
//! qb add "Fix login" --desc "Login form rejects valid emails" --priority high
//!
//! # Work it
//! qb timer start "Fix login"
//! qb timer stop "Fix login"
//! qb complete "Fix login"
//!
//! # See where you stand
//! qb profile
//! ```
//!
//! Data is stored locally in `~/.questboard/` as a single `board.json`.
//! We recommend you source control this folder via `git init` and back it
//! up periodically.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub mod cli;
pub mod clock;
pub mod cmd;
pub mod config;
pub mod db;
pub mod error;
pub mod fields;
pub mod notify;
pub mod store;
pub mod task;
pub mod user;
pub mod engine {
    pub mod achievements;
    pub mod changes;
    pub mod progress;
    pub mod timer;
    pub mod update;
}

use cli::Cli;
use clock::SystemClock;
use cmd::*;
use config::AppConfig;
use fields::Role;
use notify::ConsoleNotifier;
use store::{JsonStore, Store};
use user::User;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Completions need no storage at all.
    if let Commands::Completions { shell } = &cli.command {
        cmd_completions(*shell);
        return;
    }

    // Determine the data directory and database file.
    let (data_dir, db_path) = if let Some(db_path) = cli.db.clone() {
        let dir = db_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        (dir, db_path)
    } else {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let dir = PathBuf::from(home).join(".questboard");
        if let Err(e) = std::fs::create_dir_all(&dir) {
            eprintln!("Failed to create data directory {}: {}", dir.display(), e);
            std::process::exit(1);
        }
        let db_path = dir.join("board.json");
        (dir, db_path)
    };

    let config = AppConfig::load(&data_dir.join("config.json"));
    let mut store = JsonStore::open(&db_path);
    let mut actor = resolve_actor(&mut store, cli.user.as_deref(), config.default_user.as_deref());

    let mut engine = CliEngine::new(store, SystemClock, ConsoleNotifier, config.xp.clone());

    match cli.command {
        Commands::Completions { .. } => unreachable!("completions handled above"),

        Commands::Add {
            title,
            desc,
            project,
            assign,
            tags,
            deadline,
            priority,
            status,
            depends,
            subtasks,
        } => cmd_add(
            &mut engine,
            &mut actor,
            title,
            desc,
            project,
            assign,
            tags,
            deadline,
            priority,
            status,
            depends,
            subtasks,
        ),

        Commands::List {
            all,
            status,
            priority,
            project,
            assignee,
            tags,
            sort,
            limit,
        } => cmd_list(
            &engine, all, status, priority, project, assignee, tags, sort, limit,
        ),

        Commands::View { id, log } => cmd_view(&mut engine, id, log),

        Commands::Update {
            id,
            title,
            desc,
            project,
            deadline,
            clear_deadline,
            status,
            priority,
            assign,
            unassign,
            add_tags,
            rm_tags,
            add_deps,
            rm_deps,
            order,
        } => cmd_update(
            &mut engine,
            &mut actor,
            id,
            title,
            desc,
            project,
            deadline,
            clear_deadline,
            status,
            priority,
            assign,
            unassign,
            add_tags,
            rm_tags,
            add_deps,
            rm_deps,
            order,
        ),

        Commands::Complete { id } => cmd_complete(&mut engine, &mut actor, id),

        Commands::Reopen { id } => cmd_reopen(&mut engine, &mut actor, id),

        Commands::Delete { id } => cmd_delete(&mut engine, id),

        Commands::Subtask { action } => cmd_subtask(&mut engine, &mut actor, action),

        Commands::Comment { id, text } => cmd_comment(&mut engine, &mut actor, id, text),

        Commands::Timer { action } => {
            cmd_timer(&mut engine, &mut actor, action, config.heartbeat_secs)
        }

        Commands::Log { id } => cmd_log(&mut engine, id),

        Commands::Profile { username } => cmd_profile(&engine, &actor, username),

        Commands::Tags => cmd_tags(&engine),

        Commands::Users { action } => cmd_users(&mut engine, action),

        Commands::Projects { action } => cmd_projects(&mut engine, action),
    }
}

/// Work out who is acting. An empty store gets a default admin so first-run
/// commands work without ceremony; otherwise the --user flag, the configured
/// default, or the only registered user wins, in that order.
fn resolve_actor(store: &mut JsonStore, flag: Option<&str>, configured: Option<&str>) -> User {
    if store.db().users.is_empty() {
        let admin = User::new("admin", Role::Admin);
        match store.save_user(&admin) {
            Ok(saved) => {
                println!("Created default user 'admin'.");
                return saved;
            }
            Err(e) => {
                eprintln!("Failed to create default user: {e}");
                std::process::exit(1);
            }
        }
    }

    let requested = flag.or(configured);
    match requested {
        Some(name) => match store.db().get_user_by_name(name) {
            Some(u) => u.clone(),
            None => {
                eprintln!("User '{}' not found. Add them with: qb users add {}", name, name);
                std::process::exit(1);
            }
        },
        None => {
            if store.db().users.len() == 1 {
                store.db().users[0].clone()
            } else {
                eprintln!("Multiple users registered. Pass --user <username>.");
                std::process::exit(1);
            }
        }
    }
}
