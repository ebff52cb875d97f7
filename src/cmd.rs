//! Command implementations for the CLI interface.
//!
//! This module contains the command handlers for the various subcommands,
//! all of which drive the task engine rather than mutating task fields
//! directly, so every change flows through the audit trail and the
//! gamification pass.

use clap::Subcommand;
use clap_complete::{generate, Shell};

use chrono::{Local, NaiveDate, Utc};

use crate::clock::SystemClock;
use crate::db::{
    format_deadline_relative, format_duration, format_priority, format_role, format_status,
    format_timestamp, parse_deadline_input, print_table, resolve_task_identifier, short_id,
    split_and_normalise_tags,
};
use crate::engine::achievements::{find, CATALOG};
use crate::engine::update::TaskEngine;
use crate::fields::{Priority, Role, SortKey, Status};
use crate::notify::ConsoleNotifier;
use crate::store::{JsonStore, Store};
use crate::task::{Subtask, Task, TaskPatch};
use crate::user::{Project, User};

/// The engine as wired for the CLI: JSON file store, real clock, terminal
/// notifications.
pub type CliEngine = TaskEngine<JsonStore, SystemClock, ConsoleNotifier>;

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new task.
    Add {
        /// Short title for the task.
        title: String,
        /// Longer description of the work.
        #[arg(long)]
        desc: Option<String>,
        /// Project name.
        #[arg(long)]
        project: Option<String>,
        /// Assign to a user (username).
        #[arg(long)]
        assign: Option<String>,
        /// Comma-separated tags. May be repeated.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Deadline: YYYY-MM-DD, "today", "tomorrow", or "in Nd".
        #[arg(long)]
        deadline: Option<String>,
        /// Priority: low | medium | high | critical.
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        /// Status: todo | in-progress | review | done | blocked.
        #[arg(long, value_enum, default_value_t = Status::Todo)]
        status: Status,
        /// Task ids this task depends on. May be repeated.
        #[arg(long = "depends")]
        depends: Vec<String>,
        /// Subtask titles. May be repeated.
        #[arg(long = "subtask")]
        subtasks: Vec<String>,
    },

    /// List tasks with optional filters.
    List {
        /// Include completed tasks.
        #[arg(long)]
        all: bool,
        /// Filter by status.
        #[arg(long, value_enum)]
        status: Option<Status>,
        /// Filter by priority.
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Filter by project name.
        #[arg(long)]
        project: Option<String>,
        /// Filter by assignee username.
        #[arg(long)]
        assignee: Option<String>,
        /// Filter by tag. May be repeated. Accepts comma-separated.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Sort key.
        #[arg(long, value_enum, default_value_t = SortKey::Order)]
        sort: SortKey,
        /// Limit number of rows printed.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// View a single task by id or title.
    View {
        /// Task id (or prefix) or title to view.
        id: String,
        /// Show the full activity log.
        #[arg(long)]
        log: bool,
    },

    /// Update fields on a task.
    Update {
        /// Task id (or prefix) or title to update.
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        /// Move to another project (by name).
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        deadline: Option<String>,
        /// Clear the deadline.
        #[arg(long)]
        clear_deadline: bool,
        #[arg(long, value_enum)]
        status: Option<Status>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Reassign to a user (username).
        #[arg(long)]
        assign: Option<String>,
        /// Clear the assignee.
        #[arg(long)]
        unassign: bool,
        /// Add tags. May be repeated and comma-separated.
        #[arg(long = "add-tag")]
        add_tags: Vec<String>,
        /// Remove tags. May be repeated and comma-separated.
        #[arg(long = "rm-tag")]
        rm_tags: Vec<String>,
        /// Add a dependency on another task. May be repeated.
        #[arg(long = "add-dep")]
        add_deps: Vec<String>,
        /// Remove a dependency. May be repeated.
        #[arg(long = "rm-dep")]
        rm_deps: Vec<String>,
        /// Board sort key.
        #[arg(long)]
        order: Option<u32>,
    },

    /// Mark a task done.
    Complete {
        /// Task id (or prefix) or title to complete.
        id: String,
    },

    /// Reopen a task (status in-progress).
    Reopen {
        /// Task id (or prefix) or title to reopen.
        id: String,
    },

    /// Delete a task by id or title.
    Delete {
        /// Task id (or prefix) or title to delete.
        id: String,
    },

    /// Manage a task's subtask checklist.
    Subtask {
        #[command(subcommand)]
        action: SubtaskAction,
    },

    /// Add a comment to a task.
    Comment {
        /// Task id (or prefix) or title.
        id: String,
        /// Comment text.
        text: String,
    },

    /// Start, stop or fold the per-task timer.
    Timer {
        #[command(subcommand)]
        action: TimerAction,
    },

    /// Show a task's activity log, newest first.
    Log {
        /// Task id (or prefix) or title.
        id: String,
    },

    /// Show a user's XP and achievements.
    Profile {
        /// Username (defaults to the acting user).
        username: Option<String>,
    },

    /// List distinct tags and counts.
    Tags,

    /// Manage users.
    Users {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Manage projects.
    Projects {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum SubtaskAction {
    /// Add a checklist item.
    Add {
        /// Task id (or prefix) or title.
        task: String,
        /// Subtask title.
        title: String,
    },
    /// Mark a checklist item complete.
    Check {
        /// Task id (or prefix) or title.
        task: String,
        /// Subtask number (1-based) or id prefix.
        subtask: String,
    },
    /// Mark a checklist item incomplete.
    Uncheck {
        /// Task id (or prefix) or title.
        task: String,
        /// Subtask number (1-based) or id prefix.
        subtask: String,
    },
    /// Remove a checklist item.
    Remove {
        /// Task id (or prefix) or title.
        task: String,
        /// Subtask number (1-based) or id prefix.
        subtask: String,
    },
}

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start time tracking on a task.
    Start {
        /// Task id (or prefix) or title.
        id: String,
    },
    /// Stop time tracking and fold elapsed time.
    Stop {
        /// Task id (or prefix) or title.
        id: String,
    },
    /// Fold elapsed time without stopping the session.
    Heartbeat {
        /// Task id (or prefix) or title.
        id: String,
    },
}

#[derive(Subcommand)]
pub enum UserAction {
    /// Register a user.
    Add {
        username: String,
        /// Role: admin | developer | viewer.
        #[arg(long, value_enum, default_value_t = Role::Developer)]
        role: Role,
    },
    /// List users.
    List,
}

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Create a project.
    Add { name: String },
    /// List projects with task counts.
    List,
}

fn resolve_or_exit(engine: &CliEngine, identifier: &str) -> String {
    match resolve_task_identifier(identifier, engine.store().db()) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("Error resolving task: {}", e);
            std::process::exit(1);
        }
    }
}

fn resolve_username(engine: &CliEngine, username: &str) -> String {
    match engine.store().db().get_user_by_name(username) {
        Some(u) => u.id.clone(),
        None => {
            eprintln!("User '{}' not found. Add them with: qb users add {}", username, username);
            std::process::exit(1);
        }
    }
}

fn resolve_project_name(engine: &CliEngine, name: &str) -> String {
    match engine.store().db().get_project_by_name(name) {
        Some(p) => p.id.clone(),
        None => {
            eprintln!("Project '{}' not found. Add it with: qb projects add \"{}\"", name, name);
            std::process::exit(1);
        }
    }
}

/// Add a new task.
#[allow(clippy::too_many_arguments)]
pub fn cmd_add(
    engine: &mut CliEngine,
    actor: &mut User,
    title: String,
    desc: Option<String>,
    project: Option<String>,
    assign: Option<String>,
    tags: Vec<String>,
    deadline: Option<String>,
    priority: Priority,
    status: Status,
    depends: Vec<String>,
    subtasks: Vec<String>,
) {
    let project_id = match project {
        Some(ref name) => resolve_project_name(engine, name),
        None => {
            // Fall back to the only project when there is exactly one.
            let projects = engine.store().db().projects.clone();
            match projects.len() {
                1 => projects[0].id.clone(),
                0 => {
                    eprintln!("No projects yet. Add one with: qb projects add <name>");
                    std::process::exit(1);
                }
                _ => {
                    eprintln!("Multiple projects exist. Pass --project <name>.");
                    std::process::exit(1);
                }
            }
        }
    };

    let assigned_to = assign.as_deref().map(|name| resolve_username(engine, name));
    let deadline = match deadline {
        Some(ref s) => match parse_deadline_input(s) {
            Some(d) => Some(d),
            None => {
                eprintln!("Unrecognised deadline. Use YYYY-MM-DD, 'today', 'tomorrow', or 'in Nd'.");
                std::process::exit(1);
            }
        },
        None => None,
    };
    let depends_on: Vec<String> = depends
        .iter()
        .map(|d| resolve_or_exit(engine, d))
        .collect();
    let subtasks: Vec<Subtask> = subtasks
        .into_iter()
        .map(|title| Subtask {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            completed: false,
        })
        .collect();

    let patch = TaskPatch {
        title: Some(title),
        description: desc,
        project_id: Some(project_id),
        assigned_to: Some(assigned_to),
        deadline: deadline.map(Some),
        status: Some(status),
        priority: Some(priority),
        subtasks: if subtasks.is_empty() { None } else { Some(subtasks) },
        tags: Some(split_and_normalise_tags(&tags)),
        depends_on: if depends_on.is_empty() { None } else { Some(depends_on) },
        ..TaskPatch::default()
    };

    match engine.create_task(&patch, actor) {
        Ok(task) => println!("Added task {} ({})", short_id(&task.id), task.title),
        Err(e) => {
            eprintln!("Failed to add task: {e}");
            std::process::exit(1);
        }
    }
}

/// List tasks with optional filtering and sorting.
#[allow(clippy::too_many_arguments)]
pub fn cmd_list(
    engine: &CliEngine,
    all: bool,
    status: Option<Status>,
    priority: Option<Priority>,
    project: Option<String>,
    assignee: Option<String>,
    tags: Vec<String>,
    sort: SortKey,
    limit: Option<usize>,
) {
    let db = engine.store().db();
    let tags = split_and_normalise_tags(&tags);
    let project_id = project.as_deref().map(|name| match db.get_project_by_name(name) {
        Some(p) => p.id.clone(),
        None => {
            eprintln!("Project '{}' not found.", name);
            std::process::exit(1);
        }
    });
    let assignee_id = assignee.as_deref().map(|name| match db.get_user_by_name(name) {
        Some(u) => u.id.clone(),
        None => {
            eprintln!("User '{}' not found.", name);
            std::process::exit(1);
        }
    });

    let mut filtered: Vec<&Task> = db
        .tasks
        .iter()
        .filter(|t| {
            if !all && t.status == Status::Done {
                return false;
            }
            if let Some(s) = status {
                if t.status != s {
                    return false;
                }
            }
            if let Some(p) = priority {
                if t.priority != p {
                    return false;
                }
            }
            if let Some(ref pid) = project_id {
                if &t.project_id != pid {
                    return false;
                }
            }
            if let Some(ref uid) = assignee_id {
                if t.assigned_to.as_ref() != Some(uid) {
                    return false;
                }
            }
            for tag in &tags {
                if !t.tags.iter().any(|have| have == tag) {
                    return false;
                }
            }
            true
        })
        .collect();

    match sort {
        SortKey::Order => filtered.sort_by_key(|t| t.order),
        SortKey::Deadline => {
            filtered.sort_by_key(|t| (t.deadline.unwrap_or(NaiveDate::MAX), t.order))
        }
        SortKey::Priority => {
            // Critical first.
            filtered.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.order.cmp(&b.order)));
        }
        SortKey::Id => filtered.sort_by(|a, b| a.id.cmp(&b.id)),
    }

    if let Some(n) = limit {
        filtered.truncate(n);
    }

    print_table(&filtered, db);
}

/// View detailed information about a specific task.
///
/// Opening a detail view also reconciles a forgotten timer: a session left
/// running accrues its elapsed time and stops.
pub fn cmd_view(engine: &mut CliEngine, id: String, show_log: bool) {
    let task_id = resolve_or_exit(engine, &id);
    let task = match engine.reconcile_timer_on_open(&task_id) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to load task: {e}");
            std::process::exit(1);
        }
    };
    let db = engine.store().db();
    let today = Local::now().date_naive();

    let project = db
        .get_project(&task.project_id)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| task.project_id.clone());
    let assignee = task
        .assigned_to
        .as_deref()
        .and_then(|uid| db.get_user(uid))
        .map(|u| u.username.clone())
        .unwrap_or_else(|| "-".into());

    println!("ID:           {}", task.id);
    println!("Title:        {}", task.title);
    println!("Status:       {}", format_status(task.status));
    println!("Priority:     {}", format_priority(task.priority));
    println!("Project:      {}", project);
    println!("Assignee:     {}", assignee);
    println!(
        "Deadline:     {}",
        match task.deadline {
            Some(d) => format!("{d} ({})", format_deadline_relative(Some(d), today)),
            None => "-".into(),
        }
    );
    println!("Progress:     {}%", task.progress);
    println!("Time spent:   {}", format_duration(task.time_spent));
    println!("Created:      {}", format_timestamp(task.created_at));
    println!(
        "Completed:    {}",
        task.completed_at.map(format_timestamp).unwrap_or_else(|| "-".into())
    );
    println!(
        "Tags:         {}",
        if task.tags.is_empty() { "-".into() } else { task.tags.join(",") }
    );
    if !task.depends_on.is_empty() {
        let deps: Vec<String> = task
            .depends_on
            .iter()
            .map(|d| short_id(d).to_string())
            .collect();
        println!("Depends on:   {}", deps.join(", "));
    }
    println!("Description:\n{}\n", task.description);

    if !task.subtasks.is_empty() {
        println!("Subtasks:");
        for (i, s) in task.subtasks.iter().enumerate() {
            let mark = if s.completed { "x" } else { " " };
            println!("  {}. [{}] {}", i + 1, mark, s.title);
        }
    }

    if !task.comments.is_empty() {
        println!("Comments:");
        for c in &task.comments {
            let who = db
                .get_user(&c.user_id)
                .map(|u| u.username.clone())
                .unwrap_or_else(|| c.user_id.clone());
            println!("  {} {}: {}", format_timestamp(c.created_at), who, c.text);
        }
    }

    if show_log {
        print_activity_log(&task, engine);
    }
}

/// Update an existing task's fields.
#[allow(clippy::too_many_arguments)]
pub fn cmd_update(
    engine: &mut CliEngine,
    actor: &mut User,
    id: String,
    title: Option<String>,
    desc: Option<String>,
    project: Option<String>,
    deadline: Option<String>,
    clear_deadline: bool,
    status: Option<Status>,
    priority: Option<Priority>,
    assign: Option<String>,
    unassign: bool,
    add_tags: Vec<String>,
    rm_tags: Vec<String>,
    add_deps: Vec<String>,
    rm_deps: Vec<String>,
    order: Option<u32>,
) {
    let task_id = resolve_or_exit(engine, &id);

    let mut patch = TaskPatch {
        title,
        description: desc,
        status,
        priority,
        order,
        ..TaskPatch::default()
    };

    if let Some(ref name) = project {
        patch.project_id = Some(resolve_project_name(engine, name));
    }
    if unassign {
        patch.assigned_to = Some(None);
    } else if let Some(ref name) = assign {
        patch.assigned_to = Some(Some(resolve_username(engine, name)));
    }
    if clear_deadline {
        patch.deadline = Some(None);
    } else if let Some(ref s) = deadline {
        match parse_deadline_input(s) {
            Some(d) => patch.deadline = Some(Some(d)),
            None => {
                eprintln!("Unrecognised deadline. Use YYYY-MM-DD, 'today', 'tomorrow', or 'in Nd'.");
                std::process::exit(1);
            }
        }
    }

    // Tag and dependency edits are merges over the current values.
    let current = match engine.store().load_task(&task_id) {
        Ok(Some(t)) => t,
        _ => {
            eprintln!("Task {} not found.", short_id(&task_id));
            std::process::exit(1);
        }
    };
    if !add_tags.is_empty() || !rm_tags.is_empty() {
        let add = split_and_normalise_tags(&add_tags);
        let rm = split_and_normalise_tags(&rm_tags);
        let mut set: std::collections::BTreeSet<String> = current.tags.iter().cloned().collect();
        for t in add {
            set.insert(t);
        }
        for t in rm {
            set.remove(&t);
        }
        patch.tags = Some(set.into_iter().collect());
    }
    if !add_deps.is_empty() || !rm_deps.is_empty() {
        let mut deps: Vec<String> = current.depends_on.clone();
        for d in add_deps {
            let dep_id = resolve_or_exit(engine, &d);
            if dep_id == task_id {
                eprintln!("A task cannot depend on itself.");
                std::process::exit(1);
            }
            if !deps.contains(&dep_id) {
                deps.push(dep_id);
            }
        }
        for d in rm_deps {
            let dep_id = resolve_or_exit(engine, &d);
            deps.retain(|existing| existing != &dep_id);
        }
        patch.depends_on = Some(deps);
    }

    match engine.update_task(&task_id, &patch, actor) {
        Ok(task) => println!("Updated task {}", short_id(&task.id)),
        Err(e) => {
            eprintln!("Failed to update task: {e}");
            std::process::exit(1);
        }
    }
}

/// Mark a task done.
pub fn cmd_complete(engine: &mut CliEngine, actor: &mut User, id: String) {
    let task_id = resolve_or_exit(engine, &id);
    let patch = TaskPatch {
        status: Some(Status::Done),
        ..TaskPatch::default()
    };
    match engine.update_task(&task_id, &patch, actor) {
        Ok(task) => println!("Completed {} ({})", short_id(&task.id), task.title),
        Err(e) => {
            eprintln!("Failed to complete task: {e}");
            std::process::exit(1);
        }
    }
}

/// Reopen a completed task by setting its status back to in-progress.
pub fn cmd_reopen(engine: &mut CliEngine, actor: &mut User, id: String) {
    let task_id = resolve_or_exit(engine, &id);
    let patch = TaskPatch {
        status: Some(Status::InProgress),
        ..TaskPatch::default()
    };
    match engine.update_task(&task_id, &patch, actor) {
        Ok(task) => println!("Reopened {}", short_id(&task.id)),
        Err(e) => {
            eprintln!("Failed to reopen task: {e}");
            std::process::exit(1);
        }
    }
}

/// Delete a task.
pub fn cmd_delete(engine: &mut CliEngine, id: String) {
    let task_id = resolve_or_exit(engine, &id);
    match engine.delete_task(&task_id) {
        Ok(true) => println!("Deleted {}", short_id(&task_id)),
        Ok(false) => {
            eprintln!("Task {} not found.", short_id(&task_id));
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed to delete task: {e}");
            std::process::exit(1);
        }
    }
}

fn find_subtask_index(task: &Task, selector: &str) -> usize {
    if let Ok(n) = selector.parse::<usize>() {
        if n >= 1 && n <= task.subtasks.len() {
            return n - 1;
        }
    }
    if let Some(i) = task.subtasks.iter().position(|s| s.id.starts_with(selector)) {
        return i;
    }
    eprintln!("No subtask matching '{selector}'.");
    std::process::exit(1);
}

/// Handle subtask checklist commands.
pub fn cmd_subtask(engine: &mut CliEngine, actor: &mut User, action: SubtaskAction) {
    let (task_sel, mutate): (String, Box<dyn FnOnce(&Task) -> Vec<Subtask>>) = match action {
        SubtaskAction::Add { task, title } => (
            task,
            Box::new(move |t: &Task| {
                let mut subtasks = t.subtasks.clone();
                subtasks.push(Subtask {
                    id: uuid::Uuid::new_v4().to_string(),
                    title,
                    completed: false,
                });
                subtasks
            }),
        ),
        SubtaskAction::Check { task, subtask } => (
            task,
            Box::new(move |t: &Task| {
                let i = find_subtask_index(t, &subtask);
                let mut subtasks = t.subtasks.clone();
                subtasks[i].completed = true;
                subtasks
            }),
        ),
        SubtaskAction::Uncheck { task, subtask } => (
            task,
            Box::new(move |t: &Task| {
                let i = find_subtask_index(t, &subtask);
                let mut subtasks = t.subtasks.clone();
                subtasks[i].completed = false;
                subtasks
            }),
        ),
        SubtaskAction::Remove { task, subtask } => (
            task,
            Box::new(move |t: &Task| {
                let i = find_subtask_index(t, &subtask);
                let mut subtasks = t.subtasks.clone();
                subtasks.remove(i);
                subtasks
            }),
        ),
    };

    let task_id = resolve_or_exit(engine, &task_sel);
    let current = match engine.store().load_task(&task_id) {
        Ok(Some(t)) => t,
        _ => {
            eprintln!("Task {} not found.", short_id(&task_id));
            std::process::exit(1);
        }
    };
    let patch = TaskPatch {
        subtasks: Some(mutate(&current)),
        ..TaskPatch::default()
    };
    match engine.update_task(&task_id, &patch, actor) {
        Ok(task) => {
            let (done, total) = task.subtask_counts();
            println!("Subtasks: {done}/{total} complete ({}%)", task.progress);
        }
        Err(e) => {
            eprintln!("Failed to update subtasks: {e}");
            std::process::exit(1);
        }
    }
}

/// Add a comment to a task.
pub fn cmd_comment(engine: &mut CliEngine, actor: &mut User, id: String, text: String) {
    let task_id = resolve_or_exit(engine, &id);
    match engine.add_comment(&task_id, &text, actor) {
        Ok(task) => println!("Commented on {}", short_id(&task.id)),
        Err(e) => {
            eprintln!("Failed to comment: {e}");
            std::process::exit(1);
        }
    }
}

/// Handle timer commands.
pub fn cmd_timer(engine: &mut CliEngine, actor: &mut User, action: TimerAction, heartbeat_secs: u64) {
    match action {
        TimerAction::Start { id } => {
            let task_id = resolve_or_exit(engine, &id);
            match engine.start_timer(&task_id, actor) {
                Ok(task) => {
                    if task.timer_started_at.is_some() {
                        println!("Timer running on {} ({})", short_id(&task.id), task.title);
                        println!(
                            "Long session? Fold every {}s with: qb timer heartbeat {}",
                            heartbeat_secs,
                            short_id(&task.id)
                        );
                    }
                }
                Err(e) => {
                    eprintln!("Failed to start timer: {e}");
                    std::process::exit(1);
                }
            }
        }
        TimerAction::Stop { id } => {
            let task_id = resolve_or_exit(engine, &id);
            match engine.stop_timer(&task_id, actor) {
                Ok(task) => println!(
                    "Timer stopped. Total tracked: {}",
                    format_duration(task.time_spent)
                ),
                Err(e) => {
                    eprintln!("Failed to stop timer: {e}");
                    std::process::exit(1);
                }
            }
        }
        TimerAction::Heartbeat { id } => {
            let task_id = resolve_or_exit(engine, &id);
            match engine.timer_heartbeat(&task_id) {
                Ok(task) => println!(
                    "Folded. Total tracked: {}",
                    format_duration(task.time_spent)
                ),
                Err(e) => {
                    eprintln!("Failed to fold timer: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}

fn print_activity_log(task: &Task, engine: &CliEngine) {
    let db = engine.store().db();
    println!("Activity:");
    // Entries are stored oldest first; display newest first.
    for entry in task.activity_log.iter().rev() {
        let who = db
            .get_user(&entry.user_id)
            .map(|u| u.username.clone())
            .unwrap_or_else(|| entry.user_id.clone());
        println!(
            "  {} {} {}",
            format_timestamp(entry.timestamp),
            who,
            entry.action
        );
    }
}

/// Show a task's activity log, newest first.
pub fn cmd_log(engine: &mut CliEngine, id: String) {
    let task_id = resolve_or_exit(engine, &id);
    let task = match engine.store().load_task(&task_id) {
        Ok(Some(t)) => t,
        _ => {
            eprintln!("Task {} not found.", short_id(&task_id));
            std::process::exit(1);
        }
    };
    print_activity_log(&task, engine);
}

/// Show a user's XP and achievement progress.
pub fn cmd_profile(engine: &CliEngine, actor: &User, username: Option<String>) {
    let db = engine.store().db();
    let subject = match username {
        Some(ref name) => match db.get_user_by_name(name) {
            Some(u) => u.clone(),
            None => {
                eprintln!("User '{}' not found.", name);
                std::process::exit(1);
            }
        },
        None => actor.clone(),
    };

    println!("User:          {}", subject.username);
    println!("Role:          {}", format_role(subject.role));
    println!("XP:            {}", subject.xp);
    println!(
        "Achievements:  {}/{}",
        subject.achievements.len(),
        CATALOG.len()
    );
    for achievement in CATALOG {
        let mark = if subject.achievements.iter().any(|a| a == achievement.id) {
            "x"
        } else {
            " "
        };
        println!(
            "  [{}] {} (+{} XP): {}",
            mark, achievement.name, achievement.xp_bonus, achievement.description
        );
    }
    // Defensive: show ids that are no longer in the catalog rather than hiding them.
    for id in &subject.achievements {
        if find(id).is_none() {
            println!("  [x] {} (retired)", id);
        }
    }
}

/// List all distinct tags with their usage counts.
pub fn cmd_tags(engine: &CliEngine) {
    let mut counts: std::collections::BTreeMap<String, usize> = std::collections::BTreeMap::new();
    for t in &engine.store().db().tasks {
        for tag in &t.tags {
            *counts.entry(tag.clone()).or_default() += 1;
        }
    }
    println!("{:<16} {}", "Tag", "Count");
    for (tag, c) in counts {
        println!("{:<16} {}", tag, c);
    }
}

/// Handle user management commands.
pub fn cmd_users(engine: &mut CliEngine, action: UserAction) {
    match action {
        UserAction::Add { username, role } => {
            if engine.store().db().get_user_by_name(&username).is_some() {
                eprintln!("User '{}' already exists.", username);
                std::process::exit(1);
            }
            let user = User::new(&username, role);
            match engine.store_mut().save_user(&user) {
                Ok(_) => println!("Added user {} ({})", user.username, format_role(user.role)),
                Err(e) => {
                    eprintln!("Failed to save user: {e}");
                    std::process::exit(1);
                }
            }
        }
        UserAction::List => {
            let db = engine.store().db();
            println!("{:<14} {:<11} {:>8}  {}", "Username", "Role", "XP", "Achievements");
            for u in &db.users {
                println!(
                    "{:<14} {:<11} {:>8}  {}",
                    u.username,
                    format_role(u.role),
                    u.xp,
                    u.achievements.len()
                );
            }
        }
    }
}

/// Handle project management commands.
pub fn cmd_projects(engine: &mut CliEngine, action: ProjectAction) {
    match action {
        ProjectAction::Add { name } => {
            if engine.store().db().get_project_by_name(&name).is_some() {
                eprintln!("Project '{}' already exists.", name);
                std::process::exit(1);
            }
            let project = Project::new(&name, Utc::now().timestamp_millis());
            match engine.store_mut().save_project(&project) {
                Ok(_) => println!("Added project {}", project.name),
                Err(e) => {
                    eprintln!("Failed to save project: {e}");
                    std::process::exit(1);
                }
            }
        }
        ProjectAction::List => {
            let db = engine.store().db();
            println!("{:<20} {:>6}  {:>6}", "Project", "Open", "Done");
            for p in &db.projects {
                let open = db
                    .tasks
                    .iter()
                    .filter(|t| t.project_id == p.id && t.status != Status::Done)
                    .count();
                let done = db
                    .tasks
                    .iter()
                    .filter(|t| t.project_id == p.id && t.status == Status::Done)
                    .count();
                println!("{:<20} {:>6}  {:>6}", p.name, open, done);
            }
        }
    }
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use crate::cli::Cli;
    use clap::CommandFactory;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}
