//! Database container and utility functions for task management.
//!
//! This module provides the `Database` struct holding tasks, users and
//! projects, along with utility functions for date parsing, formatting,
//! and table output used by the command layer.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use chrono::{Datelike, Duration, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::fields::{Priority, Role, Status};
use crate::task::Task;
use crate::user::{Project, User};

/// In-memory database for tasks, users and projects.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Database {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub projects: Vec<Project>,
}

impl Database {
    /// Load database from JSON file, creating a new empty database if file doesn't exist.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Database::default();
        }
        let mut buf = String::new();
        match File::open(path).and_then(|mut f| f.read_to_string(&mut buf)) {
            Ok(_) => match serde_json::from_str(&buf) {
                Ok(db) => db,
                Err(e) => {
                    eprintln!("Error parsing DB, starting fresh: {e}");
                    Database::default()
                }
            },
            Err(e) => {
                eprintln!("Error reading DB, starting fresh: {e}");
                Database::default()
            }
        }
    }

    /// Save database to JSON file using atomic write (temp file + rename).
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        // Atomic-ish write via temp + rename.
        let tmp = path.with_extension("json.tmp");
        let mut f = File::create(&tmp)?;
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        f.write_all(data.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    /// Get a task by id.
    pub fn get_task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Get a user by id.
    pub fn get_user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Get a user by username (case-insensitive).
    pub fn get_user_by_name(&self, username: &str) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.username.eq_ignore_ascii_case(username))
    }

    /// Get a project by id.
    pub fn get_project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// Get a project by name (case-insensitive).
    pub fn get_project_by_name(&self, name: &str) -> Option<&Project> {
        self.projects
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// Normalize a tag string by trimming, lowercasing, and replacing spaces with hyphens.
pub fn normalise_tag(s: &str) -> String {
    s.trim().to_lowercase().replace(' ', "-")
}

/// Split comma-separated tag strings and normalize each tag.
pub fn split_and_normalise_tags(inputs: &[String]) -> Vec<String> {
    let mut tags = Vec::new();
    for raw in inputs {
        for part in raw.split(',') {
            let tag = normalise_tag(part);
            if !tag.is_empty() {
                tags.push(tag);
            }
        }
    }
    tags.sort();
    tags.dedup();
    tags
}

/// Parse human-readable deadline input with natural language support.
///
/// Supports:
/// - "today", "tomorrow"
/// - "end of week", "end of month"
/// - "in 3d", "in 2w"
/// - bare weekday names ("friday")
/// - "YYYY-MM-DD" format
pub fn parse_deadline_input(s: &str) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();
    let today = Local::now().date_naive();

    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return Some(today + Duration::days(1)),
        "end of week" | "eow" => {
            let (_, end) = start_end_of_this_week(today);
            return Some(end);
        }
        "end of month" | "eom" => {
            // Last day of current month
            let year = today.year();
            let month = today.month();
            let next_month = if month == 12 { 1 } else { month + 1 };
            let next_year = if month == 12 { year + 1 } else { year };
            let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
            return Some(first_of_next - Duration::days(1));
        }
        _ => {}
    }

    // "in X" patterns
    if let Some(rest) = s.strip_prefix("in ") {
        if let Some(nd) = rest.strip_suffix('d') {
            if let Ok(days) = nd.trim().parse::<i64>() {
                return Some(today + Duration::days(days));
            }
        }
        if let Some(nw) = rest.strip_suffix('w') {
            if let Ok(weeks) = nw.trim().parse::<i64>() {
                return Some(today + Duration::weeks(weeks));
            }
        }
    }

    // Weekday patterns
    let weekdays = [
        ("monday", 0),
        ("tuesday", 1),
        ("wednesday", 2),
        ("thursday", 3),
        ("friday", 4),
        ("saturday", 5),
        ("sunday", 6),
        ("mon", 0),
        ("tue", 1),
        ("wed", 2),
        ("thu", 3),
        ("fri", 4),
        ("sat", 5),
        ("sun", 6),
    ];

    for (day_name, target_day) in weekdays {
        if s == day_name {
            let current_day = today.weekday().num_days_from_monday() as i32;
            let days_ahead = (target_day + 7 - current_day) % 7;
            let target_date = today + Duration::days(days_ahead as i64);
            return Some(if days_ahead == 0 { today } else { target_date });
        }
    }

    // Try ISO format
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

/// Calculate the start and end dates of the current ISO week (Monday to Sunday).
pub fn start_end_of_this_week(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    // ISO week: Monday start.
    let weekday = today.weekday().num_days_from_monday() as i64;
    let start = today - Duration::days(weekday);
    let end = start + Duration::days(6);
    (start, end)
}

/// Format a deadline relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_deadline_relative(deadline: Option<NaiveDate>, today: NaiveDate) -> String {
    match deadline {
        None => "-".into(),
        Some(d) => {
            let delta = d - today;
            if delta.num_days() == 0 {
                "today".into()
            } else if delta.num_days() == 1 {
                "tomorrow".into()
            } else if delta.num_days() > 1 {
                format!("in {}d", delta.num_days())
            } else {
                format!("{}d late", -delta.num_days())
            }
        }
    }
}

/// Format a task status for display.
pub fn format_status(s: Status) -> &'static str {
    match s {
        Status::Todo => "Todo",
        Status::InProgress => "InProgress",
        Status::Review => "Review",
        Status::Done => "Done",
        Status::Blocked => "Blocked",
    }
}

/// Format a priority level for display.
pub fn format_priority(p: Priority) -> &'static str {
    match p {
        Priority::Low => "Low",
        Priority::Medium => "Medium",
        Priority::High => "High",
        Priority::Critical => "Critical",
    }
}

/// Format a user role for display.
pub fn format_role(r: Role) -> &'static str {
    match r {
        Role::Admin => "Admin",
        Role::Developer => "Developer",
        Role::Viewer => "Viewer",
    }
}

/// Format an accumulated duration in seconds as "2h 5m 30s".
pub fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Format an epoch-millisecond timestamp as local date-time for display.
pub fn format_timestamp(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(dt) => dt
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string(),
        None => "-".into(),
    }
}

/// Print tasks in a formatted table.
pub fn print_table(tasks: &[&Task], db: &Database) {
    // Header.
    println!(
        "{:<10} {:<11} {:<9} {:<10} {:<5} {:<14} {:<12} {}",
        "ID", "Status", "Priority", "Deadline", "Prog", "Project", "Assignee", "Title [tags]"
    );
    let today = Local::now().date_naive();
    for t in tasks {
        let tags = if t.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", t.tags.join(","))
        };
        let deadline = format_deadline_relative(t.deadline, today);
        let project = db
            .get_project(&t.project_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "-".into());
        let assignee = t
            .assigned_to
            .as_deref()
            .and_then(|id| db.get_user(id))
            .map(|u| u.username.clone())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<10} {:<11} {:<9} {:<10} {:>3}%  {:<14} {:<12} {}{}",
            short_id(&t.id),
            format_status(t.status),
            format_priority(t.priority),
            deadline,
            t.progress,
            truncate(&project, 14),
            truncate(&assignee, 12),
            t.title,
            tags
        );
    }
}

/// First eight characters of an id, enough to disambiguate on a board.
pub fn short_id(id: &str) -> &str {
    if id.len() > 8 {
        &id[..8]
    } else {
        id
    }
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}

/// Resolve a task identifier (full id, short id prefix, or exact title) to a task id.
/// Returns an error if the identifier matches multiple tasks.
pub fn resolve_task_identifier(identifier: &str, db: &Database) -> Result<String, String> {
    if let Some(t) = db.get_task(identifier) {
        return Ok(t.id.clone());
    }

    // Short id prefix match
    let prefix_matches: Vec<&Task> = db
        .tasks
        .iter()
        .filter(|t| t.id.starts_with(identifier))
        .collect();
    if prefix_matches.len() == 1 {
        return Ok(prefix_matches[0].id.clone());
    }
    if prefix_matches.len() > 1 {
        return Err(format!(
            "Identifier '{}' is ambiguous ({} matches). Use more characters.",
            identifier,
            prefix_matches.len()
        ));
    }

    // Search by title (case-insensitive)
    let matches: Vec<&Task> = db
        .tasks
        .iter()
        .filter(|t| t.title.to_lowercase() == identifier.to_lowercase())
        .collect();

    match matches.len() {
        0 => Err(format!("No task found matching '{}'", identifier)),
        1 => Ok(matches[0].id.clone()),
        _ => {
            let mut error_msg = format!("Multiple tasks found with title '{}':\n", identifier);
            for task in matches {
                error_msg.push_str(&format!("  {}: {}\n", short_id(&task.id), task.title));
            }
            error_msg.push_str("Please use the id instead.");
            Err(error_msg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_and_normalise_tags() {
        let tags = split_and_normalise_tags(&["Backend, UI".into(), "backend".into()]);
        assert_eq!(tags, vec!["backend".to_string(), "ui".to_string()]);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(7530), "2h 5m 30s");
    }

    #[test]
    fn test_parse_deadline_iso() {
        assert_eq!(
            parse_deadline_input("2026-03-14"),
            NaiveDate::from_ymd_opt(2026, 3, 14)
        );
        assert_eq!(parse_deadline_input("not a date"), None);
    }

    #[test]
    fn test_parse_deadline_relative() {
        let today = Local::now().date_naive();
        assert_eq!(parse_deadline_input("today"), Some(today));
        assert_eq!(
            parse_deadline_input("in 3d"),
            Some(today + Duration::days(3))
        );
        assert_eq!(
            parse_deadline_input("in 2w"),
            Some(today + Duration::weeks(2))
        );
    }

    #[test]
    fn test_start_end_of_week_spans_monday_to_sunday() {
        let wed = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();
        let (start, end) = start_end_of_this_week(wed);
        assert_eq!(start, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2026, 3, 8).unwrap());
    }
}
