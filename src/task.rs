//! Task data structures and the patch type used for mutations.
//!
//! This module defines the core `Task` struct with its subtask checklist,
//! comments, append-only activity log and time-tracking fields, plus the
//! `TaskPatch` type that callers hand to the engine instead of mutating
//! task fields directly.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::fields::{Priority, Status};

/// Actor id recorded on audit entries produced by the system itself
/// rather than a signed-in user.
pub const SYSTEM_USER_ID: &str = "system";

/// A single checklist item on a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subtask {
    pub id: String,
    pub title: String,
    pub completed: bool,
}

/// A comment left on a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub created_at: i64,
}

/// One record in a task's append-only activity log.
///
/// Entries are never mutated or reordered after creation. Field-level diffs
/// carry the field name and rendered old/new values; lifecycle entries
/// ("created this task", "started time tracking") carry only the action text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityLogEntry {
    pub id: String,
    pub user_id: String,
    pub action: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
}

impl ActivityLogEntry {
    /// Build a lifecycle entry with no field diff attached.
    pub fn action(user_id: &str, action: impl Into<String>, timestamp: i64) -> Self {
        ActivityLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            action: action.into(),
            timestamp,
            field_name: None,
            old_value: None,
            new_value: None,
        }
    }
}

/// A unit of trackable work.
///
/// `progress` and `completed_at` are derived fields owned by the engine;
/// `timer_started_at` being set means a tracking session is open whose
/// elapsed time is not yet folded into `time_spent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub project_id: String,
    #[serde(default)]
    pub assigned_to: Option<String>,
    pub created_by: String,
    /// Creation time, epoch milliseconds.
    pub created_at: i64,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    /// Set when the most recent status transition entered Done, epoch ms.
    #[serde(default)]
    pub completed_at: Option<i64>,
    pub status: Status,
    pub priority: Priority,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub activity_log: Vec<ActivityLogEntry>,
    /// Accumulated tracked time in whole seconds.
    #[serde(default)]
    pub time_spent: u64,
    /// Open timer session start, epoch ms. None means no session running.
    #[serde(default)]
    pub timer_started_at: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
    /// Derived completion percentage, 0-100.
    #[serde(default)]
    pub progress: u8,
    /// Board sort key.
    #[serde(default)]
    pub order: u32,
}

impl Task {
    /// Count of (completed, total) subtasks.
    pub fn subtask_counts(&self) -> (usize, usize) {
        let done = self.subtasks.iter().filter(|s| s.completed).count();
        (done, self.subtasks.len())
    }
}

/// A partial update to a task.
///
/// Every field is optional; `None` leaves the existing value untouched.
/// Clearable fields use a double `Option`: `Some(None)` clears the value,
/// `Some(Some(v))` replaces it.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub project_id: Option<String>,
    pub assigned_to: Option<Option<String>>,
    pub deadline: Option<Option<NaiveDate>>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub subtasks: Option<Vec<Subtask>>,
    pub comments: Option<Vec<Comment>>,
    pub tags: Option<Vec<String>>,
    pub depends_on: Option<Vec<String>>,
    pub attachments: Option<Vec<String>>,
    pub order: Option<u32>,
}

impl TaskPatch {
    /// Apply this patch on top of an existing task, returning the merged
    /// candidate. Derived fields (`progress`, `completed_at`) are left for
    /// the engine to recompute.
    pub fn merge_into(&self, existing: &Task) -> Task {
        let mut t = existing.clone();
        if let Some(ref s) = self.title {
            t.title = s.clone();
        }
        if let Some(ref s) = self.description {
            t.description = s.clone();
        }
        if let Some(ref p) = self.project_id {
            t.project_id = p.clone();
        }
        if let Some(ref a) = self.assigned_to {
            t.assigned_to = a.clone();
        }
        if let Some(d) = self.deadline {
            t.deadline = d;
        }
        if let Some(s) = self.status {
            t.status = s;
        }
        if let Some(p) = self.priority {
            t.priority = p;
        }
        if let Some(ref s) = self.subtasks {
            t.subtasks = s.clone();
        }
        if let Some(ref c) = self.comments {
            t.comments = c.clone();
        }
        if let Some(ref tags) = self.tags {
            t.tags = tags.clone();
        }
        if let Some(ref d) = self.depends_on {
            t.depends_on = d.clone();
        }
        if let Some(ref a) = self.attachments {
            t.attachments = a.clone();
        }
        if let Some(o) = self.order {
            t.order = o;
        }
        t
    }
}
