//! Field-change tracker: diffs two task snapshots into audit-log entries.
//!
//! Fields are checked in a fixed order so that a mutation touching several
//! fields always yields the same entry sequence. Collections that are
//! rebuilt on every edit (tags, dependencies) are compared as
//! order-independent sets; subtasks are summarised by their completion
//! counts and attachments by count only, to keep entries small.

use std::collections::{BTreeSet, HashMap};

use crate::db::{format_priority, format_status};
use crate::fields::Status;
use crate::task::{ActivityLogEntry, Task};

/// Display-name resolution for ids referenced by audit entries.
#[derive(Debug, Default)]
pub struct Lookups {
    pub user_names: HashMap<String, String>,
    pub project_names: HashMap<String, String>,
}

impl Lookups {
    fn user(&self, id: &str) -> String {
        self.user_names.get(id).cloned().unwrap_or_else(|| id.to_string())
    }

    fn project(&self, id: &str) -> String {
        self.project_names
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }
}

/// Edge-triggered status transition relative to Done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTransition {
    /// Status entered Done from a non-Done state.
    Completed,
    /// Status left Done.
    Reopened,
    None,
}

/// Classify a status change. Saving an already-Done task as Done is not a
/// completion; only the edge counts.
pub fn detect_transition(old: Status, new: Status) -> StatusTransition {
    match (old == Status::Done, new == Status::Done) {
        (false, true) => StatusTransition::Completed,
        (true, false) => StatusTransition::Reopened,
        _ => StatusTransition::None,
    }
}

fn entry(
    actor: &str,
    now_ms: i64,
    action: String,
    field: &str,
    old: Option<String>,
    new: Option<String>,
) -> ActivityLogEntry {
    ActivityLogEntry {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: actor.to_string(),
        action,
        timestamp: now_ms,
        field_name: Some(field.to_string()),
        old_value: old,
        new_value: new,
    }
}

/// Diff two task snapshots into zero or more audit entries, one per changed
/// tracked field, in the fixed field order.
pub fn diff_tasks(
    old: &Task,
    new: &Task,
    actor: &str,
    lookups: &Lookups,
    now_ms: i64,
) -> Vec<ActivityLogEntry> {
    let mut entries = Vec::new();

    if old.title != new.title {
        entries.push(entry(
            actor,
            now_ms,
            format!("changed title from \"{}\" to \"{}\"", old.title, new.title),
            "title",
            Some(old.title.clone()),
            Some(new.title.clone()),
        ));
    }

    if old.description != new.description {
        // Presence only; full text diffs would make entries unbounded.
        let action = match (old.description.is_empty(), new.description.is_empty()) {
            (true, false) => "added a description".to_string(),
            (false, true) => "removed the description".to_string(),
            _ => "updated the description".to_string(),
        };
        entries.push(entry(actor, now_ms, action, "description", None, None));
    }

    if old.status != new.status {
        entries.push(entry(
            actor,
            now_ms,
            format!(
                "changed status from {} to {}",
                format_status(old.status),
                format_status(new.status)
            ),
            "status",
            Some(format_status(old.status).to_string()),
            Some(format_status(new.status).to_string()),
        ));
    }

    if old.priority != new.priority {
        entries.push(entry(
            actor,
            now_ms,
            format!(
                "changed priority from {} to {}",
                format_priority(old.priority),
                format_priority(new.priority)
            ),
            "priority",
            Some(format_priority(old.priority).to_string()),
            Some(format_priority(new.priority).to_string()),
        ));
    }

    if old.assigned_to != new.assigned_to {
        let old_name = old.assigned_to.as_deref().map(|id| lookups.user(id));
        let new_name = new.assigned_to.as_deref().map(|id| lookups.user(id));
        let action = match (&old_name, &new_name) {
            (None, Some(n)) => format!("assigned to {n}"),
            (Some(o), None) => format!("removed assignee {o}"),
            (Some(o), Some(n)) => format!("reassigned from {o} to {n}"),
            (None, None) => unreachable!("both sides None cannot differ"),
        };
        entries.push(entry(actor, now_ms, action, "assigned_to", old_name, new_name));
    }

    if old.deadline != new.deadline {
        let old_s = old.deadline.map(|d| d.to_string());
        let new_s = new.deadline.map(|d| d.to_string());
        let action = match (&old_s, &new_s) {
            (None, Some(n)) => format!("set deadline to {n}"),
            (Some(o), None) => format!("cleared deadline (was {o})"),
            (Some(o), Some(n)) => format!("moved deadline from {o} to {n}"),
            (None, None) => unreachable!("both sides None cannot differ"),
        };
        entries.push(entry(actor, now_ms, action, "deadline", old_s, new_s));
    }

    if old.project_id != new.project_id {
        let old_name = lookups.project(&old.project_id);
        let new_name = lookups.project(&new.project_id);
        entries.push(entry(
            actor,
            now_ms,
            format!("moved from project {old_name} to {new_name}"),
            "project",
            Some(old_name),
            Some(new_name),
        ));
    }

    let old_tags: BTreeSet<&String> = old.tags.iter().collect();
    let new_tags: BTreeSet<&String> = new.tags.iter().collect();
    if old_tags != new_tags {
        let joined = new_tags
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        entries.push(entry(
            actor,
            now_ms,
            if joined.is_empty() {
                "removed all tags".to_string()
            } else {
                format!("updated tags ({joined})")
            },
            "tags",
            Some(old.tags.len().to_string()),
            Some(new.tags.len().to_string()),
        ));
    }

    let old_deps: BTreeSet<&String> = old.depends_on.iter().collect();
    let new_deps: BTreeSet<&String> = new.depends_on.iter().collect();
    if old_deps != new_deps {
        entries.push(entry(
            actor,
            now_ms,
            format!("updated dependencies ({} total)", new_deps.len()),
            "depends_on",
            Some(old_deps.len().to_string()),
            Some(new_deps.len().to_string()),
        ));
    }

    let (old_done, old_total) = old.subtask_counts();
    let (new_done, new_total) = new.subtask_counts();
    if (old_done, old_total) != (new_done, new_total) {
        entries.push(entry(
            actor,
            now_ms,
            format!("updated subtasks ({new_done}/{new_total} complete)"),
            "subtasks",
            Some(format!("{old_done}/{old_total}")),
            Some(format!("{new_done}/{new_total}")),
        ));
    }

    if old.attachments.len() != new.attachments.len() {
        entries.push(entry(
            actor,
            now_ms,
            format!("updated attachments ({} total)", new.attachments.len()),
            "attachments",
            Some(old.attachments.len().to_string()),
            Some(new.attachments.len().to_string()),
        ));
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Priority;
    use crate::task::Subtask;

    fn base_task() -> Task {
        Task {
            id: "t1".into(),
            title: "Fix login".into(),
            description: "Login form rejects valid emails".into(),
            project_id: "p1".into(),
            assigned_to: None,
            created_by: "u1".into(),
            created_at: 0,
            deadline: None,
            completed_at: None,
            status: Status::Todo,
            priority: Priority::Medium,
            subtasks: Vec::new(),
            comments: Vec::new(),
            activity_log: Vec::new(),
            time_spent: 0,
            timer_started_at: None,
            tags: vec!["backend".into(), "auth".into()],
            depends_on: Vec::new(),
            attachments: Vec::new(),
            progress: 0,
            order: 1,
        }
    }

    fn lookups() -> Lookups {
        let mut l = Lookups::default();
        l.user_names.insert("u1".into(), "ada".into());
        l.user_names.insert("u2".into(), "grace".into());
        l.project_names.insert("p1".into(), "Apollo".into());
        l.project_names.insert("p2".into(), "Gemini".into());
        l
    }

    #[test]
    fn test_identical_tasks_produce_no_entries() {
        let old = base_task();
        let new = old.clone();
        assert!(diff_tasks(&old, &new, "u1", &lookups(), 1000).is_empty());
    }

    #[test]
    fn test_title_change_records_old_and_new() {
        let old = base_task();
        let mut new = old.clone();
        new.title = "Fix login redirect".into();
        let entries = diff_tasks(&old, &new, "u1", &lookups(), 1000);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].field_name.as_deref(), Some("title"));
        assert_eq!(entries[0].old_value.as_deref(), Some("Fix login"));
        assert_eq!(entries[0].new_value.as_deref(), Some("Fix login redirect"));
        assert_eq!(entries[0].user_id, "u1");
        assert_eq!(entries[0].timestamp, 1000);
    }

    #[test]
    fn test_description_change_logs_presence_only() {
        let old = base_task();
        let mut new = old.clone();
        new.description = "Completely rewritten".into();
        let entries = diff_tasks(&old, &new, "u1", &lookups(), 0);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "updated the description");
        assert_eq!(entries[0].old_value, None);
        assert_eq!(entries[0].new_value, None);
    }

    #[test]
    fn test_assignee_resolved_to_display_name() {
        let old = base_task();
        let mut new = old.clone();
        new.assigned_to = Some("u2".into());
        let entries = diff_tasks(&old, &new, "u1", &lookups(), 0);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "assigned to grace");
        assert_eq!(entries[0].new_value.as_deref(), Some("grace"));
    }

    #[test]
    fn test_project_move_resolved_to_display_names() {
        let old = base_task();
        let mut new = old.clone();
        new.project_id = "p2".into();
        let entries = diff_tasks(&old, &new, "u1", &lookups(), 0);
        assert_eq!(entries[0].action, "moved from project Apollo to Gemini");
    }

    #[test]
    fn test_reordered_tags_are_not_a_change() {
        let old = base_task();
        let mut new = old.clone();
        new.tags = vec!["auth".into(), "backend".into()];
        assert!(diff_tasks(&old, &new, "u1", &lookups(), 0).is_empty());
    }

    #[test]
    fn test_subtasks_compared_by_counts_only() {
        let mut old = base_task();
        old.subtasks = vec![Subtask {
            id: "s1".into(),
            title: "step one".into(),
            completed: false,
        }];
        let mut new = old.clone();
        // Retitling a subtask leaves the counts untouched.
        new.subtasks[0].title = "step 1".into();
        assert!(diff_tasks(&old, &new, "u1", &lookups(), 0).is_empty());

        new.subtasks[0].completed = true;
        let entries = diff_tasks(&old, &new, "u1", &lookups(), 0);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].old_value.as_deref(), Some("0/1"));
        assert_eq!(entries[0].new_value.as_deref(), Some("1/1"));
    }

    #[test]
    fn test_multiple_changes_emit_in_fixed_field_order() {
        let old = base_task();
        let mut new = old.clone();
        new.attachments = vec!["spec.pdf".into()];
        new.status = Status::InProgress;
        new.title = "Fix login redirect".into();
        new.priority = Priority::High;
        let entries = diff_tasks(&old, &new, "u1", &lookups(), 0);
        let fields: Vec<&str> = entries
            .iter()
            .map(|e| e.field_name.as_deref().unwrap())
            .collect();
        assert_eq!(fields, vec!["title", "status", "priority", "attachments"]);
    }

    #[test]
    fn test_detect_transition_is_edge_triggered() {
        assert_eq!(
            detect_transition(Status::Todo, Status::Done),
            StatusTransition::Completed
        );
        assert_eq!(
            detect_transition(Status::Done, Status::Done),
            StatusTransition::None
        );
        assert_eq!(
            detect_transition(Status::Done, Status::InProgress),
            StatusTransition::Reopened
        );
        assert_eq!(
            detect_transition(Status::Todo, Status::Review),
            StatusTransition::None
        );
    }
}
