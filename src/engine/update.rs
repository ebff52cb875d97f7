//! Task mutation orchestrator.
//!
//! `TaskEngine` is the single entry point for task mutations. It merges a
//! patch into the existing task, recomputes derived fields, builds the audit
//! entries, persists through the `Store` port, and runs achievement and XP
//! evaluation afterwards. Task fields are never assigned directly by
//! callers; everything funnels through here so the audit trail and derived
//! fields stay consistent.
//!
//! Failure contract: a task-save failure aborts the orchestration before any
//! XP or achievement work and surfaces to the caller, whose in-memory edits
//! survive for a retry. A user-save failure after a committed task save is
//! logged and reported as a warning only; the task mutation is the
//! authoritative transaction and XP sync is best-effort.

use crate::clock::Clock;
use crate::config::XpConfig;
use crate::engine::achievements::{self, SessionContext};
use crate::engine::changes::{detect_transition, diff_tasks, Lookups, StatusTransition};
use crate::engine::progress::progress;
use crate::engine::timer;
use crate::error::{Error, Result};
use crate::fields::{Priority, Status};
use crate::notify::{Notifier, Severity};
use crate::store::Store;
use crate::task::{ActivityLogEntry, Comment, Task, TaskPatch, SYSTEM_USER_ID};
use crate::user::User;

/// Orchestrates task mutations against a store, a clock and a notifier.
pub struct TaskEngine<S: Store, C: Clock, N: Notifier> {
    store: S,
    clock: C,
    notifier: N,
    xp: XpConfig,
    session: SessionContext,
}

fn validate(task: &Task) -> Result<()> {
    if task.title.trim().is_empty() {
        return Err(Error::Validation("title"));
    }
    if task.description.trim().is_empty() {
        return Err(Error::Validation("description"));
    }
    if task.project_id.trim().is_empty() {
        return Err(Error::Validation("project"));
    }
    Ok(())
}

impl<S: Store, C: Clock, N: Notifier> TaskEngine<S, C, N> {
    pub fn new(store: S, clock: C, notifier: N, xp: XpConfig) -> Self {
        TaskEngine {
            store,
            clock,
            notifier,
            xp,
            session: SessionContext::new(),
        }
    }

    /// Read access to the underlying store, for listing commands.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access to the underlying store, for user and project upserts
    /// that do not flow through task mutations.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Create a new task from a patch. Creation seeds a single "created"
    /// audit entry instead of field diffs and never awards completion XP.
    pub fn create_task(&mut self, patch: &TaskPatch, actor: &mut User) -> Result<Task> {
        let now = self.clock.now_ms();
        let next_order = self
            .store
            .load_tasks()?
            .iter()
            .map(|t| t.order)
            .max()
            .unwrap_or(0)
            + 1;
        let blank = Task {
            id: uuid::Uuid::new_v4().to_string(),
            title: String::new(),
            description: String::new(),
            project_id: String::new(),
            assigned_to: None,
            created_by: actor.id.clone(),
            created_at: now,
            deadline: None,
            completed_at: None,
            status: Status::Todo,
            priority: Priority::Medium,
            subtasks: Vec::new(),
            comments: Vec::new(),
            activity_log: Vec::new(),
            time_spent: 0,
            timer_started_at: None,
            tags: Vec::new(),
            depends_on: Vec::new(),
            attachments: Vec::new(),
            progress: 0,
            order: next_order,
        };
        let mut candidate = patch.merge_into(&blank);
        validate(&candidate)?;
        candidate.progress = progress(&candidate.subtasks);
        if candidate.status == Status::Done {
            candidate.completed_at = Some(now);
        }
        candidate
            .activity_log
            .push(ActivityLogEntry::action(&actor.id, "created this task", now));

        let saved = self.store.save_task(&candidate)?;
        tracing::debug!(task = %saved.id, "task created");
        self.evaluate_and_sync_user(actor, 0);
        Ok(saved)
    }

    /// Apply a patch to an existing task.
    ///
    /// Steps run in a fixed order: merge, validate, recompute progress, diff
    /// into audit entries, stamp or clear `completed_at`, persist, then XP
    /// and achievement evaluation. Completion XP is edge-triggered on the
    /// status transition into Done and never compounds on repeated saves.
    pub fn update_task(
        &mut self,
        task_id: &str,
        patch: &TaskPatch,
        actor: &mut User,
    ) -> Result<Task> {
        let existing = self
            .store
            .load_task(task_id)?
            .ok_or_else(|| Error::NotFound(task_id.to_string()))?;
        let now = self.clock.now_ms();

        let mut candidate = patch.merge_into(&existing);
        validate(&candidate)?;
        candidate.progress = progress(&candidate.subtasks);

        let lookups = self.lookups();
        let entries = diff_tasks(&existing, &candidate, &actor.id, &lookups, now);
        candidate.activity_log.extend(entries);

        let transition = detect_transition(existing.status, candidate.status);
        let xp_delta = match transition {
            StatusTransition::Completed => {
                candidate.completed_at = Some(now);
                self.completion_xp(candidate.priority)
            }
            StatusTransition::Reopened => {
                candidate.completed_at = None;
                0
            }
            StatusTransition::None => 0,
        };

        let saved = self.store.save_task(&candidate)?;
        tracing::debug!(task = %saved.id, xp_delta, "task updated");
        self.evaluate_and_sync_user(actor, xp_delta);
        Ok(saved)
    }

    /// Append a comment to a task.
    pub fn add_comment(&mut self, task_id: &str, text: &str, actor: &mut User) -> Result<Task> {
        let mut task = self.load_required(task_id)?;
        let now = self.clock.now_ms();
        task.comments.push(Comment {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: actor.id.clone(),
            text: text.to_string(),
            created_at: now,
        });
        task.activity_log
            .push(ActivityLogEntry::action(&actor.id, "added a comment", now));
        let saved = self.store.save_task(&task)?;
        self.evaluate_and_sync_user(actor, 0);
        Ok(saved)
    }

    /// Open a time-tracking session on a task. No-op if one is running.
    pub fn start_timer(&mut self, task_id: &str, actor: &mut User) -> Result<Task> {
        let mut task = self.load_required(task_id)?;
        if !timer::start_timer(&mut task, &actor.id, self.clock.now_ms()) {
            return Ok(task);
        }
        self.store.save_task(&task)
    }

    /// Close the open session, folding elapsed time into `time_spent`.
    /// Idempotent: stopping a stopped timer changes nothing.
    pub fn stop_timer(&mut self, task_id: &str, actor: &mut User) -> Result<Task> {
        let mut task = self.load_required(task_id)?;
        if !timer::stop_timer(&mut task, &actor.id, self.clock.now_ms()) {
            return Ok(task);
        }
        let saved = self.store.save_task(&task)?;
        self.evaluate_and_sync_user(actor, 0);
        Ok(saved)
    }

    /// Fold the open session and restart its clock, without closing it.
    /// Long-running callers fire this on a fixed interval to bound the time
    /// lost if the process dies with a timer running.
    pub fn timer_heartbeat(&mut self, task_id: &str) -> Result<Task> {
        let mut task = self.load_required(task_id)?;
        if !timer::heartbeat(&mut task, self.clock.now_ms()) {
            return Ok(task);
        }
        self.store.save_task(&task)
    }

    /// Stop a timer left running when a task detail view is opened, so a
    /// session nobody is watching cannot accrue unbounded time. The audit
    /// entry is attributed to the system rather than the viewer.
    pub fn reconcile_timer_on_open(&mut self, task_id: &str) -> Result<Task> {
        let mut task = self.load_required(task_id)?;
        if !timer::stop_timer(&mut task, SYSTEM_USER_ID, self.clock.now_ms()) {
            return Ok(task);
        }
        self.store.save_task(&task)
    }

    /// Remove a task. Pass-through to the store.
    pub fn delete_task(&mut self, task_id: &str) -> Result<bool> {
        self.store.delete_task(task_id)
    }

    fn load_required(&self, task_id: &str) -> Result<Task> {
        self.store
            .load_task(task_id)?
            .ok_or_else(|| Error::NotFound(task_id.to_string()))
    }

    fn completion_xp(&self, priority: Priority) -> u64 {
        let mut xp = self.xp.base_completion;
        match priority {
            Priority::High => xp += self.xp.high_bonus,
            Priority::Critical => xp += self.xp.critical_bonus,
            Priority::Low | Priority::Medium => {}
        }
        xp
    }

    fn lookups(&self) -> Lookups {
        let mut lookups = Lookups::default();
        if let Ok(users) = self.store.load_users() {
            for u in users {
                lookups.user_names.insert(u.id, u.username);
            }
        }
        if let Ok(projects) = self.store.load_projects() {
            for p in projects {
                lookups.project_names.insert(p.id, p.name);
            }
        }
        lookups
    }

    /// The post-save tail: apply any completion XP to the acting user, run
    /// achievement evaluation over the committed task set, and persist the
    /// user when anything changed. Runs only after a successful task save;
    /// its own failures never unwind the task mutation.
    fn evaluate_and_sync_user(&mut self, actor: &mut User, xp_delta: u64) {
        if actor.id == SYSTEM_USER_ID {
            return;
        }
        let xp_before = actor.xp;
        let unlocked_before = actor.achievements.len();
        actor.xp += xp_delta;

        let tasks = match self.store.load_tasks() {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::warn!(error = %e, "task reload failed; evaluating achievements on an empty set");
                Vec::new()
            }
        };
        achievements::evaluate(actor, &tasks, &mut self.session, &mut self.notifier);

        if actor.xp != xp_before || actor.achievements.len() != unlocked_before {
            if let Err(e) = self.store.save_user(actor) {
                tracing::warn!(
                    error = %e,
                    user = %actor.username,
                    "user save failed; task mutation already committed"
                );
                self.notifier.notify(
                    &format!("Could not sync XP for {}: {e}", actor.username),
                    Severity::Warning,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::clock::FixedClock;
    use crate::engine::achievements::find;
    use crate::fields::Role;
    use crate::store::MemoryStore;
    use crate::task::Subtask;
    use crate::user::Project;

    #[derive(Clone, Default)]
    struct Recorder {
        events: Rc<RefCell<Vec<String>>>,
    }

    impl Notifier for Recorder {
        fn notify(&mut self, message: &str, _severity: Severity) {
            self.events.borrow_mut().push(message.to_string());
        }
    }

    const START_MS: i64 = 1_770_000_000_000;

    fn engine() -> (
        TaskEngine<MemoryStore, FixedClock, Recorder>,
        FixedClock,
        Recorder,
        User,
    ) {
        let clock = FixedClock::new(START_MS);
        let recorder = Recorder::default();
        let mut store = MemoryStore::new();
        let mut user = User::new("ada", Role::Developer);
        user.id = "u1".into();
        store.db.users.push(user.clone());
        store.db.projects.push(Project {
            id: "p1".into(),
            name: "Apollo".into(),
            created_at: 0,
        });
        let engine = TaskEngine::new(store, clock.clone(), recorder.clone(), XpConfig::default());
        (engine, clock, recorder, user)
    }

    fn draft(priority: Priority) -> TaskPatch {
        TaskPatch {
            title: Some("Ship the release".into()),
            description: Some("Cut and publish v2".into()),
            project_id: Some("p1".into()),
            assigned_to: Some(Some("u1".into())),
            priority: Some(priority),
            ..TaskPatch::default()
        }
    }

    #[test]
    fn test_create_seeds_single_created_entry() {
        let (mut eng, _clock, _rec, mut user) = engine();
        let task = eng.create_task(&draft(Priority::Medium), &mut user).unwrap();
        assert_eq!(task.activity_log.len(), 1);
        assert_eq!(task.activity_log[0].action, "created this task");
        assert_eq!(task.activity_log[0].user_id, "u1");
        assert_eq!(task.progress, 0);
        assert_eq!(task.status, Status::Todo);
        assert_eq!(task.completed_at, None);
        assert_eq!(task.order, 1);
        assert_eq!(user.xp, 0);
    }

    #[test]
    fn test_create_rejects_missing_required_fields() {
        let (mut eng, _clock, _rec, mut user) = engine();
        let patch = TaskPatch {
            title: Some("No description".into()),
            project_id: Some("p1".into()),
            ..TaskPatch::default()
        };
        let err = eng.create_task(&patch, &mut user).unwrap_err();
        assert!(matches!(err, Error::Validation("description")));
        assert!(eng.store().db.tasks.is_empty());
    }

    #[test]
    fn test_update_unknown_task_is_not_found() {
        let (mut eng, _clock, _rec, mut user) = engine();
        let err = eng
            .update_task("missing", &TaskPatch::default(), &mut user)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_completing_high_priority_grants_base_plus_bonus_once() {
        let (mut eng, _clock, _rec, mut user) = engine();
        let task = eng.create_task(&draft(Priority::High), &mut user).unwrap();

        let done = TaskPatch {
            status: Some(Status::Done),
            ..TaskPatch::default()
        };
        let task = eng.update_task(&task.id, &done, &mut user).unwrap();
        assert_eq!(task.completed_at, Some(START_MS));

        let first_bonus = find("first-completion").unwrap().xp_bonus;
        let quick_bonus = find("quick-draw").unwrap().xp_bonus;
        let expected = 150 + 100 + first_bonus + quick_bonus;
        assert_eq!(user.xp, expected);

        // Saving the already-Done task again must not award anything.
        let retitle = TaskPatch {
            title: Some("Ship the release, again".into()),
            ..TaskPatch::default()
        };
        eng.update_task(&task.id, &retitle, &mut user).unwrap();
        assert_eq!(user.xp, expected);
    }

    #[test]
    fn test_completion_xp_uses_critical_bonus() {
        let (mut eng, _clock, _rec, mut user) = engine();
        let task = eng.create_task(&draft(Priority::Critical), &mut user).unwrap();
        let done = TaskPatch {
            status: Some(Status::Done),
            ..TaskPatch::default()
        };
        eng.update_task(&task.id, &done, &mut user).unwrap();
        let first_bonus = find("first-completion").unwrap().xp_bonus;
        let quick_bonus = find("quick-draw").unwrap().xp_bonus;
        assert_eq!(user.xp, 150 + 250 + first_bonus + quick_bonus);
    }

    #[test]
    fn test_task_save_failure_aborts_xp_and_achievements() {
        let (mut eng, _clock, _rec, mut user) = engine();
        let task = eng.create_task(&draft(Priority::High), &mut user).unwrap();

        eng.store_mut().fail_task_saves = true;
        let done = TaskPatch {
            status: Some(Status::Done),
            ..TaskPatch::default()
        };
        let err = eng.update_task(&task.id, &done, &mut user).unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
        assert_eq!(user.xp, 0);
        assert!(user.achievements.is_empty());

        // The stored task is untouched and the caller may retry.
        let stored = eng.store().db.get_task(&task.id).unwrap();
        assert_eq!(stored.status, Status::Todo);
        assert_eq!(stored.completed_at, None);
    }

    #[test]
    fn test_user_save_failure_keeps_task_commit() {
        let (mut eng, _clock, rec, mut user) = engine();
        let task = eng.create_task(&draft(Priority::Medium), &mut user).unwrap();

        eng.store_mut().fail_user_saves = true;
        let done = TaskPatch {
            status: Some(Status::Done),
            ..TaskPatch::default()
        };
        let saved = eng.update_task(&task.id, &done, &mut user).unwrap();
        assert_eq!(saved.status, Status::Done);

        // In-memory XP survives; the failure is reported as a warning.
        assert!(user.xp > 0);
        let events = rec.events.borrow();
        assert!(events.iter().any(|m| m.contains("Could not sync XP")));
    }

    #[test]
    fn test_reopening_clears_completed_at_without_clawback() {
        let (mut eng, _clock, _rec, mut user) = engine();
        let task = eng.create_task(&draft(Priority::Medium), &mut user).unwrap();
        let done = TaskPatch {
            status: Some(Status::Done),
            ..TaskPatch::default()
        };
        eng.update_task(&task.id, &done, &mut user).unwrap();
        let xp_after_done = user.xp;

        let reopen = TaskPatch {
            status: Some(Status::InProgress),
            ..TaskPatch::default()
        };
        let task = eng.update_task(&task.id, &reopen, &mut user).unwrap();
        assert_eq!(task.completed_at, None);
        assert_eq!(task.status, Status::InProgress);
        assert_eq!(user.xp, xp_after_done);
    }

    #[test]
    fn test_progress_recomputed_from_merged_subtasks() {
        let (mut eng, _clock, _rec, mut user) = engine();
        let task = eng.create_task(&draft(Priority::Medium), &mut user).unwrap();

        let patch = TaskPatch {
            subtasks: Some(vec![
                Subtask {
                    id: "s1".into(),
                    title: "write notes".into(),
                    completed: true,
                },
                Subtask {
                    id: "s2".into(),
                    title: "publish".into(),
                    completed: false,
                },
            ]),
            ..TaskPatch::default()
        };
        let task = eng.update_task(&task.id, &patch, &mut user).unwrap();
        assert_eq!(task.progress, 50);
    }

    #[test]
    fn test_timer_round_trip_through_engine() {
        let (mut eng, clock, _rec, mut user) = engine();
        let task = eng.create_task(&draft(Priority::Medium), &mut user).unwrap();

        let task = eng.start_timer(&task.id, &mut user).unwrap();
        assert_eq!(task.timer_started_at, Some(START_MS));

        clock.advance_ms(90_000);
        let task = eng.stop_timer(&task.id, &mut user).unwrap();
        assert_eq!(task.time_spent, 90);
        assert_eq!(task.timer_started_at, None);

        // Stopping again is a no-op and adds no audit entries.
        let entries_before = task.activity_log.len();
        let task = eng.stop_timer(&task.id, &mut user).unwrap();
        assert_eq!(task.time_spent, 90);
        assert_eq!(task.activity_log.len(), entries_before);
    }

    #[test]
    fn test_heartbeat_and_stop_do_not_double_count() {
        let (mut eng, clock, _rec, mut user) = engine();
        let task = eng.create_task(&draft(Priority::Medium), &mut user).unwrap();
        eng.start_timer(&task.id, &mut user).unwrap();

        clock.advance_ms(30_000);
        let task = eng.timer_heartbeat(&task.id).unwrap();
        assert_eq!(task.time_spent, 30);
        assert_eq!(task.timer_started_at, Some(START_MS + 30_000));

        clock.advance_ms(15_000);
        let task = eng.stop_timer(&task.id, &mut user).unwrap();
        assert_eq!(task.time_spent, 45);

        // A heartbeat racing a completed stop sees a stopped timer.
        let task = eng.timer_heartbeat(&task.id).unwrap();
        assert_eq!(task.time_spent, 45);
        assert_eq!(task.timer_started_at, None);
    }

    #[test]
    fn test_reconcile_on_open_stops_timer_as_system() {
        let (mut eng, clock, _rec, mut user) = engine();
        let task = eng.create_task(&draft(Priority::Medium), &mut user).unwrap();
        eng.start_timer(&task.id, &mut user).unwrap();

        clock.advance_ms(60_000);
        let task = eng.reconcile_timer_on_open(&task.id).unwrap();
        assert_eq!(task.time_spent, 60);
        assert_eq!(task.timer_started_at, None);
        let last = task.activity_log.last().unwrap();
        assert_eq!(last.user_id, SYSTEM_USER_ID);
    }

    #[test]
    fn test_end_to_end_audit_scenario() {
        let (mut eng, _clock, _rec, mut user) = engine();

        // Create with no subtasks.
        let task = eng.create_task(&draft(Priority::Medium), &mut user).unwrap();
        assert_eq!(task.progress, 0);

        // Add two subtasks, one complete.
        let patch = TaskPatch {
            subtasks: Some(vec![
                Subtask {
                    id: "s1".into(),
                    title: "draft".into(),
                    completed: true,
                },
                Subtask {
                    id: "s2".into(),
                    title: "review".into(),
                    completed: false,
                },
            ]),
            ..TaskPatch::default()
        };
        let task = eng.update_task(&task.id, &patch, &mut user).unwrap();
        assert_eq!(task.progress, 50);

        // Complete.
        let done = TaskPatch {
            status: Some(Status::Done),
            ..TaskPatch::default()
        };
        let task = eng.update_task(&task.id, &done, &mut user).unwrap();
        assert_eq!(task.progress, 50);
        assert!(task.completed_at.is_some());
        let xp_after_done = user.xp;
        assert!(xp_after_done >= 150);

        // Revert to in-progress.
        let reopen = TaskPatch {
            status: Some(Status::InProgress),
            ..TaskPatch::default()
        };
        let task = eng.update_task(&task.id, &reopen, &mut user).unwrap();
        assert_eq!(task.completed_at, None);
        assert_eq!(user.xp, xp_after_done);

        let actions: Vec<(&Option<String>, &str)> = task
            .activity_log
            .iter()
            .map(|e| (&e.field_name, e.action.as_str()))
            .collect();
        assert_eq!(task.activity_log.len(), 4);
        assert_eq!(actions[0].1, "created this task");
        assert_eq!(task.activity_log[1].field_name.as_deref(), Some("subtasks"));
        assert_eq!(task.activity_log[2].field_name.as_deref(), Some("status"));
        assert_eq!(
            task.activity_log[2].new_value.as_deref(),
            Some("Done")
        );
        assert_eq!(task.activity_log[3].field_name.as_deref(), Some("status"));
        assert_eq!(
            task.activity_log[3].old_value.as_deref(),
            Some("Done")
        );
    }
}
