//! Per-task time tracking.
//!
//! A task is either Stopped (`timer_started_at` is None) or Running. Stop and
//! heartbeat both fold elapsed wall-clock time through `elapsed_seconds`, so
//! the two paths can never account the same interval differently. Whichever
//! of a manual stop and a heartbeat runs first nulls `timer_started_at`; the
//! loser sees a stopped timer and becomes a no-op instead of double-crediting.

use crate::db::format_duration;
use crate::task::{ActivityLogEntry, Task};

/// Elapsed whole seconds between a session start and now, rounded to the
/// nearest second. Clock skew making `now` earlier than the start counts as
/// zero rather than going negative.
pub fn elapsed_seconds(started_ms: i64, now_ms: i64) -> u64 {
    let delta_ms = (now_ms - started_ms).max(0);
    ((delta_ms as f64) / 1000.0).round() as u64
}

/// Open a tracking session. Returns false (and changes nothing) if a session
/// is already running.
pub fn start_timer(task: &mut Task, actor: &str, now_ms: i64) -> bool {
    if task.timer_started_at.is_some() {
        return false;
    }
    task.timer_started_at = Some(now_ms);
    task.activity_log
        .push(ActivityLogEntry::action(actor, "started time tracking", now_ms));
    true
}

/// Close a tracking session, folding elapsed time into `time_spent`.
/// Returns false (and changes nothing) if no session is running, so calling
/// stop twice is idempotent.
pub fn stop_timer(task: &mut Task, actor: &str, now_ms: i64) -> bool {
    let Some(started) = task.timer_started_at else {
        return false;
    };
    let elapsed = elapsed_seconds(started, now_ms);
    task.time_spent += elapsed;
    task.timer_started_at = None;
    task.activity_log.push(ActivityLogEntry::action(
        actor,
        format!("stopped time tracking ({})", format_duration(elapsed)),
        now_ms,
    ));
    true
}

/// Fold the open session into `time_spent` and restart the session clock at
/// now. Long-running callers fire this periodically so an abandoned session
/// loses at most one interval. No-op on a stopped timer; no audit entry.
pub fn heartbeat(task: &mut Task, now_ms: i64) -> bool {
    let Some(started) = task.timer_started_at else {
        return false;
    };
    task.time_spent += elapsed_seconds(started, now_ms);
    task.timer_started_at = Some(now_ms);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{Priority, Status};

    fn task() -> Task {
        Task {
            id: "t1".into(),
            title: "Sample".into(),
            description: "desc".into(),
            project_id: "p1".into(),
            assigned_to: None,
            created_by: "u1".into(),
            created_at: 0,
            deadline: None,
            completed_at: None,
            status: Status::Todo,
            priority: Priority::Low,
            subtasks: Vec::new(),
            comments: Vec::new(),
            activity_log: Vec::new(),
            time_spent: 0,
            timer_started_at: None,
            tags: Vec::new(),
            depends_on: Vec::new(),
            attachments: Vec::new(),
            progress: 0,
            order: 1,
        }
    }

    #[test]
    fn test_start_then_stop_accumulates_elapsed() {
        let mut t = task();
        assert!(start_timer(&mut t, "u1", 10_000));
        assert_eq!(t.timer_started_at, Some(10_000));
        assert_eq!(t.time_spent, 0);

        assert!(stop_timer(&mut t, "u1", 95_500));
        assert_eq!(t.time_spent, 86); // 85.5s rounds up
        assert_eq!(t.timer_started_at, None);
        assert_eq!(t.activity_log.len(), 2);
        assert_eq!(t.activity_log[1].action, "stopped time tracking (1m 26s)");
    }

    #[test]
    fn test_start_while_running_is_a_no_op() {
        let mut t = task();
        assert!(start_timer(&mut t, "u1", 10_000));
        assert!(!start_timer(&mut t, "u1", 20_000));
        assert_eq!(t.timer_started_at, Some(10_000));
        assert_eq!(t.activity_log.len(), 1);
    }

    #[test]
    fn test_stop_twice_is_idempotent() {
        let mut t = task();
        start_timer(&mut t, "u1", 0);
        assert!(stop_timer(&mut t, "u1", 30_000));
        assert!(!stop_timer(&mut t, "u1", 60_000));
        assert_eq!(t.time_spent, 30);
        assert_eq!(t.timer_started_at, None);
    }

    #[test]
    fn test_heartbeat_folds_and_restarts_session() {
        let mut t = task();
        start_timer(&mut t, "u1", 0);
        assert!(heartbeat(&mut t, 30_000));
        assert_eq!(t.time_spent, 30);
        assert_eq!(t.timer_started_at, Some(30_000));

        // Final stop only credits time since the last fold.
        stop_timer(&mut t, "u1", 45_000);
        assert_eq!(t.time_spent, 45);
    }

    #[test]
    fn test_heartbeat_on_stopped_timer_is_a_no_op() {
        let mut t = task();
        assert!(!heartbeat(&mut t, 30_000));
        assert_eq!(t.time_spent, 0);
        assert_eq!(t.timer_started_at, None);
    }

    #[test]
    fn test_elapsed_never_negative() {
        assert_eq!(elapsed_seconds(10_000, 9_000), 0);
        assert_eq!(elapsed_seconds(0, 1_499), 1);
        assert_eq!(elapsed_seconds(0, 1_500), 2);
    }
}
