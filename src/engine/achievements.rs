//! Achievement catalog and evaluator.
//!
//! Conditions are data, not closures: each achievement carries a
//! `Condition` variant with its thresholds, and one dispatch function
//! evaluates them. Predicates are pure and recomputed from the full task
//! set on every call, so evaluation is idempotent; the permanent unlocked
//! set lives on the user, while toast suppression lives in the
//! session-scoped `SessionContext` and resets on restart.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};

use crate::fields::{Priority, Status};
use crate::notify::{Notifier, Severity};
use crate::task::Task;
use crate::user::User;

/// Predicate parameters for one achievement, evaluated over the tasks
/// assigned to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// At least `count` completed tasks.
    CompletedTasks { count: usize },
    /// At least `count` completed tasks at `min` priority or above.
    PriorityCompletions { min: Priority, count: usize },
    /// At least `seconds` of tracked time across assigned tasks.
    TimeLogged { seconds: u64 },
    /// At least `count` completions whose local hour falls in
    /// [start, end); a window with start > end wraps past midnight.
    CompletionHour { start: u32, end: u32, count: usize },
    /// At least `count` completions on a Saturday or Sunday.
    WeekendCompletions { count: usize },
    /// Completions on `days` consecutive local calendar days.
    CompletionStreak { days: usize },
    /// At least `count` tasks completed within `within_ms` of creation.
    FastCompletion { within_ms: i64, count: usize },
}

/// An unlockable badge with a fixed XP bonus.
#[derive(Debug, Clone)]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub xp_bonus: u64,
    pub condition: Condition,
}

/// The fixed achievement catalog, evaluated in declaration order.
pub const CATALOG: &[Achievement] = &[
    Achievement {
        id: "first-completion",
        name: "First Blood",
        description: "Complete your first task",
        xp_bonus: 50,
        condition: Condition::CompletedTasks { count: 1 },
    },
    Achievement {
        id: "task-slayer",
        name: "Task Slayer",
        description: "Complete 10 tasks",
        xp_bonus: 100,
        condition: Condition::CompletedTasks { count: 10 },
    },
    Achievement {
        id: "closer",
        name: "Closer",
        description: "Complete 25 tasks",
        xp_bonus: 250,
        condition: Condition::CompletedTasks { count: 25 },
    },
    Achievement {
        id: "heavy-lifter",
        name: "Heavy Lifter",
        description: "Complete 5 high or critical priority tasks",
        xp_bonus: 150,
        condition: Condition::PriorityCompletions {
            min: Priority::High,
            count: 5,
        },
    },
    Achievement {
        id: "firefighter",
        name: "Firefighter",
        description: "Complete 3 critical priority tasks",
        xp_bonus: 200,
        condition: Condition::PriorityCompletions {
            min: Priority::Critical,
            count: 3,
        },
    },
    Achievement {
        id: "timekeeper",
        name: "Timekeeper",
        description: "Track 10 hours of work",
        xp_bonus: 150,
        condition: Condition::TimeLogged { seconds: 36_000 },
    },
    Achievement {
        id: "early-bird",
        name: "Early Bird",
        description: "Complete 3 tasks before 9am",
        xp_bonus: 100,
        condition: Condition::CompletionHour {
            start: 5,
            end: 9,
            count: 3,
        },
    },
    Achievement {
        id: "night-owl",
        name: "Night Owl",
        description: "Complete 3 tasks after 10pm",
        xp_bonus: 100,
        condition: Condition::CompletionHour {
            start: 22,
            end: 3,
            count: 3,
        },
    },
    Achievement {
        id: "weekend-warrior",
        name: "Weekend Warrior",
        description: "Complete 5 tasks on weekends",
        xp_bonus: 150,
        condition: Condition::WeekendCompletions { count: 5 },
    },
    Achievement {
        id: "on-a-roll",
        name: "On a Roll",
        description: "Complete tasks on 5 consecutive days",
        xp_bonus: 200,
        condition: Condition::CompletionStreak { days: 5 },
    },
    Achievement {
        id: "quick-draw",
        name: "Quick Draw",
        description: "Complete a task within an hour of creating it",
        xp_bonus: 75,
        condition: Condition::FastCompletion {
            within_ms: 3_600_000,
            count: 1,
        },
    },
];

/// Look up a catalog entry by id.
pub fn find(id: &str) -> Option<&'static Achievement> {
    CATALOG.iter().find(|a| a.id == id)
}

/// Session-scoped set of achievements already announced, so repeated
/// evaluations within one running session do not re-toast. Not persisted.
#[derive(Debug, Default)]
pub struct SessionContext {
    announced: HashSet<String>,
}

impl SessionContext {
    pub fn new() -> Self {
        SessionContext::default()
    }

    pub fn reset(&mut self) {
        self.announced.clear();
    }
}

fn local_time(ms: i64) -> Option<DateTime<Local>> {
    Local.timestamp_millis_opt(ms).single()
}

fn completions<'a>(user: &User, tasks: &'a [Task]) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|t| {
            t.assigned_to.as_deref() == Some(user.id.as_str())
                && t.status == Status::Done
                && t.completed_at.is_some()
        })
        .collect()
}

fn hour_in_window(hour: u32, start: u32, end: u32) -> bool {
    if start <= end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

/// Whether some run of `days` consecutive calendar dates exists among the
/// given completion timestamps. Dates are local, deduplicated, sorted, then
/// scanned for a run of entries exactly one day apart.
fn has_streak(completed_ms: &[i64], days: usize) -> bool {
    if days == 0 {
        return true;
    }
    let mut day_numbers: Vec<i64> = completed_ms
        .iter()
        .filter_map(|&ms| local_time(ms))
        .map(|dt| i64::from(dt.date_naive().num_days_from_ce()))
        .collect();
    day_numbers.sort_unstable();
    day_numbers.dedup();

    let mut run = 1usize;
    for pair in day_numbers.windows(2) {
        if pair[1] == pair[0] + 1 {
            run += 1;
            if run >= days {
                return true;
            }
        } else {
            run = 1;
        }
    }
    run >= days && !day_numbers.is_empty()
}

/// Evaluate one condition against a user and the full task set.
pub fn holds(condition: &Condition, user: &User, tasks: &[Task]) -> bool {
    let done = completions(user, tasks);
    match condition {
        Condition::CompletedTasks { count } => done.len() >= *count,
        Condition::PriorityCompletions { min, count } => {
            done.iter().filter(|t| t.priority >= *min).count() >= *count
        }
        Condition::TimeLogged { seconds } => {
            let total: u64 = tasks
                .iter()
                .filter(|t| t.assigned_to.as_deref() == Some(user.id.as_str()))
                .map(|t| t.time_spent)
                .sum();
            total >= *seconds
        }
        Condition::CompletionHour { start, end, count } => {
            done.iter()
                .filter_map(|t| t.completed_at.and_then(local_time))
                .filter(|dt| hour_in_window(dt.hour(), *start, *end))
                .count()
                >= *count
        }
        Condition::WeekendCompletions { count } => {
            done.iter()
                .filter_map(|t| t.completed_at.and_then(local_time))
                .filter(|dt| {
                    matches!(dt.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
                })
                .count()
                >= *count
        }
        Condition::CompletionStreak { days } => {
            let stamps: Vec<i64> = done.iter().filter_map(|t| t.completed_at).collect();
            has_streak(&stamps, *days)
        }
        Condition::FastCompletion { within_ms, count } => {
            done.iter()
                .filter(|t| {
                    t.completed_at
                        .map(|c| c - t.created_at <= *within_ms)
                        .unwrap_or(false)
                })
                .count()
                >= *count
        }
    }
}

/// Run the catalog against a user, unlocking every achievement whose
/// condition newly holds. Pushes ids, adds XP bonuses, announces each unlock
/// at most once per session, and returns the total XP gained.
pub fn evaluate<N: Notifier>(
    user: &mut User,
    tasks: &[Task],
    session: &mut SessionContext,
    notifier: &mut N,
) -> u64 {
    let mut gained = 0u64;
    for achievement in CATALOG {
        if user.achievements.iter().any(|a| a == achievement.id) {
            continue;
        }
        if holds(&achievement.condition, user, tasks) {
            user.achievements.push(achievement.id.to_string());
            user.xp += achievement.xp_bonus;
            gained += achievement.xp_bonus;
            tracing::debug!(
                achievement = achievement.id,
                user = %user.username,
                "achievement unlocked"
            );
            if session.announced.insert(achievement.id.to_string()) {
                notifier.notify(
                    &format!(
                        "Achievement unlocked: {} (+{} XP)",
                        achievement.name, achievement.xp_bonus
                    ),
                    Severity::Success,
                );
            }
        }
    }
    gained
}
