//! Derived completion percentage.

use crate::task::Subtask;

/// Completion percentage of a subtask checklist.
///
/// Empty checklists count as 0, not 100; otherwise the percentage is rounded
/// to the nearest whole point. The engine recomputes this on every mutation
/// rather than trusting the value a caller sends.
pub fn progress(subtasks: &[Subtask]) -> u8 {
    if subtasks.is_empty() {
        return 0;
    }
    let done = subtasks.iter().filter(|s| s.completed).count();
    ((100.0 * done as f64) / subtasks.len() as f64).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subtask(completed: bool) -> Subtask {
        Subtask {
            id: uuid::Uuid::new_v4().to_string(),
            title: "step".into(),
            completed,
        }
    }

    #[test]
    fn test_empty_checklist_is_zero() {
        assert_eq!(progress(&[]), 0);
    }

    #[test]
    fn test_single_completed_is_full() {
        assert_eq!(progress(&[subtask(true)]), 100);
    }

    #[test]
    fn test_one_of_three_rounds_down() {
        assert_eq!(progress(&[subtask(true), subtask(false), subtask(false)]), 33);
    }

    #[test]
    fn test_two_of_three_rounds_up() {
        assert_eq!(progress(&[subtask(true), subtask(true), subtask(false)]), 67);
    }

    #[test]
    fn test_half_complete() {
        assert_eq!(progress(&[subtask(true), subtask(false)]), 50);
    }
}
