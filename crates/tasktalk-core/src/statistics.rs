use serde::Serialize;

use crate::task::Task;

/// Active/completed split of a task list, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TaskStatistics {
    pub is_empty: bool,
    pub active_percent: f32,
    pub completed_percent: f32,
}

impl TaskStatistics {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let total = tasks.len();
        if total == 0 {
            return Self {
                is_empty: true,
                active_percent: 0.0,
                completed_percent: 0.0,
            };
        }

        let active = tasks.iter().filter(|t| t.is_active()).count();
        let active_percent = 100.0 * active as f32 / total as f32;
        Self {
            is_empty: false,
            active_percent,
            completed_percent: 100.0 - active_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(completed: bool) -> Task {
        Task {
            completed,
            ..Task::new("t", "")
        }
    }

    #[test]
    fn empty_list_has_zero_percentages() {
        let stats = TaskStatistics::from_tasks(&[]);
        assert!(stats.is_empty);
        assert_eq!(stats.active_percent, 0.0);
        assert_eq!(stats.completed_percent, 0.0);
    }

    #[test]
    fn one_active_one_completed_is_even_split() {
        let stats = TaskStatistics::from_tasks(&[task(false), task(true)]);
        assert!(!stats.is_empty);
        assert_eq!(stats.active_percent, 50.0);
        assert_eq!(stats.completed_percent, 50.0);
    }

    #[test]
    fn all_completed() {
        let stats = TaskStatistics::from_tasks(&[task(true), task(true), task(true)]);
        assert_eq!(stats.active_percent, 0.0);
        assert_eq!(stats.completed_percent, 100.0);
    }

    #[test]
    fn thirds_sum_to_hundred() {
        let stats = TaskStatistics::from_tasks(&[task(false), task(true), task(true)]);
        assert!((stats.active_percent - 33.333_332).abs() < 1e-3);
        assert!((stats.active_percent + stats.completed_percent - 100.0).abs() < 1e-4);
    }
}
