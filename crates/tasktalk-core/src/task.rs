use serde::{Deserialize, Serialize};

/// A to-do item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Task {
    /// `None` until the task has been inserted.
    pub id: Option<i64>,
    pub title: String,
    pub description: String,
    pub completed: bool,
}

impl Task {
    pub fn new(title: &str, description: &str) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            description: description.to_string(),
            completed: false,
        }
    }

    /// Title shown in lists; falls back to the description.
    pub fn title_for_list(&self) -> &str {
        if self.title.is_empty() {
            &self.description
        } else {
            &self.title
        }
    }

    pub fn is_active(&self) -> bool {
        !self.completed
    }

    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.description.trim().is_empty()
    }
}

/// Which tasks the list screen shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TaskFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl TaskFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskFilter::All => "all",
            TaskFilter::Active => "active",
            TaskFilter::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "all" => Some(TaskFilter::All),
            "active" => Some(TaskFilter::Active),
            "completed" => Some(TaskFilter::Completed),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskFilter::All => "All Tasks",
            TaskFilter::Active => "Active Tasks",
            TaskFilter::Completed => "Completed Tasks",
        }
    }

    pub fn empty_message(&self) -> &'static str {
        match self {
            TaskFilter::All => "You have no tasks!",
            TaskFilter::Active => "You have no active tasks!",
            TaskFilter::Completed => "You have no completed tasks!",
        }
    }

    /// Only the unfiltered list offers the "add task" affordance.
    pub fn allows_adding(&self) -> bool {
        matches!(self, TaskFilter::All)
    }

    pub fn matches(&self, task: &Task) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Active => task.is_active(),
            TaskFilter::Completed => task.completed,
        }
    }

    pub fn apply(&self, tasks: &[Task]) -> Vec<Task> {
        tasks.iter().filter(|t| self.matches(t)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Task> {
        let mut done = Task::new("Done", "");
        done.completed = true;
        vec![Task::new("Open", "first"), done, Task::new("", "only description")]
    }

    #[test]
    fn title_falls_back_to_description() {
        let tasks = sample();
        assert_eq!(tasks[0].title_for_list(), "Open");
        assert_eq!(tasks[2].title_for_list(), "only description");
    }

    #[test]
    fn filters_select_by_completion() {
        let tasks = sample();
        assert_eq!(TaskFilter::All.apply(&tasks).len(), 3);
        assert_eq!(TaskFilter::Active.apply(&tasks).len(), 2);
        let completed = TaskFilter::Completed.apply(&tasks);
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].title, "Done");
    }

    #[test]
    fn whitespace_only_task_is_empty() {
        assert!(Task::new("  ", "\t").is_empty());
        assert!(!Task::new("", "x").is_empty());
    }

    #[test]
    fn filter_names_parse_case_insensitively() {
        assert_eq!(TaskFilter::from_str("Active"), Some(TaskFilter::Active));
        assert_eq!(TaskFilter::from_str(TaskFilter::Completed.as_str()), Some(TaskFilter::Completed));
        assert_eq!(TaskFilter::from_str("later"), None);
        assert!(TaskFilter::All.allows_adding());
        assert!(!TaskFilter::Active.allows_adding());
    }
}
