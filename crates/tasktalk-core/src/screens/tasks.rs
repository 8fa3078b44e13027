use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use super::{completion_message, SaveOutcome, MSG_COMPLETED_CLEARED, MSG_TASK_ADDED, MSG_TASK_SAVED};
use crate::db::TaskRepository;
use crate::error::{Result, TaskTalkError};
use crate::saved_state::{SavedState, TASKS_FILTER_KEY};
use crate::task::{Task, TaskFilter};

/// The filtered task list.
pub struct TaskListModel {
    tasks: Arc<dyn TaskRepository>,
    saved_state: Arc<dyn SavedState>,
    rx: watch::Receiver<Vec<Task>>,
    items: Vec<Task>,
    filter: TaskFilter,
    snackbar: Option<String>,
}

impl TaskListModel {
    /// The filter is restored from saved state.
    pub fn new(tasks: Arc<dyn TaskRepository>, saved_state: Arc<dyn SavedState>) -> Self {
        let filter = saved_state
            .get(TASKS_FILTER_KEY)
            .and_then(|s| TaskFilter::from_str(&s))
            .unwrap_or_default();
        let mut rx = tasks.observe();
        let items = rx.borrow_and_update().clone();

        Self {
            tasks,
            saved_state,
            rx,
            items,
            filter,
            snackbar: None,
        }
    }

    pub fn filter(&self) -> TaskFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: TaskFilter) {
        self.filter = filter;
        self.saved_state.set(TASKS_FILTER_KEY, filter.as_str());
    }

    pub fn label(&self) -> &'static str {
        self.filter.label()
    }

    pub fn empty_message(&self) -> &'static str {
        self.filter.empty_message()
    }

    pub fn add_visible(&self) -> bool {
        self.filter.allows_adding()
    }

    /// Tasks passing the current filter, oldest first.
    pub fn visible(&self) -> Vec<Task> {
        self.filter.apply(&self.items)
    }

    /// Pull the latest snapshot if the store changed. Returns true when it did.
    pub fn sync(&mut self) -> bool {
        if !self.rx.has_changed().unwrap_or(false) {
            return false;
        }
        self.items = self.rx.borrow_and_update().clone();
        true
    }

    /// Reload from the store regardless of pending notifications.
    pub async fn refresh(&mut self) -> Result<()> {
        self.items = self.tasks.list().await?;
        self.rx.borrow_and_update();
        debug!(count = self.items.len(), "tasks refreshed");
        Ok(())
    }

    pub async fn toggle_completed(&mut self, task: &Task) -> Result<()> {
        let id = task
            .id
            .ok_or_else(|| TaskTalkError::InvalidData("task was never saved".to_string()))?;
        let completed = !task.completed;
        if self.tasks.set_completed(id, completed).await? == 0 {
            return Err(TaskTalkError::TaskNotFound(id));
        }
        self.sync();
        self.snackbar = Some(completion_message(completed).to_string());
        Ok(())
    }

    pub async fn clear_completed(&mut self) -> Result<()> {
        let removed = self.tasks.delete_completed().await?;
        info!(removed, "completed tasks cleared");
        self.sync();
        self.snackbar = Some(MSG_COMPLETED_CLEARED.to_string());
        Ok(())
    }

    /// Confirm what the add/edit screen just did.
    pub fn show_edit_result(&mut self, outcome: SaveOutcome) {
        match outcome {
            SaveOutcome::Created(_) => self.show_message(MSG_TASK_ADDED),
            SaveOutcome::Updated(_) => self.show_message(MSG_TASK_SAVED),
            SaveOutcome::Rejected => {}
        }
    }

    pub fn show_message(&mut self, message: impl Into<String>) {
        self.snackbar = Some(message.into());
    }

    pub fn snackbar(&self) -> Option<&str> {
        self.snackbar.as_deref()
    }

    pub fn dismiss_snackbar(&mut self) {
        self.snackbar = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, SqliteTaskRepository};
    use crate::saved_state::MemorySavedState;

    async fn model_with(tasks: &[(&str, bool)]) -> (TaskListModel, Arc<MemorySavedState>) {
        let repo = Arc::new(SqliteTaskRepository::new(Database::open_in_memory().unwrap()).unwrap());
        for (title, completed) in tasks {
            let mut task = Task::new(title, "");
            task.completed = *completed;
            repo.insert(task).await.unwrap();
        }
        let saved = Arc::new(MemorySavedState::default());
        (TaskListModel::new(repo, saved.clone()), saved)
    }

    #[tokio::test]
    async fn filter_is_saved_and_restored() {
        let (mut model, saved) = model_with(&[("a", false), ("b", true)]).await;
        assert_eq!(model.filter(), TaskFilter::All);
        assert!(model.add_visible());

        model.set_filter(TaskFilter::Completed);
        assert_eq!(saved.get(TASKS_FILTER_KEY).as_deref(), Some("completed"));
        assert_eq!(model.label(), "Completed Tasks");
        assert!(!model.add_visible());
        let visible = model.visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].title, "b");

        let restored = TaskListModel::new(model.tasks.clone(), saved);
        assert_eq!(restored.filter(), TaskFilter::Completed);
    }

    #[tokio::test]
    async fn toggle_sets_snackbar_and_updates_items() {
        let (mut model, _) = model_with(&[("a", false)]).await;
        let task = model.visible()[0].clone();

        model.toggle_completed(&task).await.unwrap();
        assert_eq!(model.snackbar(), Some("Task marked complete"));
        assert!(model.visible()[0].completed);

        let task = model.visible()[0].clone();
        model.toggle_completed(&task).await.unwrap();
        assert_eq!(model.snackbar(), Some("Task marked active"));
    }

    #[tokio::test]
    async fn edit_results_confirm_add_and_save() {
        let (mut model, _) = model_with(&[]).await;
        model.show_edit_result(SaveOutcome::Rejected);
        assert_eq!(model.snackbar(), None);
        model.show_edit_result(SaveOutcome::Created(1));
        assert_eq!(model.snackbar(), Some("Task added"));
        model.show_edit_result(SaveOutcome::Updated(1));
        assert_eq!(model.snackbar(), Some("Task saved"));
    }

    #[tokio::test]
    async fn toggling_an_unsaved_task_is_invalid() {
        let (mut model, _) = model_with(&[]).await;
        let err = model.toggle_completed(&Task::new("draft", "")).await.unwrap_err();
        assert!(matches!(err, TaskTalkError::InvalidData(_)));
        assert_eq!(model.snackbar(), None);
    }

    #[tokio::test]
    async fn clear_completed_leaves_active_tasks() {
        let (mut model, _) = model_with(&[("a", false), ("b", true), ("c", true)]).await;
        model.clear_completed().await.unwrap();
        assert_eq!(model.snackbar(), Some("Completed tasks cleared"));
        assert_eq!(model.visible().len(), 1);

        model.set_filter(TaskFilter::Completed);
        assert!(model.visible().is_empty());
        assert_eq!(model.empty_message(), "You have no completed tasks!");
    }
}
