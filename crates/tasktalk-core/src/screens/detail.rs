use std::sync::Arc;

use tracing::info;

use super::{completion_message, MSG_TASK_DELETED};
use crate::db::TaskRepository;
use crate::error::{Result, TaskTalkError};
use crate::task::Task;

pub struct TaskDetailModel {
    tasks: Arc<dyn TaskRepository>,
    task: Task,
    snackbar: Option<String>,
}

impl TaskDetailModel {
    pub async fn load(tasks: Arc<dyn TaskRepository>, id: i64) -> Result<Self> {
        let task = tasks.get(id).await?.ok_or(TaskTalkError::TaskNotFound(id))?;
        Ok(Self {
            tasks,
            task,
            snackbar: None,
        })
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn id(&self) -> i64 {
        self.task.id.unwrap_or_default()
    }

    pub async fn toggle_completed(&mut self) -> Result<()> {
        let completed = !self.task.completed;
        if self.tasks.set_completed(self.id(), completed).await? == 0 {
            return Err(TaskTalkError::TaskNotFound(self.id()));
        }
        self.task.completed = completed;
        self.snackbar = Some(completion_message(completed).to_string());
        Ok(())
    }

    pub async fn delete(&mut self) -> Result<()> {
        self.tasks.delete(self.id()).await?;
        info!(id = self.id(), "task deleted");
        self.snackbar = Some(MSG_TASK_DELETED.to_string());
        Ok(())
    }

    pub fn snackbar(&self) -> Option<&str> {
        self.snackbar.as_deref()
    }
}
