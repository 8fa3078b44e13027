use std::sync::Arc;

use tracing::{debug, info};

use super::MSG_EMPTY_TASK;
use crate::db::TaskRepository;
use crate::error::{Result, TaskTalkError};
use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created(i64),
    Updated(i64),
    /// Nothing was written; see `snackbar()`.
    Rejected,
}

/// Form state for creating a task or editing an existing one.
pub struct AddEditModel {
    tasks: Arc<dyn TaskRepository>,
    id: Option<i64>,
    completed: bool,
    pub title: String,
    pub description: String,
    snackbar: Option<String>,
}

impl AddEditModel {
    pub fn new_task(tasks: Arc<dyn TaskRepository>) -> Self {
        Self {
            tasks,
            id: None,
            completed: false,
            title: String::new(),
            description: String::new(),
            snackbar: None,
        }
    }

    pub async fn edit(tasks: Arc<dyn TaskRepository>, id: i64) -> Result<Self> {
        let task = tasks.get(id).await?.ok_or(TaskTalkError::TaskNotFound(id))?;
        Ok(Self {
            tasks,
            id: task.id,
            completed: task.completed,
            title: task.title,
            description: task.description,
            snackbar: None,
        })
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub async fn save(&mut self) -> Result<SaveOutcome> {
        let task = Task {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            completed: self.completed,
        };
        if task.is_empty() {
            debug!("empty task rejected");
            self.snackbar = Some(MSG_EMPTY_TASK.to_string());
            return Ok(SaveOutcome::Rejected);
        }

        match self.id {
            None => {
                let id = self.tasks.insert(task).await?;
                info!(id, "task created");
                self.id = Some(id);
                Ok(SaveOutcome::Created(id))
            }
            Some(id) => {
                if self.tasks.update(task).await? == 0 {
                    return Err(TaskTalkError::TaskNotFound(id));
                }
                info!(id, "task updated");
                Ok(SaveOutcome::Updated(id))
            }
        }
    }

    pub fn snackbar(&self) -> Option<&str> {
        self.snackbar.as_deref()
    }
}
