use std::sync::Arc;

use tokio::sync::watch;

use crate::db::TaskRepository;
use crate::statistics::TaskStatistics;
use crate::task::Task;

/// Live active/completed split.
pub struct StatisticsModel {
    rx: watch::Receiver<Vec<Task>>,
}

impl StatisticsModel {
    pub fn new(tasks: &Arc<dyn TaskRepository>) -> Self {
        Self { rx: tasks.observe() }
    }

    pub fn statistics(&self) -> TaskStatistics {
        TaskStatistics::from_tasks(&self.rx.borrow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, SqliteTaskRepository};

    #[tokio::test]
    async fn follows_store_changes() {
        let repo: Arc<dyn TaskRepository> =
            Arc::new(SqliteTaskRepository::new(Database::open_in_memory().unwrap()).unwrap());
        let model = StatisticsModel::new(&repo);
        assert!(model.statistics().is_empty);

        let id = repo.insert(Task::new("a", "")).await.unwrap();
        repo.insert(Task::new("b", "")).await.unwrap();
        repo.set_completed(id, true).await.unwrap();

        let stats = model.statistics();
        assert!(!stats.is_empty);
        assert_eq!(stats.active_percent, 50.0);
        assert_eq!(stats.completed_percent, 50.0);
    }
}
