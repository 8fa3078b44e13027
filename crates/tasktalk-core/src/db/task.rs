use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::watch;

use super::Database;
use crate::error::{Result, TaskTalkError};
use crate::task::Task;

#[async_trait]
pub trait TaskRepository: Send + Sync {
    fn observe(&self) -> watch::Receiver<Vec<Task>>;
    async fn list(&self) -> Result<Vec<Task>>;
    async fn get(&self, id: i64) -> Result<Option<Task>>;
    /// Returns the assigned id.
    async fn insert(&self, task: Task) -> Result<i64>;
    /// Returns the number of rows updated; 0 when the task no longer exists.
    async fn update(&self, task: Task) -> Result<usize>;
    async fn set_completed(&self, id: i64, completed: bool) -> Result<usize>;
    async fn delete(&self, id: i64) -> Result<usize>;
    async fn delete_completed(&self) -> Result<usize>;
}

pub struct SqliteTaskRepository {
    db: Database,
    tx: Arc<watch::Sender<Vec<Task>>>,
}

impl SqliteTaskRepository {
    pub fn new(db: Database) -> Result<Self> {
        let initial = db.with_conn(select_all)?;
        let (tx, _rx) = watch::channel(initial);
        Ok(Self {
            db,
            tx: Arc::new(tx),
        })
    }

    async fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let tx = Arc::clone(&self.tx);
        self.db
            .call(move |conn| {
                let out = f(conn)?;
                tx.send_replace(select_all(conn)?);
                Ok(out)
            })
            .await
    }
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: Some(row.get(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        completed: row.get(3)?,
    })
}

fn select_all(conn: &Connection) -> Result<Vec<Task>> {
    let mut stmt =
        conn.prepare("SELECT id, title, description, is_completed FROM tasks ORDER BY id ASC")?;
    let rows = stmt.query_map([], row_to_task)?;

    let mut tasks = Vec::new();
    for r in rows {
        tasks.push(r?);
    }
    Ok(tasks)
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    fn observe(&self) -> watch::Receiver<Vec<Task>> {
        self.tx.subscribe()
    }

    async fn list(&self) -> Result<Vec<Task>> {
        self.db.call(select_all).await
    }

    async fn get(&self, id: i64) -> Result<Option<Task>> {
        self.db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT id, title, description, is_completed FROM tasks WHERE id = ?1",
                        params![id],
                        row_to_task,
                    )
                    .optional()?)
            })
            .await
    }

    async fn insert(&self, task: Task) -> Result<i64> {
        self.mutate(move |conn| {
            conn.execute(
                "INSERT INTO tasks (title, description, is_completed) VALUES (?1, ?2, ?3)",
                params![task.title, task.description, task.completed],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn update(&self, task: Task) -> Result<usize> {
        let id = task
            .id
            .ok_or_else(|| TaskTalkError::InvalidData("cannot update a task that was never saved".to_string()))?;
        self.mutate(move |conn| {
            Ok(conn.execute(
                "UPDATE tasks SET title = ?1, description = ?2, is_completed = ?3 WHERE id = ?4",
                params![task.title, task.description, task.completed, id],
            )?)
        })
        .await
    }

    async fn set_completed(&self, id: i64, completed: bool) -> Result<usize> {
        self.mutate(move |conn| {
            Ok(conn.execute(
                "UPDATE tasks SET is_completed = ?1 WHERE id = ?2",
                params![completed, id],
            )?)
        })
        .await
    }

    async fn delete(&self, id: i64) -> Result<usize> {
        self.mutate(move |conn| Ok(conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?))
            .await
    }

    async fn delete_completed(&self) -> Result<usize> {
        self.mutate(|conn| Ok(conn.execute("DELETE FROM tasks WHERE is_completed = 1", [])?))
            .await
    }
}
