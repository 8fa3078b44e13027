use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, Row};
use tokio::sync::watch;

use super::Database;
use crate::error::{Result, TaskTalkError};
use crate::state::{ChatTurn, Direction};

/// Append-only log of chat turns. Turns are only ever removed all at once.
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Live ordered sequence, oldest first, updated after every mutation.
    fn observe(&self) -> watch::Receiver<Vec<ChatTurn>>;
    async fn list(&self) -> Result<Vec<ChatTurn>>;
    async fn append(&self, text: &str, direction: Direction) -> Result<ChatTurn>;
    async fn clear(&self) -> Result<()>;
}

pub struct SqliteChatRepository {
    db: Database,
    tx: Arc<watch::Sender<Vec<ChatTurn>>>,
}

impl SqliteChatRepository {
    pub fn new(db: Database) -> Result<Self> {
        let initial = db.with_conn(select_all)?;
        let (tx, _rx) = watch::channel(initial);
        Ok(Self {
            db,
            tx: Arc::new(tx),
        })
    }

    /// Run a mutation and publish the new snapshot while still holding the lock,
    /// so observers see snapshots in commit order.
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

fn row_to_turn(row: &Row<'_>) -> rusqlite::Result<(i64, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn into_turn((id, text, kind): (i64, String, String)) -> Result<ChatTurn> {
    let direction = Direction::from_str(&kind)
        .ok_or_else(|| TaskTalkError::InvalidData(format!("unknown message_type '{kind}' for message {id}")))?;
    Ok(ChatTurn { id, text, direction })
}

fn select_all(conn: &Connection) -> Result<Vec<ChatTurn>> {
    let mut stmt = conn.prepare("SELECT id, message, message_type FROM chat_message ORDER BY id ASC")?;
    let rows = stmt.query_map([], row_to_turn)?;

    let mut turns = Vec::new();
    for r in rows {
        turns.push(into_turn(r?)?);
    }
    Ok(turns)
}

#[async_trait]
impl ChatRepository for SqliteChatRepository {
    fn observe(&self) -> watch::Receiver<Vec<ChatTurn>> {
        self.tx.subscribe()
    }

    async fn list(&self) -> Result<Vec<ChatTurn>> {
        self.db.call(select_all).await
    }

    async fn append(&self, text: &str, direction: Direction) -> Result<ChatTurn> {
        let text = text.to_string();
        self.mutate(move |conn| {
            conn.execute(
                "INSERT INTO chat_message (message, message_type) VALUES (?1, ?2)",
                params![text, direction.as_str()],
            )?;
            Ok(ChatTurn {
                id: conn.last_insert_rowid(),
                text,
                direction,
            })
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.mutate(|conn| {
            conn.execute("DELETE FROM chat_message", [])?;
            Ok(())
        })
        .await
    }
}
