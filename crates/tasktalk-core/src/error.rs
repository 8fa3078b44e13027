//! Error types for the tasktalk core library.

/// Top-level error type for storage, completion, and speech collaborators.
#[derive(Debug, thiserror::Error)]
pub enum TaskTalkError {
    /// SQLite error from the task or chat store.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport error talking to a completion provider.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The completion provider answered with an error or an unusable body.
    #[error("completion error: {0}")]
    Completion(String),

    /// Speech recognition or synthesis error.
    #[error("speech error: {0}")]
    Speech(String),

    /// No task with this id.
    #[error("task {0} not found")]
    TaskNotFound(i64),

    /// A row or value that cannot be interpreted, such as an unsaved task
    /// passed where a stored one is required.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// A background task or channel went away.
    #[error("channel error: {0}")]
    Channel(String),
}

impl From<tokio::task::JoinError> for TaskTalkError {
    fn from(e: tokio::task::JoinError) -> Self {
        TaskTalkError::Channel(e.to_string())
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, TaskTalkError>;
