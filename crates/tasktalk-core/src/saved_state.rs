//! Small key/value state that survives process restarts.
//!
//! `set` is called on every keystroke in the chat box, so the JSON store only
//! updates memory there and leaves the disk write to a background task that
//! waits for typing to pause. `flush` forces the write.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{Result, TaskTalkError};

/// Chat input the user had not yet sent.
pub const USER_LAST_INPUT_KEY: &str = "user-last-input";
/// Current task list filter.
pub const TASKS_FILTER_KEY: &str = "tasks-filter";

/// Quiet period before pending changes are written.
pub const WRITE_DELAY: Duration = Duration::from_millis(250);

#[async_trait]
pub trait SavedState: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);

    /// Write anything still pending.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// In-process only; used by tests and when no data directory is available.
#[derive(Default)]
pub struct MemorySavedState {
    values: Mutex<BTreeMap<String, String>>,
}

impl SavedState for MemorySavedState {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
    }
}

struct JsonFile {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
    /// Serializes writers so an older snapshot never lands after a newer one.
    write_lock: Mutex<()>,
}

impl JsonFile {
    fn persist(&self) -> Result<()> {
        let _writing = self
            .write_lock
            .lock()
            .map_err(|_| TaskTalkError::Channel("saved state writer poisoned".to_string()))?;
        let snapshot = self
            .values
            .lock()
            .map_err(|_| TaskTalkError::Channel("saved state poisoned".to_string()))?
            .clone();

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&snapshot)?)?;
        debug!(path = %self.path.display(), keys = snapshot.len(), "saved state written");
        Ok(())
    }
}

async fn persist_blocking(file: Arc<JsonFile>) -> Result<()> {
    tokio::task::spawn_blocking(move || file.persist()).await?
}

/// Backed by a JSON object on disk. Must be opened inside a tokio runtime.
pub struct JsonSavedState {
    file: Arc<JsonFile>,
    dirty: mpsc::UnboundedSender<()>,
}

impl JsonSavedState {
    pub fn open(path: &Path) -> Result<Self> {
        let values = if path.exists() {
            let content = fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };
        let file = Arc::new(JsonFile {
            path: path.to_path_buf(),
            values: Mutex::new(values),
            write_lock: Mutex::new(()),
        });

        let (dirty, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_behind(Arc::clone(&file), rx));
        Ok(Self { file, dirty })
    }
}

/// Waits for a change, lets further changes settle for `WRITE_DELAY`, then
/// writes once. Ends when the store is dropped.
async fn write_behind(file: Arc<JsonFile>, mut dirty: mpsc::UnboundedReceiver<()>) {
    while dirty.recv().await.is_some() {
        loop {
            tokio::time::sleep(WRITE_DELAY).await;
            let mut more = false;
            while dirty.try_recv().is_ok() {
                more = true;
            }
            if !more {
                break;
            }
        }
        if let Err(e) = persist_blocking(Arc::clone(&file)).await {
            warn!(error = %e, "failed to write saved state");
        }
    }
}

#[async_trait]
impl SavedState for JsonSavedState {
    fn get(&self, key: &str) -> Option<String> {
        self.file.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let Ok(mut values) = self.file.values.lock() else {
            return;
        };
        if values.get(key).map(String::as_str) == Some(value) {
            return;
        }
        values.insert(key.to_string(), value.to_string());
        drop(values);
        if self.dirty.send(()).is_err() {
            warn!(key, "saved state writer stopped; change kept in memory only");
        }
    }

    async fn flush(&self) -> Result<()> {
        persist_blocking(Arc::clone(&self.file)).await
    }
}
