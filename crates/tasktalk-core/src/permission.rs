//! Microphone consent.
//!
//! A terminal has no OS permission dialog to defer to, so consent is asked
//! once by the UI and remembered in the config file.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MicrophoneStatus {
    Granted,
    Denied,
    Unknown,
}

impl MicrophoneStatus {
    fn to_u8(self) -> u8 {
        match self {
            MicrophoneStatus::Unknown => 0,
            MicrophoneStatus::Granted => 1,
            MicrophoneStatus::Denied => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => MicrophoneStatus::Granted,
            2 => MicrophoneStatus::Denied,
            _ => MicrophoneStatus::Unknown,
        }
    }
}

pub const RATIONALE_FIRST_USE: &str =
    "tasktalk needs the microphone to hear your question. Allow voice input?";
pub const RATIONALE_DENIED: &str =
    "Voice input was declined earlier. Allow the microphone to talk to the coach.";

#[async_trait]
pub trait MicrophonePermission: Send + Sync {
    fn status(&self) -> MicrophoneStatus;

    /// Message explaining why the microphone is needed, given the current status.
    fn rationale(&self) -> Option<String> {
        match self.status() {
            MicrophoneStatus::Granted => None,
            MicrophoneStatus::Denied => Some(RATIONALE_DENIED.to_string()),
            MicrophoneStatus::Unknown => Some(RATIONALE_FIRST_USE.to_string()),
        }
    }

    async fn grant(&self);
    async fn deny(&self);
}

/// Consent stored in `config.json` under `microphone_consent`.
pub struct ConfigPermission {
    status: AtomicU8,
    /// `None` keeps the answer in memory only.
    path: Option<PathBuf>,
}

impl ConfigPermission {
    /// Reads the current answer from `config` and records new answers in the
    /// user's config file.
    pub fn from_config(config: &Config) -> Self {
        let path = match Config::config_path() {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "no config directory; microphone consent will not be remembered");
                None
            }
        };
        Self::with_path(config, path)
    }

    pub fn with_path(config: &Config, path: Option<PathBuf>) -> Self {
        let status = match config.microphone_consent {
            Some(true) => MicrophoneStatus::Granted,
            Some(false) => MicrophoneStatus::Denied,
            None => MicrophoneStatus::Unknown,
        };
        Self {
            status: AtomicU8::new(status.to_u8()),
            path,
        }
    }

    /// Never touches the config file.
    pub fn in_memory(status: MicrophoneStatus) -> Self {
        Self {
            status: AtomicU8::new(status.to_u8()),
            path: None,
        }
    }

    async fn record(&self, status: MicrophoneStatus) {
        self.status.store(status.to_u8(), Ordering::SeqCst);
        let Some(path) = self.path.clone() else {
            return;
        };

        let granted = status == MicrophoneStatus::Granted;
        let written =
            tokio::task::spawn_blocking(move || Config::write_microphone_consent(&path, granted)).await;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "failed to save microphone consent"),
            Err(e) => warn!(error = %e, "microphone consent writer panicked"),
        }
    }
}

#[async_trait]
impl MicrophonePermission for ConfigPermission {
    fn status(&self) -> MicrophoneStatus {
        MicrophoneStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    async fn grant(&self) {
        self.record(MicrophoneStatus::Granted).await;
    }

    async fn deny(&self) {
        self.record(MicrophoneStatus::Denied).await;
    }
}
