use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow};
use serde_json::Value;

use crate::provider::Provider;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub provider: Option<String>,
    pub default_model: Option<String>,
    pub gemini_api_key: Option<String>,
    pub ollama_url: Option<String>,
    /// External transcription command; its stdout is taken as the utterance.
    pub recognizer_command: Option<String>,
    /// Overrides the platform text-to-speech command; it reads the reply on stdin.
    pub speech_command: Option<String>,
    pub microphone_consent: Option<bool>,
    pub database_path: Option<PathBuf>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            provider: Some(Provider::Gemini.as_str().to_string()),
            ..Self::default()
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    /// Set `microphone_consent` in the file at `config_path`, keeping every
    /// other key as written. A file that is not a JSON object is left alone.
    pub fn write_microphone_consent(config_path: &Path, granted: bool) -> Result<()> {
        let mut value = if config_path.exists() {
            let content = fs::read_to_string(config_path)?;
            serde_json::from_str::<Value>(&content).with_context(|| {
                format!("{} is not valid JSON; not overwriting it", config_path.display())
            })?
        } else {
            serde_json::to_value(Self::new())?
        };

        let object = value
            .as_object_mut()
            .ok_or_else(|| anyhow!("{} does not hold a JSON object", config_path.display()))?;
        object.insert("microphone_consent".to_string(), Value::Bool(granted));

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(config_path, serde_json::to_string_pretty(&value)?)?;
        Ok(())
    }

    pub fn provider(&self) -> Provider {
        self.provider
            .as_deref()
            .and_then(Provider::from_str)
            .unwrap_or(Provider::Gemini)
    }

    pub fn model(&self) -> String {
        self.default_model
            .clone()
            .unwrap_or_else(|| self.provider().default_model().to_string())
    }

    /// Environment first, then the stored key.
    pub fn gemini_key(&self) -> Option<String> {
        std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.gemini_api_key.clone())
    }

    pub fn ollama_url(&self) -> &str {
        self.ollama_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL)
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("tasktalk.db")),
        }
    }

    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;

        Ok(data_dir.join("tasktalk"))
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("tasktalk").join("config.json"))
    }
}
