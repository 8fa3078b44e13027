pub mod gemini;
pub mod ollama;
pub mod prompt;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::{Result, TaskTalkError};
use crate::provider::Provider;
use crate::state::{CompletionResult, Prompt};

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;

/// Remote text generation: one request, one reply, no streaming.
///
/// Implementations never return transport errors; every problem is folded
/// into `CompletionResult::Failure` so callers only branch once.
#[async_trait]
pub trait CompletionSource: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> CompletionResult;
}

/// Build the completion client selected by the config.
pub fn from_config(config: &Config) -> Result<Arc<dyn CompletionSource>> {
    let model = config.model();
    match config.provider() {
        Provider::Gemini => {
            let key = config.gemini_key().ok_or_else(|| {
                TaskTalkError::Config(
                    "Gemini API key not configured. Set GEMINI_API_KEY or gemini_api_key in config.json".to_string(),
                )
            })?;
            Ok(Arc::new(GeminiClient::new(&key, &model)))
        }
        Provider::Ollama => Ok(Arc::new(OllamaClient::new(config.ollama_url(), &model))),
    }
}

/// Stand-in used when the selected provider cannot be built, so the rest of
/// the app still works. Every request fails with the original reason.
pub struct UnavailableCompletion {
    reason: String,
}

impl UnavailableCompletion {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl CompletionSource for UnavailableCompletion {
    async fn complete(&self, _prompt: &Prompt) -> CompletionResult {
        CompletionResult::Failure(self.reason.clone())
    }
}
